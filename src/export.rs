//! Composed payloads.
//!
//! Record payloads are flat and never inline related rows. When a caller
//! wants a post together with its files and interactions, or a full dump of
//! the database, the children are serialized on their own and nested here.

use serde_json::{json, Value};

use crate::db::models::{Archivo, Interaccion, Post, Usuario};
use crate::db::DbPool;
use crate::error::ModelResult;
use crate::repository::{
    ArchivoRepository, InteraccionRepository, PostRepository, SqliteArchivoRepository,
    SqliteInteraccionRepository, SqlitePostRepository, SqliteUsuarioRepository,
    UsuarioRepository,
};

/// Flat post payload plus `archivos` and `interacciones` arrays.
pub fn post_payload(post: &Post, archivos: &[Archivo], interacciones: &[Interaccion]) -> Value {
    let mut payload = post.to_json();
    if let Value::Object(ref mut map) = payload {
        map.insert(
            "archivos".to_string(),
            archivos.iter().map(Archivo::to_json).collect(),
        );
        map.insert(
            "interacciones".to_string(),
            interacciones.iter().map(Interaccion::to_json).collect(),
        );
    }
    payload
}

/// Flat user payload plus a `posts` array of composed posts.
pub fn usuario_payload(usuario: &Usuario, posts: Vec<Value>) -> Value {
    let mut payload = usuario.to_json();
    if let Value::Object(ref mut map) = payload {
        map.insert("posts".to_string(), Value::Array(posts));
    }
    payload
}

/// Every user with their posts, files and the interactions received.
pub async fn snapshot(pool: &DbPool) -> ModelResult<Value> {
    let usuarios = SqliteUsuarioRepository::new(pool.clone());
    let posts = SqlitePostRepository::new(pool.clone());
    let archivos = SqliteArchivoRepository::new(pool.clone());
    let interacciones = SqliteInteraccionRepository::new(pool.clone());

    let mut out = Vec::new();
    for usuario in usuarios.list().await? {
        let mut composed = Vec::new();
        for post in posts.list_by_usuario(usuario.id).await? {
            let files = archivos.list_by_post(post.id).await?;
            let received = interacciones.list_by_post(post.id).await?;
            composed.push(post_payload(&post, &files, &received));
        }
        out.push(usuario_payload(&usuario, composed));
    }

    tracing::debug!(usuarios = out.len(), "Built snapshot");
    Ok(json!({ "usuarios": out }))
}
