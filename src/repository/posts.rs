use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::db::models::{NewPost, Post};
use crate::db::DbPool;
use crate::error::{ModelError, ModelResult};

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Fails with a foreign key violation when the author does not exist
    async fn create(&self, nuevo: NewPost) -> ModelResult<Post>;

    async fn get(&self, id: i64) -> ModelResult<Option<Post>>;

    /// Newest first
    async fn list_by_usuario(&self, usuario_id: i64) -> ModelResult<Vec<Post>>;

    async fn update_descripcion(&self, id: i64, descripcion: Option<String>)
        -> ModelResult<Post>;

    /// Delete a post with its files and interactions
    async fn delete(&self, id: i64) -> ModelResult<bool>;
}

pub struct SqlitePostRepository {
    pool: DbPool,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn create(&self, nuevo: NewPost) -> ModelResult<Post> {
        let conn = self.pool.get()?;

        let post = conn.query_row(
            &format!(
                "INSERT INTO post (descripcion, usuario_id) VALUES (?1, ?2) RETURNING {}",
                Post::COLUMNS
            ),
            params![nuevo.descripcion, nuevo.usuario_id],
            Post::from_row,
        )?;
        tracing::info!(post_id = post.id, usuario_id = post.usuario_id, "Created post");

        Ok(post)
    }

    async fn get(&self, id: i64) -> ModelResult<Option<Post>> {
        let conn = self.pool.get()?;

        let post = conn
            .query_row(
                &format!("SELECT {} FROM post WHERE id = ?1", Post::COLUMNS),
                params![id],
                Post::from_row,
            )
            .optional()?;

        Ok(post)
    }

    async fn list_by_usuario(&self, usuario_id: i64) -> ModelResult<Vec<Post>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM post WHERE usuario_id = ?1 ORDER BY fecha_creado DESC, id DESC",
            Post::COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![usuario_id], Post::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn update_descripcion(
        &self,
        id: i64,
        descripcion: Option<String>,
    ) -> ModelResult<Post> {
        let conn = self.pool.get()?;

        let post = conn
            .query_row(
                &format!(
                    "UPDATE post SET descripcion = ?2 WHERE id = ?1 RETURNING {}",
                    Post::COLUMNS
                ),
                params![id, descripcion],
                Post::from_row,
            )
            .optional()?;

        post.ok_or_else(|| ModelError::NotFound(format!("post {id}")))
    }

    async fn delete(&self, id: i64) -> ModelResult<bool> {
        let conn = self.pool.get()?;

        let rows = conn.execute("DELETE FROM post WHERE id = ?1", params![id])?;
        if rows > 0 {
            tracing::info!(post_id = id, "Deleted post");
        }

        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_repo() -> (SqlitePostRepository, DbPool, TempDir) {
        let (pool, temp_dir) = test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO usuario (email, password) VALUES ('a@x.com', 'hash')",
            [],
        )
        .unwrap();
        drop(conn);

        (SqlitePostRepository::new(pool.clone()), pool, temp_dir)
    }

    #[tokio::test]
    async fn test_create_and_serialize() {
        let (repo, _pool, _temp) = create_test_repo();
        let before = Utc::now() - chrono::Duration::seconds(1);

        let post = repo
            .create(NewPost {
                usuario_id: 1,
                descripcion: Some("hi".into()),
            })
            .await
            .unwrap();

        assert_eq!(post.id, 1);
        assert!(post.fecha_creado >= before);
        let payload = post.to_json();
        assert_eq!(payload["id"], 1);
        assert_eq!(payload["descripcion"], "hi");
        assert_eq!(payload["usuario_id"], 1);
        assert!(payload["fecha_creado"].is_string());
    }

    #[tokio::test]
    async fn test_descripcion_is_optional() {
        let (repo, _pool, _temp) = create_test_repo();

        let post = repo
            .create(NewPost {
                usuario_id: 1,
                descripcion: None,
            })
            .await
            .unwrap();

        assert!(post.to_json()["descripcion"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_author_is_foreign_key_violation() {
        let (repo, _pool, _temp) = create_test_repo();

        let err = repo
            .create(NewPost {
                usuario_id: 99,
                descripcion: Some("hi".into()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::ForeignKeyViolation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_list_by_usuario_newest_first() {
        let (repo, _pool, _temp) = create_test_repo();

        for texto in ["uno", "dos", "tres"] {
            repo.create(NewPost {
                usuario_id: 1,
                descripcion: Some(texto.into()),
            })
            .await
            .unwrap();
        }

        let posts = repo.list_by_usuario(1).await.unwrap();
        let textos: Vec<_> = posts
            .iter()
            .map(|p| p.descripcion.as_deref().unwrap())
            .collect();
        assert_eq!(textos, vec!["tres", "dos", "uno"]);
        assert!(repo.list_by_usuario(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_descripcion() {
        let (repo, _pool, _temp) = create_test_repo();
        let post = repo
            .create(NewPost {
                usuario_id: 1,
                descripcion: Some("hi".into()),
            })
            .await
            .unwrap();

        let updated = repo
            .update_descripcion(post.id, Some("editado".into()))
            .await
            .unwrap();
        assert_eq!(updated.descripcion.as_deref(), Some("editado"));
        assert_eq!(updated.fecha_creado, post.fecha_creado);

        let err = repo.update_descripcion(99, None).await.unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_children() {
        let (repo, pool, _temp) = create_test_repo();
        let post = repo
            .create(NewPost {
                usuario_id: 1,
                descripcion: None,
            })
            .await
            .unwrap();

        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO archivo (file, post_id) VALUES ('a.png', 1), ('b.png', 1);
             INSERT INTO interaccion (user_id, post_id, tipo_interaccion) VALUES (1, 1, 'like');",
        )
        .unwrap();

        assert!(repo.delete(post.id).await.unwrap());

        let remaining: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM archivo) + (SELECT COUNT(*) FROM interaccion)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(repo.get(post.id).await.unwrap().is_none());
    }
}
