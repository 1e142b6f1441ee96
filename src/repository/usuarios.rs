use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{
    format_timestamp, NewUsuario, PerfilUpdate, Usuario, PASSWORD_MAX_BYTES,
};
use crate::db::DbPool;
use crate::error::{ModelError, ModelResult};

/// Account storage. Passwords are bcrypt-hashed on the way in.
#[async_trait]
pub trait UsuarioRepository: Send + Sync {
    async fn create(&self, nuevo: NewUsuario) -> ModelResult<Usuario>;

    async fn get(&self, id: i64) -> ModelResult<Option<Usuario>>;

    async fn find_by_email(&self, email: &str) -> ModelResult<Option<Usuario>>;

    async fn list(&self) -> ModelResult<Vec<Usuario>>;

    /// Overwrites only the fields set in `cambios`. A field cannot be cleared
    /// back to NULL through this call.
    async fn update_profile(&self, id: i64, cambios: PerfilUpdate) -> ModelResult<Usuario>;

    /// Returns the account only if the password matches its stored hash
    async fn verify_credentials(&self, email: &str, password: &str)
        -> ModelResult<Option<Usuario>>;

    /// Delete an account along with its posts, their files and every
    /// interaction touching either
    async fn delete(&self, id: i64) -> ModelResult<bool>;
}

pub struct SqliteUsuarioRepository {
    pool: DbPool,
    bcrypt_cost: u32,
}

impl SqliteUsuarioRepository {
    pub fn new(pool: DbPool) -> Self {
        Self::with_bcrypt_cost(pool, bcrypt::DEFAULT_COST)
    }

    pub fn with_bcrypt_cost(pool: DbPool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }
}

fn fetch(conn: &Connection, id: i64) -> ModelResult<Option<Usuario>> {
    let usuario = conn
        .query_row(
            &format!("SELECT {} FROM usuario WHERE id = ?1", Usuario::COLUMNS),
            params![id],
            Usuario::from_row,
        )
        .optional()?;
    Ok(usuario)
}

fn fetch_by_email(conn: &Connection, email: &str) -> ModelResult<Option<Usuario>> {
    let usuario = conn
        .query_row(
            &format!("SELECT {} FROM usuario WHERE email = ?1", Usuario::COLUMNS),
            params![email],
            Usuario::from_row,
        )
        .optional()?;
    Ok(usuario)
}

#[async_trait]
impl UsuarioRepository for SqliteUsuarioRepository {
    async fn create(&self, nuevo: NewUsuario) -> ModelResult<Usuario> {
        nuevo.validate()?;
        let password_hash = bcrypt::hash(&nuevo.password, self.bcrypt_cost)?;

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO usuario (email, password, nombre, apellido, biografia, imagen, sexo, fecha_subscripcion)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                nuevo.email,
                password_hash,
                nuevo.nombre,
                nuevo.apellido,
                nuevo.biografia,
                nuevo.imagen,
                nuevo.sexo,
                nuevo.fecha_subscripcion.as_ref().map(format_timestamp),
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(usuario_id = id, "Created usuario");

        fetch(&conn, id)?.ok_or_else(|| ModelError::NotFound(format!("usuario {id}")))
    }

    async fn get(&self, id: i64) -> ModelResult<Option<Usuario>> {
        let conn = self.pool.get()?;
        fetch(&conn, id)
    }

    async fn find_by_email(&self, email: &str) -> ModelResult<Option<Usuario>> {
        let conn = self.pool.get()?;
        fetch_by_email(&conn, email)
    }

    async fn list(&self) -> ModelResult<Vec<Usuario>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM usuario ORDER BY id",
            Usuario::COLUMNS
        ))?;
        let usuarios = stmt
            .query_map([], Usuario::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(usuarios)
    }

    async fn update_profile(&self, id: i64, cambios: PerfilUpdate) -> ModelResult<Usuario> {
        cambios.validate()?;

        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE usuario SET
               nombre = COALESCE(?2, nombre),
               apellido = COALESCE(?3, apellido),
               biografia = COALESCE(?4, biografia),
               imagen = COALESCE(?5, imagen),
               sexo = COALESCE(?6, sexo)
             WHERE id = ?1",
            params![
                id,
                cambios.nombre,
                cambios.apellido,
                cambios.biografia,
                cambios.imagen,
                cambios.sexo
            ],
        )?;
        if rows == 0 {
            return Err(ModelError::NotFound(format!("usuario {id}")));
        }
        tracing::debug!(usuario_id = id, "Updated profile");

        fetch(&conn, id)?.ok_or_else(|| ModelError::NotFound(format!("usuario {id}")))
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> ModelResult<Option<Usuario>> {
        // bcrypt would compare only the first 72 bytes of a longer input
        if password.len() > PASSWORD_MAX_BYTES {
            return Ok(None);
        }

        let conn = self.pool.get()?;
        let Some(usuario) = fetch_by_email(&conn, email)? else {
            return Ok(None);
        };

        if bcrypt::verify(password, &usuario.password_hash)? {
            Ok(Some(usuario))
        } else {
            tracing::debug!(usuario_id = usuario.id, "Password mismatch");
            Ok(None)
        }
    }

    async fn delete(&self, id: i64) -> ModelResult<bool> {
        let conn = self.pool.get()?;

        // Both cascade paths onto interaccion resolve inside this one statement
        let rows = conn.execute("DELETE FROM usuario WHERE id = ?1", params![id])?;
        if rows > 0 {
            tracing::info!(usuario_id = id, "Deleted usuario");
        }

        Ok(rows > 0)
    }
}
