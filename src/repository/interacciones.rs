use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::db::models::{Interaccion, InteraccionCounts, NewInteraccion, TipoInteraccion};
use crate::db::DbPool;
use crate::error::ModelResult;

/// Likes and favourites. A user holds at most one interaction of each kind per post.
#[async_trait]
pub trait InteraccionRepository: Send + Sync {
    /// Fails with a unique violation if the same (user, post, kind) already exists
    async fn create(&self, nueva: NewInteraccion) -> ModelResult<Interaccion>;

    async fn get(&self, id: i64) -> ModelResult<Option<Interaccion>>;

    async fn list_by_post(&self, post_id: i64) -> ModelResult<Vec<Interaccion>>;

    async fn list_by_usuario(&self, user_id: i64) -> ModelResult<Vec<Interaccion>>;

    async fn delete(&self, id: i64) -> ModelResult<bool>;

    /// Remove the interaction if present, otherwise add it.
    /// Returns whether it is active afterwards.
    async fn toggle(&self, user_id: i64, post_id: i64, tipo: TipoInteraccion)
        -> ModelResult<bool>;

    async fn counts(&self, post_id: i64) -> ModelResult<InteraccionCounts>;
}

pub struct SqliteInteraccionRepository {
    pool: DbPool,
}

impl SqliteInteraccionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn list_where(&self, column: &str, value: i64) -> ModelResult<Vec<Interaccion>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM interaccion WHERE {column} = ?1 ORDER BY id",
            Interaccion::COLUMNS
        ))?;
        let interacciones = stmt
            .query_map(params![value], Interaccion::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(interacciones)
    }
}

#[async_trait]
impl InteraccionRepository for SqliteInteraccionRepository {
    async fn create(&self, nueva: NewInteraccion) -> ModelResult<Interaccion> {
        let conn = self.pool.get()?;

        let interaccion = conn.query_row(
            &format!(
                "INSERT INTO interaccion (user_id, post_id, tipo_interaccion)
                 VALUES (?1, ?2, ?3) RETURNING {}",
                Interaccion::COLUMNS
            ),
            params![nueva.user_id, nueva.post_id, nueva.tipo_interaccion],
            Interaccion::from_row,
        )?;
        tracing::debug!(
            interaccion_id = interaccion.id,
            tipo = %interaccion.tipo_interaccion,
            "Created interaccion"
        );

        Ok(interaccion)
    }

    async fn get(&self, id: i64) -> ModelResult<Option<Interaccion>> {
        let conn = self.pool.get()?;

        let interaccion = conn
            .query_row(
                &format!(
                    "SELECT {} FROM interaccion WHERE id = ?1",
                    Interaccion::COLUMNS
                ),
                params![id],
                Interaccion::from_row,
            )
            .optional()?;

        Ok(interaccion)
    }

    async fn list_by_post(&self, post_id: i64) -> ModelResult<Vec<Interaccion>> {
        self.list_where("post_id", post_id)
    }

    async fn list_by_usuario(&self, user_id: i64) -> ModelResult<Vec<Interaccion>> {
        self.list_where("user_id", user_id)
    }

    async fn delete(&self, id: i64) -> ModelResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM interaccion WHERE id = ?1", params![id])?;
        if rows > 0 {
            tracing::info!(interaccion_id = id, "Deleted interaccion");
        }

        Ok(rows > 0)
    }

    async fn toggle(
        &self,
        user_id: i64,
        post_id: i64,
        tipo: TipoInteraccion,
    ) -> ModelResult<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let removed = tx.execute(
            "DELETE FROM interaccion WHERE user_id = ?1 AND post_id = ?2 AND tipo_interaccion = ?3",
            params![user_id, post_id, tipo],
        )?;
        let active = if removed > 0 {
            false
        } else {
            tx.execute(
                "INSERT INTO interaccion (user_id, post_id, tipo_interaccion) VALUES (?1, ?2, ?3)",
                params![user_id, post_id, tipo],
            )?;
            true
        };

        tx.commit()?;
        tracing::debug!(user_id, post_id, tipo = %tipo, active, "Toggled interaccion");

        Ok(active)
    }

    async fn counts(&self, post_id: i64) -> ModelResult<InteraccionCounts> {
        let conn = self.pool.get()?;

        let counts = conn.query_row(
            "SELECT
               COALESCE(SUM(tipo_interaccion = 'like'), 0),
               COALESCE(SUM(tipo_interaccion = 'fav'), 0)
             FROM interaccion WHERE post_id = ?1",
            params![post_id],
            |row| {
                Ok(InteraccionCounts {
                    likes: row.get(0)?,
                    favs: row.get(1)?,
                })
            },
        )?;

        Ok(counts)
    }
}
