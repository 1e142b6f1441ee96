use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::db::models::{Archivo, NewArchivo};
use crate::db::DbPool;
use crate::error::ModelResult;

/// File attachment references. Only the path is stored; the bytes live elsewhere.
#[async_trait]
pub trait ArchivoRepository: Send + Sync {
    async fn create(&self, nuevo: NewArchivo) -> ModelResult<Archivo>;

    async fn get(&self, id: i64) -> ModelResult<Option<Archivo>>;

    async fn list_by_post(&self, post_id: i64) -> ModelResult<Vec<Archivo>>;

    async fn delete(&self, id: i64) -> ModelResult<bool>;
}

pub struct SqliteArchivoRepository {
    pool: DbPool,
}

impl SqliteArchivoRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArchivoRepository for SqliteArchivoRepository {
    async fn create(&self, nuevo: NewArchivo) -> ModelResult<Archivo> {
        nuevo.validate()?;
        let conn = self.pool.get()?;

        let archivo = conn.query_row(
            &format!(
                "INSERT INTO archivo (file, post_id) VALUES (?1, ?2) RETURNING {}",
                Archivo::COLUMNS
            ),
            params![nuevo.file, nuevo.post_id],
            Archivo::from_row,
        )?;
        tracing::debug!(archivo_id = archivo.id, post_id = archivo.post_id, "Attached file");

        Ok(archivo)
    }

    async fn get(&self, id: i64) -> ModelResult<Option<Archivo>> {
        let conn = self.pool.get()?;

        let archivo = conn
            .query_row(
                &format!("SELECT {} FROM archivo WHERE id = ?1", Archivo::COLUMNS),
                params![id],
                Archivo::from_row,
            )
            .optional()?;

        Ok(archivo)
    }

    async fn list_by_post(&self, post_id: i64) -> ModelResult<Vec<Archivo>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM archivo WHERE post_id = ?1 ORDER BY id",
            Archivo::COLUMNS
        ))?;
        let archivos = stmt
            .query_map(params![post_id], Archivo::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(archivos)
    }

    async fn delete(&self, id: i64) -> ModelResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM archivo WHERE id = ?1", params![id])?;
        if rows > 0 {
            tracing::info!(archivo_id = id, "Deleted archivo");
        }

        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;
    use crate::error::ModelError;
    use tempfile::TempDir;

    fn create_test_repo() -> (SqliteArchivoRepository, TempDir) {
        let (pool, temp_dir) = test_pool();
        pool.get()
            .unwrap()
            .execute_batch(
                "INSERT INTO usuario (email, password) VALUES ('a@x.com', 'hash');
                 INSERT INTO post (usuario_id, descripcion) VALUES (1, 'hi');",
            )
            .unwrap();

        (SqliteArchivoRepository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (repo, _temp) = create_test_repo();

        let a = repo
            .create(NewArchivo {
                post_id: 1,
                file: "uploads/a.png".into(),
            })
            .await
            .unwrap();
        repo.create(NewArchivo {
            post_id: 1,
            file: "uploads/b.mp4".into(),
        })
        .await
        .unwrap();

        assert_eq!(
            a.to_json(),
            serde_json::json!({"id": 1, "file": "uploads/a.png", "post_id": 1})
        );
        let files: Vec<_> = repo
            .list_by_post(1)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.file)
            .collect();
        assert_eq!(files, vec!["uploads/a.png", "uploads/b.mp4"]);
    }

    #[tokio::test]
    async fn test_oversized_path_is_rejected() {
        let (repo, _temp) = create_test_repo();

        let err = repo
            .create(NewArchivo {
                post_id: 1,
                file: "f".repeat(256),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::TooLong { field: "file", max: 255, len: 256 }));
    }

    #[tokio::test]
    async fn test_unknown_post_is_foreign_key_violation() {
        let (repo, _temp) = create_test_repo();

        let err = repo
            .create(NewArchivo {
                post_id: 7,
                file: "a.png".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::ForeignKeyViolation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, _temp) = create_test_repo();
        let archivo = repo
            .create(NewArchivo {
                post_id: 1,
                file: "a.png".into(),
            })
            .await
            .unwrap();

        assert!(repo.delete(archivo.id).await.unwrap());
        assert!(repo.get(archivo.id).await.unwrap().is_none());
        assert!(!repo.delete(archivo.id).await.unwrap());
    }
}
