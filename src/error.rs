use rusqlite::ffi;

use crate::db::models::ParseTipoError;

/// Everything that can go wrong while writing or reading records.
///
/// Constraint failures reported by SQLite are classified by extended result
/// code so callers can tell a duplicate email from a dangling foreign key
/// without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Not-null constraint violated: {0}")]
    NotNullViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Field `{field}` is {len} characters long, maximum is {max}")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    #[error("Invalid interaction kind: {0}")]
    InvalidInteractionKind(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

impl From<rusqlite::Error> for ModelError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, ref msg) = err {
            let detail = msg.clone().unwrap_or_else(|| code.to_string());
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return ModelError::UniqueViolation(detail)
                }
                ffi::SQLITE_CONSTRAINT_NOTNULL => return ModelError::NotNullViolation(detail),
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return ModelError::ForeignKeyViolation(detail)
                }
                ffi::SQLITE_CONSTRAINT_CHECK if detail.contains("tipo_interaccion") => {
                    return ModelError::InvalidInteractionKind(detail)
                }
                ffi::SQLITE_CONSTRAINT_CHECK => return ModelError::Constraint(detail),
                _ => {}
            }
        }
        ModelError::Database(err)
    }
}

impl From<ParseTipoError> for ModelError {
    fn from(err: ParseTipoError) -> Self {
        ModelError::InvalidInteractionKind(err.0)
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
