use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ModelError, ModelResult};

pub const EMAIL_MAX: usize = 120;
/// bcrypt only reads this many bytes of input; counted in bytes, not chars.
pub const PASSWORD_MAX_BYTES: usize = 72;
pub const NOMBRE_MAX: usize = 80;
pub const IMAGEN_MAX: usize = 255;
pub const SEXO_MAX: usize = 20;
pub const FILE_MAX: usize = 255;

/// Kind of interaction a user can leave on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoInteraccion {
    Like,
    Fav,
}

impl TipoInteraccion {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoInteraccion::Like => "like",
            TipoInteraccion::Fav => "fav",
        }
    }
}

impl fmt::Display for TipoInteraccion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interaction kind `{0}`")]
pub struct ParseTipoError(pub String);

impl FromStr for TipoInteraccion {
    type Err = ParseTipoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(TipoInteraccion::Like),
            "fav" => Ok(TipoInteraccion::Fav),
            other => Err(ParseTipoError(other.to_string())),
        }
    }
}

impl ToSql for TipoInteraccion {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TipoInteraccion {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// Stored timestamps are UTC, ISO-8601, millisecond precision.
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn check_len(field: &'static str, value: &str, max: usize) -> ModelResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(ModelError::TooLong { field, max, len });
    }
    Ok(())
}

fn check_bytes(field: &'static str, value: &str, max: usize) -> ModelResult<()> {
    let len = value.len();
    if len > max {
        return Err(ModelError::TooLong { field, max, len });
    }
    Ok(())
}

fn check_opt_len(field: &'static str, value: Option<&str>, max: usize) -> ModelResult<()> {
    match value {
        Some(v) => check_len(field, v, max),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Usuario {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub biografia: Option<String>,
    pub imagen: Option<String>,
    pub sexo: Option<String>,
    pub fecha_subscripcion: Option<DateTime<Utc>>,
}

impl Usuario {
    pub(crate) const COLUMNS: &'static str =
        "id, email, password, nombre, apellido, biografia, imagen, sexo, fecha_subscripcion";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let fecha: Option<String> = row.get(8)?;
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            nombre: row.get(3)?,
            apellido: row.get(4)?,
            biografia: row.get(5)?,
            imagen: row.get(6)?,
            sexo: row.get(7)?,
            fecha_subscripcion: fecha.map(|f| parse_timestamp(8, &f)).transpose()?,
        })
    }

    /// Flat response payload. The password hash never leaves this struct.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "nombre": self.nombre,
            "apellido": self.apellido,
            "biografia": self.biografia,
            "imagen": self.imagen,
            "sexo": self.sexo,
            "fecha_subscripcion": self.fecha_subscripcion,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub descripcion: Option<String>,
    pub usuario_id: i64,
    pub fecha_creado: DateTime<Utc>,
}

impl Post {
    pub(crate) const COLUMNS: &'static str = "id, descripcion, usuario_id, fecha_creado";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let fecha: String = row.get(3)?;
        Ok(Self {
            id: row.get(0)?,
            descripcion: row.get(1)?,
            usuario_id: row.get(2)?,
            fecha_creado: parse_timestamp(3, &fecha)?,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "descripcion": self.descripcion,
            "usuario_id": self.usuario_id,
            "fecha_creado": self.fecha_creado,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Archivo {
    pub id: i64,
    pub file: String,
    pub post_id: i64,
}

impl Archivo {
    pub(crate) const COLUMNS: &'static str = "id, file, post_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file: row.get(1)?,
            post_id: row.get(2)?,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({ "id": self.id, "file": self.file, "post_id": self.post_id })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interaccion {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub tipo_interaccion: TipoInteraccion,
    pub fecha: DateTime<Utc>,
}

impl Interaccion {
    pub(crate) const COLUMNS: &'static str = "id, user_id, post_id, tipo_interaccion, fecha";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let fecha: String = row.get(4)?;
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            post_id: row.get(2)?,
            tipo_interaccion: row.get(3)?,
            fecha: parse_timestamp(4, &fecha)?,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "user_id": self.user_id,
            "post_id": self.post_id,
            "tipo_interaccion": self.tipo_interaccion,
            "fecha": self.fecha,
        })
    }
}

/// Registration input. `password` is plaintext here and hashed before storage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUsuario {
    pub email: String,
    pub password: String,
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub biografia: Option<String>,
    pub imagen: Option<String>,
    pub sexo: Option<String>,
    pub fecha_subscripcion: Option<DateTime<Utc>>,
}

impl NewUsuario {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        check_len("email", &self.email, EMAIL_MAX)?;
        check_bytes("password", &self.password, PASSWORD_MAX_BYTES)?;
        check_opt_len("nombre", self.nombre.as_deref(), NOMBRE_MAX)?;
        check_opt_len("apellido", self.apellido.as_deref(), NOMBRE_MAX)?;
        check_opt_len("imagen", self.imagen.as_deref(), IMAGEN_MAX)?;
        check_opt_len("sexo", self.sexo.as_deref(), SEXO_MAX)
    }
}

/// Partial profile edit; `None` leaves the stored value untouched, so there is
/// no way to clear a field back to NULL here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PerfilUpdate {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub biografia: Option<String>,
    pub imagen: Option<String>,
    pub sexo: Option<String>,
}

impl PerfilUpdate {
    pub fn validate(&self) -> ModelResult<()> {
        check_opt_len("nombre", self.nombre.as_deref(), NOMBRE_MAX)?;
        check_opt_len("apellido", self.apellido.as_deref(), NOMBRE_MAX)?;
        check_opt_len("imagen", self.imagen.as_deref(), IMAGEN_MAX)?;
        check_opt_len("sexo", self.sexo.as_deref(), SEXO_MAX)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub usuario_id: i64,
    pub descripcion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewArchivo {
    pub post_id: i64,
    pub file: String,
}

impl NewArchivo {
    pub fn validate(&self) -> ModelResult<()> {
        check_len("file", &self.file, FILE_MAX)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInteraccion {
    pub user_id: i64,
    pub post_id: i64,
    pub tipo_interaccion: TipoInteraccion,
}

/// Per-kind interaction totals for one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InteraccionCounts {
    pub likes: i64,
    pub favs: i64,
}
