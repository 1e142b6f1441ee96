// Repository pattern - isolates all database side effects
pub mod archivos;
pub mod interacciones;
pub mod posts;
pub mod usuarios;

pub use archivos::{ArchivoRepository, SqliteArchivoRepository};
pub use interacciones::{InteraccionRepository, SqliteInteraccionRepository};
pub use posts::{PostRepository, SqlitePostRepository};
pub use usuarios::{SqliteUsuarioRepository, UsuarioRepository};
