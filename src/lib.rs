// Library exports for muro
// This allows integration tests and the CLI to use the schema layer

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod repository;

pub use error::{ModelError, ModelResult};
