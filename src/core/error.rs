use rusqlite;
use std::io;
use thiserror::Error;

/// Errors surfaced by the attribute layer.
///
/// Collaborator failures (SQLite, JSON, I/O) are carried transparently: the
/// caller sees the engine's own message and `source()`.
#[derive(Error, Debug)]
pub enum EavError {
    #[error(transparent)]
    RusqliteError(#[from] rusqlite::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}
