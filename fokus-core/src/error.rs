//! Error types for fokus-core

use thiserror::Error;

/// Main error type for the fokus-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Subject not found
    #[error("subject not found: {0}")]
    SubjectNotFound(String),

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Refusing to delete the only remaining subject
    #[error("cannot delete the last subject: {0}")]
    LastSubject(String),
}

/// Result type alias for fokus-core
pub type Result<T> = std::result::Result<T, Error>;
