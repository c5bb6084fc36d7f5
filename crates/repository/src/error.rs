//! Error types for persistence operations

/// Errors from the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("store parse error: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Result alias for repository operations.
pub type Result<T> = std::result::Result<T, Error>;
