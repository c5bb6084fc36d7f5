//! Error types for launcher credential operations

use repository::EditionId;

/// Errors from launcher credential operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid key num")]
    InvalidKeyNum,

    #[error("invalid edition: {0}")]
    InvalidEdition(EditionId),

    #[error("invalid key status: {0}")]
    InvalidStatus(String),

    /// Unknown, malformed or inactive product key.
    #[error("invalid key")]
    InvalidKey,

    #[error("invalid access token")]
    InvalidToken,

    #[error("expired access token")]
    Expired,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<repository::Error> for Error {
    fn from(e: repository::Error) -> Self {
        match e {
            repository::Error::NotFound(what) => Error::NotFound(what),
            other => Error::Store(other.to_string()),
        }
    }
}

/// Result alias for launcher credential operations.
pub type Result<T> = std::result::Result<T, Error>;
