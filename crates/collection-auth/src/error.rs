//! Error types for login and identity-provider operations

/// Errors from the login flow and the identity-provider client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("identity provider timed out: {0}")]
    Timeout(String),

    #[error("identity provider returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid identity provider response: {0}")]
    InvalidResponse(String),

    #[error("invalid identity provider URL: {0}")]
    InvalidUrl(String),

    /// The token endpoint rejected the code or verifier.
    #[error("invalid state or code")]
    InvalidStateOrCode,

    #[error("invalid client: {0}")]
    InvalidClient(String),

    /// The user-info endpoint rejected the access token.
    #[error("invalid identity session")]
    InvalidSession,

    #[error("no code verifier")]
    NoAuthorizationState,

    #[error("state mismatch")]
    StateMismatch,

    #[error("no auth session")]
    NoSession,
}

impl Error {
    /// Whether the caller, not the server or the provider, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidStateOrCode
                | Error::NoAuthorizationState
                | Error::StateMismatch
                | Error::NoSession
        )
    }
}

/// Result alias for login operations.
pub type Result<T> = std::result::Result<T, Error>;
