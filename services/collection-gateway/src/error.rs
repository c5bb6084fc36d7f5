//! HTTP error taxonomy
//!
//! Every handler and the authorization guard return `ApiError`. Internal
//! errors are logged here and reach the client only as a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                error!(error = %detail, "internal error");
                "internal server error".to_string()
            }
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m) => m,
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<collection_auth::Error> for ApiError {
    fn from(e: collection_auth::Error) -> Self {
        if e.is_client_error() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl From<launcher_keys::Error> for ApiError {
    fn from(e: launcher_keys::Error) -> Self {
        use launcher_keys::Error as E;
        match e {
            E::InvalidKeyNum | E::InvalidStatus(_) | E::InvalidKey => {
                ApiError::BadRequest(e.to_string())
            }
            E::InvalidToken | E::Expired => ApiError::Unauthorized(e.to_string()),
            E::InvalidEdition(_) | E::NotFound(_) => ApiError::NotFound(e.to_string()),
            E::Store(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<repository::Error> for ApiError {
    fn from(e: repository::Error) -> Self {
        match e {
            repository::Error::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
