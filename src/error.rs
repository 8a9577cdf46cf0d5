use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::backend::BackendError;
use crate::quota::QuotaError;
use crate::response;

/// Per-request failures. Each one is recovered inside the handler and turned
/// into a status code plus a plain-text body.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("Key not found")]
    KeyNotFound,

    #[error("Key must not be empty")]
    EmptyKey,

    #[error("Content body is too large")]
    PayloadTooLarge,

    #[error("Storage server(s) exhausted")]
    StorageExhausted,

    #[error("Internal Error: {0}")]
    Backend(#[from] BackendError),

    #[error("Unable to read request body")]
    BodyUnreadable,

    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

impl FrontendError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FrontendError::KeyNotFound => StatusCode::NOT_FOUND,
            FrontendError::EmptyKey | FrontendError::PayloadTooLarge => StatusCode::BAD_REQUEST,
            FrontendError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            FrontendError::StorageExhausted
            | FrontendError::Backend(_)
            | FrontendError::BodyUnreadable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QuotaError> for FrontendError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::PayloadTooLarge { .. } => FrontendError::PayloadTooLarge,
            QuotaError::StorageExhausted { .. } => FrontendError::StorageExhausted,
        }
    }
}

impl IntoResponse for FrontendError {
    fn into_response(self) -> Response {
        match self {
            FrontendError::MethodNotAllowed => response::method_not_allowed(),
            other => response::plain_text(other.status_code(), other.to_string()),
        }
    }
}

/// Failures that stop the process before (or while) it starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no backend storage nodes supplied")]
    NoBackendNodes,

    #[error("invalid port {0}")]
    InvalidPort(u32),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl StartupError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::NoBackendNodes => 1,
            StartupError::InvalidPort(_) | StartupError::InvalidConfiguration(_) => 2,
            StartupError::Bind { .. } => 3,
        }
    }

    /// Whether the usage text should accompany the error.
    pub fn wants_usage(&self) -> bool {
        matches!(self, StartupError::NoBackendNodes | StartupError::InvalidPort(_))
    }
}

pub type Result<T, E = FrontendError> = std::result::Result<T, E>;
