use axum::{
    body::{self, Body},
    extract::State,
    http::{Method, Uri},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use std::error::Error as _;
use std::sync::Arc;

use crate::error::{FrontendError, Result};
use crate::frontend::Frontend;
use crate::response;

/// Shared application state
pub type SharedState = Arc<Frontend>;

/// Strip exactly one leading separator from the request path. Returns `None`
/// when nothing is left to use as a key.
pub fn key_from_path(path: &str) -> Option<&str> {
    let key = path.strip_prefix('/').unwrap_or(path);
    (!key.is_empty()).then_some(key)
}

/// Entry point for every request, whatever the method or path.
pub async fn handle_request(
    State(frontend): State<SharedState>,
    method: Method,
    uri: Uri,
    body: Body,
) -> Response {
    let result = match method {
        Method::GET => get_value(&frontend, uri.path()).await,
        Method::PUT => put_value(&frontend, uri.path(), body).await,
        _ => Err(FrontendError::MethodNotAllowed),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            match &err {
                FrontendError::Backend(cause) => {
                    tracing::warn!(method = %method, path = %uri.path(), error = %cause, "Backend failure");
                }
                other => {
                    tracing::debug!(method = %method, path = %uri.path(), error = %other, "Request rejected");
                }
            }
            err.into_response()
        }
    }
}

async fn get_value(frontend: &Frontend, path: &str) -> Result<Response> {
    let key = key_from_path(path).ok_or(FrontendError::EmptyKey)?;
    let value = frontend.get(key).await?;
    Ok(response::value(value))
}

async fn put_value(frontend: &Frontend, path: &str, body: Body) -> Result<Response> {
    let key = key_from_path(path).ok_or(FrontendError::EmptyKey)?;

    // Read one byte past the request ceiling so oversized bodies are detected
    // without buffering them in full.
    let limit = frontend.quota().limits().max_content_length as usize + 1;
    let value = body::to_bytes(body, limit).await.map_err(|err| {
        let over_limit = err
            .source()
            .is_some_and(|source| source.is::<LengthLimitError>());
        if over_limit {
            FrontendError::PayloadTooLarge
        } else {
            tracing::warn!(error = %err, "Failed to read request body");
            FrontendError::BodyUnreadable
        }
    })?;

    frontend.put(key, value).await?;
    Ok(response::stored())
}
