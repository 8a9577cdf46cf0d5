use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

/// Methods the front end answers to, as sent in the `Allow` header.
pub const ALLOWED_METHODS: &str = "GET, PUT";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_HTML: &str = "text/html";

/// Plain-text body with the given status.
pub fn plain_text(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))],
        message.into(),
    )
        .into_response()
}

/// Stored value, returned byte for byte.
pub fn value(value: Bytes) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM))],
        Body::from(value),
    )
        .into_response()
}

/// Successful PUT: 200 with an empty body.
pub fn stored() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML))],
    )
        .into_response()
}

pub fn method_not_allowed() -> Response {
    let mut response = plain_text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}
