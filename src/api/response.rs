use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::error::ApiError;

pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With";
pub const CORS_MAX_AGE: &str = "86400";

pub const NOT_FOUND_BODY: &str = "Not Found";
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";
pub const NO_RESPONSE_BODY: &str = "No response returned";

/// JSON response with extra headers (typically the request's CORS headers)
pub fn json(status: StatusCode, body: &Value, extra_headers: &HeaderMap) -> Response {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to serialize response body: {}", e);
            return text(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY);
        }
    };

    let mut response = (status, Body::from(bytes)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in extra_headers {
        headers.insert(name.clone(), value.clone());
    }
    response
}

/// Plain-text response used for the dispatcher's own outcomes
pub fn text(status: StatusCode, body: &'static str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        body,
    )
        .into_response()
}

pub fn not_found() -> Response {
    text(StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}

pub fn internal_error() -> Response {
    text(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
}

pub fn no_response() -> Response {
    text(StatusCode::INTERNAL_SERVER_ERROR, NO_RESPONSE_BODY)
}

/// Render a business error, keeping the request's CORS headers
pub fn error(err: &ApiError, extra_headers: &HeaderMap) -> Response {
    json(err.status_code(), &err.to_json(), extra_headers)
}

/// Permissive pre-flight answer used when no middleware resolved an OPTIONS request
pub fn preflight(origin: Option<&str>) -> Response {
    let origin = origin
        .and_then(|o| HeaderValue::from_str(o).ok())
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_ALLOW_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(CORS_ALLOW_HEADERS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(CORS_MAX_AGE));
    response
}

/// `{"error": message}` body for ad-hoc error payloads with extra fields
pub fn error_body(message: &str) -> Value {
    json!({ "error": message })
}
