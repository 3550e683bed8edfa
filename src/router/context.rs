use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::response;
use crate::error::ApiError;
use crate::router::handler::{Flow, HandlerResult};
use crate::router::path::Params;
use crate::services::{AppState, AuthUser};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request state threaded through middleware and handlers.
///
/// Built fresh by the dispatcher for every request and dropped once the
/// response exists. The known fields cover what the gateway's own middleware
/// produces; anything else rides in the type-keyed extension map.
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,

    /// Buffered request body; empty until a route has matched
    pub body: Bytes,

    /// Configuration and collaborator clients shared by all requests
    pub state: Arc<AppState>,

    /// Route parameters, bound after route lookup
    pub params: Params,

    /// Headers every response of this request should carry (set by CORS)
    pub cors_headers: HeaderMap,

    /// Verified principal (set by the auth guard)
    pub user: Option<AuthUser>,

    pub request_id: String,

    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    pub fn new(parts: Parts, state: Arc<AppState>) -> Self {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: Bytes::new(),
            state,
            params: Params::new(),
            cors_headers: HeaderMap::new(),
            user: None,
            request_id,
            extensions: HashMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Token from an `Authorization: Bearer <token>` header
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// First value of a query-string parameter
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Route parameter bound by the dispatcher
    pub fn param(&self, name: &str) -> Result<&str, ApiError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ApiError::bad_request(format!("Missing route parameter '{}'", name)))
    }

    /// Parse the buffered body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.body.is_empty() {
            return Err(ApiError::invalid_json("Request body must be a JSON document"));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))
    }

    /// Principal attached by the auth guard
    pub fn user(&self) -> Result<&AuthUser, ApiError> {
        self.user
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }

    /// Finish the request with a JSON body carrying this request's CORS headers
    pub fn respond(&self, status: StatusCode, body: Value) -> HandlerResult {
        Ok(Flow::Respond(response::json(status, &body, &self.cors_headers)))
    }

    /// Store a middleware-defined value, replacing any previous one of the same type
    pub fn insert_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }
}
