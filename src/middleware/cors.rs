use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;

use crate::api::response::{CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_MAX_AGE};
use crate::config::SecurityConfig;
use crate::router::{Flow, Handler, HandlerResult, RequestContext};

/// Global CORS middleware.
///
/// Stores the CORS headers for this request in `ctx.cors_headers` so every
/// JSON response (errors included) carries them, and answers OPTIONS
/// pre-flight requests itself.
pub struct Cors {
    allow_any_origin: bool,
    origins: Vec<String>,
}

impl Cors {
    pub fn new(allow_any_origin: bool, origins: Vec<String>) -> Self {
        Self { allow_any_origin, origins }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(security.allow_any_origin, security.cors_origins.clone())
    }

    /// Value for `Access-Control-Allow-Origin` given the request's `Origin`
    pub fn allowed_origin<'a>(&'a self, origin: Option<&'a str>) -> &'a str {
        let origin = origin.unwrap_or("*");
        if self.allow_any_origin || self.origins.iter().any(|o| o == origin) {
            return origin;
        }
        self.origins.first().map(String::as_str).unwrap_or("*")
    }

    fn headers(&self, origin: Option<&str>) -> HeaderMap {
        let allowed = HeaderValue::from_str(self.allowed_origin(origin))
            .unwrap_or_else(|_| HeaderValue::from_static("*"));

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_ALLOW_METHODS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(CORS_ALLOW_HEADERS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers
    }
}

#[async_trait]
impl Handler for Cors {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        let headers = self.headers(ctx.header("origin"));

        if ctx.method == Method::OPTIONS {
            let mut response = StatusCode::NO_CONTENT.into_response();
            response.headers_mut().extend(headers);
            response
                .headers_mut()
                .insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(CORS_MAX_AGE));
            return Ok(Flow::Respond(response));
        }

        ctx.cors_headers = headers;
        Ok(Flow::Continue)
    }

    fn name(&self) -> &'static str {
        "cors"
    }
}
