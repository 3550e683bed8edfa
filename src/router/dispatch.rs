//! Request dispatch.
//!
//! A request moves through INIT → MIDDLEWARE → ROUTE_LOOKUP → PARAM_BIND →
//! HANDLER_CHAIN. Middleware and handlers end the request early by returning
//! `Flow::Respond` or `Err(ApiError)`. A panic in either stage is caught once
//! here and answered with a plain 500; the dispatcher keeps serving.
//!
//! The body is only buffered once a route has matched, right before the
//! handler chain runs. Unrouted requests never touch it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::Request,
    http::{HeaderValue, Method},
    response::Response,
};
use futures::FutureExt;
use tracing::Instrument;

use crate::api::response;
use crate::error::ApiError;
use crate::router::context::{RequestContext, REQUEST_ID_HEADER};
use crate::router::handler::{BoxHandler, Flow};
use crate::router::path;
use crate::router::table::RouteTable;
use crate::services::AppState;

/// Runs requests against an immutable [`RouteTable`].
///
/// Holds no per-request state, so clones can serve concurrent requests freely.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
    state: Arc<AppState>,
}

impl Dispatcher {
    pub fn new(table: Arc<RouteTable>, state: Arc<AppState>) -> Self {
        Self { table, state }
    }

    /// Answer one request. Never fails: every outcome is a response.
    pub async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();

        // INIT
        let mut ctx = RequestContext::new(parts, self.state.clone());
        let request_id = ctx.request_id.clone();
        let span = tracing::info_span!(
            "dispatch",
            request_id = %request_id,
            method = %ctx.method,
            path = %ctx.path(),
        );

        let mut response = async move {
            match AssertUnwindSafe(self.run(&mut ctx, body)).catch_unwind().await {
                Ok(response) => response,
                Err(panic) => {
                    tracing::error!(error = %panic_message(&panic), "Unhandled failure while processing request");
                    response::internal_error()
                }
            }
        }
        .instrument(span)
        .await;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    async fn run(&self, ctx: &mut RequestContext, body: Body) -> Response {
        // MIDDLEWARE
        if let Some(response) = run_chain(self.table.middlewares(), ctx).await {
            return response;
        }

        // Pre-flight left unresolved by middleware gets the permissive default
        if ctx.method == Method::OPTIONS {
            return response::preflight(ctx.header("origin"));
        }

        // ROUTE_LOOKUP
        let request_path = ctx.path().to_string();
        let Some(route) = self.table.find(&ctx.method, &request_path) else {
            tracing::debug!("No route matched");
            return response::not_found();
        };

        // PARAM_BIND
        ctx.params = path::extract_params(&route.template, &request_path);

        let limit = self.state.config.server.max_request_size_bytes;
        match read_body(body, limit).await {
            Ok(bytes) => ctx.body = bytes,
            Err(err) => return response::error(&err, &ctx.cors_headers),
        }

        // HANDLER_CHAIN
        if let Some(response) = run_chain(&route.handlers, ctx).await {
            return response;
        }

        tracing::error!(route = %route.template, "Handler chain completed without producing a response");
        response::no_response()
    }
}

/// Run steps in order; the first one that answers ends the chain
async fn run_chain(steps: &[BoxHandler], ctx: &mut RequestContext) -> Option<Response> {
    for step in steps {
        match step.call(ctx).await {
            Ok(Flow::Continue) => {
                tracing::trace!(step = step.name(), "continue");
            }
            Ok(Flow::Respond(response)) => {
                tracing::debug!(step = step.name(), status = %response.status(), "responded");
                return Some(response);
            }
            Err(err) => {
                if err.is_server_error() {
                    tracing::error!(step = step.name(), status = %err.status_code(), "{}", err);
                } else {
                    tracing::debug!(step = step.name(), status = %err.status_code(), "{}", err);
                }
                return Some(response::error(&err, &ctx.cors_headers));
            }
        }
    }
    None
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    match to_bytes(body, limit).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            // to_bytes reports the limit through a LengthLimitError source
            let too_large = std::error::Error::source(&e)
                .map(|source| source.is::<http_body_util::LengthLimitError>())
                .unwrap_or(false);
            if too_large {
                tracing::debug!(limit, "Request body over the size limit");
                Err(ApiError::payload_too_large("Payload Too Large"))
            } else {
                tracing::debug!("Failed to read request body: {}", e);
                Err(ApiError::bad_request("Unreadable request body"))
            }
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}

/// Bind a dispatcher to axum as the catch-all service
pub fn into_service(dispatcher: Dispatcher) -> axum::Router {
    axum::Router::new().fallback(move |request: Request| {
        let dispatcher = dispatcher.clone();
        async move { dispatcher.handle(request).await }
    })
}
