// handlers/health.rs - GET /api/health

use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde_json::json;

use crate::router::{HandlerResult, RequestContext};

use super::timestamp;

/// GET /api/health - Liveness check; touches no collaborator
pub fn get(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.respond(
            StatusCode::OK,
            json!({
                "status": "ok",
                "message": "Gateway is running",
                "timestamp": timestamp()
            }),
        )
    })
}
