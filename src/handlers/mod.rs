// handlers/mod.rs - Gateway endpoints
//
// Public (no token) → health, auth register/login/logout, widget config read
// Protected (RequireUser ahead in the chain) → everything else
//
// Each handler is a plain fn(&mut RequestContext) -> BoxFuture<HandlerResult>
// wired into the route table through `handler_fn`.

pub mod auth;
pub mod bots;
pub mod crawl;
pub mod documents;
pub mod embeddings;
pub mod health;
pub mod vectors;
pub mod widget;

use serde_json::{json, Value};

use crate::error::ApiError;
use crate::services::{AppState, ServiceError};

pub(crate) const BOT_NOT_FOUND: &str = "Bot not found or access denied";

/// Fetch one row of `table` by id, scoped to `user_id`.
///
/// Any refusal from the store (no row, malformed id) reads as `not_found`;
/// an unreachable store still surfaces as a 503.
pub(crate) async fn owned_row(
    state: &AppState,
    table: &str,
    columns: &str,
    id: &str,
    user_id: &str,
    not_found: &str,
) -> Result<Value, ApiError> {
    state
        .store
        .from(table)
        .select(columns)
        .eq("id", id)
        .eq("user_id", user_id)
        .fetch_one()
        .await
        .map_err(|err| scoped_not_found(err, not_found))
}

pub(crate) fn scoped_not_found(err: ServiceError, message: &str) -> ApiError {
    if err.is_rejection() {
        tracing::debug!("{}: {}", message, err);
        ApiError::not_found(message)
    } else {
        err.into()
    }
}

/// Primary key of a stored row as a string (uuid or integer ids)
pub(crate) fn row_id(row: &Value) -> Result<String, ApiError> {
    match row.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => {
            tracing::error!("Stored row has no id: {}", row);
            Err(ApiError::bad_gateway("Upstream service returned an invalid response"))
        }
    }
}

/// Message the store attached to a refused write, when it said no
pub(crate) fn rejection_message(err: &ServiceError) -> Option<&str> {
    match err {
        ServiceError::Rejected { message, .. } => Some(message),
        ServiceError::NotFound(message) => Some(message),
        _ => None,
    }
}

/// Put a bot's `embedded` documents back to `processed` once its vectors are gone
pub(crate) async fn reset_embedded_documents(state: &AppState, bot_id: &str, user_id: &str) {
    let result = state
        .store
        .from("documents")
        .eq("bot_id", bot_id)
        .eq("user_id", user_id)
        .eq("status", "embedded")
        .update(json!({ "status": "processed" }))
        .await;
    if let Err(err) = result {
        tracing::error!(bot_id = %bot_id, "Failed to reset embedded documents: {}", err);
    }
}

pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Treat `""` like an absent field
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
