// handlers/widget.rs - Embeddable chat widget configuration
//
// Reading is public (the widget runs on third-party pages); updating is
// owner-only. Stored under `settings.widget` on the bot row.

use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::router::{HandlerResult, RequestContext};

use super::{owned_row, scoped_not_found, timestamp, BOT_NOT_FOUND};

pub const WIDGET_KEYS: [&str; 6] = [
    "theme",
    "primary_color",
    "position",
    "welcome_message",
    "placeholder_text",
    "show_sources",
];

/// GET /api/widget/:botId/config - Effective widget settings with defaults filled in
pub fn get(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let bot_id = ctx.param("botId")?.to_string();
        let bot = ctx
            .state
            .store
            .from("bots")
            .select("id, name, settings")
            .eq("id", &bot_id)
            .fetch_one()
            .await
            .map_err(|err| scoped_not_found(err, "Bot not found"))?;

        ctx.respond(StatusCode::OK, json!({ "config": effective_config(&bot) }))
    })
}

/// POST /api/widget/:botId/config - Merge widget settings; only known keys are accepted
pub fn update(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let bot_id = ctx.param("botId")?.to_string();
        let Value::Object(updates) = ctx.json::<Value>()? else {
            return Err(ApiError::bad_request("Request body must be a JSON object"));
        };

        let state = ctx.state.clone();
        let bot = owned_row(&state, "bots", "id, settings", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        let invalid = invalid_keys(&updates);
        if !invalid.is_empty() {
            return ctx.respond(
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!("Invalid configuration keys: {}", invalid.join(", ")),
                    "valid_keys": WIDGET_KEYS
                }),
            );
        }

        let settings = merge_widget_settings(bot.get("settings"), updates);
        let widget = settings.get("widget").cloned().unwrap_or(Value::Null);

        state
            .store
            .from("bots")
            .eq("id", &bot_id)
            .eq("user_id", &user_id)
            .update(json!({ "settings": settings, "updated_at": timestamp() }))
            .await?;

        ctx.respond(
            StatusCode::OK,
            json!({
                "message": "Widget configuration updated successfully",
                "config": widget
            }),
        )
    })
}

fn effective_config(bot: &Value) -> Value {
    let name = bot.get("name").and_then(Value::as_str).unwrap_or_default();
    let widget = &bot["settings"]["widget"];
    let text = |key: &str, default: String| -> Value {
        match widget.get(key).and_then(Value::as_str) {
            Some(value) if !value.is_empty() => Value::String(value.to_string()),
            _ => Value::String(default),
        }
    };

    json!({
        "bot_id": bot.get("id").cloned().unwrap_or(Value::Null),
        "name": name,
        "theme": text("theme", "light".to_string()),
        "primary_color": text("primary_color", "#007BFF".to_string()),
        "position": text("position", "bottom-right".to_string()),
        "welcome_message": text(
            "welcome_message",
            format!("Hi there! I'm {}. How can I help you today?", name),
        ),
        "placeholder_text": text("placeholder_text", "Ask me anything...".to_string()),
        "show_sources": widget.get("show_sources") != Some(&Value::Bool(false))
    })
}

fn invalid_keys(updates: &Map<String, Value>) -> Vec<&str> {
    updates
        .keys()
        .map(String::as_str)
        .filter(|key| !WIDGET_KEYS.contains(key))
        .collect()
}

/// `settings` with `updates` merged over `settings.widget`; other settings are kept
fn merge_widget_settings(existing: Option<&Value>, updates: Map<String, Value>) -> Value {
    let mut settings = match existing {
        Some(Value::Object(settings)) => settings.clone(),
        _ => Map::new(),
    };
    let mut widget = match settings.get("widget") {
        Some(Value::Object(widget)) => widget.clone(),
        _ => Map::new(),
    };
    widget.extend(updates);
    settings.insert("widget".to_string(), Value::Object(widget));
    Value::Object(settings)
}
