// handlers/bots.rs - /api/bots CRUD
//
// Every bot owns one vector collection named after its id. Collection
// management is best-effort: failures are logged and never fail the request.

use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::router::{HandlerResult, RequestContext};

use super::{non_empty, owned_row, row_id, timestamp, BOT_NOT_FOUND};

/// Columns a client may never set directly
const PROTECTED_COLUMNS: [&str; 3] = ["id", "user_id", "created_at"];

#[derive(Debug, Deserialize)]
pub struct NewBot {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website_url: Option<String>,
}

/// GET /api/bots - All bots owned by the caller
pub fn list(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let bots = ctx
            .state
            .store
            .from("bots")
            .eq("user_id", &user_id)
            .fetch_all()
            .await?;
        ctx.respond(StatusCode::OK, json!({ "bots": bots }))
    })
}

/// GET /api/bots/:botId
pub fn get(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let bot_id = ctx.param("botId")?.to_string();
        let bot = owned_row(&ctx.state, "bots", "*", &bot_id, &user_id, BOT_NOT_FOUND).await?;
        ctx.respond(StatusCode::OK, json!({ "bot": bot }))
    })
}

/// POST /api/bots - Create a bot and its vector collection
pub fn create(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let input: NewBot = ctx.json()?;
        let Some(name) = non_empty(input.name) else {
            return Err(ApiError::bad_request("Bot name is required"));
        };

        let state = ctx.state.clone();
        let bot = state
            .store
            .from("bots")
            .insert(json!({
                "name": name,
                "description": input.description,
                "website_url": input.website_url,
                "user_id": user_id,
                "created_at": timestamp()
            }))
            .await?;

        let bot_id = row_id(&bot)?;
        match state.vectors.create_collection(&bot_id).await {
            Ok(()) => tracing::info!(bot_id = %bot_id, "Created vector collection"),
            Err(err) => tracing::error!(bot_id = %bot_id, "Failed to create vector collection: {}", err),
        }

        ctx.respond(
            StatusCode::CREATED,
            json!({ "message": "Bot created successfully", "bot": bot }),
        )
    })
}

/// PUT /api/bots/:botId - Patch a bot; identity and ownership columns are ignored
pub fn update(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let bot_id = ctx.param("botId")?.to_string();
        let updates = ctx.json::<Value>()?;
        let mut patch = updatable_fields(updates)?;

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        patch.insert("updated_at".to_string(), Value::String(timestamp()));
        let rows = state
            .store
            .from("bots")
            .eq("id", &bot_id)
            .eq("user_id", &user_id)
            .update(Value::Object(patch))
            .await?;
        let bot = rows.into_iter().next().unwrap_or(Value::Null);

        ctx.respond(
            StatusCode::OK,
            json!({ "message": "Bot updated successfully", "bot": bot }),
        )
    })
}

/// DELETE /api/bots/:botId - Remove a bot and drop its vector collection
pub fn delete(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let bot_id = ctx.param("botId")?.to_string();

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        state
            .store
            .from("bots")
            .eq("id", &bot_id)
            .eq("user_id", &user_id)
            .delete()
            .await?;

        if let Err(err) = state.vectors.delete_collection(&bot_id).await {
            tracing::error!(bot_id = %bot_id, "Failed to delete vector collection: {}", err);
        }

        ctx.respond(StatusCode::OK, json!({ "message": "Bot deleted successfully" }))
    })
}

fn updatable_fields(updates: Value) -> Result<Map<String, Value>, ApiError> {
    let Value::Object(mut fields) = updates else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };
    for column in PROTECTED_COLUMNS {
        fields.remove(column);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_columns_are_stripped() {
        let fields = updatable_fields(json!({
            "id": "other",
            "user_id": "someone-else",
            "created_at": "1970-01-01",
            "name": "Renamed"
        }))
        .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], "Renamed");
    }

    #[test]
    fn updates_must_be_objects() {
        assert!(updatable_fields(json!(["name"])).is_err());
    }
}
