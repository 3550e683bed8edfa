// handlers/vectors.rs - /api/vectors/collections handlers
//
// A bot's collection is named after the bot id.

use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::router::{HandlerResult, RequestContext};

use super::{non_empty, owned_row, rejection_message, reset_embedded_documents, BOT_NOT_FOUND};

const COLLECTION_NOT_FOUND: &str = "Collection not found or access denied";
const INDEX_UNAVAILABLE: &str = "Vector database service unavailable";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollection {
    pub bot_id: Option<String>,
}

/// GET /api/vectors/collections - The caller's bots and whether each has a collection.
///
/// An unreachable vector index degrades to `exists: null` plus a warning
/// instead of failing the request.
pub fn list(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let state = ctx.state.clone();

        let bots = state
            .store
            .from("bots")
            .select("id, name")
            .eq("user_id", &user_id)
            .fetch_all()
            .await?;

        match state.vectors.list_collections().await {
            Ok(existing) => {
                let collections = describe(&bots, |id| Value::Bool(existing.iter().any(|name| name == id)));
                ctx.respond(StatusCode::OK, json!({ "collections": collections }))
            }
            Err(err) => {
                tracing::error!("Vector index unavailable: {}", err);
                let collections = describe(&bots, |_| Value::Null);
                ctx.respond(
                    StatusCode::OK,
                    json!({
                        "collections": collections,
                        "warning": INDEX_UNAVAILABLE
                    }),
                )
            }
        }
    })
}

/// POST /api/vectors/collections - Create the collection for one of the caller's bots.
///
/// Input: `{ "botId" }`. An existing collection is reported with 200 instead
/// of 201.
pub fn create(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let input: CreateCollection = ctx.json()?;
        let Some(bot_id) = non_empty(input.bot_id) else {
            return Err(ApiError::bad_request("Bot ID is required"));
        };

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        match state.vectors.create_collection(&bot_id).await {
            Ok(()) => {
                tracing::info!(collection = %bot_id, "Created vector collection");
                ctx.respond(
                    StatusCode::CREATED,
                    json!({ "message": "Collection created successfully", "collection_name": bot_id }),
                )
            }
            Err(err) if rejection_message(&err).is_some_and(|m| m.contains("already exists")) => ctx.respond(
                StatusCode::OK,
                json!({ "message": "Collection already exists", "collection_name": bot_id }),
            ),
            Err(err) => {
                tracing::error!(collection = %bot_id, "Failed to create collection: {}", err);
                ctx.respond(StatusCode::SERVICE_UNAVAILABLE, json!({ "error": INDEX_UNAVAILABLE }))
            }
        }
    })
}

/// DELETE /api/vectors/collections/:collectionId - Drop a bot's collection and
/// put its embedded documents back to `processed`
pub fn delete(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let collection = ctx.param("collectionId")?.to_string();

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &collection, &user_id, COLLECTION_NOT_FOUND).await?;

        if let Err(err) = state.vectors.delete_collection(&collection).await {
            tracing::error!(collection = %collection, "Failed to delete collection: {}", err);
            return ctx.respond(StatusCode::SERVICE_UNAVAILABLE, json!({ "error": INDEX_UNAVAILABLE }));
        }

        reset_embedded_documents(&state, &collection, &user_id).await;
        ctx.respond(StatusCode::OK, json!({ "message": "Collection deleted successfully" }))
    })
}

fn describe(bots: &[Value], exists: impl Fn(&str) -> Value) -> Vec<Value> {
    bots.iter()
        .map(|bot| {
            let id = bot.get("id").cloned().unwrap_or(Value::Null);
            let key = match &id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({
                "id": id,
                "name": bot.get("name").cloned().unwrap_or(Value::Null),
                "exists": exists(&key),
                "collection_name": key
            })
        })
        .collect()
}
