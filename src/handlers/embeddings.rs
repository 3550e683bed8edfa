// handlers/embeddings.rs - /api/embeddings/* handlers

use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::router::{HandlerResult, RequestContext};
use crate::services::{AppState, EmbedJob};

use super::{non_empty, owned_row, reset_embedded_documents, row_id, timestamp, BOT_NOT_FOUND};

const JOB_NOT_FOUND: &str = "Embedding job not found";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateEmbeddings {
    pub bot_id: Option<String>,
    pub document_ids: Option<Vec<String>>,
}

/**
 * POST /api/embeddings/generate - Embed processed documents into the bot's collection
 *
 * Input: `{ "botId", "documentIds": [...] }`
 *
 * Every listed document must belong to the bot and be `processed`. The
 * documents move to `embedding` while the job runs; if the embedder cannot
 * take the job they are put back to `processed` and the job is marked
 * `failed`.
 */
pub fn generate(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let input: GenerateEmbeddings = ctx.json()?;
        let Some(bot_id) = non_empty(input.bot_id) else {
            return Err(ApiError::bad_request("Bot ID is required"));
        };
        let document_ids = input.document_ids.unwrap_or_default();
        if document_ids.is_empty() {
            return Err(ApiError::bad_request("At least one document ID is required"));
        }

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        let documents = state
            .store
            .from("documents")
            .select("id, file_path, file_type, status")
            .in_("id", &document_ids)
            .eq("bot_id", &bot_id)
            .eq("user_id", &user_id)
            .fetch_all()
            .await?;
        if documents.is_empty() {
            return Err(ApiError::not_found("No valid documents found"));
        }

        let unprocessed = unprocessed_ids(&documents);
        if !unprocessed.is_empty() {
            return ctx.respond(
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Some documents are not ready for embedding",
                    "unprocessed_documents": unprocessed
                }),
            );
        }

        let job = state
            .store
            .from("embedding_jobs")
            .insert(json!({
                "bot_id": bot_id,
                "user_id": user_id,
                "document_ids": document_ids,
                "status": "pending",
                "created_at": timestamp()
            }))
            .await?;
        let job_id = row_id(&job)?;
        tracing::info!(job_id = %job_id, bot_id = %bot_id, documents = document_ids.len(), "Created embedding job");

        set_document_status(&state, &document_ids, &user_id, "embedding").await;

        let descriptor = EmbedJob {
            job_id: &job_id,
            bot_id: &bot_id,
            document_ids: &document_ids,
        };

        if let Err(err) = state.embedder.trigger(&descriptor).await {
            let (status, message) = if err.is_rejection() {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start embedding service")
            } else {
                (StatusCode::SERVICE_UNAVAILABLE, "Embedding service unavailable")
            };
            tracing::error!(job_id = %job_id, "{}: {}", message, err);

            let failed = state
                .store
                .from("embedding_jobs")
                .eq("id", &job_id)
                .update(json!({ "status": "failed", "error": message }))
                .await;
            if let Err(err) = failed {
                tracing::error!(job_id = %job_id, "Failed to mark embedding job failed: {}", err);
            }
            set_document_status(&state, &document_ids, &user_id, "processed").await;

            return ctx.respond(status, json!({ "error": message, "job_id": job_id }));
        }

        ctx.respond(
            StatusCode::ACCEPTED,
            json!({ "message": "Embedding job started successfully", "job_id": job_id }),
        )
    })
}

/// GET /api/embeddings/status/:jobId
pub fn status(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let job_id = ctx.param("jobId")?.to_string();
        let job = owned_row(&ctx.state, "embedding_jobs", "*", &job_id, &user_id, JOB_NOT_FOUND).await?;
        ctx.respond(StatusCode::OK, json!({ "job": job }))
    })
}

/**
 * DELETE /api/embeddings/delete/:botId - Drop every embedding of a bot
 *
 * The bot's `embedded` documents go back to `processed` first, so they can be
 * embedded again. A refusal from the embedder is a 500, an unreachable one
 * a 503.
 */
pub fn delete(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let bot_id = ctx.param("botId")?.to_string();

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        reset_embedded_documents(&state, &bot_id, &user_id).await;

        if let Err(err) = state.embedder.delete_all(&bot_id).await {
            let (status, message) = if err.is_rejection() {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete embeddings")
            } else {
                (StatusCode::SERVICE_UNAVAILABLE, "Embedding service unavailable")
            };
            tracing::error!(bot_id = %bot_id, "{}: {}", message, err);
            return ctx.respond(status, json!({ "error": message }));
        }

        tracing::info!(bot_id = %bot_id, "Deleted bot embeddings");
        ctx.respond(StatusCode::OK, json!({ "message": "Embeddings deleted successfully" }))
    })
}

fn unprocessed_ids(documents: &[Value]) -> Vec<Value> {
    documents
        .iter()
        .filter(|doc| doc.get("status").and_then(Value::as_str) != Some("processed"))
        .map(|doc| doc.get("id").cloned().unwrap_or(Value::Null))
        .collect()
}

async fn set_document_status(state: &AppState, document_ids: &[String], user_id: &str, status: &str) {
    let result = state
        .store
        .from("documents")
        .in_("id", document_ids)
        .eq("user_id", user_id)
        .update(json!({ "status": status }))
        .await;
    if let Err(err) = result {
        tracing::error!("Failed to set document status to {}: {}", status, err);
    }
}
