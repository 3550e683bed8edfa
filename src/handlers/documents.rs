// handlers/documents.rs - /api/documents/* handlers
//
// Uploads land in blob storage, get a `documents` row, then go to the parser
// service. The parser moves the row through `parsing` to `processed`.

use std::convert::Infallible;

use axum::body::Bytes;
use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::router::{HandlerResult, RequestContext};
use crate::services::blobs::object_path;
use crate::services::ParseJob;

use super::{non_empty, owned_row, rejection_message, row_id, timestamp, BOT_NOT_FOUND};

const DOCUMENT_NOT_FOUND: &str = "Document not found";
const SUPPORTED_TYPES: [&str; 5] = ["pdf", "txt", "docx", "md", "html"];

#[derive(Debug, Default)]
struct UploadForm {
    bot_id: Option<String>,
    file: Option<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    name: String,
    content_type: String,
    data: Bytes,
}

/**
 * POST /api/documents/upload - Store a document for one of the caller's bots
 *
 * Input: multipart form with a `file` part and a `botId` field.
 *
 * Output: 202 `{ "message", "document_id", "file_name" }` once the parser has
 * the document. If the parser refuses it (500) or cannot be reached (503) the
 * row is marked `failed` and its id is still returned.
 */
pub fn upload(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let content_type = ctx.header("content-type").unwrap_or_default().to_string();
        let form = read_form(&content_type, ctx.body.clone()).await?;

        let Some(file) = form.file else {
            return Err(ApiError::bad_request("No file provided"));
        };
        let Some(bot_id) = form.bot_id else {
            return Err(ApiError::bad_request("Bot ID is required"));
        };

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        let file_type = file_type(&file.name);
        if !SUPPORTED_TYPES.contains(&file_type.as_str()) {
            return Err(ApiError::bad_request(format!(
                "Unsupported file type. Supported types: {}",
                SUPPORTED_TYPES.join(", ")
            )));
        }

        let file_path = object_path(&user_id, &bot_id, chrono::Utc::now().timestamp_millis(), &file.name);
        let file_size = file.data.len();
        if let Err(err) = state.blobs.upload(&file_path, &file.content_type, file.data).await {
            return match rejection_message(&err) {
                Some(message) => Err(ApiError::bad_request(message)),
                None => Err(err.into()),
            };
        }

        let inserted = state
            .store
            .from("documents")
            .insert(json!({
                "bot_id": bot_id,
                "user_id": user_id,
                "file_name": file.name,
                "file_type": file_type,
                "file_path": file_path,
                "file_size": file_size,
                "status": "pending",
                "created_at": timestamp()
            }))
            .await;
        let document = match inserted {
            Ok(document) => document,
            Err(err) => {
                // The row is what makes the object reachable; drop the orphan
                if let Err(cleanup) = state.blobs.remove(&[file_path.clone()]).await {
                    tracing::error!(path = %file_path, "Failed to remove orphaned upload: {}", cleanup);
                }
                return match rejection_message(&err) {
                    Some(message) => Err(ApiError::bad_request(message)),
                    None => Err(err.into()),
                };
            }
        };
        let document_id = row_id(&document)?;
        tracing::info!(document_id = %document_id, bot_id = %bot_id, size = file_size, "Stored document");

        let descriptor = ParseJob {
            document_id: &document_id,
            file_path: &file_path,
            file_type: &file_type,
            bot_id: &bot_id,
        };

        if let Err(err) = state.parser.trigger(&descriptor).await {
            let (status, message) = if err.is_rejection() {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start parser service")
            } else {
                (StatusCode::SERVICE_UNAVAILABLE, "Parser service unavailable")
            };
            tracing::error!(document_id = %document_id, "{}: {}", message, err);

            let failed = state
                .store
                .from("documents")
                .eq("id", &document_id)
                .update(json!({ "status": "failed", "error": message }))
                .await;
            if let Err(err) = failed {
                tracing::error!(document_id = %document_id, "Failed to mark document failed: {}", err);
            }

            return ctx.respond(status, json!({ "error": message, "document_id": document_id }));
        }

        ctx.respond(
            StatusCode::ACCEPTED,
            json!({
                "message": "Document uploaded successfully",
                "document_id": document_id,
                "file_name": file.name
            }),
        )
    })
}

/// GET /api/documents?botId= - The bot's documents, newest first
pub fn list(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let Some(bot_id) = non_empty(ctx.query("botId")) else {
            return Err(ApiError::bad_request("Bot ID is required"));
        };

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        let documents = state
            .store
            .from("documents")
            .eq("bot_id", &bot_id)
            .eq("user_id", &user_id)
            .order("created_at", false)
            .fetch_all()
            .await?;
        ctx.respond(StatusCode::OK, json!({ "documents": documents }))
    })
}

/// GET /api/documents/:documentId
pub fn get(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let document_id = ctx.param("documentId")?.to_string();
        let document = owned_row(&ctx.state, "documents", "*", &document_id, &user_id, DOCUMENT_NOT_FOUND).await?;
        ctx.respond(StatusCode::OK, json!({ "document": document }))
    })
}

/// DELETE /api/documents/:documentId - Remove the row, the stored file and
/// any embeddings. Only the row deletion can fail the request.
pub fn delete(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let document_id = ctx.param("documentId")?.to_string();

        let state = ctx.state.clone();
        let document = owned_row(
            &state,
            "documents",
            "file_path, bot_id",
            &document_id,
            &user_id,
            DOCUMENT_NOT_FOUND,
        )
        .await?;

        if let Some(file_path) = document.get("file_path").and_then(Value::as_str) {
            if let Err(err) = state.blobs.remove(&[file_path.to_string()]).await {
                tracing::error!(document_id = %document_id, "Failed to delete stored file: {}", err);
            }
        }

        state
            .store
            .from("documents")
            .eq("id", &document_id)
            .eq("user_id", &user_id)
            .delete()
            .await?;

        let bot_id = text_field(&document, "bot_id");
        if let Err(err) = state.embedder.delete_document(&document_id, &bot_id).await {
            tracing::error!(document_id = %document_id, "Failed to delete document embeddings: {}", err);
        }

        ctx.respond(StatusCode::OK, json!({ "message": "Document deleted successfully" }))
    })
}

async fn read_form(content_type: &str, body: Bytes) -> Result<UploadForm, ApiError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| ApiError::bad_request("Expected a multipart/form-data body"))?;
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let Some(file_name) = field.file_name().and_then(|n| non_empty(Some(n.to_string()))) else {
                    continue;
                };
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field.bytes().await.map_err(malformed)?;
                form.file = Some(UploadedFile {
                    name: file_name,
                    content_type,
                    data,
                });
            }
            Some("botId") => {
                form.bot_id = non_empty(Some(field.text().await.map_err(malformed)?));
            }
            _ => {}
        }
    }
    Ok(form)
}

fn malformed(err: multer::Error) -> ApiError {
    tracing::debug!("Malformed multipart body: {}", err);
    ApiError::bad_request("Malformed multipart body")
}

/// Lower-cased extension; a name without a dot is its own "extension"
fn file_type(file_name: &str) -> String {
    file_name.rsplit('.').next().unwrap_or_default().to_lowercase()
}

fn text_field(row: &Value, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
