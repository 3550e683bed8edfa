// handlers/crawl.rs - /api/crawl/* handlers
//
// The gateway records the job and hands it to the crawler service; the
// crawler reports progress by updating the job row directly.

use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::router::{HandlerResult, RequestContext};
use crate::services::{AppState, CrawlJob};

use super::{non_empty, owned_row, row_id, scoped_not_found, timestamp, BOT_NOT_FOUND};

const JOB_NOT_FOUND: &str = "Crawl job not found";
const DEFAULT_MAX_DEPTH: u32 = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCrawl {
    pub url: Option<String>,
    pub bot_id: Option<String>,
    pub max_depth: Option<u32>,
    pub exclude_patterns: Option<Vec<String>>,
}

/**
 * POST /api/crawl/website - Queue a website crawl for one of the caller's bots
 *
 * Input: `{ "url", "botId", "maxDepth"?, "excludePatterns"? }`
 *
 * Output: 202 `{ "message", "job_id" }`. When the crawler refuses the job
 * (500) or cannot be reached (503) the job row is marked `failed` and its id
 * is still returned.
 */
pub fn start(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let input: StartCrawl = ctx.json()?;
        let Some(url) = non_empty(input.url) else {
            return Err(ApiError::bad_request("URL is required"));
        };
        let Some(bot_id) = non_empty(input.bot_id) else {
            return Err(ApiError::bad_request("Bot ID is required"));
        };
        let max_depth = input.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let exclude_patterns = input.exclude_patterns.unwrap_or_default();

        let state = ctx.state.clone();
        owned_row(&state, "bots", "id", &bot_id, &user_id, BOT_NOT_FOUND).await?;

        let job = state
            .store
            .from("crawl_jobs")
            .insert(json!({
                "bot_id": bot_id,
                "user_id": user_id,
                "url": url,
                "max_depth": max_depth,
                "exclude_patterns": exclude_patterns,
                "status": "pending",
                "created_at": timestamp()
            }))
            .await?;
        let job_id = row_id(&job)?;
        tracing::info!(job_id = %job_id, bot_id = %bot_id, "Created crawl job");

        let descriptor = CrawlJob {
            job_id: &job_id,
            bot_id: &bot_id,
            url: &url,
            max_depth,
            exclude_patterns: &exclude_patterns,
        };

        if let Err(err) = state.crawler.trigger(&descriptor).await {
            let (status, message) = if err.is_rejection() {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start crawler service")
            } else {
                (StatusCode::SERVICE_UNAVAILABLE, "Crawler service unavailable")
            };
            tracing::error!(job_id = %job_id, "{}: {}", message, err);
            mark_failed(&state, &job_id, message).await;
            return ctx.respond(status, json!({ "error": message, "job_id": job_id }));
        }

        ctx.respond(
            StatusCode::ACCEPTED,
            json!({ "message": "Crawl job started successfully", "job_id": job_id }),
        )
    })
}

/// GET /api/crawl/status/:jobId
pub fn status(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let job_id = ctx.param("jobId")?.to_string();
        let job = owned_row(&ctx.state, "crawl_jobs", "*", &job_id, &user_id, JOB_NOT_FOUND).await?;
        ctx.respond(StatusCode::OK, json!({ "job": job }))
    })
}

/// GET /api/crawl/jobs?botId= - A bot's crawl jobs, newest first
pub fn jobs(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let Some(bot_id) = non_empty(ctx.query("botId")) else {
            return Err(ApiError::bad_request("Bot ID is required"));
        };

        let jobs = ctx
            .state
            .store
            .from("crawl_jobs")
            .eq("bot_id", &bot_id)
            .eq("user_id", &user_id)
            .order("created_at", false)
            .fetch_all()
            .await?;
        ctx.respond(StatusCode::OK, json!({ "jobs": jobs }))
    })
}

/// DELETE /api/crawl/job/:jobId - Cancel a job, stopping the crawler if it is running
pub fn cancel(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user_id = ctx.user()?.id.clone();
        let job_id = ctx.param("jobId")?.to_string();

        let state = ctx.state.clone();
        let job = owned_row(&state, "crawl_jobs", "id, status", &job_id, &user_id, JOB_NOT_FOUND).await?;

        if job.get("status").and_then(|s| s.as_str()) == Some("in_progress") {
            if let Err(err) = state.crawler.cancel(&job_id).await {
                tracing::warn!(job_id = %job_id, "Crawler did not acknowledge cancellation: {}", err);
            }
        }

        state
            .store
            .from("crawl_jobs")
            .eq("id", &job_id)
            .eq("user_id", &user_id)
            .update(json!({ "status": "cancelled" }))
            .await
            .map_err(|err| scoped_not_found(err, JOB_NOT_FOUND))?;

        ctx.respond(StatusCode::OK, json!({ "message": "Crawl job cancelled" }))
    })
}

async fn mark_failed(state: &AppState, job_id: &str, reason: &str) {
    let result = state
        .store
        .from("crawl_jobs")
        .eq("id", job_id)
        .update(json!({ "status": "failed", "error": reason }))
        .await;
    if let Err(err) = result {
        tracing::error!(job_id = %job_id, "Failed to mark crawl job failed: {}", err);
    }
}
