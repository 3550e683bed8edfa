// routes.rs - The gateway's route table
//
// Registration order is match priority. Protected routes put RequireUser
// first in their chain.

use std::sync::Arc;

use tower_http::trace::TraceLayer;

use crate::chain;
use crate::handlers::{auth, bots, crawl, documents, embeddings, health, vectors, widget};
use crate::middleware::{Cors, RequireUser};
use crate::router::{handler_fn, into_service, Router};
use crate::services::AppState;

/// Middleware and routes for the gateway, in priority order
pub fn router(state: &AppState) -> Router {
    Router::new()
        .use_middleware(Cors::from_config(&state.config.security))
        // Public
        .get("/api/health", chain![handler_fn(health::get)])
        .post("/api/auth/register", chain![handler_fn(auth::register)])
        .post("/api/auth/login", chain![handler_fn(auth::login)])
        .post("/api/auth/logout", chain![handler_fn(auth::logout)])
        .get("/api/auth/user", chain![RequireUser, handler_fn(auth::current_user)])
        // Bots
        .get("/api/bots", chain![RequireUser, handler_fn(bots::list)])
        .post("/api/bots", chain![RequireUser, handler_fn(bots::create)])
        .get("/api/bots/:botId", chain![RequireUser, handler_fn(bots::get)])
        .put("/api/bots/:botId", chain![RequireUser, handler_fn(bots::update)])
        .delete("/api/bots/:botId", chain![RequireUser, handler_fn(bots::delete)])
        // Crawl jobs
        .post("/api/crawl/website", chain![RequireUser, handler_fn(crawl::start)])
        .get("/api/crawl/status/:jobId", chain![RequireUser, handler_fn(crawl::status)])
        .get("/api/crawl/jobs", chain![RequireUser, handler_fn(crawl::jobs)])
        .delete("/api/crawl/job/:jobId", chain![RequireUser, handler_fn(crawl::cancel)])
        // Documents
        .post("/api/documents/upload", chain![RequireUser, handler_fn(documents::upload)])
        .get("/api/documents", chain![RequireUser, handler_fn(documents::list)])
        .get("/api/documents/:documentId", chain![RequireUser, handler_fn(documents::get)])
        .delete("/api/documents/:documentId", chain![RequireUser, handler_fn(documents::delete)])
        // Embedding jobs
        .post("/api/embeddings/generate", chain![RequireUser, handler_fn(embeddings::generate)])
        .get("/api/embeddings/status/:jobId", chain![RequireUser, handler_fn(embeddings::status)])
        .delete("/api/embeddings/delete/:botId", chain![RequireUser, handler_fn(embeddings::delete)])
        // Vector index
        .get("/api/vectors/collections", chain![RequireUser, handler_fn(vectors::list)])
        .post("/api/vectors/collections", chain![RequireUser, handler_fn(vectors::create)])
        .delete(
            "/api/vectors/collections/:collectionId",
            chain![RequireUser, handler_fn(vectors::delete)],
        )
        // Widget (read is public, embedded on third-party pages)
        .get("/api/widget/:botId/config", chain![handler_fn(widget::get)])
        .post("/api/widget/:botId/config", chain![RequireUser, handler_fn(widget::update)])
}

/// The complete HTTP service: dispatcher behind request tracing
pub fn app(state: Arc<AppState>) -> axum::Router {
    let dispatcher = router(&state).into_dispatcher(state);
    into_service(dispatcher).layer(TraceLayer::new_for_http())
}
