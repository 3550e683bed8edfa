// HTTP clients for the gateway's external collaborators
//
// identity - bearer token verification, sign-up/sign-in/sign-out
// store    - relational data store (query-builder over the REST interface)
// blobs    - object storage for uploaded documents
// vectors  - vector index collections
// jobs     - crawl / parse / embed job triggers

pub mod blobs;
pub mod identity;
pub mod jobs;
pub mod store;
pub mod vectors;

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::AppConfig;

pub use blobs::BlobStore;
pub use identity::{AuthSession, AuthUser, IdentityService};
pub use jobs::{CrawlJob, EmbedJob, JobKind, JobTrigger, ParseJob};
pub use store::{DataStore, Query};
pub use vectors::VectorIndex;

/// Errors from calls to external collaborators
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid upstream response: {0}")]
    Decode(String),

    #[error("Missing configuration: {0}")]
    NotConfigured(&'static str),
}

impl ServiceError {
    /// The collaborator answered and said no (as opposed to being unreachable)
    pub fn is_rejection(&self) -> bool {
        matches!(self, ServiceError::Rejected { .. } | ServiceError::NotFound(_))
    }
}

/// Configuration plus one client per collaborator; the "environment" every
/// request context carries
pub struct AppState {
    pub config: AppConfig,
    pub identity: IdentityService,
    pub store: DataStore,
    pub blobs: BlobStore,
    pub vectors: VectorIndex,
    pub crawler: JobTrigger,
    pub parser: JobTrigger,
    pub embedder: JobTrigger,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let services = &config.services;

        // One pooled client; the timeout bounds every collaborator call
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(services.request_timeout_secs))
            .build()?;

        let identity = IdentityService::new(
            client.clone(),
            &services.supabase_url,
            &services.supabase_anon_key,
            &services.supabase_service_role_key,
        );
        let store = DataStore::new(
            client.clone(),
            &services.supabase_url,
            &services.supabase_service_role_key,
        );
        let blobs = BlobStore::new(
            client.clone(),
            &services.supabase_url,
            &services.supabase_service_role_key,
            &services.storage_bucket,
        );
        let vectors = VectorIndex::new(
            client.clone(),
            &services.qdrant_url,
            &services.qdrant_api_key,
            services.vector_size,
        );
        let crawler = JobTrigger::new(
            client.clone(),
            JobKind::Crawl,
            &services.crawler_service_url,
            &services.crawler_service_key,
        );
        let parser = JobTrigger::new(
            client.clone(),
            JobKind::Parse,
            &services.parser_service_url,
            &services.parser_service_key,
        );
        let embedder = JobTrigger::new(
            client,
            JobKind::Embed,
            &services.embeddings_service_url,
            &services.embeddings_service_key,
        );

        Ok(Self {
            config,
            identity,
            store,
            blobs,
            vectors,
            crawler,
            parser,
            embedder,
        })
    }
}

/// Join `path` onto `base` and append query pairs
pub(crate) fn endpoint(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, ServiceError> {
    if base.is_empty() {
        return Err(ServiceError::NotConfigured("service base URL"));
    }
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    let mut url = Url::parse(&raw).map_err(|_| ServiceError::NotConfigured("valid service base URL"))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Pass 2xx responses through; turn anything else into `Rejected`
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Rejected {
        status: status.as_u16(),
        message: upstream_message(&body),
    })
}

/// Best human-readable message from an upstream error body
fn upstream_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["/msg", "/message", "/error_description", "/error", "/status/error"]
                .iter()
                .find_map(|pointer| v.pointer(pointer).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}
