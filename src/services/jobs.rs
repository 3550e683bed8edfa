use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::json;

use super::{check_status, endpoint, ServiceError};

/// Which background microservice a trigger talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Crawl,
    Parse,
    Embed,
}

impl JobKind {
    fn path(self) -> &'static str {
        match self {
            JobKind::Crawl => "/crawl",
            JobKind::Parse => "/parse",
            JobKind::Embed => "/embed",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            JobKind::Crawl => "crawler",
            JobKind::Parse => "parser",
            JobKind::Embed => "embedder",
        }
    }
}

/// Fire-and-forget trigger for a job microservice. The job row is the
/// source of truth; the service updates it as it progresses.
pub struct JobTrigger {
    client: Client,
    kind: JobKind,
    base_url: String,
    service_key: String,
}

/// Job descriptor posted to the crawler
#[derive(Debug, Serialize)]
pub struct CrawlJob<'a> {
    pub job_id: &'a str,
    pub bot_id: &'a str,
    pub url: &'a str,
    pub max_depth: u32,
    pub exclude_patterns: &'a [String],
}

/// Document descriptor posted to the parser
#[derive(Debug, Serialize)]
pub struct ParseJob<'a> {
    pub document_id: &'a str,
    pub file_path: &'a str,
    pub file_type: &'a str,
    pub bot_id: &'a str,
}

/// Job descriptor posted to the embedder
#[derive(Debug, Serialize)]
pub struct EmbedJob<'a> {
    pub job_id: &'a str,
    pub bot_id: &'a str,
    pub document_ids: &'a [String],
}

impl JobTrigger {
    pub fn new(client: Client, kind: JobKind, base_url: &str, service_key: &str) -> Self {
        Self {
            client,
            kind,
            base_url: base_url.to_string(),
            service_key: service_key.to_string(),
        }
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<(), ServiceError> {
        let url = endpoint(&self.base_url, path, &[])?;
        let mut request = self.client.request(method, url).bearer_auth(&self.service_key);
        if let Some(body) = body {
            request = request.json(body);
        }
        check_status(request.send().await?).await?;
        Ok(())
    }

    /// Hand a job to the service. Any 2xx means accepted.
    pub async fn trigger<T: Serialize + ?Sized>(&self, job: &T) -> Result<(), ServiceError> {
        self.send(Method::POST, self.kind.path(), Some(job)).await?;
        tracing::debug!(service = self.kind.as_str(), "Job accepted");
        Ok(())
    }

    /// Ask the service to stop a running job
    pub async fn cancel(&self, job_id: &str) -> Result<(), ServiceError> {
        let path = format!("{}/{}/cancel", self.kind.path(), job_id);
        self.send::<()>(Method::POST, &path, None).await
    }

    /// Drop every stored embedding of a bot (embedder only)
    pub async fn delete_all(&self, bot_id: &str) -> Result<(), ServiceError> {
        self.send(Method::POST, "/delete_all", Some(&json!({ "bot_id": bot_id })))
            .await
    }

    /// Drop the embeddings of one document (embedder only)
    pub async fn delete_document(&self, document_id: &str, bot_id: &str) -> Result<(), ServiceError> {
        let path = format!("/documents/{}/delete", document_id);
        self.send(Method::DELETE, &path, Some(&json!({ "bot_id": bot_id })))
            .await
    }
}
