use axum::body::Bytes;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::json;
use url::Url;

use super::{check_status, endpoint, ServiceError};

/// Object storage for uploaded documents, one bucket, keys are
/// `<user>/<bot>/<millis>_<file name>`
pub struct BlobStore {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl BlobStore {
    pub fn new(client: Client, base_url: &str, service_key: &str, bucket: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn object_url(&self, path: &str) -> Result<Url, ServiceError> {
        endpoint(&self.base_url, &format!("/storage/v1/object/{}/{}", self.bucket, path), &[])
    }

    /// Store `data` under `path`, replacing any object already there
    pub async fn upload(&self, path: &str, content_type: &str, data: Bytes) -> Result<(), ServiceError> {
        let url = self.object_url(path)?;
        let response = self
            .request(Method::POST, url)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(data)
            .send()
            .await?;
        check_status(response).await?;
        tracing::debug!(bucket = %self.bucket, path, "Stored object");
        Ok(())
    }

    pub async fn remove(&self, paths: &[String]) -> Result<(), ServiceError> {
        let url = endpoint(&self.base_url, &format!("/storage/v1/object/{}", self.bucket), &[])?;
        let response = self
            .request(Method::DELETE, url)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Storage key for an upload. Characters outside `[A-Za-z0-9._-]` in the
/// file name become `_` so the key stays a plain URL path.
pub fn object_path(user_id: &str, bot_id: &str, millis: i64, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    format!("{}/{}/{}_{}", user_id, bot_id, millis, safe)
}
