use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{check_status, endpoint, ServiceError};

/// Vector index client; one collection per bot, named after the bot id
pub struct VectorIndex {
    client: Client,
    base_url: String,
    api_key: String,
    vector_size: u32,
}

#[derive(Deserialize)]
struct ListResponse {
    result: CollectionList,
}

#[derive(Deserialize)]
struct CollectionList {
    collections: Vec<CollectionName>,
}

#[derive(Deserialize)]
struct CollectionName {
    name: String,
}

impl VectorIndex {
    pub fn new(client: Client, base_url: &str, api_key: &str, vector_size: u32) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            vector_size,
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        if self.api_key.is_empty() {
            request
        } else {
            request.header("api-key", &self.api_key)
        }
    }

    fn collection_url(&self, name: &str) -> Result<Url, ServiceError> {
        endpoint(&self.base_url, &format!("/collections/{}", name), &[])
    }

    /// Create a cosine-distance collection sized for the configured embedder
    pub async fn create_collection(&self, name: &str) -> Result<(), ServiceError> {
        let url = self.collection_url(name)?;
        let response = self
            .request(Method::PUT, url)
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine"
                }
            }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn delete_collection(&self, name: &str) -> Result<(), ServiceError> {
        let url = self.collection_url(name)?;
        let response = self.request(Method::DELETE, url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Names of every collection in the index
    pub async fn list_collections(&self) -> Result<Vec<String>, ServiceError> {
        let url = endpoint(&self.base_url, "/collections", &[])?;
        let response = self.request(Method::GET, url).send().await?;
        let body: ListResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(body.result.collections.into_iter().map(|c| c.name).collect())
    }
}
