use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use url::Url;

use super::{check_status, endpoint, ServiceError};

/// Relational data store reached through its REST query interface
pub struct DataStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl DataStore {
    pub fn new(client: Client, base_url: &str, service_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            service_key: service_key.to_string(),
        }
    }

    /// Start a query against `table`
    pub fn from(&self, table: &str) -> Query<'_> {
        Query {
            store: self,
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

/// Query builder: filters accumulate, a terminal operation sends the request
pub struct Query<'a> {
    store: &'a DataStore,
    table: String,
    columns: String,
    filters: Vec<(String, String)>,
    order: Option<String>,
}

impl<'a> Query<'a> {
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn in_<S: AsRef<str>>(mut self, column: &str, values: &[S]) -> Self {
        let quoted: Vec<String> = values
            .iter()
            .map(|v| format!("\"{}\"", v.as_ref().replace('"', "\\\"")))
            .collect();
        self.filters.push((column.to_string(), format!("in.({})", quoted.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order = Some(format!("{}.{}", column, direction));
        self
    }

    fn url(&self, with_select: bool) -> Result<Url, ServiceError> {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if with_select {
            pairs.push(("select", &self.columns));
        }
        for (column, filter) in &self.filters {
            pairs.push((column, filter));
        }
        if let Some(order) = &self.order {
            pairs.push(("order", order));
        }
        endpoint(&self.store.base_url, &format!("/rest/v1/{}", self.table), &pairs)
    }

    pub async fn fetch_all(self) -> Result<Vec<Value>, ServiceError> {
        let url = self.url(true)?;
        let response = self.store.request(Method::GET, url).send().await?;
        let rows = check_status(response).await?.json().await?;
        Ok(rows)
    }

    /// Exactly the first matching row; `NotFound` when there is none
    pub async fn fetch_one(self) -> Result<Value, ServiceError> {
        let table = self.table.clone();
        self.fetch_all()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("No matching row in {}", table)))
    }

    /// Insert one row and return it as stored
    pub async fn insert(self, row: Value) -> Result<Value, ServiceError> {
        let url = self.url(true)?;
        let response = self
            .store
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let rows: Vec<Value> = check_status(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ServiceError::Decode(format!("insert into {} returned no row", self.table)))
    }

    /// Apply `patch` to every matching row and return the updated rows
    pub async fn update(self, patch: Value) -> Result<Vec<Value>, ServiceError> {
        let url = self.url(true)?;
        let response = self
            .store
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let rows = check_status(response).await?.json().await?;
        Ok(rows)
    }

    pub async fn delete(self) -> Result<(), ServiceError> {
        let url = self.url(false)?;
        let response = self.store.request(Method::DELETE, url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}
