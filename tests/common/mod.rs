#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use rag_gateway::config::{AppConfig, ServicesConfig};
use rag_gateway::AppState;

pub const OWNER_TOKEN: &str = "owner-token";
pub const OTHER_TOKEN: &str = "other-token";
pub const OWNER_ID: &str = "user-1";
pub const OTHER_ID: &str = "user-2";
pub const PASSWORD: &str = "correct-horse";

/// Recorded state of the fake collaborators
#[derive(Default)]
pub struct Upstream {
    pub tables: HashMap<String, Vec<Value>>,
    pub collections: Vec<String>,
    /// Stored objects: (bucket/path, content type, size)
    pub blobs: Vec<(String, String, usize)>,
    /// (path, body) of every job trigger and cancel call
    pub calls: Vec<(String, Value)>,
    /// Job services answer 500 when set
    pub reject_jobs: bool,
    next_id: u64,
}

pub type Shared = Arc<Mutex<Upstream>>;

/// A gateway wired to an in-process fake of every collaborator
pub struct TestEnv {
    pub base_url: String,
    pub upstream_url: String,
    pub upstream: Shared,
    pub client: reqwest::Client,
}

impl TestEnv {
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Start with a config tweak applied after the services point at the fake
    pub async fn start_with(tweak: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let upstream: Shared = Arc::default();
        let upstream_url = serve(mock_upstream(upstream.clone())).await?;

        let mut config = AppConfig::development();
        config.services = ServicesConfig::single_host(&upstream_url);
        tweak(&mut config);

        let state = AppState::new(config).context("failed to build app state")?;
        let base_url = serve(rag_gateway::app(Arc::new(state))).await?;

        Ok(Self {
            base_url,
            upstream_url,
            upstream,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    /// Request as the owner of the seeded data
    pub fn owner(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, self.url(path)).bearer_auth(OWNER_TOKEN)
    }

    pub fn seed(&self, table: &str, row: Value) {
        let mut upstream = self.upstream.lock().unwrap();
        upstream.tables.entry(table.to_string()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        let upstream = self.upstream.lock().unwrap();
        upstream.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn row(&self, table: &str, id: &str) -> Option<Value> {
        self.rows(table).into_iter().find(|row| row["id"] == id)
    }

    pub fn collections(&self) -> Vec<String> {
        self.upstream.lock().unwrap().collections.clone()
    }

    pub fn blobs(&self) -> Vec<(String, String, usize)> {
        self.upstream.lock().unwrap().blobs.clone()
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.upstream.lock().unwrap().calls.clone()
    }

    pub fn reject_jobs(&self) {
        self.upstream.lock().unwrap().reject_jobs = true;
    }

    /// Seed a bot owned by `user_id`
    pub fn seed_bot(&self, id: &str, user_id: &str, name: &str) {
        self.seed(
            "bots",
            json!({
                "id": id,
                "user_id": user_id,
                "name": name,
                "settings": null,
                "created_at": "2024-01-01T00:00:00Z"
            }),
        );
    }
}

/// Bind on a free port and serve in the background
async fn serve(app: Router) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://127.0.0.1:{}", port))
}

fn mock_upstream(state: Shared) -> Router {
    Router::new()
        // Identity
        .route("/auth/v1/user", get(auth_user))
        .route("/auth/v1/signup", post(auth_signup))
        .route("/auth/v1/token", post(auth_token))
        .route("/auth/v1/logout", post(auth_logout))
        // Data store
        .route(
            "/rest/v1/:table",
            get(rest_select).post(rest_insert).patch(rest_update).delete(rest_delete),
        )
        // Blob storage
        .route("/storage/v1/object/:bucket", axum::routing::delete(storage_remove))
        .route("/storage/v1/object/:bucket/*path", post(storage_upload))
        // Vector index
        .route("/qdrant/collections", get(qdrant_list))
        .route(
            "/qdrant/collections/:name",
            get(qdrant_get).put(qdrant_create).delete(qdrant_delete),
        )
        // Job services
        .route("/crawler/crawl", post(job_trigger))
        .route("/crawler/crawl/:id/cancel", post(job_cancel))
        .route("/parser/parse", post(job_trigger))
        .route("/embedder/embed", post(job_trigger))
        .route("/embedder/delete_all", post(job_trigger))
        .route("/embedder/documents/:id/delete", axum::routing::delete(job_trigger))
        .with_state(state)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn user_for(token: &str) -> Option<Value> {
    match token {
        OWNER_TOKEN => Some(json!({ "id": OWNER_ID, "email": "owner@example.com", "aud": "authenticated" })),
        OTHER_TOKEN => Some(json!({ "id": OTHER_ID, "email": "other@example.com", "aud": "authenticated" })),
        _ => None,
    }
}

async fn auth_user(headers: HeaderMap) -> Response {
    match bearer(&headers).and_then(user_for) {
        Some(user) => Json(user).into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "invalid JWT" }))).into_response(),
    }
}

async fn auth_signup(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if email == "taken@example.com" {
        return (StatusCode::BAD_REQUEST, Json(json!({ "msg": "User already registered" }))).into_response();
    }
    // Confirmation pending: no session in the response
    Json(json!({ "id": "user-new", "email": email, "user_metadata": body["data"] })).into_response()
}

async fn auth_token(RawQuery(query): RawQuery, Json(body): Json<Value>) -> Response {
    if query.as_deref() != Some("grant_type=password") || body["password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
        )
            .into_response();
    }
    Json(json!({
        "access_token": OWNER_TOKEN,
        "token_type": "bearer",
        "user": { "id": OWNER_ID, "email": body["email"] }
    }))
    .into_response()
}

async fn auth_logout(headers: HeaderMap) -> StatusCode {
    match bearer(&headers).and_then(user_for) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::UNAUTHORIZED,
    }
}

enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
}

struct RestQuery {
    filters: Vec<Filter>,
    order_desc: Option<String>,
}

fn parse_rest_query(raw: Option<String>) -> RestQuery {
    let mut query = RestQuery { filters: Vec::new(), order_desc: None };
    let raw = raw.unwrap_or_default();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let (key, value) = (key.into_owned(), value.into_owned());
        if key == "select" {
            continue;
        }
        if key == "order" {
            query.order_desc = value.strip_suffix(".desc").map(str::to_string);
        } else if let Some(v) = value.strip_prefix("eq.") {
            query.filters.push(Filter::Eq(key, v.to_string()));
        } else if let Some(list) = value.strip_prefix("in.(").and_then(|v| v.strip_suffix(')')) {
            let values = list.split(',').map(|v| v.trim_matches('"').to_string()).collect();
            query.filters.push(Filter::In(key, values));
        }
    }
    query
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => text_of(&row[column.as_str()]) == *value,
        Filter::In(column, values) => values.contains(&text_of(&row[column.as_str()])),
    })
}

async fn rest_select(
    State(state): State<Shared>,
    Path(table): Path<String>,
    RawQuery(raw): RawQuery,
) -> Json<Vec<Value>> {
    let query = parse_rest_query(raw);
    let upstream = state.lock().unwrap();
    let mut rows: Vec<Value> = upstream
        .tables
        .get(&table)
        .map(|rows| rows.iter().filter(|row| matches(row, &query.filters)).cloned().collect())
        .unwrap_or_default();
    if let Some(column) = query.order_desc {
        rows.sort_by(|a, b| text_of(&b[column.as_str()]).cmp(&text_of(&a[column.as_str()])));
    }
    Json(rows)
}

async fn rest_insert(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Json(rows): Json<Vec<Value>>,
) -> (StatusCode, Json<Vec<Value>>) {
    let mut upstream = state.lock().unwrap();
    let mut inserted = Vec::new();
    for mut row in rows {
        if row.get("id").is_none() {
            upstream.next_id += 1;
            row["id"] = json!(format!("{}-{}", table, upstream.next_id));
        }
        inserted.push(row.clone());
        upstream.tables.entry(table.clone()).or_default().push(row);
    }
    (StatusCode::CREATED, Json(inserted))
}

async fn rest_update(
    State(state): State<Shared>,
    Path(table): Path<String>,
    RawQuery(raw): RawQuery,
    Json(patch): Json<Value>,
) -> Json<Vec<Value>> {
    let query = parse_rest_query(raw);
    let mut upstream = state.lock().unwrap();
    let mut updated = Vec::new();
    if let Some(rows) = upstream.tables.get_mut(&table) {
        for row in rows.iter_mut().filter(|row| matches(row, &query.filters)) {
            if let (Value::Object(target), Value::Object(fields)) = (&mut *row, &patch) {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
    }
    Json(updated)
}

async fn rest_delete(
    State(state): State<Shared>,
    Path(table): Path<String>,
    RawQuery(raw): RawQuery,
) -> StatusCode {
    let query = parse_rest_query(raw);
    let mut upstream = state.lock().unwrap();
    if let Some(rows) = upstream.tables.get_mut(&table) {
        rows.retain(|row| !matches(row, &query.filters));
    }
    StatusCode::NO_CONTENT
}

fn qdrant_key_ok(headers: &HeaderMap) -> bool {
    headers.get("api-key").and_then(|v| v.to_str().ok()) == Some("qdrant-key")
}

async fn qdrant_list(State(state): State<Shared>) -> Json<Value> {
    let upstream = state.lock().unwrap();
    let collections: Vec<Value> = upstream.collections.iter().map(|name| json!({ "name": name })).collect();
    Json(json!({ "result": { "collections": collections }, "status": "ok" }))
}

async fn qdrant_get(State(state): State<Shared>, Path(name): Path<String>) -> StatusCode {
    if state.lock().unwrap().collections.contains(&name) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn qdrant_create(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !qdrant_key_ok(&headers) || body["vectors"]["distance"] != "Cosine" {
        return (StatusCode::BAD_REQUEST, Json(json!({ "status": { "error": "bad request" } }))).into_response();
    }
    let mut upstream = state.lock().unwrap();
    if upstream.collections.contains(&name) {
        let error = format!("Wrong input: Collection `{}` already exists!", name);
        return (StatusCode::BAD_REQUEST, Json(json!({ "status": { "error": error } }))).into_response();
    }
    upstream.collections.push(name);
    Json(json!({ "result": true, "status": "ok" })).into_response()
}

async fn qdrant_delete(State(state): State<Shared>, Path(name): Path<String>) -> Json<Value> {
    state.lock().unwrap().collections.retain(|c| c != &name);
    Json(json!({ "result": true, "status": "ok" }))
}

async fn job_trigger(State(state): State<Shared>, uri: Uri, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut upstream = state.lock().unwrap();
    if upstream.reject_jobs {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": "worker pool exhausted" }))).into_response();
    }
    upstream.calls.push((uri.path().to_string(), body));
    (StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))).into_response()
}

async fn job_cancel(State(state): State<Shared>, uri: Uri) -> StatusCode {
    state.lock().unwrap().calls.push((uri.path().to_string(), Value::Null));
    StatusCode::OK
}

async fn storage_upload(
    State(state): State<Shared>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let key = format!("{}/{}", bucket, path);
    state.lock().unwrap().blobs.push((key.clone(), content_type, body.len()));
    Json(json!({ "Key": key })).into_response()
}

async fn storage_remove(
    State(state): State<Shared>,
    Path(bucket): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let prefixes: Vec<String> = body["prefixes"]
        .as_array()
        .map(|list| list.iter().filter_map(Value::as_str).map(|p| format!("{}/{}", bucket, p)).collect())
        .unwrap_or_default();
    state.lock().unwrap().blobs.retain(|(key, _, _)| !prefixes.contains(key));
    Json(json!([]))
}
