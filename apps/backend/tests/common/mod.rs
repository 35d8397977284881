//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext wiring an in-memory cache database to the service router
//! - MockUpstream, a local stand-in for the WaniKani API served over HTTP
//! - Helpers for reading server-sent event bodies

pub mod fixtures;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use wanikani_cache_backend::config::AppConfig;
use wanikani_cache_backend::db::Database;
use wanikani_cache_backend::services::details::DetailSynchronizer;
use wanikani_cache_backend::services::wanikani::WaniKaniClient;
use wanikani_cache_backend::{router, AppState};

pub const TEST_TOKEN: &str = "test-token";

/// Test context containing the cache database, the mock upstream and the router.
pub struct TestContext {
    pub db: Arc<Database>,
    pub upstream: MockUpstream,
    pub details: DetailSynchronizer,
    app: Router,
}

impl TestContext {
    /// Create a context with a credential and no pacing delay.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a context, letting the caller adjust configuration first.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let upstream = MockUpstream::start().await;

        let mut config = AppConfig {
            api_token: Some(TEST_TOKEN.to_string()),
            api_url: upstream.base_url.clone(),
            detail_fetch_delay: Duration::ZERO,
            ..AppConfig::default()
        };
        adjust(&mut config);

        let db = Database::connect_in_memory()
            .await
            .expect("Failed to open in-memory database");
        db.run_migrations().await.expect("Failed to run migrations");
        let db = Arc::new(db);

        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("Failed to build HTTP client");
        let client = WaniKaniClient::with_http_client(http, &config);

        let state = AppState::new(db.clone(), Arc::new(client), &config);
        let details = state.details.clone();
        let app = router(state);

        Self {
            db,
            upstream,
            details,
            app,
        }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }
}

/// Parse an SSE body into the JSON payload of each `data:` line.
pub fn parse_sse(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("event payload is JSON"))
        .collect()
}

/// Event `type` values in order.
pub fn event_types(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[derive(Default)]
struct MockData {
    base_url: String,
    page_size: usize,
    user: Option<Value>,
    review_assignments: Vec<Value>,
    assignments: Vec<Value>,
    subjects: Vec<Value>,
    details: HashMap<i64, Value>,
    detail_failures: HashMap<i64, u16>,
    requests: Vec<(String, Instant)>,
}

/// In-process WaniKani API double listening on an ephemeral port.
#[derive(Clone)]
pub struct MockUpstream {
    pub base_url: String,
    data: Arc<Mutex<MockData>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let data = Arc::new(Mutex::new(MockData {
            base_url: base_url.clone(),
            page_size: 500,
            ..MockData::default()
        }));

        let app = Router::new()
            .route("/user", get(mock_user))
            .route("/assignments", get(mock_assignments))
            .route("/subjects", get(mock_subjects))
            .route("/subjects/:id", get(mock_subject))
            .with_state(data.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock upstream failed");
        });

        Self { base_url, data }
    }

    pub fn set_page_size(&self, size: usize) {
        self.data.lock().unwrap().page_size = size;
    }

    pub fn set_user(&self, user: Value) {
        self.data.lock().unwrap().user = Some(user);
    }

    pub fn set_review_assignments(&self, assignments: Vec<Value>) {
        self.data.lock().unwrap().review_assignments = assignments;
    }

    pub fn set_assignments(&self, assignments: Vec<Value>) {
        self.data.lock().unwrap().assignments = assignments;
    }

    pub fn set_subjects(&self, subjects: Vec<Value>) {
        self.data.lock().unwrap().subjects = subjects;
    }

    pub fn add_detail(&self, detail: Value) {
        let id = detail["id"].as_i64().expect("detail has id");
        self.data.lock().unwrap().details.insert(id, detail);
    }

    /// Make `GET /subjects/{id}` answer with `status`.
    pub fn fail_detail(&self, id: i64, status: u16) {
        self.data.lock().unwrap().detail_failures.insert(id, status);
    }

    pub fn clear_failure(&self, id: i64) {
        self.data.lock().unwrap().detail_failures.remove(&id);
    }

    /// Every request path and query seen so far, in order.
    pub fn requests(&self) -> Vec<String> {
        let data = self.data.lock().unwrap();
        data.requests.iter().map(|(uri, _)| uri.clone()).collect()
    }

    /// Number of requests whose path starts with `prefix`.
    pub fn request_count(&self, prefix: &str) -> usize {
        self.requests().iter().filter(|r| r.starts_with(prefix)).count()
    }

    /// When each single-subject request arrived, in order.
    pub fn detail_request_times(&self) -> Vec<Instant> {
        let data = self.data.lock().unwrap();
        data.requests
            .iter()
            .filter(|(uri, _)| uri.starts_with("/subjects/"))
            .map(|(_, at)| *at)
            .collect()
    }

    /// Requests for single subjects, as subject ids.
    pub fn detail_requests(&self) -> Vec<i64> {
        self.requests()
            .iter()
            .filter_map(|r| r.strip_prefix("/subjects/"))
            .filter_map(|id| id.parse().ok())
            .collect()
    }
}

type Shared = State<Arc<Mutex<MockData>>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_TOKEN}"))
}

fn csv_values(params: &HashMap<String, String>, key: &str) -> Option<Vec<String>> {
    params
        .get(key)
        .map(|v| v.split(',').map(str::to_string).collect())
}

/// Slice `items` into one collection page, linking to the next via `page`.
fn collection(
    data: &MockData,
    path: &str,
    params: &HashMap<String, String>,
    items: Vec<Value>,
) -> Value {
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let start = page * data.page_size;
    let end = (start + data.page_size).min(items.len());
    let page_items = items.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();

    let next_url = (end < items.len()).then(|| {
        let mut query: BTreeMap<&str, String> = params
            .iter()
            .filter(|(k, _)| k.as_str() != "page")
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        query.insert("page", (page + 1).to_string());
        let query: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}{}?{}", data.base_url, path, query.join("&"))
    });

    json!({
        "object": "collection",
        "pages": { "next_url": next_url, "per_page": data.page_size },
        "total_count": items.len(),
        "data": page_items,
    })
}

async fn mock_user(State(data): Shared, uri: OriginalUri, headers: HeaderMap) -> Response {
    let mut data = data.lock().unwrap();
    data.requests.push((uri.0.to_string(), Instant::now()));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match &data.user {
        Some(user) => Json(json!({ "object": "user", "data": user })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn mock_assignments(
    State(data): Shared,
    uri: OriginalUri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut data = data.lock().unwrap();
    data.requests.push((uri.0.to_string(), Instant::now()));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let items: Vec<Value> = if params.contains_key("immediately_available_for_review") {
        data.review_assignments.clone()
    } else {
        let wanted = csv_values(&params, "subject_ids").unwrap_or_default();
        data.assignments
            .iter()
            .filter(|a| wanted.contains(&a["data"]["subject_id"].to_string()))
            .cloned()
            .collect()
    };

    Json(collection(&data, "/assignments", &params, items)).into_response()
}

async fn mock_subjects(
    State(data): Shared,
    uri: OriginalUri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut data = data.lock().unwrap();
    data.requests.push((uri.0.to_string(), Instant::now()));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let levels = csv_values(&params, "levels");
    let types = csv_values(&params, "types");
    let items: Vec<Value> = data
        .subjects
        .iter()
        .filter(|s| {
            levels
                .as_ref()
                .map_or(true, |l| l.contains(&s["data"]["level"].to_string()))
        })
        .filter(|s| {
            types.as_ref().map_or(true, |t| {
                t.iter().any(|t| s["object"].as_str() == Some(t.as_str()))
            })
        })
        .cloned()
        .collect();

    Json(collection(&data, "/subjects", &params, items)).into_response()
}

async fn mock_subject(
    State(data): Shared,
    uri: OriginalUri,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut data = data.lock().unwrap();
    data.requests.push((uri.0.to_string(), Instant::now()));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(status) = data.detail_failures.get(&id) {
        let status = StatusCode::from_u16(*status).unwrap();
        return (status, Json(json!({ "error": "mock failure", "code": status.as_u16() })))
            .into_response();
    }
    match data.details.get(&id) {
        Some(detail) => Json(detail.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
