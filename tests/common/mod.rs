//! Shared fixtures: a local stand-in for the Square API and config helpers.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TOKEN_ENV: &str = "SALESYNC_TEST_SQUARE_TOKEN";
pub const TOKEN: &str = "test-token";

// ─── Square stub ────────────────────────────────────────────────────

/// Mutable behaviour and call log of the stub.
pub struct StubState {
    /// Pages of orders. The first request gets page 0; each page after the
    /// first is reached through cursor `page-<n>`.
    pub pages: Mutex<Vec<Vec<Value>>>,
    /// Catalog object id → SKU.
    pub skus: Mutex<HashMap<String, String>>,
    pub search_status: Mutex<StatusCode>,
    pub catalog_status: Mutex<StatusCode>,
    /// Extra `errors` array returned with a 200 search response.
    pub search_errors: Mutex<Option<Value>>,
    pub search_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
    pub search_bodies: Mutex<Vec<Value>>,
    pub catalog_bodies: Mutex<Vec<Value>>,
    pub auth_headers: Mutex<Vec<String>>,
}

impl StubState {
    fn new() -> Self {
        Self {
            pages: Mutex::new(vec![Vec::new()]),
            skus: Mutex::new(HashMap::new()),
            search_status: Mutex::new(StatusCode::OK),
            catalog_status: Mutex::new(StatusCode::OK),
            search_errors: Mutex::new(None),
            search_calls: AtomicUsize::new(0),
            catalog_calls: AtomicUsize::new(0),
            search_bodies: Mutex::new(Vec::new()),
            catalog_bodies: Mutex::new(Vec::new()),
            auth_headers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_orders(&self, orders: Vec<Value>) {
        *self.pages.lock().unwrap() = vec![orders];
    }

    pub fn set_pages(&self, pages: Vec<Vec<Value>>) {
        *self.pages.lock().unwrap() = pages;
    }

    pub fn set_sku(&self, catalog_object_id: &str, sku: &str) {
        self.skus
            .lock()
            .unwrap()
            .insert(catalog_object_id.to_string(), sku.to_string());
    }

    pub fn fail_search(&self, status: StatusCode) {
        *self.search_status.lock().unwrap() = status;
    }

    pub fn fail_catalog(&self, status: StatusCode) {
        *self.catalog_status.lock().unwrap() = status;
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }
}

pub struct SquareStub {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
}

impl SquareStub {
    pub async fn start() -> Self {
        let state = Arc::new(StubState::new());
        let app = Router::new()
            .route("/v2/orders/search", post(search_orders))
            .route("/v2/catalog/batch-retrieve", post(batch_retrieve))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

fn record_auth(state: &StubState, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    state.auth_headers.lock().unwrap().push(auth);
}

async fn search_orders(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.search_calls.fetch_add(1, Ordering::SeqCst);
    record_auth(&state, &headers);
    state.search_bodies.lock().unwrap().push(body.clone());

    let status = *state.search_status.lock().unwrap();
    if status != StatusCode::OK {
        return (
            status,
            Json(json!({
                "errors": [{ "category": "API_ERROR", "code": "SERVICE_UNAVAILABLE" }]
            })),
        );
    }
    if let Some(errors) = state.search_errors.lock().unwrap().clone() {
        return (StatusCode::OK, Json(json!({ "errors": errors })));
    }

    let page_index = body
        .get("cursor")
        .and_then(Value::as_str)
        .and_then(|c| c.strip_prefix("page-"))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);

    let pages = state.pages.lock().unwrap();
    let orders = pages.get(page_index).cloned().unwrap_or_default();
    let mut response = json!({ "orders": orders });
    if page_index + 1 < pages.len() {
        response["cursor"] = json!(format!("page-{}", page_index + 1));
    }
    (StatusCode::OK, Json(response))
}

async fn batch_retrieve(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.catalog_calls.fetch_add(1, Ordering::SeqCst);
    state.catalog_bodies.lock().unwrap().push(body.clone());

    let status = *state.catalog_status.lock().unwrap();
    if status != StatusCode::OK {
        return (status, Json(json!({ "errors": [] })));
    }

    let skus = state.skus.lock().unwrap();
    let objects: Vec<Value> = body["object_ids"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|id| {
            skus.get(id).map(|sku| {
                json!({
                    "type": "ITEM_VARIATION",
                    "id": id,
                    "item_variation_data": { "sku": sku }
                })
            })
        })
        .collect();

    (StatusCode::OK, Json(json!({ "objects": objects })))
}

// ─── Fixtures ───────────────────────────────────────────────────────

pub fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A completed order with one line per `(uid, catalog_object_id, quantity)`.
pub fn order(id: &str, created_at: DateTime<Utc>, lines: &[(&str, &str, &str)]) -> Value {
    let line_items: Vec<Value> = lines
        .iter()
        .map(|(uid, catalog, qty)| {
            json!({
                "uid": uid,
                "name": format!("item {}", catalog),
                "quantity": qty,
                "catalog_object_id": catalog
            })
        })
        .collect();
    json!({
        "id": id,
        "location_id": "LOC1",
        "state": "COMPLETED",
        "created_at": ts(created_at),
        "line_items": line_items
    })
}

/// A time comfortably inside the hourly window.
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

pub struct TestEnv {
    pub tmp: TempDir,
    pub config_path: PathBuf,
}

impl TestEnv {
    pub fn db_path(&self) -> PathBuf {
        self.tmp.path().join("data/sales.sqlite")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.tmp.path().join("exports")
    }

    pub fn export_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.export_dir()) {
            Ok(entries) => {
                let mut files: Vec<PathBuf> = entries.map(|e| e.unwrap().path()).collect();
                files.sort();
                files
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn config(&self) -> sales_sync::config::Config {
        sales_sync::config::load_config(&self.config_path).unwrap()
    }
}

pub fn write_config(root: &Path, base_url: &str, extra: &str) -> PathBuf {
    let content = format!(
        r#"[db]
path = "{root}/data/sales.sqlite"

[square]
base_url = "{base_url}"
token_env = "{token_env}"
location_ids = ["LOC1"]
states = ["COMPLETED"]
page_limit = 100
timeout_secs = 5

[export]
dir = "{root}/exports"
{extra}
"#,
        root = root.display(),
        base_url = base_url,
        token_env = TOKEN_ENV,
        extra = extra,
    );
    let path = root.join("salesync.toml");
    std::fs::write(&path, content).unwrap();
    path
}

pub fn setup(base_url: &str) -> TestEnv {
    setup_with(base_url, "")
}

pub fn setup_with(base_url: &str, extra: &str) -> TestEnv {
    std::env::set_var(TOKEN_ENV, TOKEN);
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), base_url, extra);
    TestEnv { tmp, config_path }
}

pub async fn row_count(db_path: &Path) -> i64 {
    if !db_path.exists() {
        return 0;
    }
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", db_path.display()))
        .await
        .unwrap();
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='sold_items'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let count = if exists {
        sqlx::query_scalar("SELECT COUNT(*) FROM sold_items")
            .fetch_one(&pool)
            .await
            .unwrap()
    } else {
        0
    };
    pool.close().await;
    count
}
