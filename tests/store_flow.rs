//! End-to-end tests for the store/admin HTTP API.
//!
//! Each test spins up two Axum servers on random ports: a stand-in
//! Notion API with in-memory state, and the relay itself pointed at
//! it, then exercises the real client/handler/router over HTTP.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use notion_relay::config::NotionConfig;
use notion_relay::server::{AppState, routes};

const PRIMARY_DB: &str = "primary-db";
const GUIDE_DB: &str = "guide-db";

// ── Stand-in Notion API ─────────────────────────────────────────────

#[derive(Default)]
struct FakeNotion {
    /// Created pages, oldest first: (id, properties).
    pages: Vec<(String, Value)>,
    /// Guide entries: code → route.
    guide: HashMap<String, String>,
    /// Title property names that provoke the relation-type error.
    relation_typed: HashSet<String>,
    counter: usize,
}

impl FakeNotion {
    fn page_json(&self, index: usize) -> Value {
        let (id, properties) = &self.pages[index];
        json!({ "id": id, "properties": properties })
    }

    fn seed_page(&mut self, id: &str) {
        self.pages
            .push((id.to_string(), json!({ "Barcode": { "rich_text": [] } })));
    }
}

type Fake = Arc<Mutex<FakeNotion>>;

async fn fake_create_page(State(fake): State<Fake>, Json(body): Json<Value>) -> impl IntoResponse {
    let mut fake = fake.lock().unwrap();

    let properties = body["properties"].clone();
    let title_property = properties
        .as_object()
        .and_then(|o| o.keys().next().cloned())
        .unwrap_or_default();
    if fake.relation_typed.contains(&title_property) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "object": "error",
                "status": 400,
                "code": "validation_error",
                "message": format!("{title_property} is expected to be a relation."),
            })),
        );
    }

    fake.counter += 1;
    let id = format!("page-{}", fake.counter);
    // Every page in the fake schema also carries a Barcode column.
    let mut stored = properties.as_object().cloned().unwrap_or_default();
    stored
        .entry("Barcode".to_string())
        .or_insert(json!({ "rich_text": [] }));
    fake.pages.push((id.clone(), Value::Object(stored)));

    let index = fake.pages.len() - 1;
    (StatusCode::OK, Json(fake.page_json(index)))
}

async fn fake_query(
    State(fake): State<Fake>,
    Path(database_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let fake = fake.lock().unwrap();

    if database_id == GUIDE_DB {
        let wanted = body["filter"]["title"]["equals"].as_str().unwrap_or_default();
        let results: Vec<Value> = fake
            .guide
            .get(wanted)
            .map(|route| {
                vec![json!({
                    "id": format!("guide-{wanted}"),
                    "properties": {
                        "Route": { "rich_text": [ { "plain_text": route } ] }
                    }
                })]
            })
            .unwrap_or_default();
        return Json(json!({ "results": results }));
    }

    // Primary table: newest by creation time.
    let results: Vec<Value> = if fake.pages.is_empty() {
        vec![]
    } else {
        vec![fake.page_json(fake.pages.len() - 1)]
    };
    Json(json!({ "results": results }))
}

async fn fake_retrieve_page(State(fake): State<Fake>, Path(id): Path<String>) -> impl IntoResponse {
    let fake = fake.lock().unwrap();
    match fake.pages.iter().position(|(pid, _)| *pid == id) {
        Some(index) => (StatusCode::OK, Json(fake.page_json(index))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("Could not find page with ID: {id}.") })),
        ),
    }
}

async fn fake_update_page(
    State(fake): State<Fake>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut fake = fake.lock().unwrap();
    let Some(index) = fake.pages.iter().position(|(pid, _)| *pid == id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("Could not find page with ID: {id}.") })),
        );
    };

    if let Some(updates) = body["properties"].as_object() {
        let properties = fake.pages[index].1.as_object_mut().unwrap();
        for (key, value) in updates {
            properties.insert(key.clone(), value.clone());
        }
    }
    (StatusCode::OK, Json(fake.page_json(index)))
}

async fn fake_me(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "API token is invalid." })),
        );
    }
    (StatusCode::OK, Json(json!({ "name": "Test Integration" })))
}

/// Start the stand-in Notion API; returns its base URL and state.
async fn start_fake_notion() -> (String, Fake) {
    let fake: Fake = Arc::new(Mutex::new(FakeNotion::default()));

    let app = Router::new()
        .route("/v1/pages", post(fake_create_page))
        .route("/v1/pages/{id}", get(fake_retrieve_page).patch(fake_update_page))
        .route("/v1/databases/{id}/query", post(fake_query))
        .route("/v1/users/me", get(fake_me))
        .with_state(Arc::clone(&fake));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}/v1"), fake)
}

// ── Relay under test ────────────────────────────────────────────────

fn relay_config(guide: bool) -> NotionConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("NOTION_TOKEN".to_string(), "secret_test".to_string()),
        ("NOTION_DATABASE_ID".to_string(), PRIMARY_DB.to_string()),
    ]);
    if guide {
        vars.insert("NOTION_GUIDE_DATABASE_ID".to_string(), GUIDE_DB.to_string());
    }
    NotionConfig::from_vars(&vars).unwrap()
}

/// Start the relay against the given Notion base URL; returns its base URL.
async fn start_relay(config: Option<NotionConfig>, env_path: PathBuf, api_base: &str) -> String {
    let state = AppState::with_api_base(config, env_path, api_base);
    let app = routes(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the servers a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

fn temp_env_path() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    (dir, path)
}

async fn post_store(http: &reqwest::Client, relay: &str, message: &str) -> Value {
    http.post(format!("{relay}/store"))
        .json(&json!({ "message": message }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn store_creates_record_with_message_title() {
    let (notion_url, fake) = start_fake_notion().await;
    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(Some(relay_config(false)), env_path, &notion_url).await;
    let http = reqwest::Client::new();

    let body = post_store(&http, &relay, "first note").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["page_id"], "page-1");
    assert_eq!(body["is_mastercode"], false);

    let fake = fake.lock().unwrap();
    assert_eq!(fake.pages.len(), 1);
    assert_eq!(
        fake.pages[0].1["Message"]["title"][0]["text"]["content"],
        "first note"
    );
}

#[tokio::test]
async fn duplicate_messages_create_two_records() {
    let (notion_url, fake) = start_fake_notion().await;
    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(Some(relay_config(false)), env_path, &notion_url).await;
    let http = reqwest::Client::new();

    let first = post_store(&http, &relay, "dup").await;
    let second = post_store(&http, &relay, "dup").await;
    assert_eq!(first["success"], true);
    assert_eq!(second["success"], true);
    assert_ne!(first["page_id"], second["page_id"]);
    assert_eq!(fake.lock().unwrap().pages.len(), 2);
}

#[tokio::test]
async fn master_code_patches_most_recent_record() {
    let (notion_url, fake) = start_fake_notion().await;
    fake.lock()
        .unwrap()
        .guide
        .insert("B2".to_string(), "Shelf-12".to_string());

    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(Some(relay_config(true)), env_path, &notion_url).await;
    let http = reqwest::Client::new();

    let r1 = post_store(&http, &relay, "an item").await;
    assert_eq!(r1["is_mastercode"], false);

    let outcome = post_store(&http, &relay, "B2").await;
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["is_mastercode"], true);
    assert_eq!(outcome["page_id"], r1["page_id"]);

    let fake = fake.lock().unwrap();
    // No new page was created; R1's barcode now carries the route.
    assert_eq!(fake.pages.len(), 1);
    assert_eq!(
        fake.pages[0].1["Barcode"]["rich_text"][0]["text"]["content"],
        "Shelf-12"
    );
}

#[tokio::test]
async fn master_code_after_restart_uses_newest_record() {
    let (notion_url, fake) = start_fake_notion().await;
    {
        let mut fake = fake.lock().unwrap();
        fake.guide.insert("B2".to_string(), "Shelf-12".to_string());
        // Pages created by a previous process run; the in-memory
        // pointer of this relay instance starts empty.
        fake.seed_page("old-1");
        fake.seed_page("old-2");
    }

    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(Some(relay_config(true)), env_path, &notion_url).await;
    let http = reqwest::Client::new();

    let outcome = post_store(&http, &relay, "B2").await;
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["is_mastercode"], true);
    assert_eq!(outcome["page_id"], "old-2");

    let fake = fake.lock().unwrap();
    assert_eq!(fake.pages.len(), 2);
    assert_eq!(
        fake.pages[1].1["Barcode"]["rich_text"][0]["text"]["content"],
        "Shelf-12"
    );
}

#[tokio::test]
async fn master_code_with_empty_table_creates_record_from_route() {
    let (notion_url, fake) = start_fake_notion().await;
    fake.lock()
        .unwrap()
        .guide
        .insert("B2".to_string(), "Shelf-12".to_string());

    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(Some(relay_config(true)), env_path, &notion_url).await;
    let http = reqwest::Client::new();

    let outcome = post_store(&http, &relay, "B2").await;
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["is_mastercode"], true);

    let fake = fake.lock().unwrap();
    assert_eq!(fake.pages.len(), 1);
    assert_eq!(
        fake.pages[0].1["Message"]["title"][0]["text"]["content"],
        "Shelf-12"
    );
}

#[tokio::test]
async fn relation_typed_title_falls_back_to_alternate_property() {
    let (notion_url, fake) = start_fake_notion().await;
    fake.lock()
        .unwrap()
        .relation_typed
        .insert("Message".to_string());

    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(Some(relay_config(false)), env_path, &notion_url).await;
    let http = reqwest::Client::new();

    let outcome = post_store(&http, &relay, "hello").await;
    assert_eq!(outcome["success"], true);

    let fake = fake.lock().unwrap();
    assert_eq!(fake.pages.len(), 1);
    assert_eq!(
        fake.pages[0].1["Name"]["title"][0]["text"]["content"],
        "hello"
    );
}

#[tokio::test]
async fn health_reports_configuration() {
    let (notion_url, _fake) = start_fake_notion().await;
    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(Some(relay_config(true)), env_path, &notion_url).await;

    let body: Value = reqwest::get(format!("{relay}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["notion_configured"], true);
    assert_eq!(body["guide_configured"], true);
}

#[tokio::test]
async fn admin_test_reports_integration_user() {
    let (notion_url, _fake) = start_fake_notion().await;
    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(Some(relay_config(false)), env_path, &notion_url).await;
    let http = reqwest::Client::new();

    let body: Value = http
        .post(format!("{relay}/admin/test"))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"], "Test Integration");
}

#[tokio::test]
async fn admin_config_enables_storing_at_runtime() {
    let (notion_url, fake) = start_fake_notion().await;
    let (_dir, env_path) = temp_env_path();
    // Start unconfigured.
    let relay = start_relay(None, env_path.clone(), &notion_url).await;
    let http = reqwest::Client::new();

    let body = post_store(&http, &relay, "too early").await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Notion credentials not configured");

    let body: Value = http
        .post(format!("{relay}/admin/config"))
        .json(&json!({
            "token": "secret_test",
            "database_id": PRIMARY_DB,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["config"]["token"], "********");

    // The env file was rewritten wholesale.
    let written = std::fs::read_to_string(&env_path).unwrap();
    assert!(written.contains("NOTION_TOKEN=secret_test\n"));
    assert!(written.contains(&format!("NOTION_DATABASE_ID={PRIMARY_DB}\n")));

    let body = post_store(&http, &relay, "now it works").await;
    assert_eq!(body["success"], true);
    assert_eq!(fake.lock().unwrap().pages.len(), 1);
}

#[tokio::test]
async fn remote_failure_degrades_to_error_json() {
    // Relay pointed at a closed port: every store fails softly.
    let (_dir, env_path) = temp_env_path();
    let relay = start_relay(
        Some(relay_config(false)),
        env_path,
        "http://127.0.0.1:9/v1",
    )
    .await;
    let http = reqwest::Client::new();

    let body = post_store(&http, &relay, "unreachable").await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Transport error"));
}
