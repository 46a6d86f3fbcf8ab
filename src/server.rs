//! HTTP surface — JSON endpoints over the submission handler and the
//! config loader. Everything degrades to a failure JSON; nothing here
//! is fatal.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::{ConfigUpdate, NotionConfig};
use crate::notion::{NotionClient, TableClient};
use crate::submission::{LastWritten, SubmissionHandler, new_last_written};

const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Current configuration; `None` until credentials are provided.
    /// Swapped wholesale on admin update.
    pub config: Arc<RwLock<Option<NotionConfig>>>,
    /// Identifier of the most recently created record.
    pub last_written: LastWritten,
    /// Env file rewritten on admin update.
    pub env_path: Arc<PathBuf>,
    /// Notion API base URL (tests point this at a local server).
    api_base: Arc<String>,
}

impl AppState {
    pub fn new(config: Option<NotionConfig>, env_path: PathBuf) -> Self {
        Self::with_api_base(config, env_path, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        config: Option<NotionConfig>,
        env_path: PathBuf,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            last_written: new_last_written(),
            env_path: Arc::new(env_path),
            api_base: Arc::new(api_base.into()),
        }
    }

    fn client_for(&self, config: &NotionConfig) -> Arc<dyn TableClient> {
        Arc::new(NotionClient::with_base_url(
            config.token.clone(),
            self.api_base.as_str(),
        ))
    }
}

/// Build the Axum router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/store", post(store_message))
        .route("/health", get(health))
        .route("/admin/config", get(read_config).post(update_config))
        .route("/admin/test", post(test_credentials))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Store ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StoreRequest {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct StoreResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_mastercode: Option<bool>,
}

impl StoreResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            page_id: None,
            is_mastercode: None,
        }
    }
}

async fn store_message(
    State(state): State<AppState>,
    Json(body): Json<StoreRequest>,
) -> impl IntoResponse {
    if body.message.trim().is_empty() {
        return Json(StoreResponse::failure("No message provided"));
    }

    let Some(config) = state.config.read().await.clone() else {
        return Json(StoreResponse::failure("Notion credentials not configured"));
    };

    let handler = SubmissionHandler::new(
        state.client_for(&config),
        &config,
        Arc::clone(&state.last_written),
    );

    match handler.submit(&body.message).await {
        Ok(outcome) => {
            info!(page_id = %outcome.page_id, is_mastercode = outcome.is_mastercode, "Message stored");
            Json(StoreResponse {
                success: true,
                message: Some("Message stored successfully".to_string()),
                error: None,
                page_id: Some(outcome.page_id),
                is_mastercode: Some(outcome.is_mastercode),
            })
        }
        Err(e) => {
            warn!(error = %e, "Store failed");
            Json(StoreResponse::failure(e.to_string()))
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.read().await;
    Json(serde_json::json!({
        "status": "healthy",
        "notion_configured": config.is_some(),
        "guide_configured": config.as_ref().is_some_and(NotionConfig::guide_configured),
    }))
}

// ── Admin ───────────────────────────────────────────────────────────

async fn read_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.read().await;
    match config.as_ref() {
        Some(config) => Json(serde_json::json!({
            "configured": true,
            "config": config.view(),
        })),
        None => Json(serde_json::json!({ "configured": false })),
    }
}

async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> impl IntoResponse {
    let mut current = state.config.write().await;

    let merged = match update.apply(current.as_ref()) {
        Ok(merged) => merged,
        Err(e) => {
            return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
        }
    };

    if let Err(e) = merged.save_env_file(&state.env_path) {
        warn!(error = %e, path = %state.env_path.display(), "Failed to persist config");
        return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
    }

    info!(path = %state.env_path.display(), "Configuration updated and persisted");
    let view = merged.view();
    *current = Some(merged);
    Json(serde_json::json!({ "success": true, "config": view }))
}

async fn test_credentials(State(state): State<AppState>) -> impl IntoResponse {
    let Some(config) = state.config.read().await.clone() else {
        return Json(serde_json::json!({
            "success": false,
            "error": "Notion credentials not configured",
        }));
    };

    match state.client_for(&config).me().await {
        Ok(user) => {
            let name = user
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("Unknown");
            Json(serde_json::json!({ "success": true, "user": name }))
        }
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

/// Run the server until shutdown.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = routes(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
