//! HTTP client for the Notion REST API.
//!
//! Hand-built JSON bodies, per-call error mapping, no retry — any
//! transient failure surfaces to the caller as a `NotionError`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::types::{Page, QueryResponse};
use super::TableClient;
use crate::error::NotionError;

const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";

/// Pinned API version sent on every request.
const NOTION_VERSION: &str = "2022-06-28";

/// Notion REST client.
pub struct NotionClient {
    token: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl NotionClient {
    pub fn new(token: SecretString) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Client against a non-default base URL (integration tests point
    /// this at a local stand-in server).
    pub fn with_base_url(token: SecretString, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            token,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.api_url(path))
            .bearer_auth(self.token.expose_secret())
            .header("Notion-Version", NOTION_VERSION)
    }

    /// Send a request, mapping transport failures and non-2xx
    /// responses into `NotionError`. Non-2xx bodies carry Notion's
    /// `message` field when present, the raw body otherwise.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, NotionError> {
        let response = request
            .send()
            .await
            .map_err(|e| NotionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotionError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(body);
            return Err(NotionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| NotionError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TableClient for NotionClient {
    async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
    ) -> Result<Page, NotionError> {
        let body = serde_json::json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        let value = self
            .send(self.request(reqwest::Method::POST, "pages").json(&body))
            .await?;
        serde_json::from_value(value).map_err(|e| NotionError::InvalidResponse(e.to_string()))
    }

    async fn query_database(
        &self,
        database_id: &str,
        body: Value,
    ) -> Result<Vec<Page>, NotionError> {
        let path = format!("databases/{database_id}/query");
        let value = self
            .send(self.request(reqwest::Method::POST, &path).json(&body))
            .await?;
        let response: QueryResponse = serde_json::from_value(value)
            .map_err(|e| NotionError::InvalidResponse(e.to_string()))?;
        Ok(response.results)
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Page, NotionError> {
        let path = format!("pages/{page_id}");
        let value = self.send(self.request(reqwest::Method::GET, &path)).await?;
        serde_json::from_value(value).map_err(|e| NotionError::InvalidResponse(e.to_string()))
    }

    async fn update_page(&self, page_id: &str, properties: Value) -> Result<Page, NotionError> {
        let path = format!("pages/{page_id}");
        let body = serde_json::json!({ "properties": properties });
        let value = self
            .send(self.request(reqwest::Method::PATCH, &path).json(&body))
            .await?;
        serde_json::from_value(value).map_err(|e| NotionError::InvalidResponse(e.to_string()))
    }

    async fn me(&self) -> Result<Value, NotionError> {
        self.send(self.request(reqwest::Method::GET, "users/me"))
            .await
    }
}

// ── Tests ───────────────────────────────────────────────────────────
