//! Notion REST API integration.
//!
//! The hosted database owns all durable state; this module is a thin
//! typed wrapper over its HTTP API. The `TableClient` trait is the
//! seam the submission handler is written against, so tests can run
//! without a network.

mod client;
pub mod types;

pub use client::NotionClient;
pub use types::{Page, QueryResponse, plain_text, rich_text_value, single_property, title_value};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::NotionError;

/// Remote tabular-store operations used by the submission handler.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Create a page in a database; returns the created page.
    async fn create_page(&self, database_id: &str, properties: Value)
    -> Result<Page, NotionError>;

    /// Query a database with a raw filter/sort body.
    async fn query_database(&self, database_id: &str, body: Value)
    -> Result<Vec<Page>, NotionError>;

    /// Retrieve a single page with its property map.
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, NotionError>;

    /// Patch properties on an existing page.
    async fn update_page(&self, page_id: &str, properties: Value) -> Result<Page, NotionError>;

    /// The integration user behind the token (credential check).
    async fn me(&self) -> Result<Value, NotionError>;
}
