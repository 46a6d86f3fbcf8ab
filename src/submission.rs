//! Submission handler — the one piece of business logic.
//!
//! A message either becomes a new record in the primary database, or,
//! when it matches a master code in the Guide database, retroactively
//! patches the route onto the most recently created record.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{NotionConfig, PropertyNames};
use crate::error::SubmitError;
use crate::notion::{TableClient, plain_text, rich_text_value, single_property, title_value};

/// Pointer to the most recently created record, shared across
/// submissions. Process-local only; after a restart the handler falls
/// back to a newest-by-creation-time query.
pub type LastWritten = Arc<Mutex<Option<String>>>;

pub fn new_last_written() -> LastWritten {
    Arc::new(Mutex::new(None))
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Identifier of the record created or amended.
    pub page_id: String,
    /// Whether the message was classified as a master code.
    pub is_mastercode: bool,
}

/// Handles one message at a time against the configured databases.
pub struct SubmissionHandler {
    client: Arc<dyn TableClient>,
    database_id: String,
    guide_database_id: Option<String>,
    props: PropertyNames,
    last_written: LastWritten,
}

impl SubmissionHandler {
    pub fn new(client: Arc<dyn TableClient>, config: &NotionConfig, last_written: LastWritten) -> Self {
        Self {
            client,
            database_id: config.database_id.clone(),
            guide_database_id: config.guide_database_id.clone(),
            props: config.properties.clone(),
            last_written,
        }
    }

    /// Submit one message. See the module docs for the decision tree.
    ///
    /// No rollback on failure: a record created before a later step
    /// fails stays in the database (each creation is already a
    /// terminal success on its own).
    pub async fn submit(&self, message: &str) -> Result<SubmitOutcome, SubmitError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SubmitError::EmptyMessage);
        }

        let Some(guide_db) = self.guide_database_id.clone() else {
            let page_id = self.create_record(message).await?;
            return Ok(SubmitOutcome {
                page_id,
                is_mastercode: false,
            });
        };

        match self.lookup_route(&guide_db, message).await? {
            None => {
                let page_id = self.create_record(message).await?;
                Ok(SubmitOutcome {
                    page_id,
                    is_mastercode: false,
                })
            }
            Some(route) => match self.amendment_target().await? {
                Some(target) => {
                    self.patch_route(&target, &route).await?;
                    info!(page_id = %target, route = %route, "Master code applied to prior record");
                    Ok(SubmitOutcome {
                        page_id: target,
                        is_mastercode: true,
                    })
                }
                None => {
                    // Nothing to amend; the route itself becomes a record.
                    let page_id = self.create_record(&route).await?;
                    Ok(SubmitOutcome {
                        page_id,
                        is_mastercode: true,
                    })
                }
            },
        }
    }

    /// Create a record with `title` as its title, trying the primary
    /// title property first and falling back once when the database
    /// reports it as relation-typed. Updates the last-written pointer.
    async fn create_record(&self, title: &str) -> Result<String, SubmitError> {
        let properties = single_property(&self.props.title, title_value(title));
        let page = match self.client.create_page(&self.database_id, properties).await {
            Ok(page) => page,
            Err(e) if e.is_relation_type_mismatch() => {
                warn!(
                    property = %self.props.title,
                    fallback = %self.props.fallback_title,
                    "Title property is relation-typed, retrying with fallback"
                );
                let properties =
                    single_property(&self.props.fallback_title, title_value(title));
                self.client.create_page(&self.database_id, properties).await?
            }
            Err(e) => return Err(e.into()),
        };

        info!(page_id = %page.id, "Record created");
        *self.last_written.lock().await = Some(page.id.clone());
        Ok(page.id)
    }

    /// Look up a guide entry whose code property exactly equals the
    /// message; returns its route value.
    async fn lookup_route(
        &self,
        guide_db: &str,
        code: &str,
    ) -> Result<Option<String>, SubmitError> {
        let body = json!({
            "filter": {
                "property": self.props.guide_code,
                "title": { "equals": code }
            },
            "page_size": 1
        });
        let results = self.client.query_database(guide_db, body).await?;

        let Some(entry) = results.into_iter().next() else {
            return Ok(None);
        };

        let route = entry
            .properties
            .get(&self.props.guide_route)
            .and_then(plain_text)
            .ok_or_else(|| SubmitError::MalformedGuideEntry {
                property: self.props.guide_route.clone(),
            })?;
        Ok(Some(route))
    }

    /// The record a master code amends: the in-memory pointer when
    /// set, otherwise the newest record by creation time. `None` when
    /// the primary table is empty.
    async fn amendment_target(&self) -> Result<Option<String>, SubmitError> {
        if let Some(id) = self.last_written.lock().await.clone() {
            return Ok(Some(id));
        }

        let body = json!({
            "sorts": [
                { "timestamp": "created_time", "direction": "descending" }
            ],
            "page_size": 1
        });
        let results = self.client.query_database(&self.database_id, body).await?;
        Ok(results.into_iter().next().map(|page| page.id))
    }

    /// Patch the route onto the first barcode candidate property that
    /// exists on the target page.
    async fn patch_route(&self, page_id: &str, route: &str) -> Result<(), SubmitError> {
        let page = self.client.retrieve_page(page_id).await?;
        let property = self
            .props
            .barcode_candidates
            .iter()
            .find(|name| page.properties.contains_key(name.as_str()))
            .ok_or_else(|| SubmitError::NoBarcodeProperty {
                tried: self.props.barcode_candidates.clone(),
            })?;

        let properties = single_property(property, rich_text_value(route));
        self.client.update_page(page_id, properties).await?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
