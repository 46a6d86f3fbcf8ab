//! Configuration — credentials and property-name overrides from the
//! environment, with wholesale persistence back to a local env file.
//!
//! Resolution order for credentials:
//! 1. `NOTION_API` — a single JSON secret `{"token": ..., "database_id": ...}`
//!    (deployment secrets are delivered this way).
//! 2. `NOTION_TOKEN` + `NOTION_DATABASE_ID` individual variables
//!    (local development via `.env`).

use std::collections::HashMap;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default env file written/read by the admin config endpoints.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Property names used against the Notion databases, all overridable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    /// Title property tried first when creating a record.
    pub title: String,
    /// Title property used when the primary one is relation-typed.
    pub fallback_title: String,
    /// Ordered candidates for the barcode/route property on a record;
    /// the first name present on the target page wins.
    pub barcode_candidates: Vec<String>,
    /// Title property of a Guide entry, matched exactly against the message.
    pub guide_code: String,
    /// Text property of a Guide entry holding the route value.
    pub guide_route: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: "Message".to_string(),
            fallback_title: "Name".to_string(),
            barcode_candidates: vec![
                "Barcode".to_string(),
                "barcode".to_string(),
                "Code".to_string(),
            ],
            guide_code: "Code".to_string(),
            guide_route: "Route".to_string(),
        }
    }
}

/// Resolved configuration for talking to Notion.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// Integration token. Never logged, masked in the admin view.
    pub token: SecretString,
    /// Primary database that records are written to.
    pub database_id: String,
    /// Secondary lookup table for master codes (unset = no guide routing).
    pub guide_database_id: Option<String>,
    pub properties: PropertyNames,
    /// HTTP listen port for the web surface.
    pub port: u16,
}

impl NotionConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build config from a map of variables (testable core of `from_env`).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let (token, database_id) = resolve_credentials(vars)?;

        let guide_database_id = vars
            .get("NOTION_GUIDE_DATABASE_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let defaults = PropertyNames::default();
        let properties = PropertyNames {
            title: var_or(vars, "NOTION_TITLE_PROPERTY", &defaults.title),
            fallback_title: var_or(vars, "NOTION_FALLBACK_TITLE_PROPERTY", &defaults.fallback_title),
            barcode_candidates: vars
                .get("NOTION_BARCODE_PROPERTIES")
                .map(|s| parse_candidate_list(s))
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.barcode_candidates),
            guide_code: var_or(vars, "NOTION_GUIDE_CODE_PROPERTY", &defaults.guide_code),
            guide_route: var_or(vars, "NOTION_GUIDE_ROUTE_PROPERTY", &defaults.guide_route),
        };

        let port: u16 = match vars.get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("not a valid port number: {raw}"),
            })?,
            None => 5000,
        };

        Ok(Self {
            token: SecretString::from(token),
            database_id,
            guide_database_id,
            properties,
            port,
        })
    }

    pub fn guide_configured(&self) -> bool {
        self.guide_database_id.is_some()
    }

    /// Rewrite the env file wholesale with the current configuration.
    /// Unknown keys in an existing file are not preserved.
    pub fn save_env_file(&self, path: &Path) -> Result<(), ConfigError> {
        let mut out = String::from("# Notion API Configuration\n");
        out.push_str(&format!("NOTION_TOKEN={}\n", self.token.expose_secret()));
        out.push_str(&format!("NOTION_DATABASE_ID={}\n", self.database_id));
        if let Some(guide) = &self.guide_database_id {
            out.push_str(&format!("NOTION_GUIDE_DATABASE_ID={guide}\n"));
        }
        out.push_str(&format!("NOTION_TITLE_PROPERTY={}\n", self.properties.title));
        out.push_str(&format!(
            "NOTION_FALLBACK_TITLE_PROPERTY={}\n",
            self.properties.fallback_title
        ));
        out.push_str(&format!(
            "NOTION_BARCODE_PROPERTIES={}\n",
            self.properties.barcode_candidates.join(",")
        ));
        out.push_str(&format!(
            "NOTION_GUIDE_CODE_PROPERTY={}\n",
            self.properties.guide_code
        ));
        out.push_str(&format!(
            "NOTION_GUIDE_ROUTE_PROPERTY={}\n",
            self.properties.guide_route
        ));
        out.push_str(&format!("PORT={}\n", self.port));

        std::fs::write(path, out)?;
        Ok(())
    }

    /// Admin-facing view with the token masked.
    pub fn view(&self) -> ConfigView {
        ConfigView {
            token: "********".to_string(),
            database_id: self.database_id.clone(),
            guide_database_id: self.guide_database_id.clone(),
            title_property: self.properties.title.clone(),
            fallback_title_property: self.properties.fallback_title.clone(),
            barcode_properties: self.properties.barcode_candidates.clone(),
            guide_code_property: self.properties.guide_code.clone(),
            guide_route_property: self.properties.guide_route.clone(),
            port: self.port,
        }
    }
}

fn resolve_credentials(vars: &HashMap<String, String>) -> Result<(String, String), ConfigError> {
    if let Some(secret) = vars.get("NOTION_API").filter(|s| !s.trim().is_empty()) {
        let data: serde_json::Value = serde_json::from_str(secret)
            .map_err(|e| ConfigError::InvalidSecret(format!("not valid JSON: {e}")))?;
        let token = data
            .get("token")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::InvalidSecret("missing 'token' key".to_string()))?;
        let database_id = data
            .get("database_id")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::InvalidSecret("missing 'database_id' key".to_string()))?;
        return Ok((token.to_string(), database_id.to_string()));
    }

    let token = vars
        .get("NOTION_TOKEN")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            key: "NOTION_TOKEN".to_string(),
            hint: "Create a .env file with your Notion integration token, \
                   or set the NOTION_API secret with token and database_id."
                .to_string(),
        })?;
    let database_id = vars
        .get("NOTION_DATABASE_ID")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            key: "NOTION_DATABASE_ID".to_string(),
            hint: "Create a .env file with your Notion database ID, \
                   or set the NOTION_API secret with token and database_id."
                .to_string(),
        })?;
    Ok((token.clone(), database_id.clone()))
}

fn var_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn parse_candidate_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Admin DTOs ──────────────────────────────────────────────────────

/// Read-config response body (token masked).
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub token: String,
    pub database_id: String,
    pub guide_database_id: Option<String>,
    pub title_property: String,
    pub fallback_title_property: String,
    pub barcode_properties: Vec<String>,
    pub guide_code_property: String,
    pub guide_route_property: String,
    pub port: u16,
}

/// Update-config request body. Absent fields keep their current value;
/// an empty string clears `guide_database_id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    pub token: Option<String>,
    pub database_id: Option<String>,
    pub guide_database_id: Option<String>,
    pub title_property: Option<String>,
    pub fallback_title_property: Option<String>,
    pub barcode_properties: Option<Vec<String>>,
    pub guide_code_property: Option<String>,
    pub guide_route_property: Option<String>,
    pub port: Option<u16>,
}

impl ConfigUpdate {
    /// Merge this update onto an existing config (or defaults when the
    /// service was previously unconfigured).
    pub fn apply(self, base: Option<&NotionConfig>) -> Result<NotionConfig, ConfigError> {
        let token = self
            .token
            .filter(|s| !s.is_empty())
            .map(SecretString::from)
            .or_else(|| base.map(|c| c.token.clone()))
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "token".to_string(),
                hint: "Provide a Notion integration token.".to_string(),
            })?;

        let database_id = self
            .database_id
            .filter(|s| !s.is_empty())
            .or_else(|| base.map(|c| c.database_id.clone()))
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "database_id".to_string(),
                hint: "Provide the primary Notion database ID.".to_string(),
            })?;

        let guide_database_id = match self.guide_database_id {
            Some(s) if s.is_empty() => None,
            Some(s) => Some(s),
            None => base.and_then(|c| c.guide_database_id.clone()),
        };

        let current = base.map(|c| c.properties.clone()).unwrap_or_default();
        let properties = PropertyNames {
            title: self.title_property.unwrap_or(current.title),
            fallback_title: self.fallback_title_property.unwrap_or(current.fallback_title),
            barcode_candidates: self
                .barcode_properties
                .filter(|v| !v.is_empty())
                .unwrap_or(current.barcode_candidates),
            guide_code: self.guide_code_property.unwrap_or(current.guide_code),
            guide_route: self.guide_route_property.unwrap_or(current.guide_route),
        };

        Ok(NotionConfig {
            token,
            database_id,
            guide_database_id,
            properties,
            port: self.port.unwrap_or_else(|| base.map(|c| c.port).unwrap_or(5000)),
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────
