//! Wire types and property helpers for the Notion API.

use serde::Deserialize;
use serde_json::{Map, Value, json};

/// A page returned by the Notion API. Only the fields this service
/// reads are modeled; the property map is kept as raw JSON because
/// property names and shapes are configuration-dependent.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Response body of a database query.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Page>,
}

/// Build a title property payload for page creation.
pub fn title_value(content: &str) -> Value {
    json!({
        "title": [
            { "text": { "content": content } }
        ]
    })
}

/// Build a rich-text property payload for page updates.
pub fn rich_text_value(content: &str) -> Value {
    json!({
        "rich_text": [
            { "text": { "content": content } }
        ]
    })
}

/// A properties object containing a single named property. `json!`
/// cannot key an object with a runtime string, hence the helper.
pub fn single_property(name: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(name.to_string(), value);
    Value::Object(map)
}

/// Extract the plain text of a property that may be either rich-text
/// or title shaped. Concatenates fragments; `None` when the property
/// has neither shape or carries no text.
pub fn plain_text(property: &Value) -> Option<String> {
    let fragments = property
        .get("rich_text")
        .or_else(|| property.get("title"))?
        .as_array()?;

    let mut out = String::new();
    for fragment in fragments {
        if let Some(text) = fragment
            .get("plain_text")
            .and_then(Value::as_str)
            .or_else(|| {
                fragment
                    .get("text")
                    .and_then(|t| t.get("content"))
                    .and_then(Value::as_str)
            })
        {
            out.push_str(text);
        }
    }

    if out.is_empty() { None } else { Some(out) }
}

// ── Tests ───────────────────────────────────────────────────────────
