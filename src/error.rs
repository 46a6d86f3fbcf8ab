//! Error types for notion-relay.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Notion API error: {0}")]
    Notion(#[from] NotionError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("NOTION_API secret is invalid: {0}")]
    InvalidSecret(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the Notion REST client.
#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Notion API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from Notion: {0}")]
    InvalidResponse(String),
}

impl NotionError {
    /// The schema-compatibility signal: the configured title property
    /// exists on the database but is relation-typed. Triggers the one
    /// fallback attempt with the alternate title property name.
    pub fn is_relation_type_mismatch(&self) -> bool {
        matches!(self, NotionError::Api { message, .. } if message.contains("expected to be a relation"))
    }
}

/// Errors from the submission handler.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("No message provided")]
    EmptyMessage,

    #[error("Guide entry has no readable route in property {property}")]
    MalformedGuideEntry { property: String },

    #[error("No barcode property found on target page (tried: {})", .tried.join(", "))]
    NoBarcodeProperty { tried: Vec<String> },

    #[error(transparent)]
    Notion(#[from] NotionError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
