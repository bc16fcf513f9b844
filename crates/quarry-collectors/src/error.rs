use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    /// The caller's cancellation token fired, either before the collector
    /// started a query or while it waited for a rate-limit slot.
    #[error("cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("rate limited by {source_name} (resets at {})", .reset.as_deref().unwrap_or("unknown"))]
    RateLimited {
        source_name: String,
        reset: Option<String>,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("collector not found: {0}")]
    UnknownCollector(String),

    #[error("collector timed out after {0:?}")]
    TimedOut(Duration),
}

impl CollectorError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CollectorError::Cancelled)
    }
}
