use quarry_research::ResearchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch scan failed: {0}")]
    Scan(#[source] ResearchError),

    #[error("snapshot I/O error at {path}: {source}")]
    SnapshotIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    SnapshotFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("signal publish failed: {0}")]
    Publish(String),

    /// The scan ended by cancellation, so it produced no trustworthy totals.
    #[error("watch cycle cancelled")]
    Cancelled,
}

impl From<ResearchError> for WatchError {
    fn from(e: ResearchError) -> Self {
        match e {
            ResearchError::Cancelled => WatchError::Cancelled,
            other => WatchError::Scan(other),
        }
    }
}
