//! Change signals emitted by the watch loop.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quarry_core::state_dir;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::diff::WatchDiff;
use crate::error::WatchError;

pub const SIGNAL_SOURCE: &str = "quarry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    CompetitorShipped,
}

impl SignalType {
    /// Name matched against the watch `notify_on` allow-list.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::CompetitorShipped => "competitor_shipped",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub source: String,
    pub affected_field: String,
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    #[serde(default)]
    pub new_files: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    /// Signal announcing a watch cycle that found changes.
    #[must_use]
    pub fn watch_update(diff: &WatchDiff) -> Self {
        let mut detail = diff.summary.clone();
        if !diff.new_files.is_empty() {
            detail.push_str(" | new files: ");
            detail.push_str(&diff.new_files.join(", "));
        }
        Self {
            id: new_signal_id(),
            signal_type: SignalType::CompetitorShipped,
            source: SIGNAL_SOURCE.to_string(),
            affected_field: "watch".to_string(),
            severity: Severity::Warning,
            title: "Competitor watch update".to_string(),
            detail,
            new_files: diff.new_files.clone(),
            created_at: Utc::now(),
        }
    }
}

/// `sig-` followed by 16 random hex digits.
#[must_use]
pub fn new_signal_id() -> String {
    let bytes: [u8; 8] = rand::random();
    let mut id = String::with_capacity(20);
    id.push_str("sig-");
    for b in bytes {
        let _ = write!(id, "{b:02x}");
    }
    id
}

#[async_trait]
pub trait SignalPublisher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`WatchError::Publish`] when the signal cannot be delivered.
    async fn publish(&self, signal: &Signal) -> Result<(), WatchError>;
}

/// Appends one JSON line per signal to `<project>/.quarry/signals.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonlSignalSink {
    path: PathBuf,
}

impl JsonlSignalSink {
    #[must_use]
    pub fn for_project(project_path: &Path) -> Self {
        Self {
            path: state_dir(project_path).join("signals.jsonl"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SignalPublisher for JsonlSignalSink {
    async fn publish(&self, signal: &Signal) -> Result<(), WatchError> {
        let fail = |e: &dyn std::fmt::Display| {
            WatchError::Publish(format!("{}: {e}", self.path.display()))
        };

        let mut line = serde_json::to_string(signal).map_err(|e| fail(&e))?;
        line.push('\n');

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| fail(&e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| fail(&e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| fail(&e))?;
        file.flush().await.map_err(|e| fail(&e))
    }
}
