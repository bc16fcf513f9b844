use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of discovered information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub title: String,
    pub summary: String,
    /// Reference to where the finding came from (URL, artifact path or
    /// collector name).
    pub source: String,
    pub source_type: String,
    /// Always within `[0, 1]`.
    pub relevance: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub collected_at: DateTime<Utc>,
}

impl Finding {
    /// Builds a finding with a fresh ID, clamping `relevance` into `[0, 1]`.
    /// A NaN relevance becomes zero.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        source: impl Into<String>,
        source_type: impl Into<String>,
        relevance: f64,
    ) -> Self {
        let relevance = if relevance.is_nan() {
            0.0
        } else {
            relevance.clamp(0.0, 1.0)
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            summary: summary.into(),
            source: source.into(),
            source_type: source_type.into(),
            relevance,
            tags: Vec::new(),
            collected_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// One collector's findings for one topic within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub run_id: String,
    pub collector_name: String,
    pub topic_key: String,
    pub findings: Vec<Finding>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Done,
    Errored,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Errored)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Done => write!(f, "done"),
            RunStatus::Errored => write!(f, "errored"),
        }
    }
}

/// Per-collector bookkeeping inside a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorProgress {
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sources_collected: usize,
    pub insights_created: usize,
    pub output_files: Vec<PathBuf>,
    pub finding_count: usize,
    /// Per-query failures the collector reported alongside its results.
    pub partial_errors: Vec<String>,
    pub error: Option<String>,
}
