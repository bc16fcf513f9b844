use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use quarry_core::HuntMode;
use serde::{Deserialize, Serialize};

/// Immutable input for one collector invocation.
///
/// The coordinator builds one of these per run and hands every collector its
/// own clone; collectors never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Search queries in caller order, already flattened across topics.
    pub queries: Vec<String>,
    /// Maximum results per query. Zero lets the collector pick its own cap.
    pub max_results: usize,
    /// Source-specific quality floor (stars, citations). Zero disables it.
    pub min_quality: u64,
    /// Directory artifacts are written under. Each collector adds its own
    /// sub-directory.
    pub output_dir: PathBuf,
    /// Credential override. When `None` the collector falls back to the
    /// credential it was constructed with.
    pub credential: Option<String>,
    pub mode: HuntMode,
}

impl CollectorConfig {
    #[must_use]
    pub fn new(queries: Vec<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            queries,
            max_results: 0,
            min_quality: 0,
            output_dir: output_dir.into(),
            credential: None,
            mode: HuntMode::default(),
        }
    }
}

/// Summary of one collector invocation.
///
/// `errors` holds per-query failures that did not stop the invocation; a
/// result with a non-empty `errors` list is still a partial success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorResult {
    pub collector_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub sources_collected: usize,
    pub insights_created: usize,
    /// Only paths that were actually written.
    pub output_files: Vec<PathBuf>,
    pub errors: Vec<String>,
    /// Sources collected per query, keyed by the query text. Queries that
    /// produced nothing are absent.
    #[serde(default)]
    pub sources_by_query: BTreeMap<String, usize>,
}

impl CollectorResult {
    /// Starts an empty result stamped with the current time.
    #[must_use]
    pub fn start(collector_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            collector_name: collector_name.into(),
            started_at: now,
            completed_at: now,
            sources_collected: 0,
            insights_created: 0,
            output_files: Vec::new(),
            errors: Vec::new(),
            sources_by_query: BTreeMap::new(),
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Credits `count` sources to `query`.
    pub fn record_sources(&mut self, query: &str, count: usize) {
        if count == 0 {
            return;
        }
        self.sources_collected += count;
        *self.sources_by_query.entry(query.to_string()).or_default() += count;
    }

    /// Stamps the completion time, keeping `completed_at >= started_at`.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.completed_at = Utc::now().max(self.started_at);
        self
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
