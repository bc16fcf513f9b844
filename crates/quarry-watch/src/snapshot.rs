//! The single persisted baseline a watch cycle diffs against.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quarry_core::state_dir;
use quarry_research::ScanSummary;
use serde::{Deserialize, Serialize};

use crate::error::WatchError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSnapshot {
    pub scanned_at: DateTime<Utc>,
    pub total_sources: usize,
    pub total_insights: usize,
    #[serde(default)]
    pub output_files: Vec<String>,
}

impl WatchSnapshot {
    #[must_use]
    pub fn from_summary(summary: &ScanSummary) -> Self {
        Self {
            scanned_at: Utc::now(),
            total_sources: summary.sources_collected,
            total_insights: summary.insights_created,
            output_files: summary
                .output_files
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Reads and replaces `<project>/.quarry/watch/last_scan.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn for_project(project_path: &Path) -> Self {
        Self::at(state_dir(project_path).join("watch").join("last_scan.json"))
    }

    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the previous snapshot. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::SnapshotIo`] if the file exists but cannot be
    /// read, or [`WatchError::SnapshotFormat`] if it is not a snapshot.
    pub async fn load(&self) -> Result<Option<WatchSnapshot>, WatchError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(WatchError::SnapshotIo {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| WatchError::SnapshotFormat {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Replaces the stored snapshot.
    ///
    /// The JSON is written to a sibling temp file and renamed over the
    /// previous baseline, so readers never see a truncated file.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::SnapshotIo`] on any filesystem failure.
    pub async fn save(&self, snapshot: &WatchSnapshot) -> Result<(), WatchError> {
        let json =
            serde_json::to_vec_pretty(snapshot).map_err(|source| WatchError::SnapshotFormat {
                path: self.path.display().to_string(),
                source,
            })?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| io_error(dir, source))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| io_error(&tmp, source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| io_error(&self.path, source))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> WatchError {
    WatchError::SnapshotIo {
        path: path.display().to_string(),
        source,
    }
}
