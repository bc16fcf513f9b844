//! Per-project configuration stored at `<project>/.quarry/config.yaml`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::ConfigError;

/// Topic that absorbs results when a run is started without any topics.
pub const DEFAULT_TOPIC: &str = "general";

/// Collectors the watch loop runs when its config names none.
pub const DEFAULT_WATCH_COLLECTORS: &[&str] = &["github-scout", "openalex"];

/// Watch interval used when the configured value is missing or unparseable.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Maps a topic key (e.g. `"platform"`, `"storage"`) to its search queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub key: String,
    #[serde(default)]
    pub queries: Vec<String>,
}

impl TopicConfig {
    #[must_use]
    pub fn new(key: impl Into<String>, queries: Vec<String>) -> Self {
        Self {
            key: key.into(),
            queries,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Duration string such as `"24h"` or `"6h30m"`.
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub collectors: Vec<String>,
    /// Signal types to emit. Empty means every type is emitted.
    #[serde(default)]
    pub notify_on: Vec<String>,
}

impl WatchConfig {
    /// Parsed tick interval, falling back to 24 hours when the configured
    /// value is empty, unparseable or zero.
    #[must_use]
    pub fn interval(&self) -> Duration {
        match parse_duration(&self.interval) {
            Ok(d) if !d.is_zero() => d,
            Ok(_) => DEFAULT_WATCH_INTERVAL,
            Err(reason) => {
                if !self.interval.trim().is_empty() {
                    tracing::warn!(
                        interval = %self.interval,
                        reason = %reason,
                        "unparseable watch interval; falling back to 24h"
                    );
                }
                DEFAULT_WATCH_INTERVAL
            }
        }
    }

    /// Collectors to run each cycle, defaulting to [`DEFAULT_WATCH_COLLECTORS`].
    #[must_use]
    pub fn collectors_or_default(&self) -> Vec<String> {
        if self.collectors.is_empty() {
            DEFAULT_WATCH_COLLECTORS
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        } else {
            self.collectors.clone()
        }
    }

    /// Whether signals of `signal_type` pass the `notify_on` allow-list.
    #[must_use]
    pub fn notify_enabled(&self, signal_type: &str) -> bool {
        if self.notify_on.is_empty() {
            return true;
        }
        let want = signal_type.trim().to_lowercase();
        self.notify_on
            .iter()
            .any(|entry| entry.trim().to_lowercase() == want)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
    /// Collectors used by an interactive research run when none are given.
    #[serde(default)]
    pub collectors: Vec<String>,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Directory holding all quarry state for a project.
#[must_use]
pub fn state_dir(project_path: &Path) -> PathBuf {
    project_path.join(".quarry")
}

#[must_use]
pub fn project_config_path(project_path: &Path) -> PathBuf {
    state_dir(project_path).join("config.yaml")
}

/// Load and validate the project file.
///
/// A missing file is not an error: the default (empty) config is returned.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read, parsed, or
/// fails validation.
pub fn load_project_config(project_path: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = project_config_path(project_path);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no project file; using defaults");
            return Ok(ProjectConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::ProjectFileIo {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    let config: ProjectConfig = serde_yaml::from_str(&content)?;
    validate_project(&config)?;
    Ok(config)
}

fn validate_project(config: &ProjectConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for topic in &config.topics {
        let key = topic.key.trim();
        if key.is_empty() {
            return Err(ConfigError::Validation(
                "topic key must be non-empty".to_string(),
            ));
        }
        if !seen.insert(key.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate topic key: '{}'",
                topic.key
            )));
        }
    }

    Ok(())
}
