use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How much effort a collector should spend per query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HuntMode {
    Quick,
    #[default]
    Balanced,
    Deep,
}

impl HuntMode {
    /// Per-query result cap a collector applies when its config leaves
    /// `max_results` at zero.
    #[must_use]
    pub fn default_max_results(self) -> usize {
        match self {
            HuntMode::Quick => 10,
            HuntMode::Balanced => 30,
            HuntMode::Deep => 100,
        }
    }
}

impl std::fmt::Display for HuntMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HuntMode::Quick => write!(f, "quick"),
            HuntMode::Balanced => write!(f, "balanced"),
            HuntMode::Deep => write!(f, "deep"),
        }
    }
}

impl FromStr for HuntMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(HuntMode::Quick),
            "balanced" => Ok(HuntMode::Balanced),
            "deep" => Ok(HuntMode::Deep),
            other => Err(format!(
                "unknown hunt mode '{other}'; expected quick, balanced or deep"
            )),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub project_path: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_results: usize,
    pub hunt_mode: HuntMode,
    /// Upper bound on a single collector invocation. `None` leaves the
    /// collector bounded only by its caller's cancellation.
    pub collector_timeout_secs: Option<u64>,
    pub github_token: Option<String>,
    pub openalex_email: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("project_path", &self.project_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_results", &self.max_results)
            .field("hunt_mode", &self.hunt_mode)
            .field("collector_timeout_secs", &self.collector_timeout_secs)
            .field(
                "github_token",
                &self.github_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "openalex_email",
                &self.openalex_email.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
