//! Shared configuration for the quarry research workspace.
//!
//! Holds the environment-driven [`AppConfig`], the per-project YAML file
//! ([`ProjectConfig`]) with its topic and watch sections, and the duration
//! parser used for watch intervals.

pub mod app_config;
pub mod config;
pub mod duration;
pub mod error;
pub mod project;

pub use app_config::{AppConfig, Environment, HuntMode};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use duration::parse_duration;
pub use error::ConfigError;
pub use project::{
    load_project_config, project_config_path, state_dir, ProjectConfig, TopicConfig, WatchConfig,
    DEFAULT_TOPIC, DEFAULT_WATCH_COLLECTORS, DEFAULT_WATCH_INTERVAL,
};
