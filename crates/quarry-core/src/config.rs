use crate::app_config::{AppConfig, Environment, HuntMode};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to an invalid value.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to an invalid value.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// All variables are optional; only malformed values are rejected.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] if a set variable cannot be parsed.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let env = parse_environment(&or_default("QUARRY_ENV", "development"));
    let log_level = or_default("QUARRY_LOG_LEVEL", "info");
    let project_path = PathBuf::from(or_default("QUARRY_PROJECT_PATH", "."));

    let request_timeout_secs = parse_u64("QUARRY_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("QUARRY_USER_AGENT", "quarry/0.1 (research-collector)");
    let max_results = parse_usize("QUARRY_MAX_RESULTS", "10")?;

    let hunt_mode = or_default("QUARRY_HUNT_MODE", "balanced")
        .parse::<HuntMode>()
        .map_err(|reason| ConfigError::InvalidEnvVar {
            var: "QUARRY_HUNT_MODE".to_string(),
            reason,
        })?;

    let collector_timeout_secs = match parse_u64("QUARRY_COLLECTOR_TIMEOUT_SECS", "0")? {
        0 => None,
        secs => Some(secs),
    };

    Ok(AppConfig {
        env,
        log_level,
        project_path,
        request_timeout_secs,
        user_agent,
        max_results,
        hunt_mode,
        collector_timeout_secs,
        github_token: optional("GITHUB_TOKEN"),
        openalex_email: optional("OPENALEX_EMAIL"),
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
