use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_production() {
    assert_eq!(parse_environment("production"), Environment::Production);
}

#[test]
fn parse_environment_test() {
    assert_eq!(parse_environment("test"), Environment::Test);
}

#[test]
fn parse_environment_unknown_defaults_to_development() {
    assert_eq!(parse_environment("staging"), Environment::Development);
}

#[test]
fn build_app_config_defaults_with_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.project_path.to_str(), Some("."));
    assert_eq!(cfg.request_timeout_secs, 30);
    assert_eq!(cfg.user_agent, "quarry/0.1 (research-collector)");
    assert_eq!(cfg.max_results, 10);
    assert_eq!(cfg.hunt_mode, HuntMode::Balanced);
    assert!(cfg.collector_timeout_secs.is_none());
    assert!(cfg.github_token.is_none());
    assert!(cfg.openalex_email.is_none());
}

#[test]
fn build_app_config_reads_credentials() {
    let mut map = HashMap::new();
    map.insert("GITHUB_TOKEN", "ghp_test");
    map.insert("OPENALEX_EMAIL", "ops@example.com");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.github_token.as_deref(), Some("ghp_test"));
    assert_eq!(cfg.openalex_email.as_deref(), Some("ops@example.com"));
}

#[test]
fn build_app_config_blank_credential_is_none() {
    let mut map = HashMap::new();
    map.insert("GITHUB_TOKEN", "   ");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.github_token.is_none());
}

#[test]
fn build_app_config_collector_timeout_override() {
    let mut map = HashMap::new();
    map.insert("QUARRY_COLLECTOR_TIMEOUT_SECS", "120");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.collector_timeout_secs, Some(120));
}

#[test]
fn build_app_config_zero_collector_timeout_means_none() {
    let mut map = HashMap::new();
    map.insert("QUARRY_COLLECTOR_TIMEOUT_SECS", "0");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.collector_timeout_secs.is_none());
}

#[test]
fn build_app_config_request_timeout_invalid() {
    let mut map = HashMap::new();
    map.insert("QUARRY_REQUEST_TIMEOUT_SECS", "not-a-number");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "QUARRY_REQUEST_TIMEOUT_SECS"
        ),
        "expected InvalidEnvVar(QUARRY_REQUEST_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn build_app_config_max_results_override() {
    let mut map = HashMap::new();
    map.insert("QUARRY_MAX_RESULTS", "25");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.max_results, 25);
}

#[test]
fn build_app_config_max_results_invalid() {
    let mut map = HashMap::new();
    map.insert("QUARRY_MAX_RESULTS", "-1");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "QUARRY_MAX_RESULTS"
        ),
        "expected InvalidEnvVar(QUARRY_MAX_RESULTS), got: {result:?}"
    );
}

#[test]
fn build_app_config_hunt_mode_is_case_insensitive() {
    let mut map = HashMap::new();
    map.insert("QUARRY_HUNT_MODE", "Deep");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.hunt_mode, HuntMode::Deep);
}

#[test]
fn build_app_config_hunt_mode_invalid() {
    let mut map = HashMap::new();
    map.insert("QUARRY_HUNT_MODE", "thorough");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "QUARRY_HUNT_MODE"
        ),
        "expected InvalidEnvVar(QUARRY_HUNT_MODE), got: {result:?}"
    );
}

#[test]
fn hunt_mode_result_caps_grow_with_effort() {
    assert!(HuntMode::Quick.default_max_results() < HuntMode::Balanced.default_max_results());
    assert!(HuntMode::Balanced.default_max_results() < HuntMode::Deep.default_max_results());
}

#[test]
fn debug_output_redacts_credentials() {
    let mut map = HashMap::new();
    map.insert("GITHUB_TOKEN", "ghp_secret");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("ghp_secret"));
    assert!(rendered.contains("[redacted]"));
}
