//! Integration tests for `GitHubScout` using wiremock HTTP mocks.

use quarry_collectors::{Collector, CollectorConfig, CollectorError, GitHubScout};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scout(base_url: &str, token: Option<&str>) -> GitHubScout {
    GitHubScout::with_base_url(token.map(str::to_string), 30, "quarry-test", base_url)
        .expect("client construction should not fail")
}

fn scratch_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("quarry-github-{}", uuid::Uuid::new_v4()))
}

fn repo(full_name: &str) -> serde_json::Value {
    let (owner, name) = full_name.split_once('/').unwrap();
    serde_json::json!({
        "name": name,
        "full_name": full_name,
        "owner": { "login": owner },
        "description": "a repository",
        "html_url": format!("https://github.com/{full_name}"),
        "stargazers_count": 120,
        "language": "Rust",
        "topics": ["async"],
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

fn page(total: usize, items: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "total_count": total,
        "incomplete_results": false,
        "items": items
    })
}

fn config(queries: &[&str], dir: &std::path::Path) -> CollectorConfig {
    let mut cfg = CollectorConfig::new(queries.iter().map(|q| (*q).to_string()).collect(), dir);
    cfg.max_results = 5;
    cfg
}

#[tokio::test]
async fn hunt_writes_one_artifact_per_query_and_dedups_across_queries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "rust async"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(2, vec![repo("tokio-rs/tokio"), repo("smol-rs/smol")])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "runtime"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(
                2,
                vec![repo("tokio-rs/tokio"), repo("bytecodealliance/wasmtime")],
            )),
        )
        .mount(&server)
        .await;

    let dir = scratch_dir();
    let result = scout(&server.uri(), None)
        .hunt(&CancellationToken::new(), config(&["rust async", "runtime"], &dir))
        .await
        .expect("hunt should succeed");

    assert_eq!(result.collector_name, "github-scout");
    assert_eq!(result.sources_collected, 3);
    assert_eq!(result.sources_by_query.get("rust async"), Some(&2));
    assert_eq!(result.sources_by_query.get("runtime"), Some(&1));
    assert_eq!(result.output_files.len(), 2);
    assert!(result.errors.is_empty());
    assert!(result.completed_at >= result.started_at);

    for file in &result.output_files {
        assert!(file.starts_with(dir.join("github")));
        assert!(file.exists(), "artifact {} should exist", file.display());
    }
    let second = std::fs::read_to_string(&result.output_files[1]).unwrap();
    assert!(second.contains("wasmtime"));
    assert!(!second.contains("tokio-rs"));
}

#[tokio::test]
async fn min_quality_becomes_stars_qualifier() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "vector db stars:>=50"))
        .and(query_param("sort", "stars"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(1, vec![repo("qdrant/qdrant")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = scratch_dir();
    let mut cfg = config(&["vector db"], &dir);
    cfg.min_quality = 50;

    let result = scout(&server.uri(), None)
        .hunt(&CancellationToken::new(), cfg)
        .await
        .expect("hunt should succeed");

    assert_eq!(result.sources_collected, 1);
}

#[tokio::test]
async fn rate_limited_query_is_recorded_and_others_continue() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "limited"))
        .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-reset", "1735689600"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "fine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(1, vec![repo("a/b")])))
        .mount(&server)
        .await;

    let dir = scratch_dir();
    let result = scout(&server.uri(), None)
        .hunt(&CancellationToken::new(), config(&["limited", "fine"], &dir))
        .await
        .expect("per-query failures must not fail the hunt");

    assert_eq!(result.sources_collected, 1);
    assert_eq!(result.output_files.len(), 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("rate limited"));
    assert!(result.errors[0].contains("1735689600"));
}

#[tokio::test]
async fn server_error_is_recorded_without_artifact() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = scratch_dir();
    let result = scout(&server.uri(), None)
        .hunt(&CancellationToken::new(), config(&["anything"], &dir))
        .await
        .expect("hunt should still return a result");

    assert_eq!(result.sources_collected, 0);
    assert!(result.output_files.is_empty());
    assert!(result.errors[0].contains("500"));
    assert!(!dir.join("github").exists());
}

#[tokio::test]
async fn cancelled_token_aborts_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0, vec![])))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let result = scout(&server.uri(), None)
        .hunt(&token, config(&["rust"], &scratch_dir()))
        .await;

    assert!(matches!(result, Err(CollectorError::Cancelled)));
}

#[tokio::test]
async fn token_is_sent_as_bearer_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(header("authorization", "Bearer ghp_test"))
        .and(header("x-github-api-version", "2022-11-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(1, vec![repo("a/b")])))
        .expect(1)
        .mount(&server)
        .await;

    let result = scout(&server.uri(), Some("ghp_test"))
        .hunt(&CancellationToken::new(), config(&["rust"], &scratch_dir()))
        .await
        .expect("hunt should succeed");

    assert_eq!(result.sources_collected, 1);
}

#[tokio::test]
async fn credential_override_takes_precedence() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer override"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(1, vec![repo("a/b")])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = scratch_dir();
    let mut cfg = config(&["rust"], &dir);
    cfg.credential = Some("override".to_string());

    let result = scout(&server.uri(), Some("ghp_default"))
        .hunt(&CancellationToken::new(), cfg)
        .await
        .expect("hunt should succeed");

    assert_eq!(result.sources_collected, 1);
}

#[tokio::test]
async fn pages_until_max_results_reached() {
    let server = MockServer::start().await;

    let first: Vec<_> = (0..100).map(|i| repo(&format!("owner/repo-{i}"))).collect();
    let second: Vec<_> = (100..200).map(|i| repo(&format!("owner/repo-{i}"))).collect();

    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(500, first)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(500, second)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = scratch_dir();
    let mut cfg = config(&["rust"], &dir);
    cfg.max_results = 150;

    let result = scout(&server.uri(), None)
        .hunt(&CancellationToken::new(), cfg)
        .await
        .expect("hunt should succeed");

    assert_eq!(result.sources_collected, 150);
    assert_eq!(result.output_files.len(), 1);
}
