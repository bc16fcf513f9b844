//! `github-scout`: repository search against the GitHub REST API.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::collector::{
    ensure_not_cancelled, retain_unseen, slugify, write_yaml_artifact, Collector,
};
use crate::error::CollectorError;
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::types::{CollectorConfig, CollectorResult};

pub const GITHUB_SCOUT: &str = "github-scout";

const DEFAULT_BASE_URL: &str = "https://api.github.com/";

/// Search API limits: 30 requests/minute with a token, 10 without.
pub const GITHUB_RATE_POLICY: RateLimitPolicy = RateLimitPolicy {
    anonymous: 10,
    authenticated: 30,
    window: Duration::from_secs(60),
};

/// GitHub caps search pages at 100 items and 1000 results overall.
const MAX_PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    name: String,
    full_name: String,
    owner: RepoOwner,
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Debug, Serialize)]
struct SearchArtifact<'a> {
    query: &'a str,
    collected_at: DateTime<Utc>,
    repos: Vec<RepoArtifact<'a>>,
}

#[derive(Debug, Serialize)]
struct RepoArtifact<'a> {
    owner: &'a str,
    name: &'a str,
    description: &'a str,
    url: &'a str,
    stars: u64,
    language: &'a str,
    topics: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Repository search collector.
///
/// Holds one limiter per authentication state so the budget survives across
/// runs; the token in effect for an invocation picks which one is used.
pub struct GitHubScout {
    client: Client,
    base_url: Url,
    token: Option<String>,
    authenticated_limiter: RateLimiter,
    anonymous_limiter: RateLimiter,
}

impl GitHubScout {
    /// Creates a collector pointed at the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Http`] if the `reqwest::Client` cannot be
    /// built.
    pub fn new(
        token: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, CollectorError> {
        Self::with_base_url(token, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a collector with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`CollectorError::InvalidBaseUrl`] if `base_url` does not
    /// parse.
    pub fn with_base_url(
        token: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| CollectorError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
            authenticated_limiter: GITHUB_RATE_POLICY.limiter(true),
            anonymous_limiter: GITHUB_RATE_POLICY.limiter(false),
        })
    }

    fn limiter(&self, authenticated: bool) -> &RateLimiter {
        if authenticated {
            &self.authenticated_limiter
        } else {
            &self.anonymous_limiter
        }
    }

    fn search_url(&self, search_query: &str, per_page: usize, page: usize) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("{}search/repositories", self.base_url.path()));
        url.query_pairs_mut()
            .append_pair("q", search_query)
            .append_pair("sort", "stars")
            .append_pair("order", "desc")
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());
        url
    }

    /// Pages through the search results for one query.
    async fn search(
        &self,
        cancel: &CancellationToken,
        query: &str,
        token: Option<&str>,
        max_results: usize,
        min_stars: u64,
    ) -> Result<Vec<RepoItem>, CollectorError> {
        let search_query = if min_stars > 0 {
            format!("{query} stars:>={min_stars}")
        } else {
            query.to_string()
        };
        let per_page = max_results.clamp(1, MAX_PER_PAGE);
        let max_pages = max_results.div_ceil(per_page).clamp(1, MAX_PAGES);
        let limiter = self.limiter(token.is_some());

        let mut repos = Vec::new();
        for page in 1..=max_pages {
            limiter.wait(cancel).await?;

            let url = self.search_url(&search_query, per_page, page);
            let mut request = self
                .client
                .get(url.clone())
                .header(ACCEPT, "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28");
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();
            if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
                let reset = response
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                return Err(CollectorError::RateLimited {
                    source_name: GITHUB_SCOUT.to_string(),
                    reset,
                });
            }
            if !status.is_success() {
                return Err(CollectorError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let body = response.text().await?;
            let parsed: SearchResponse =
                serde_json::from_str(&body).map_err(|e| CollectorError::Deserialize {
                    context: format!("search/repositories(q={query}, page={page})"),
                    source: e,
                })?;

            let page_len = parsed.items.len();
            repos.extend(parsed.items);

            if repos.len() >= max_results {
                repos.truncate(max_results);
                break;
            }
            if page_len < per_page || repos.len() >= parsed.total_count {
                break;
            }
        }

        Ok(repos)
    }
}

#[async_trait]
impl Collector for GitHubScout {
    fn name(&self) -> &str {
        GITHUB_SCOUT
    }

    async fn hunt(
        &self,
        cancel: &CancellationToken,
        config: CollectorConfig,
    ) -> Result<CollectorResult, CollectorError> {
        let mut result = CollectorResult::start(GITHUB_SCOUT);
        let token = config
            .credential
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.token.as_deref());
        let max_results = if config.max_results == 0 {
            config.mode.default_max_results()
        } else {
            config.max_results
        };
        let output_dir = config.output_dir.join("github");
        let mut seen = HashSet::new();

        for query in &config.queries {
            ensure_not_cancelled(cancel)?;

            let mut repos = match self
                .search(cancel, query, token, max_results, config.min_quality)
                .await
            {
                Ok(repos) => repos,
                Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        collector = GITHUB_SCOUT,
                        query = %query,
                        error = %e,
                        "repository search failed"
                    );
                    result.record_error(format!("query {query:?} failed: {e}"));
                    continue;
                }
            };

            retain_unseen(&mut repos, &mut seen, |r| r.full_name.to_lowercase());
            if repos.is_empty() {
                continue;
            }

            let collected_at = Utc::now();
            let artifact = SearchArtifact {
                query,
                collected_at,
                repos: repos
                    .iter()
                    .map(|r| RepoArtifact {
                        owner: &r.owner.login,
                        name: &r.name,
                        description: r.description.as_deref().unwrap_or_default(),
                        url: &r.html_url,
                        stars: r.stargazers_count,
                        language: r.language.as_deref().unwrap_or_default(),
                        topics: &r.topics,
                        updated_at: r.updated_at,
                    })
                    .collect(),
            };

            let slug = match slugify(query) {
                s if s.is_empty() => "query".to_string(),
                s => s,
            };
            let file_name = format!("{}-{slug}.yaml", collected_at.format("%Y-%m-%d"));

            match write_yaml_artifact(&output_dir, &file_name, &artifact).await {
                Ok(path) => {
                    tracing::debug!(
                        collector = GITHUB_SCOUT,
                        query = %query,
                        count = repos.len(),
                        "collected repositories"
                    );
                    result.record_sources(query, repos.len());
                    result.output_files.push(path);
                }
                Err(e) => {
                    tracing::warn!(
                        collector = GITHUB_SCOUT,
                        query = %query,
                        error = %e,
                        "failed to write search artifact"
                    );
                    result.record_error(format!("failed to write results for {query:?}: {e}"));
                }
            }
        }

        Ok(result.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scout(base_url: &str) -> GitHubScout {
        GitHubScout::with_base_url(None, 30, "quarry-test", base_url)
            .expect("client construction should not fail")
    }

    #[test]
    fn search_url_encodes_query_and_paging() {
        let url = scout("https://api.github.com").search_url("rust async stars:>=50", 25, 2);
        assert_eq!(url.path(), "/search/repositories");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".to_string(), "rust async stars:>=50".to_string())));
        assert!(pairs.contains(&("per_page".to_string(), "25".to_string())));
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
    }

    #[test]
    fn search_url_keeps_base_path_prefix() {
        let url = scout("http://localhost:8080/api/v3/").search_url("q", 10, 1);
        assert_eq!(url.path(), "/api/v3/search/repositories");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = GitHubScout::with_base_url(None, 30, "quarry-test", "not a url");
        assert!(matches!(result, Err(CollectorError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn limiter_follows_authentication() {
        let s = scout("https://api.github.com");
        assert_eq!(s.limiter(true).max_requests(), 30);
        assert_eq!(s.limiter(false).max_requests(), 10);
    }

    #[test]
    fn blank_token_counts_as_anonymous() {
        let s = GitHubScout::with_base_url(Some("  ".to_string()), 30, "ua", "http://x")
            .expect("client construction should not fail");
        assert!(s.token.is_none());
    }
}
