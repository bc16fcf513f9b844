//! `openalex`: scholarly works search against the OpenAlex API.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::collector::{ensure_not_cancelled, retain_unseen, write_yaml_artifact, Collector};
use crate::error::CollectorError;
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::types::{CollectorConfig, CollectorResult};

pub const OPENALEX: &str = "openalex";

const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// 10 req/s in the polite pool (requests carrying a contact email), 5 otherwise.
pub const OPENALEX_RATE_POLICY: RateLimitPolicy = RateLimitPolicy {
    anonymous: 5,
    authenticated: 10,
    window: Duration::from_secs(1),
};

const MAX_PER_PAGE: usize = 200;

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<WorkItem>,
}

#[derive(Debug, Deserialize)]
struct WorkItem {
    id: String,
    doi: Option<String>,
    title: Option<String>,
    display_name: Option<String>,
    publication_date: Option<String>,
    #[serde(default)]
    cited_by_count: u64,
    #[serde(default)]
    open_access: OpenAccess,
    #[serde(default)]
    authorships: Vec<Authorship>,
    primary_location: Option<Location>,
    #[serde(default)]
    topics: Vec<Named>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAccess {
    #[serde(default)]
    is_oa: bool,
    oa_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Named,
}

#[derive(Debug, Deserialize)]
struct Location {
    source: Option<Named>,
    pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Relevance {
    High,
    Medium,
    Low,
}

#[derive(Debug, Serialize)]
struct WorkArtifact {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    doi: Option<String>,
    title: String,
    authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    journal: Option<String>,
    citations: u64,
    open_access: bool,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    topics: Vec<String>,
    relevance: Relevance,
}

#[derive(Debug, Serialize)]
struct WorksArtifact {
    query: String,
    collected_at: DateTime<Utc>,
    works: Vec<WorkArtifact>,
}

impl WorkArtifact {
    fn from_item(item: WorkItem, query: &str) -> Self {
        let title = item
            .title
            .filter(|t| !t.is_empty())
            .or(item.display_name)
            .unwrap_or_default();
        let relevance = assess_relevance(&title, item.cited_by_count, query);
        let (journal, pdf_url) = match item.primary_location {
            Some(loc) => (loc.source.and_then(|s| s.display_name), loc.pdf_url),
            None => (None, None),
        };

        Self {
            doi: item
                .doi
                .map(|d| d.trim_start_matches("https://doi.org/").to_string()),
            title,
            authors: item
                .authorships
                .into_iter()
                .filter_map(|a| a.author.display_name)
                .filter(|n| !n.is_empty())
                .collect(),
            published_at: item.publication_date.filter(|d| !d.is_empty()),
            journal,
            citations: item.cited_by_count,
            open_access: item.open_access.is_oa,
            url: item.id.clone(),
            pdf_url: pdf_url.or(item.open_access.oa_url),
            topics: item
                .topics
                .into_iter()
                .filter_map(|t| t.display_name)
                .collect(),
            relevance,
            id: item.id,
        }
    }
}

fn assess_relevance(title: &str, citations: u64, query: &str) -> Relevance {
    let title_match = title.to_lowercase().contains(&query.to_lowercase());
    if citations >= 100 || (title_match && citations >= 10) {
        Relevance::High
    } else if title_match || citations >= 50 {
        Relevance::Medium
    } else {
        Relevance::Low
    }
}

/// Works search collector.
pub struct OpenAlexCollector {
    client: Client,
    base_url: String,
    email: Option<String>,
    polite_limiter: RateLimiter,
    anonymous_limiter: RateLimiter,
}

impl OpenAlexCollector {
    /// # Errors
    ///
    /// Returns [`CollectorError::Http`] if the `reqwest::Client` cannot be
    /// built.
    pub fn new(
        email: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, CollectorError> {
        Self::with_base_url(email, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a collector with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`CollectorError::InvalidBaseUrl`] if `base_url` is not an
    /// absolute http(s) URL.
    pub fn with_base_url(
        email: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, CollectorError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CollectorError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.filter(|e| !e.trim().is_empty()),
            polite_limiter: OPENALEX_RATE_POLICY.limiter(true),
            anonymous_limiter: OPENALEX_RATE_POLICY.limiter(false),
        })
    }

    fn works_url(
        &self,
        query: &str,
        per_page: usize,
        min_citations: u64,
        email: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}/works?search={}&per_page={per_page}&sort=cited_by_count:desc",
            self.base_url,
            utf8_percent_encode(query, NON_ALPHANUMERIC)
        );
        if min_citations > 0 {
            let filter = format!("cited_by_count:>{}", min_citations - 1);
            url.push_str("&filter=");
            url.push_str(&utf8_percent_encode(&filter, NON_ALPHANUMERIC).to_string());
        }
        if let Some(email) = email {
            url.push_str("&mailto=");
            url.push_str(&utf8_percent_encode(email, NON_ALPHANUMERIC).to_string());
        }
        url
    }

    async fn search(
        &self,
        query: &str,
        per_page: usize,
        min_citations: u64,
        email: Option<&str>,
    ) -> Result<Vec<WorkItem>, CollectorError> {
        let url = self.works_url(query, per_page, min_citations, email);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let reset = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(CollectorError::RateLimited {
                source_name: OPENALEX.to_string(),
                reset,
            });
        }
        if !status.is_success() {
            return Err(CollectorError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let parsed: WorksResponse =
            serde_json::from_str(&body).map_err(|e| CollectorError::Deserialize {
                context: format!("works(search={query})"),
                source: e,
            })?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl Collector for OpenAlexCollector {
    fn name(&self) -> &str {
        OPENALEX
    }

    async fn hunt(
        &self,
        cancel: &CancellationToken,
        config: CollectorConfig,
    ) -> Result<CollectorResult, CollectorError> {
        let mut result = CollectorResult::start(OPENALEX);
        let email = config
            .credential
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .or(self.email.as_deref());
        let limiter = if email.is_some() {
            &self.polite_limiter
        } else {
            &self.anonymous_limiter
        };
        let max_results = if config.max_results == 0 {
            config.mode.default_max_results()
        } else {
            config.max_results
        };
        let per_page = max_results.min(MAX_PER_PAGE);

        let mut seen = HashSet::new();
        let mut works = Vec::new();

        for query in &config.queries {
            ensure_not_cancelled(cancel)?;
            limiter.wait(cancel).await?;

            let mut items = match self
                .search(query, per_page, config.min_quality, email)
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(
                        collector = OPENALEX,
                        query = %query,
                        error = %e,
                        "works search failed"
                    );
                    result.record_error(format!("search {query:?}: {e}"));
                    continue;
                }
            };

            retain_unseen(&mut items, &mut seen, |w| w.id.clone());
            result.record_sources(query, items.len());
            works.extend(items.into_iter().map(|w| WorkArtifact::from_item(w, query)));
        }

        if !works.is_empty() {
            let collected_at = Utc::now();
            let artifact = WorksArtifact {
                query: config.queries.join(", "),
                collected_at,
                works,
            };
            let dir = config.output_dir.join("openalex");
            let file_name = format!("{}-openalex.yaml", collected_at.format("%Y-%m-%d"));

            match write_yaml_artifact(&dir, &file_name, &artifact).await {
                Ok(path) => result.output_files.push(path),
                Err(e) => {
                    tracing::warn!(collector = OPENALEX, error = %e, "failed to save works");
                    result.record_error(format!("save results: {e}"));
                }
            }
        }

        Ok(result.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(email: Option<&str>) -> OpenAlexCollector {
        OpenAlexCollector::with_base_url(
            email.map(str::to_string),
            30,
            "quarry-test",
            "https://api.openalex.org/",
        )
        .expect("client construction should not fail")
    }

    #[test]
    fn works_url_encodes_search_and_filter() {
        let url = collector(None).works_url("gene editing", 25, 100, None);
        assert!(url.starts_with("https://api.openalex.org/works?search=gene%20editing"));
        assert!(url.contains("per_page=25"));
        assert!(url.contains("filter=cited%5Fby%5Fcount%3A%3E99"));
        assert!(!url.contains("mailto"));
    }

    #[test]
    fn works_url_adds_mailto_for_polite_pool() {
        let url = collector(None).works_url("genome", 10, 0, Some("ops@example.com"));
        assert!(url.contains("&mailto=ops%40example%2Ecom"));
        assert!(!url.contains("filter="));
    }

    #[test]
    fn relevance_rewards_citations_and_title_matches() {
        assert_eq!(assess_relevance("Anything", 150, "genome"), Relevance::High);
        assert_eq!(
            assess_relevance("The Human Genome", 12, "genome"),
            Relevance::High
        );
        assert_eq!(
            assess_relevance("The Human Genome", 2, "genome"),
            Relevance::Medium
        );
        assert_eq!(assess_relevance("Unrelated", 60, "genome"), Relevance::Medium);
        assert_eq!(assess_relevance("Unrelated", 3, "genome"), Relevance::Low);
    }

    #[test]
    fn artifact_prefers_title_and_strips_doi_prefix() {
        let item: WorkItem = serde_json::from_value(serde_json::json!({
            "id": "https://openalex.org/W1",
            "doi": "https://doi.org/10.1000/xyz",
            "title": "",
            "display_name": "Fallback Title",
            "cited_by_count": 5,
            "open_access": { "is_oa": true, "oa_url": "https://oa.example/w1.pdf" },
            "authorships": [{ "author": { "display_name": "Ada" } }],
            "primary_location": { "source": { "display_name": "Nature" }, "pdf_url": null }
        }))
        .unwrap();

        let work = WorkArtifact::from_item(item, "genome");
        assert_eq!(work.title, "Fallback Title");
        assert_eq!(work.doi.as_deref(), Some("10.1000/xyz"));
        assert_eq!(work.journal.as_deref(), Some("Nature"));
        assert_eq!(work.pdf_url.as_deref(), Some("https://oa.example/w1.pdf"));
        assert_eq!(work.authors, vec!["Ada"]);
        assert!(work.open_access);
    }

    #[test]
    fn rejects_relative_base_url() {
        let result = OpenAlexCollector::with_base_url(None, 30, "ua", "api.openalex.org");
        assert!(matches!(result, Err(CollectorError::InvalidBaseUrl { .. })));
    }
}
