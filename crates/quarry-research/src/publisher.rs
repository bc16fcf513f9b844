//! Optional best-effort export of findings to an external insight store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::ResearchError;
use crate::types::Finding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Competitive,
    Trends,
    User,
    Research,
}

impl InsightCategory {
    /// Category of the first tag that mentions `competitive`, `trend` or
    /// `user` (case-insensitive substring); `Research` otherwise.
    #[must_use]
    pub fn from_tags(tags: &[String]) -> Self {
        for tag in tags {
            let tag = tag.to_lowercase();
            if tag.contains("competitive") {
                return InsightCategory::Competitive;
            }
            if tag.contains("trend") {
                return InsightCategory::Trends;
            }
            if tag.contains("user") {
                return InsightCategory::User;
            }
        }
        InsightCategory::Research
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub project: String,
    pub source: String,
    pub category: InsightCategory,
    pub title: String,
    pub body: String,
    pub url: String,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    #[must_use]
    pub fn from_finding(project: &str, finding: &Finding) -> Self {
        Self {
            project: project.to_string(),
            source: finding.source_type.clone(),
            category: InsightCategory::from_tags(&finding.tags),
            title: finding.title.clone(),
            body: finding.summary.clone(),
            url: finding.source.clone(),
            score: finding.relevance,
            created_at: finding.collected_at,
        }
    }
}

#[async_trait]
pub trait InsightPublisher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ResearchError::Publish`] when the insight is not accepted.
    async fn publish(&self, insight: Insight) -> Result<(), ResearchError>;
}

/// Publishes `findings` on a detached task.
///
/// The task may outlive the run that produced the findings. Failures are
/// logged per insight and never reach the caller.
pub fn spawn_publish(
    publisher: Arc<dyn InsightPublisher>,
    project: String,
    findings: Vec<Finding>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for finding in &findings {
            let insight = Insight::from_finding(&project, finding);
            if let Err(e) = publisher.publish(insight).await {
                tracing::warn!(
                    project = %project,
                    finding = %finding.title,
                    error = %e,
                    "failed to publish insight"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn category_from_tags() {
        assert_eq!(
            InsightCategory::from_tags(&tags(&["Competitive-Landscape"])),
            InsightCategory::Competitive
        );
        assert_eq!(
            InsightCategory::from_tags(&tags(&["market TRENDS"])),
            InsightCategory::Trends
        );
        assert_eq!(
            InsightCategory::from_tags(&tags(&["user-feedback"])),
            InsightCategory::User
        );
        assert_eq!(
            InsightCategory::from_tags(&tags(&["genomics"])),
            InsightCategory::Research
        );
        assert_eq!(InsightCategory::from_tags(&[]), InsightCategory::Research);
    }

    #[test]
    fn first_matching_tag_wins() {
        assert_eq!(
            InsightCategory::from_tags(&tags(&["misc", "user study", "competitive"])),
            InsightCategory::User
        );
    }

    #[test]
    fn insight_maps_finding_fields() {
        let finding = Finding::new("Title", "Body", "https://x", "openalex", 0.7)
            .with_tags(tags(&["trend"]));
        let insight = Insight::from_finding("proj", &finding);
        assert_eq!(insight.project, "proj");
        assert_eq!(insight.source, "openalex");
        assert_eq!(insight.url, "https://x");
        assert_eq!(insight.body, "Body");
        assert_eq!(insight.category, InsightCategory::Trends);
        assert_eq!(insight.created_at, finding.collected_at);
    }

    struct Flaky {
        published: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InsightPublisher for Flaky {
        async fn publish(&self, insight: Insight) -> Result<(), ResearchError> {
            if insight.title == "bad" {
                return Err(ResearchError::Publish("rejected".to_string()));
            }
            self.published.lock().unwrap().push(insight.title);
            Ok(())
        }
    }

    #[tokio::test]
    async fn spawn_publish_continues_past_failures() {
        let publisher = Arc::new(Flaky {
            published: Mutex::new(Vec::new()),
        });
        let findings = vec![
            Finding::new("bad", "", "", "x", 0.1),
            Finding::new("good", "", "", "x", 0.9),
        ];

        spawn_publish(publisher.clone(), "proj".to_string(), findings)
            .await
            .unwrap();

        assert_eq!(*publisher.published.lock().unwrap(), vec!["good"]);
    }
}
