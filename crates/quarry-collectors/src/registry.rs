use std::collections::HashMap;
use std::sync::Arc;

use quarry_core::AppConfig;

use crate::collector::Collector;
use crate::error::CollectorError;
use crate::github::GitHubScout;
use crate::openalex::OpenAlexCollector;

/// Name-keyed lookup of available collectors, populated at startup.
#[derive(Default, Clone)]
pub struct CollectorRegistry {
    collectors: HashMap<String, Arc<dyn Collector>>,
}

impl CollectorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `github-scout` and `openalex`, configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Http`] if an HTTP client cannot be built.
    pub fn with_defaults(config: &AppConfig) -> Result<Self, CollectorError> {
        let mut registry = Self::new();
        registry.register(Arc::new(GitHubScout::new(
            config.github_token.clone(),
            config.request_timeout_secs,
            &config.user_agent,
        )?));
        registry.register(Arc::new(OpenAlexCollector::new(
            config.openalex_email.clone(),
            config.request_timeout_secs,
            &config.user_agent,
        )?));
        Ok(registry)
    }

    /// Adds `collector` under its own name, replacing any previous entry.
    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        let name = collector.name().to_string();
        if self.collectors.insert(name.clone(), collector).is_some() {
            tracing::debug!(collector = %name, "replaced registered collector");
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Collector>> {
        self.collectors.get(name).cloned()
    }

    /// Like [`get`](Self::get) but reports a missing name as an error.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::UnknownCollector`] if `name` is not registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Collector>, CollectorError> {
        self.get(name)
            .ok_or_else(|| CollectorError::UnknownCollector(name.to_string()))
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collectors.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("collectors", &self.names())
            .finish()
    }
}
