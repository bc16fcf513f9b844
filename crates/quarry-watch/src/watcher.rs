//! Periodic scan, diff and signal loop.

use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::{TopicConfig, WatchConfig};
use quarry_research::{Coordinator, ResearchError, ScanSummary};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::diff::WatchDiff;
use crate::error::WatchError;
use crate::signal::{Signal, SignalPublisher, SignalType};
use crate::snapshot::{SnapshotStore, WatchSnapshot};

/// Runs one scan over a set of collectors.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ResearchError`] when the scan could not start.
    async fn scan(
        &self,
        cancel: &CancellationToken,
        collectors: &[String],
    ) -> Result<ScanSummary, ResearchError>;
}

/// [`Scanner`] backed by a research [`Coordinator`].
#[derive(Clone)]
pub struct CoordinatorScanner {
    coordinator: Coordinator,
    project_id: String,
    topics: Vec<TopicConfig>,
}

impl CoordinatorScanner {
    #[must_use]
    pub fn new(
        coordinator: Coordinator,
        project_id: impl Into<String>,
        topics: Vec<TopicConfig>,
    ) -> Self {
        Self {
            coordinator,
            project_id: project_id.into(),
            topics,
        }
    }
}

#[async_trait]
impl Scanner for CoordinatorScanner {
    async fn scan(
        &self,
        cancel: &CancellationToken,
        collectors: &[String],
    ) -> Result<ScanSummary, ResearchError> {
        self.coordinator
            .scan(cancel, &self.project_id, collectors, &self.topics)
            .await
    }
}

/// Result of one watch cycle.
#[derive(Debug, Clone)]
pub struct WatchOutcome {
    pub snapshot: WatchSnapshot,
    pub diff: WatchDiff,
    /// No usable previous snapshot existed.
    pub is_first: bool,
    /// Signal emitted for this cycle, if the diff warranted one.
    pub signal: Option<Signal>,
}

pub struct WatchLoop {
    scanner: Arc<dyn Scanner>,
    store: SnapshotStore,
    config: WatchConfig,
    publisher: Option<Arc<dyn SignalPublisher>>,
}

impl WatchLoop {
    #[must_use]
    pub fn new(scanner: Arc<dyn Scanner>, store: SnapshotStore, config: WatchConfig) -> Self {
        Self {
            scanner,
            store,
            config,
            publisher: None,
        }
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn SignalPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Runs one cycle: scan, diff against the stored baseline, replace the
    /// baseline and emit a signal when something changed.
    ///
    /// Snapshot load and save failures are logged; a load failure counts as
    /// a first run. Signal delivery failures are logged and do not fail the
    /// cycle.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Cancelled`] if the scan was cancelled, and
    /// [`WatchError::Scan`] if it could not start. The baseline is left
    /// untouched in both cases.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<WatchOutcome, WatchError> {
        let collectors = self.config.collectors_or_default();
        let summary = self.scanner.scan(cancel, &collectors).await?;
        if summary.cancelled {
            return Err(WatchError::Cancelled);
        }
        for (collector, error) in &summary.collector_errors {
            tracing::warn!(collector = %collector, error = %error, "watch: collector failed");
        }

        let current = WatchSnapshot::from_summary(&summary);
        let previous = match self.store.load().await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(error = %e, "watch: unreadable snapshot; treating as first run");
                None
            }
        };

        let diff = WatchDiff::between(previous.as_ref(), &current);

        if let Err(e) = self.store.save(&current).await {
            tracing::warn!(error = %e, "watch: failed to save snapshot");
        }

        let signal = self.emit(&diff).await;

        Ok(WatchOutcome {
            snapshot: current,
            diff,
            is_first: previous.is_none(),
            signal,
        })
    }

    async fn emit(&self, diff: &WatchDiff) -> Option<Signal> {
        if !diff.has_changes() {
            return None;
        }
        let signal_type = SignalType::CompetitorShipped;
        if !self.config.notify_enabled(signal_type.as_str()) {
            tracing::debug!(signal_type = %signal_type, "watch: signal type not in notify_on");
            return None;
        }

        let signal = Signal::watch_update(diff);
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(&signal).await {
                tracing::warn!(signal_id = %signal.id, error = %e, "watch: signal publish failed");
            }
        }
        Some(signal)
    }

    /// Runs a cycle immediately, then one per configured interval until
    /// `cancel` fires. A failed cycle is logged and the loop keeps going.
    pub async fn run(&self, cancel: &CancellationToken) {
        let period = self.config.interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = period.as_secs(),
            collectors = ?self.config.collectors_or_default(),
            "watch: loop started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.run_once(cancel).await {
                Ok(outcome) => tracing::info!(
                    changed = outcome.diff.has_changes(),
                    first = outcome.is_first,
                    summary = %outcome.diff.summary,
                    "watch: cycle complete"
                ),
                Err(WatchError::Cancelled) if cancel.is_cancelled() => break,
                Err(e) => tracing::warn!(error = %e, "watch: cycle failed"),
            }
        }

        tracing::info!("watch: loop stopped");
    }
}
