//! Owns the active research run and fans collectors out for it.
//!
//! At most one run is active per [`Coordinator`]. Starting a new run cancels
//! the previous one and announces that cancellation before the new run's
//! `RunStarted` event. Events are emitted while the coordinator lock is held
//! and only for runs that are still live, so nothing from a superseded run
//! reaches the observer after its successor started.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use quarry_collectors::{
    Collector, CollectorConfig, CollectorError, CollectorRegistry, CollectorResult,
};
use quarry_core::{state_dir, AppConfig, HuntMode, TopicConfig, DEFAULT_TOPIC};
use tokio_util::sync::CancellationToken;

use crate::error::ResearchError;
use crate::events::{Observer, ResearchEvent};
use crate::publisher::{spawn_publish, InsightPublisher};
use crate::run::Run;
use crate::types::{CollectorProgress, Finding, RunStatus, Update};

/// Reason recorded when a run is replaced by a newer one.
pub const SUPERSEDED_REASON: &str = "new run started";

/// Reason recorded when the caller's token ends a run.
pub const CONTEXT_CANCELLED_REASON: &str = "context cancelled";

const SUMMARY_RELEVANCE: f64 = 0.7;

/// Per-run collector settings shared by every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub max_results: usize,
    pub min_quality: u64,
    pub mode: HuntMode,
    /// Upper bound on one collector invocation. `None` leaves collectors
    /// bounded only by cancellation.
    pub collector_timeout: Option<Duration>,
}

impl RunSettings {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_results: 0,
            min_quality: 0,
            mode: HuntMode::default(),
            collector_timeout: None,
        }
    }

    /// Artifacts go under `<project>/.quarry/sources`.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            output_dir: state_dir(&config.project_path).join("sources"),
            max_results: config.max_results,
            min_quality: 0,
            mode: config.hunt_mode,
            collector_timeout: config.collector_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Totals of a finished run, as returned by [`Coordinator::scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub run_id: String,
    pub sources_collected: usize,
    pub insights_created: usize,
    /// Artifacts from every completed collector, grouped by collector name.
    pub output_files: Vec<PathBuf>,
    /// Error message per errored collector.
    pub collector_errors: BTreeMap<String, String>,
    /// True when the run ended by cancellation rather than completion.
    pub cancelled: bool,
    pub duration: Duration,
}

#[derive(Default)]
struct CoordinatorState {
    active: Option<Arc<Run>>,
    observer: Option<Arc<dyn Observer>>,
    publisher: Option<(Arc<dyn InsightPublisher>, String)>,
}

impl CoordinatorState {
    fn notify(&self, event: ResearchEvent) {
        if let Some(observer) = &self.observer {
            observer.notify(event);
        }
    }

    /// Delivers `event` only while `run` is still live.
    fn notify_live(&self, run: &Run, event: ResearchEvent) {
        if !run.is_cancelled() {
            self.notify(event);
        }
    }
}

struct Shared {
    registry: Arc<CollectorRegistry>,
    settings: RunSettings,
    state: Mutex<CoordinatorState>,
}

/// Starts, cancels and fans out research runs.
///
/// Cheap to clone; clones share the same active run.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    #[must_use]
    pub fn new(registry: Arc<CollectorRegistry>, settings: RunSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                settings,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn registry(&self) -> &CollectorRegistry {
        &self.shared.registry
    }

    #[must_use]
    pub fn settings(&self) -> &RunSettings {
        &self.shared.settings
    }

    /// Attaches the observer that receives every subsequent event.
    ///
    /// The observer is called with the coordinator lock held and must not
    /// call back into the coordinator.
    pub fn set_observer(&self, observer: Arc<dyn Observer>) {
        self.state().observer = Some(observer);
    }

    pub fn clear_observer(&self) {
        self.state().observer = None;
    }

    /// Publishes every finding of later runs to `publisher` under `project`.
    pub fn set_publisher(
        &self,
        publisher: Arc<dyn InsightPublisher>,
        project: impl Into<String>,
    ) {
        self.state().publisher = Some((publisher, project.into()));
    }

    pub fn clear_publisher(&self) {
        self.state().publisher = None;
    }

    /// Starts a run of `collectors` over the queries of `topics`.
    ///
    /// Any run still active is cancelled first with reason
    /// [`SUPERSEDED_REASON`]. Collectors run on spawned tasks; the returned
    /// handle can be awaited with [`Run::wait`].
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Cancelled`] if `cancel` has already fired.
    pub fn start_run(
        &self,
        cancel: &CancellationToken,
        project_id: &str,
        collectors: &[String],
        topics: &[TopicConfig],
    ) -> Result<Arc<Run>, ResearchError> {
        if cancel.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }

        let collectors = dedup_names(collectors);
        let run = Arc::new(Run::new(project_id, &collectors, cancel));

        {
            let mut state = self.state();
            if let Some(previous) = state.active.take() {
                if previous.cancel(SUPERSEDED_REASON) {
                    tracing::info!(
                        run_id = %previous.id(),
                        reason = SUPERSEDED_REASON,
                        "research run cancelled"
                    );
                    state.notify(ResearchEvent::RunCancelled {
                        run_id: previous.id().to_string(),
                        reason: SUPERSEDED_REASON.to_string(),
                    });
                }
            }
            state.active = Some(Arc::clone(&run));
            state.notify(ResearchEvent::RunStarted {
                run_id: run.id().to_string(),
                project_id: project_id.to_string(),
                collectors: collectors.clone(),
            });
        }

        tracing::info!(
            run_id = %run.id(),
            project = %project_id,
            collectors = ?collectors,
            "research run started"
        );

        let this = self.clone();
        let topics = topics.to_vec();
        let handle = Arc::clone(&run);
        tokio::spawn(async move { this.execute(handle, collectors, topics).await });

        Ok(run)
    }

    /// Starts a run and waits for it to reach its terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Cancelled`] if `cancel` has already fired.
    pub async fn scan(
        &self,
        cancel: &CancellationToken,
        project_id: &str,
        collectors: &[String],
        topics: &[TopicConfig],
    ) -> Result<ScanSummary, ResearchError> {
        let run = self.start_run(cancel, project_id, collectors, topics)?;
        run.wait().await;
        Ok(summarize(&run))
    }

    /// Cancels the active run. Returns `false` if there is none or it has
    /// already finished or been cancelled.
    pub fn cancel_active_run(&self, reason: &str) -> bool {
        let state = self.state();
        let Some(run) = state.active.as_ref() else {
            return false;
        };
        if !run.cancel(reason) {
            return false;
        }
        tracing::info!(run_id = %run.id(), reason = %reason, "research run cancelled");
        state.notify(ResearchEvent::RunCancelled {
            run_id: run.id().to_string(),
            reason: reason.to_string(),
        });
        true
    }

    #[must_use]
    pub fn active_run(&self) -> Option<Arc<Run>> {
        self.state().active.clone()
    }

    /// True if `run_id` is the active run and it is neither done nor cancelled.
    #[must_use]
    pub fn is_run_active(&self, run_id: &str) -> bool {
        self.active_run()
            .is_some_and(|run| run.id() == run_id && !run.is_done() && !run.is_cancelled())
    }

    #[must_use]
    pub fn updates_for_topic(&self, topic_key: &str) -> Vec<Update> {
        self.active_run()
            .map(|run| run.updates_for_topic(topic_key))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn collector_statuses(&self) -> BTreeMap<String, CollectorProgress> {
        self.active_run()
            .map(|run| run.collector_statuses())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn running_collector_count(&self) -> usize {
        self.active_run().map_or(0, |run| run.running_count())
    }

    #[must_use]
    pub fn total_findings(&self) -> usize {
        self.active_run().map_or(0, |run| run.total_findings())
    }

    async fn execute(self, run: Arc<Run>, collectors: Vec<String>, topics: Vec<TopicConfig>) {
        let config = CollectorConfig {
            queries: flatten_queries(&topics),
            max_results: self.shared.settings.max_results,
            min_quality: self.shared.settings.min_quality,
            output_dir: self.shared.settings.output_dir.clone(),
            credential: None,
            mode: self.shared.settings.mode,
        };
        let topics = Arc::new(topics);

        let mut names = Vec::with_capacity(collectors.len());
        let mut tasks = Vec::with_capacity(collectors.len());
        for name in collectors {
            let collector = match self.shared.registry.resolve(&name) {
                Ok(collector) => collector,
                Err(error) => {
                    tracing::warn!(
                        run_id = %run.id(),
                        collector = %name,
                        error = %error,
                        "skipping collector"
                    );
                    self.record_failure(&run, name, &error.to_string());
                    continue;
                }
            };

            tasks.push(tokio::spawn(self.clone().run_collector(
                Arc::clone(&run),
                collector,
                config.clone(),
                Arc::clone(&topics),
            )));
            names.push(name);
        }

        for (name, joined) in names.into_iter().zip(join_all(tasks).await) {
            if let Err(e) = joined {
                tracing::error!(
                    run_id = %run.id(),
                    collector = %name,
                    error = %e,
                    "collector task panicked"
                );
                self.record_failure(&run, name, &format!("collector task panicked: {e}"));
            }
        }

        self.finalize(&run);
    }

    async fn run_collector(
        self,
        run: Arc<Run>,
        collector: Arc<dyn Collector>,
        config: CollectorConfig,
        topics: Arc<Vec<TopicConfig>>,
    ) {
        let name = collector.name().to_string();
        {
            let state = self.state();
            run.mark_running(&name);
            state.notify_live(
                &run,
                ResearchEvent::CollectorStarted {
                    run_id: run.id().to_string(),
                    collector: name.clone(),
                },
            );
        }

        let outcome = match self.shared.settings.collector_timeout {
            Some(limit) => tokio::time::timeout(limit, collector.hunt(run.token(), config))
                .await
                .unwrap_or(Err(CollectorError::TimedOut(limit))),
            None => collector.hunt(run.token(), config).await,
        };

        match outcome {
            Ok(result) => self.record_success(&run, &name, &result, &topics),
            Err(e) => {
                if e.is_cancelled() {
                    tracing::debug!(
                        run_id = %run.id(),
                        collector = %name,
                        "collector cancelled"
                    );
                } else {
                    tracing::warn!(
                        run_id = %run.id(),
                        collector = %name,
                        error = %e,
                        "collector failed"
                    );
                }
                self.record_failure(&run, name, &e.to_string());
            }
        }
    }

    /// Marks `name` errored and announces it, unless it already finished.
    fn record_failure(&self, run: &Run, name: String, error: &str) {
        let state = self.state();
        if run.mark_errored(&name, error) {
            state.notify_live(
                run,
                ResearchEvent::CollectorErrored {
                    run_id: run.id().to_string(),
                    collector: name,
                    error: error.to_string(),
                },
            );
        }
    }

    fn record_success(
        &self,
        run: &Run,
        name: &str,
        result: &CollectorResult,
        topics: &[TopicConfig],
    ) {
        if result.has_errors() {
            tracing::warn!(
                run_id = %run.id(),
                collector = %name,
                errors = result.errors.len(),
                "collector finished with partial errors"
            );
        }

        let by_topic = attribute_findings(name, result, topics);
        let finding_count = by_topic.iter().map(|(_, f)| f.len()).sum();
        let mut delivered = Vec::new();

        let publisher = {
            let state = self.state();
            run.mark_completed(name, result, finding_count);

            for (topic_key, findings) in by_topic {
                let update = Update {
                    run_id: run.id().to_string(),
                    collector_name: name.to_string(),
                    topic_key: topic_key.clone(),
                    findings: findings.clone(),
                    timestamp: Utc::now(),
                };
                if run.add_update(update) {
                    state.notify(ResearchEvent::CollectorUpdate {
                        run_id: run.id().to_string(),
                        collector: name.to_string(),
                        topic_key,
                        findings: findings.clone(),
                    });
                    delivered.extend(findings);
                }
            }

            state.notify_live(
                run,
                ResearchEvent::CollectorCompleted {
                    run_id: run.id().to_string(),
                    collector: name.to_string(),
                    finding_count,
                },
            );
            state.publisher.clone()
        };

        tracing::info!(
            run_id = %run.id(),
            collector = %name,
            sources = result.sources_collected,
            insights = result.insights_created,
            findings = finding_count,
            "collector completed"
        );

        if let Some((publisher, project)) = publisher {
            if !delivered.is_empty() {
                spawn_publish(publisher, project, delivered);
            }
        }
    }

    fn finalize(&self, run: &Run) {
        let state = self.state();
        if run.token().is_cancelled() {
            if run.cancel(CONTEXT_CANCELLED_REASON) {
                tracing::info!(
                    run_id = %run.id(),
                    reason = CONTEXT_CANCELLED_REASON,
                    "research run cancelled"
                );
                state.notify(ResearchEvent::RunCancelled {
                    run_id: run.id().to_string(),
                    reason: CONTEXT_CANCELLED_REASON.to_string(),
                });
            }
        } else if run.mark_done() {
            let duration = run.duration();
            let total_findings = run.total_findings();
            tracing::info!(
                run_id = %run.id(),
                total_findings,
                duration_ms = duration_ms(duration),
                "research run completed"
            );
            state.notify(ResearchEvent::RunCompleted {
                run_id: run.id().to_string(),
                total_findings,
                duration_ms: duration_ms(duration),
            });
        }
        run.finish();
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn dedup_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

/// Queries of every topic in caller order, trimmed, without blanks or
/// duplicates.
#[must_use]
pub fn flatten_queries(topics: &[TopicConfig]) -> Vec<String> {
    let mut seen = HashSet::new();
    topics
        .iter()
        .flat_map(|t| t.queries.iter())
        .map(|q| q.trim())
        .filter(|q| !q.is_empty() && seen.insert(*q))
        .map(str::to_string)
        .collect()
}

/// Splits a collector result into one summary finding per topic.
///
/// Each query is credited to the first topic (in caller order) that lists
/// it. Sources without a per-query breakdown go to the first topic, or to
/// [`DEFAULT_TOPIC`] when there are no topics. Topics with nothing credited
/// produce no finding.
#[must_use]
pub fn attribute_findings(
    collector: &str,
    result: &CollectorResult,
    topics: &[TopicConfig],
) -> Vec<(String, Vec<Finding>)> {
    if result.sources_collected == 0 {
        return Vec::new();
    }

    let keys: Vec<String> = if topics.is_empty() {
        vec![DEFAULT_TOPIC.to_string()]
    } else {
        topics.iter().map(|t| t.key.clone()).collect()
    };
    let mut counts = vec![0usize; keys.len()];

    for (query, count) in &result.sources_by_query {
        let index = topics
            .iter()
            .position(|t| t.queries.iter().any(|q| q.trim() == query.trim()))
            .unwrap_or(0);
        counts[index] += count;
    }

    let attributed: usize = counts.iter().sum();
    if result.sources_collected > attributed {
        counts[0] += result.sources_collected - attributed;
    }

    let mut insights = result.insights_created;
    keys.into_iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| {
            let finding = Finding::new(
                format!("{collector} results"),
                format!("Found {count} sources with {insights} insights"),
                collector,
                collector,
                SUMMARY_RELEVANCE,
            )
            .with_tags(vec![key.clone(), collector.to_string()]);
            insights = 0;
            (key, vec![finding])
        })
        .collect()
}

fn summarize(run: &Run) -> ScanSummary {
    let mut summary = ScanSummary {
        run_id: run.id().to_string(),
        sources_collected: 0,
        insights_created: 0,
        output_files: Vec::new(),
        collector_errors: BTreeMap::new(),
        cancelled: !run.is_done(),
        duration: run.duration(),
    };

    for (name, progress) in run.collector_statuses() {
        match progress.status {
            RunStatus::Done => {
                summary.sources_collected += progress.sources_collected;
                summary.insights_created += progress.insights_created;
                summary.output_files.extend(progress.output_files);
            }
            RunStatus::Errored => {
                summary
                    .collector_errors
                    .insert(name, progress.error.unwrap_or_default());
            }
            RunStatus::Pending | RunStatus::Running => {}
        }
    }

    summary
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
