//! State of one orchestration episode.
//!
//! A [`Run`] is shared between the coordinator and every collector task it
//! spawns. All mutable state lives behind one lock; the cancellation token
//! is a child of the caller's token, so cancelling either reaches every
//! collector and every pending rate-limit wait.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use quarry_collectors::CollectorResult;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::{CollectorProgress, RunStatus, Update};

#[derive(Debug, Default)]
struct RunState {
    collectors: BTreeMap<String, CollectorProgress>,
    updates: HashMap<String, Vec<Update>>,
    /// Topic keys in the order their first update arrived.
    topic_order: Vec<String>,
    done: bool,
    cancel_reason: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
}

#[derive(Debug)]
pub struct Run {
    id: String,
    project_id: String,
    started_at: DateTime<Utc>,
    clock: Instant,
    cancel: CancellationToken,
    state: Mutex<RunState>,
    finished: watch::Sender<bool>,
}

impl Run {
    /// Creates a run whose collectors start out `pending`.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        collectors: &[String],
        parent: &CancellationToken,
    ) -> Self {
        let state = RunState {
            collectors: collectors
                .iter()
                .map(|name| (name.clone(), CollectorProgress::default()))
                .collect(),
            ..RunState::default()
        };
        let (finished, _) = watch::channel(false);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            started_at: Utc::now(),
            clock: Instant::now(),
            cancel: parent.child_token(),
            state: Mutex::new(state),
            finished,
        }
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Token every collector task of this run observes.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels the run and records `reason`.
    ///
    /// Returns `false` without doing anything when the run is already done or
    /// was already cancelled with a reason, so callers can emit exactly one
    /// cancellation event.
    pub fn cancel(&self, reason: &str) -> bool {
        let mut state = self.state();
        if state.done || state.cancel_reason.is_some() {
            return false;
        }
        state.cancel_reason = Some(reason.to_string());
        drop(state);
        self.cancel.cancel();
        true
    }

    /// True once the run was cancelled explicitly or through its parent token.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.state().cancel_reason.is_some()
    }

    #[must_use]
    pub fn cancel_reason(&self) -> Option<String> {
        self.state().cancel_reason.clone()
    }

    /// Marks the run done. Returns `false` if it was already done or has
    /// been cancelled with a reason.
    pub fn mark_done(&self) -> bool {
        let mut state = self.state();
        if state.done || state.cancel_reason.is_some() {
            return false;
        }
        state.done = true;
        state.completed_at = Some(Utc::now());
        state.duration = Some(self.clock.elapsed());
        true
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state().done
    }

    /// Signals waiters that the run reached its terminal state. Idempotent.
    pub(crate) fn finish(&self) {
        {
            let mut state = self.state();
            if state.duration.is_none() {
                state.duration = Some(self.clock.elapsed());
            }
        }
        self.finished.send_replace(true);
    }

    /// True once the run is done or cancelled and every collector task has
    /// returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Resolves once [`is_finished`](Self::is_finished) becomes true.
    pub async fn wait(&self) {
        let mut rx = self.finished.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|finished| *finished).await;
    }

    /// Wall-clock time from creation to completion, or to now while running.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.state().duration.unwrap_or_else(|| self.clock.elapsed())
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.state().completed_at
    }

    /// Appends `update` to its topic. Rejected once the run is cancelled or
    /// done.
    pub fn add_update(&self, update: Update) -> bool {
        let mut state = self.state();
        if state.done || state.cancel_reason.is_some() || self.cancel.is_cancelled() {
            return false;
        }
        let key = update.topic_key.clone();
        if !state.updates.contains_key(&key) {
            state.topic_order.push(key.clone());
        }
        state.updates.entry(key).or_default().push(update);
        true
    }

    /// Moves `name` from `pending` to `running`. Adds the entry if the
    /// collector was not part of the initial set.
    pub fn mark_running(&self, name: &str) -> bool {
        let mut state = self.state();
        let entry = state.collectors.entry(name.to_string()).or_default();
        if entry.status != RunStatus::Pending {
            return false;
        }
        entry.status = RunStatus::Running;
        entry.started_at = Some(Utc::now());
        true
    }

    /// Records a successful invocation. No-op if `name` is already terminal.
    pub fn mark_completed(
        &self,
        name: &str,
        result: &CollectorResult,
        finding_count: usize,
    ) -> bool {
        let mut state = self.state();
        let entry = state.collectors.entry(name.to_string()).or_default();
        if entry.status.is_terminal() {
            return false;
        }
        entry.status = RunStatus::Done;
        entry.finished_at = Some(Utc::now());
        entry.sources_collected = result.sources_collected;
        entry.insights_created = result.insights_created;
        entry.output_files.clone_from(&result.output_files);
        entry.finding_count = finding_count;
        entry.partial_errors.clone_from(&result.errors);
        true
    }

    /// Records a failure. No-op if `name` is already terminal.
    pub fn mark_errored(&self, name: &str, error: &str) -> bool {
        let mut state = self.state();
        let entry = state.collectors.entry(name.to_string()).or_default();
        if entry.status.is_terminal() {
            return false;
        }
        entry.status = RunStatus::Errored;
        entry.finished_at = Some(Utc::now());
        entry.error = Some(error.to_string());
        true
    }

    #[must_use]
    pub fn collector_status(&self, name: &str) -> Option<CollectorProgress> {
        self.state().collectors.get(name).cloned()
    }

    #[must_use]
    pub fn collector_statuses(&self) -> BTreeMap<String, CollectorProgress> {
        self.state().collectors.clone()
    }

    #[must_use]
    pub fn running_count(&self) -> usize {
        self.state()
            .collectors
            .values()
            .filter(|p| p.status == RunStatus::Running)
            .count()
    }

    /// Updates for `topic_key` in arrival order.
    #[must_use]
    pub fn updates_for_topic(&self, topic_key: &str) -> Vec<Update> {
        self.state()
            .updates
            .get(topic_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Topic keys that received at least one update, in arrival order.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.state().topic_order.clone()
    }

    #[must_use]
    pub fn total_findings(&self) -> usize {
        self.state()
            .updates
            .values()
            .flatten()
            .map(|u| u.findings.len())
            .sum()
    }
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
