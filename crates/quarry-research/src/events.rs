//! Progress events streamed to an optional observer.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::types::Finding;

/// One step of a research run.
///
/// Every run produces exactly one terminal event: `RunCompleted` or
/// `RunCancelled`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResearchEvent {
    RunStarted {
        run_id: String,
        project_id: String,
        collectors: Vec<String>,
    },
    CollectorStarted {
        run_id: String,
        collector: String,
    },
    CollectorUpdate {
        run_id: String,
        collector: String,
        topic_key: String,
        findings: Vec<Finding>,
    },
    CollectorCompleted {
        run_id: String,
        collector: String,
        finding_count: usize,
    },
    CollectorErrored {
        run_id: String,
        collector: String,
        error: String,
    },
    RunCompleted {
        run_id: String,
        total_findings: usize,
        duration_ms: u64,
    },
    RunCancelled {
        run_id: String,
        reason: String,
    },
}

impl ResearchEvent {
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            ResearchEvent::RunStarted { run_id, .. }
            | ResearchEvent::CollectorStarted { run_id, .. }
            | ResearchEvent::CollectorUpdate { run_id, .. }
            | ResearchEvent::CollectorCompleted { run_id, .. }
            | ResearchEvent::CollectorErrored { run_id, .. }
            | ResearchEvent::RunCompleted { run_id, .. }
            | ResearchEvent::RunCancelled { run_id, .. } => run_id,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResearchEvent::RunCompleted { .. } | ResearchEvent::RunCancelled { .. }
        )
    }
}

/// Receives research events.
///
/// `notify` is called while the coordinator holds its own lock, so it must
/// return promptly and never block.
pub trait Observer: Send + Sync {
    fn notify(&self, event: ResearchEvent);
}

/// Observer that forwards events into an unbounded channel.
///
/// Sends to a dropped receiver are ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ResearchEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn notify(&self, event: ResearchEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kebab_case_type_tag() {
        let event = ResearchEvent::RunCancelled {
            run_id: "r1".to_string(),
            reason: "new run started".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "run-cancelled");
        assert_eq!(json["reason"], "new run started");
    }

    #[test]
    fn terminal_events() {
        let done = ResearchEvent::RunCompleted {
            run_id: "r1".to_string(),
            total_findings: 0,
            duration_ms: 5,
        };
        let started = ResearchEvent::CollectorStarted {
            run_id: "r1".to_string(),
            collector: "c".to_string(),
        };
        assert!(done.is_terminal());
        assert!(!started.is_terminal());
        assert_eq!(started.run_id(), "r1");
    }

    #[test]
    fn channel_observer_ignores_dropped_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.notify(ResearchEvent::RunCancelled {
            run_id: "r1".to_string(),
            reason: "x".to_string(),
        });
    }

    #[test]
    fn channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.notify(ResearchEvent::CollectorStarted {
            run_id: "r1".to_string(),
            collector: "c".to_string(),
        });
        let event = rx.try_recv().unwrap();
        assert_eq!(event.run_id(), "r1");
    }
}
