//! Research run orchestration.
//!
//! The [`Coordinator`] owns at most one active [`Run`]. A run fans the
//! requested collectors out on spawned tasks, routes their results into
//! per-topic [`Update`]s and streams [`ResearchEvent`]s to an optional
//! [`Observer`].

pub mod coordinator;
pub mod error;
pub mod events;
pub mod publisher;
pub mod run;
pub mod types;

pub use coordinator::{
    attribute_findings, flatten_queries, Coordinator, RunSettings, ScanSummary,
    CONTEXT_CANCELLED_REASON, SUPERSEDED_REASON,
};
pub use error::ResearchError;
pub use events::{ChannelObserver, Observer, ResearchEvent};
pub use publisher::{spawn_publish, Insight, InsightCategory, InsightPublisher};
pub use run::Run;
pub use types::{CollectorProgress, Finding, RunStatus, Update};
