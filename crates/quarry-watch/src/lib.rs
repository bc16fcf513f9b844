//! Continuous monitoring on top of research runs.
//!
//! A [`WatchLoop`] scans a fixed set of collectors on an interval, diffs the
//! totals against the last persisted [`WatchSnapshot`] and emits a
//! [`Signal`] when something changed.

pub mod diff;
pub mod error;
pub mod signal;
pub mod snapshot;
pub mod watcher;

pub use diff::WatchDiff;
pub use error::WatchError;
pub use signal::{new_signal_id, JsonlSignalSink, Severity, Signal, SignalPublisher, SignalType};
pub use snapshot::{SnapshotStore, WatchSnapshot};
pub use watcher::{CoordinatorScanner, Scanner, WatchLoop, WatchOutcome};
