use std::collections::HashSet;

use serde::Serialize;

use crate::snapshot::WatchSnapshot;

/// Difference between two consecutive watch snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchDiff {
    has_changes: bool,
    pub source_delta: i64,
    pub insight_delta: i64,
    /// Current artifacts absent from the previous snapshot, in current order.
    pub new_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub summary: String,
}

impl WatchDiff {
    /// Compares `current` against the previous baseline.
    ///
    /// Without a baseline the diff reports a change only when the current
    /// scan found anything, and every artifact counts as new.
    #[must_use]
    pub fn between(previous: Option<&WatchSnapshot>, current: &WatchSnapshot) -> Self {
        let Some(previous) = previous else {
            return Self {
                has_changes: current.total_sources > 0 || !current.output_files.is_empty(),
                source_delta: signed(current.total_sources),
                insight_delta: signed(current.total_insights),
                new_files: current.output_files.clone(),
                removed_files: Vec::new(),
                summary: format!(
                    "initial scan: {} sources, {} insights",
                    current.total_sources, current.total_insights
                ),
            };
        };

        let before: HashSet<&str> = previous.output_files.iter().map(String::as_str).collect();
        let after: HashSet<&str> = current.output_files.iter().map(String::as_str).collect();

        let new_files: Vec<String> = current
            .output_files
            .iter()
            .filter(|f| !before.contains(f.as_str()))
            .cloned()
            .collect();
        let removed_files: Vec<String> = previous
            .output_files
            .iter()
            .filter(|f| !after.contains(f.as_str()))
            .cloned()
            .collect();

        let source_delta = signed(current.total_sources) - signed(previous.total_sources);
        let insight_delta = signed(current.total_insights) - signed(previous.total_insights);
        let has_changes = source_delta != 0 || insight_delta != 0 || before != after;

        let summary = if has_changes {
            format!(
                "sources {source_delta:+}, insights {insight_delta:+}, {} new files, {} removed files",
                new_files.len(),
                removed_files.len()
            )
        } else {
            "no changes".to_string()
        };

        Self {
            has_changes,
            source_delta,
            insight_delta,
            new_files,
            removed_files,
            summary,
        }
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.has_changes
    }
}

fn signed(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn snap(sources: usize, insights: usize, files: &[&str]) -> WatchSnapshot {
        WatchSnapshot {
            scanned_at: Utc::now(),
            total_sources: sources,
            total_insights: insights,
            output_files: files.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    #[test]
    fn first_scan_with_results_is_a_change() {
        let diff = WatchDiff::between(None, &snap(5, 2, &["a", "b"]));
        assert!(diff.has_changes());
        assert_eq!(diff.summary, "initial scan: 5 sources, 2 insights");
        assert_eq!(diff.new_files, vec!["a", "b"]);
    }

    #[test]
    fn empty_first_scan_is_not_a_change() {
        let diff = WatchDiff::between(None, &snap(0, 0, &[]));
        assert!(!diff.has_changes());
        assert!(diff.new_files.is_empty());
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let previous = snap(5, 2, &["a", "b"]);
        let current = snap(5, 2, &["b", "a"]);
        let diff = WatchDiff::between(Some(&previous), &current);
        assert!(!diff.has_changes());
        assert_eq!(diff.summary, "no changes");
        assert!(diff.new_files.is_empty());
    }

    #[test]
    fn reports_deltas_and_new_files_in_current_order() {
        let previous = snap(5, 2, &["a", "b"]);
        let current = snap(3, 4, &["c", "a", "d"]);
        let diff = WatchDiff::between(Some(&previous), &current);
        assert!(diff.has_changes());
        assert_eq!(diff.source_delta, -2);
        assert_eq!(diff.insight_delta, 2);
        assert_eq!(diff.new_files, vec!["c", "d"]);
        assert_eq!(diff.removed_files, vec!["b"]);
        assert_eq!(
            diff.summary,
            "sources -2, insights +2, 2 new files, 1 removed files"
        );
    }

    #[test]
    fn artifact_change_alone_is_a_change() {
        let previous = snap(5, 2, &["a"]);
        let current = snap(5, 2, &["b"]);
        assert!(WatchDiff::between(Some(&previous), &current).has_changes());
    }
}
