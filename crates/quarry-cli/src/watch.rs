//! `quarry watch`: the periodic watch loop, or a single cycle.

use std::sync::Arc;

use quarry_collectors::CollectorRegistry;
use quarry_core::{project_config_path, AppConfig, ProjectConfig};
use quarry_research::{Coordinator, RunSettings};
use quarry_watch::{CoordinatorScanner, JsonlSignalSink, SnapshotStore, WatchLoop};
use tokio_util::sync::CancellationToken;

/// # Errors
///
/// Returns an error if watch is disabled and `once` is false, or if a
/// single-cycle run fails.
pub(crate) async fn run_watch(
    config: &AppConfig,
    project: &ProjectConfig,
    registry: Arc<CollectorRegistry>,
    cancel: &CancellationToken,
    project_id: &str,
    once: bool,
) -> anyhow::Result<()> {
    if !project.watch.enabled && !once {
        anyhow::bail!(
            "watch is disabled; set watch.enabled in {} or pass --once",
            project_config_path(&config.project_path).display()
        );
    }

    let coordinator = Coordinator::new(registry, RunSettings::from_app_config(config));
    let scanner = CoordinatorScanner::new(coordinator, project_id, project.topics.clone());
    let watch = WatchLoop::new(
        Arc::new(scanner),
        SnapshotStore::for_project(&config.project_path),
        project.watch.clone(),
    )
    .with_publisher(Arc::new(JsonlSignalSink::for_project(
        &config.project_path,
    )));

    if once {
        let outcome = watch.run_once(cancel).await?;
        let report = serde_json::json!({
            "is_first": outcome.is_first,
            "snapshot": outcome.snapshot,
            "diff": outcome.diff,
            "signal": outcome.signal,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        watch.run(cancel).await;
    }
    Ok(())
}
