//! `quarry research`: one coordinator run with events on stdout.

use std::sync::Arc;

use quarry_collectors::CollectorRegistry;
use quarry_core::{AppConfig, ProjectConfig, TopicConfig};
use quarry_research::{ChannelObserver, Coordinator, RunSettings};
use tokio_util::sync::CancellationToken;

pub(crate) struct ResearchArgs {
    pub project_id: String,
    pub collectors: Vec<String>,
    pub topics: Vec<TopicConfig>,
}

/// Collectors named on the command line, else the project's default set,
/// else every registered collector.
pub(crate) fn select_collectors(
    requested: Vec<String>,
    project: &ProjectConfig,
    registry: &CollectorRegistry,
) -> Vec<String> {
    if !requested.is_empty() {
        requested
    } else if !project.collectors.is_empty() {
        project.collectors.clone()
    } else {
        registry.names()
    }
}

/// Runs one research scan, printing every event as a JSON line.
///
/// # Errors
///
/// Returns an error if the run cannot start or the event printer panics.
/// Collector failures only show up as events.
pub(crate) async fn run_research(
    config: &AppConfig,
    project: &ProjectConfig,
    registry: Arc<CollectorRegistry>,
    cancel: &CancellationToken,
    args: ResearchArgs,
) -> anyhow::Result<()> {
    let collectors = select_collectors(args.collectors, project, &registry);
    let topics = if args.topics.is_empty() {
        project.topics.clone()
    } else {
        args.topics
    };
    if topics.is_empty() {
        tracing::warn!("no topics configured; collectors will receive no queries");
    }

    let coordinator = Coordinator::new(registry, RunSettings::from_app_config(config));
    let (observer, mut events) = ChannelObserver::new();
    coordinator.set_observer(Arc::new(observer));

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode event"),
            }
        }
    });

    let summary = coordinator
        .scan(cancel, &args.project_id, &collectors, &topics)
        .await?;
    coordinator.clear_observer();
    printer.await?;

    tracing::info!(
        run_id = %summary.run_id,
        sources = summary.sources_collected,
        insights = summary.insights_created,
        artifacts = summary.output_files.len(),
        failed_collectors = summary.collector_errors.len(),
        cancelled = summary.cancelled,
        "research run finished"
    );
    Ok(())
}
