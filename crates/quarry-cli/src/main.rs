mod research;
mod watch;

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use quarry_collectors::CollectorRegistry;
use quarry_core::TopicConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quarry")]
#[command(about = "Run research collectors and watch for changes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run collectors once and stream progress events as JSON lines
    Research {
        /// Project identifier attached to the run (defaults to the project directory name)
        #[arg(long)]
        project_id: Option<String>,
        /// Collector to run; repeat for several (defaults to the project file, then all)
        #[arg(long = "collector")]
        collectors: Vec<String>,
        /// Topic as KEY=QUERY[,QUERY...]; repeat for several (defaults to the project file)
        #[arg(long = "topic", value_parser = parse_topic_arg)]
        topics: Vec<TopicConfig>,
    },
    /// Scan the watch collectors on the configured interval and emit signals
    Watch {
        /// Run a single cycle and print its outcome
        #[arg(long)]
        once: bool,
    },
    /// List registered collectors
    Collectors,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = quarry_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let project = quarry_core::load_project_config(&config.project_path)?;
    let registry = Arc::new(CollectorRegistry::with_defaults(&config)?);
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match cli.command {
        Commands::Research {
            project_id,
            collectors,
            topics,
        } => {
            let project_id =
                project_id.unwrap_or_else(|| default_project_id(&config.project_path));
            research::run_research(
                &config,
                &project,
                registry,
                &cancel,
                research::ResearchArgs {
                    project_id,
                    collectors,
                    topics,
                },
            )
            .await
        }
        Commands::Watch { once } => {
            let project_id = default_project_id(&config.project_path);
            watch::run_watch(&config, &project, registry, &cancel, &project_id, once).await
        }
        Commands::Collectors => {
            for name in registry.names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, cancelling");
            cancel.cancel();
        }
    });
}

/// Parses `KEY=Q1,Q2` into a topic. Blank queries are dropped; at least one
/// must remain.
fn parse_topic_arg(raw: &str) -> Result<TopicConfig, String> {
    let (key, queries) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=QUERY[,QUERY...], got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("topic key is empty in '{raw}'"));
    }
    let queries: Vec<String> = queries
        .split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect();
    if queries.is_empty() {
        return Err(format!("topic '{key}' has no queries"));
    }
    Ok(TopicConfig::new(key, queries))
}

fn default_project_id(project_path: &Path) -> String {
    std::fs::canonicalize(project_path)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "default".to_string())
}
