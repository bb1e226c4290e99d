use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mediagraph::generation::{GenerationKind, GenerationParams, JobOutcome};
use mediagraph::model::{AspectRatio, DerivationKind};
use mediagraph::persistence::TeardownOutcome;
use mediagraph::{AppContext, MediagraphConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

const LOG_FILTER_ENV: &str = "MEDIAGRAPH_LOG";

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,
    /// Directory holding project snapshots and emergency backups
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,
    #[clap(long, global = true)]
    provider_url: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the project's nodes and edges as JSON
    Show {
        #[clap(short, long)]
        project: String,
    },
    AddText {
        #[clap(short, long)]
        project: String,
        #[clap(short, long)]
        content: String,
    },
    /// Generate new media from a prompt and wait for the result
    Generate {
        #[clap(short, long)]
        project: String,
        #[clap(short, long, value_enum)]
        kind: MediaArg,
        #[clap(long)]
        prompt: String,
        #[clap(short, long)]
        aspect_ratio: Option<String>,
        #[clap(short, long, default_value = "1")]
        count: u32,
    },
    Delete {
        #[clap(short, long)]
        project: String,
        #[clap(short, long)]
        node: String,
    },
    /// Refresh expired media URLs from the provider
    Reconcile {
        #[clap(short, long)]
        project: String,
    },
    /// Print the emergency backup written by a failed save, if any
    Backup {
        #[clap(short, long)]
        project: String,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MediaArg {
    Image,
    Video,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(args.log_level);

    let mut config = MediagraphConfig::from_env();
    if let Some(data_dir) = args.data_dir {
        config.persistence.data_dir = data_dir;
    }
    if let Some(provider_url) = args.provider_url {
        config.provider.base_url = provider_url;
    }
    let context = AppContext::from_config(config)?;

    match args.command {
        Commands::Show { project } => {
            open(&context, &project).await?;
            let nodes = context.graph().nodes().await;
            let edges = context.graph().edges().await;
            let document = serde_json::json!({
                "project": context.active_project().await,
                "nodes": nodes,
                "edges": edges,
                "remainingCredits": context.orchestrator().remaining_credits().await,
            });
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::AddText { project, content } => {
            open(&context, &project).await?;
            let node = context.add_text(&content).await?;
            info!("Added text node {}", node.id);
            println!("{}", node.id);
        }
        Commands::Generate {
            project,
            kind,
            prompt,
            aspect_ratio,
            count,
        } => {
            open(&context, &project).await?;

            let (kind, derivation) = match kind {
                MediaArg::Image => (GenerationKind::Image, DerivationKind::TextToImage),
                MediaArg::Video => (GenerationKind::Video, DerivationKind::TextToVideo),
            };
            let mut params = GenerationParams::new(derivation, prompt).with_count(count);
            if let Some(ratio) = aspect_ratio {
                let ratio = AspectRatio::from_str(&ratio)
                    .map_err(|_| anyhow!("Unsupported aspect ratio: {}", ratio))?;
                params = params.with_aspect_ratio(ratio);
            }

            info!("Generating {} in project {}", kind, project);
            let handle = context.generate_new(kind, params).await?;
            match handle.wait().await {
                JobOutcome::Completed { node_ids } => {
                    for id in node_ids {
                        println!("{}", id);
                    }
                }
                JobOutcome::Failed(err) => warn!("Generation failed: {}", err.user_message()),
                JobOutcome::Superseded => warn!("Generation was superseded"),
            }
        }
        Commands::Delete { project, node } => {
            open(&context, &project).await?;
            let removed = context.delete_node(&node).await?;
            info!("Deleted {} node {}", removed.kind(), removed.id);
        }
        Commands::Reconcile { project } => {
            let load = context.open_project(&project).await?;
            if let Some(task) = load.reconcile {
                // Run in the foreground so the count can be reported
                task.abort();
            }
            let applied = context.reconcile_now().await?;
            println!("{}", applied);
        }
        Commands::Backup { project } => {
            match context.read_backup(&project)? {
                Some(snapshot) => println!("{}", snapshot.to_json()?),
                None => info!("No emergency backup for project {}", project),
            }
            return Ok(());
        }
    }

    match context.close_project().await? {
        Some(TeardownOutcome::BackedUp(err)) => {
            warn!("Project saved to emergency backup only: {}", err)
        }
        Some(TeardownOutcome::Saved) | None => {}
    }
    Ok(())
}

/// Open a project and let any interrupted jobs finish before continuing.
async fn open(context: &AppContext, project: &str) -> Result<()> {
    let load = context.open_project(project).await?;
    info!(
        "Opened project {} ({} nodes)",
        load.project.title, load.node_count
    );
    for job in load.resumed_jobs {
        let node_id = job.node_id.clone();
        let outcome = job.wait().await;
        info!("Resumed job for {} finished: {:?}", node_id, outcome);
    }
    if let Some(task) = load.reconcile {
        if let Err(err) = task.await {
            warn!("Background reconciliation did not finish: {}", err);
        }
    }
    Ok(())
}

fn default_directives(log_level: LogLevel) -> String {
    let level = Level::from(log_level).as_str().to_ascii_lowercase();
    format!("hyper=off,reqwest=warn,{}", level)
}

/// Full filter directives in `MEDIAGRAPH_LOG` take precedence over
/// `--log-level`, e.g. `MEDIAGRAPH_LOG=mediagraph::generation=trace,info`.
fn setup_logging(log_level: LogLevel) {
    let filter = std::env::var(LOG_FILTER_ENV)
        .ok()
        .and_then(|directives| match EnvFilter::try_new(&directives) {
            Ok(filter) => Some(filter),
            Err(err) => {
                eprintln!("Ignoring invalid {}: {}", LOG_FILTER_ENV, err);
                None
            }
        })
        .unwrap_or_else(|| EnvFilter::new(default_directives(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
