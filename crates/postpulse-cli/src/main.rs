mod analyze;
mod report;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "postpulse")]
#[command(about = "Estimate recent posting activity from profile page snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the page snapshot comes from.
#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub(crate) struct SourceArgs {
    /// Saved HTML page on disk
    #[arg(long)]
    file: Option<PathBuf>,

    /// Page URL to fetch
    #[arg(long)]
    url: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze one snapshot and print the result
    Analyze {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Do not write the result to the history file
        #[arg(long)]
        no_save: bool,
    },
    /// Re-analyze a source at a fixed interval, recording every result
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between analyses
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,

        /// Stop after this many analyses (runs until interrupted if omitted)
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Show the most recent recorded analysis
    Last {
        #[arg(long)]
        json: bool,
    },
    /// List recorded analyses, newest first
    History {
        #[arg(long, default_value_t = postpulse_store::HISTORY_CAP)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
    /// Delete recorded analyses
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = postpulse_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let store = postpulse_store::HistoryStore::new(&config.history_path);

    match cli.command {
        Commands::Analyze {
            source,
            json,
            no_save,
        } => analyze::run_analyze(&config, &store, &source, json, no_save).await,
        Commands::Watch {
            source,
            interval_secs,
            iterations,
        } => analyze::run_watch(&config, &store, &source, interval_secs, iterations).await,
        Commands::Last { json } => report::run_last(&store, config.window_hours, json).await,
        Commands::History { limit, json } => report::run_history(&store, limit, json).await,
        Commands::Clear => report::run_clear(&store).await,
    }
}
