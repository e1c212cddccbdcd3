//! Operator CLI for the Kraken crawl scheduling engine (§6, §10.4).
//!
//! Thin assembly point only: it wires an [`InMemoryMetadataStore`] (persisted
//! to a local JSON file between invocations) and an [`InMemoryTaskDispatcher`]
//! together, it does not implement requests, pipelines, terminators or
//! callbacks itself — those are the deployment's own plugins.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod store_file;

#[derive(Debug, Parser)]
#[command(name = "kraken", version, about = "Operator CLI for the Kraken crawl scheduling engine")]
struct Cli {
    /// Path to the local JSON file backing this CLI's Targets/Series/Crawls
    /// across separate invocations. The in-memory store has no durability
    /// of its own; this file is the only thing that does.
    #[arg(long, global = true, default_value = "kraken-store.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bulk-imports Targets from a JSON records file, crossed with one or more languages.
    SetupTargets(commands::setup_targets::Args),
    /// Creates a Series from a name, stage blueprint files and an optional filter file.
    SetupSeries(commands::setup_series::Args),
    /// Prints a hand-written JSON-Schema description of the Stage blueprint shape.
    ShowStageSchema,
    /// Runs the Scheduler against one Series' next Crawl until the allocator drains.
    Daemon(commands::daemon::Args),
}

fn main() -> ExitCode {
    #[cfg(feature = "tracing")]
    init_tracing();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("error: failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> kraken::Result<()> {
    match cli.command {
        Commands::SetupTargets(args) => commands::setup_targets::run(&cli.store, args).await,
        Commands::SetupSeries(args) => commands::setup_series::run(&cli.store, args).await,
        Commands::ShowStageSchema => commands::show_stage_schema::run(),
        Commands::Daemon(args) => commands::daemon::run(&cli.store, args).await,
    }
}

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt::layer();
    tracing_subscriber::registry().with(fmt).with(env).init();
}
