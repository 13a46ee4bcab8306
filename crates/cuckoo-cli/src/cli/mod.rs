//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // File first, then environment and flags
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(address) = cli.address {
        config.cuckoo_address = address;
    }
    if let Some(proc_path) = cli.proc_path {
        config.cuckoo_proc_path = proc_path;
    }
    if let Some(ratings) = cli.ratings {
        config.ratings_path = ratings;
    }

    let ctx = commands::Context { config };

    match cli.command {
        Commands::Analyze(args) => commands::analyze::execute(ctx, args).await,
        Commands::Score(args) => commands::score::execute(&ctx, &args),
    }
}

/// Crates whose events are shown without `RUST_LOG`
const LOG_TARGETS: [&str; 4] = ["cuckoo_core", "cuckoo_client", "cuckoo_worker", "cuckoo_cli"];

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect();
        EnvFilter::new(directives.join(","))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
