//! Command-line entry point for the FRB search dispatcher.
//!
//! Watches a directory for incoming data files and runs one search process
//! per file, recording each result in a completion log so restarts skip
//! files that were already searched.
//!
//! # Usage
//!
//! ```bash
//! frb-watch [OPTIONS] <CONFIG>
//!
//! # Search the backlog and every new file until Ctrl-C
//! frb-watch search.yaml
//!
//! # Search only what is already there, then exit
//! frb-watch --no-real-time search.yaml
//!
//! # Ignore the backlog and point at another directory
//! frb-watch --no-pre-existing --search-dir /data/tonight search.yaml
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::fs::File;
use std::io;
use std::process::ExitCode;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use frb_core::SearchConfig;
use frb_dispatch::{CommandProcessor, Engine, PARAMETERS_ENV, RunOptions};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Dispatch FRB searches for files arriving in a directory.
///
/// Files that existed at startup are searched first, then every new file as
/// it appears. Each result is appended to the completion log in the output
/// directory.
#[derive(Debug, Parser)]
#[command(name = "frb-watch", version, about, long_about = None)]
struct Cli {
    /// YAML configuration document.
    #[arg(required_unless_present = "run_search")]
    config: Option<Utf8PathBuf>,

    /// Directory to search, overriding `search_directory` in the configuration.
    #[arg(short = 'd', long, env = "FRB_SEARCH_DIR")]
    search_dir: Option<Utf8PathBuf>,

    /// Do not watch for new files; exit once the backlog is searched.
    #[arg(long)]
    no_real_time: bool,

    /// Do not search files that already exist at startup.
    #[arg(long)]
    no_pre_existing: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Search a single file and exit. Used for per-file search processes.
    ///
    /// Search processes inherit the dispatcher's environment, so
    /// `FRB_SEARCH_DIR` may be set here and is ignored.
    #[arg(
        long,
        value_name = "FILE",
        hide = true,
        conflicts_with_all = ["config", "no_real_time", "no_pre_existing"]
    )]
    run_search: Option<Utf8PathBuf>,
}

impl Cli {
    const fn run_options(&self) -> RunOptions {
        RunOptions {
            pre_existing: !self.no_pre_existing,
            real_time: !self.no_real_time,
        }
    }
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects `RUST_LOG` if set. Otherwise uses `debug` with `--verbose` and
/// `info` by default. Output goes to stderr so search processes started in
/// worker mode keep stdout to themselves.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn,notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var_os("NO_COLOR").is_none();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(io::stderr),
        )
        .with(filter)
        .init();
}

/// Loads the configuration document and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the document cannot be read or parsed, or if any
/// option is invalid after the overrides are applied.
fn build_config(cli: &Cli) -> color_eyre::Result<SearchConfig> {
    let Some(path) = cli.config.as_deref() else {
        return Err(color_eyre::eyre::eyre!(
            "a configuration document is required"
        ));
    };

    let mut config = SearchConfig::load(path)?;
    if let Some(dir) = &cli.search_dir {
        config = config.with_search_directory(dir.clone());
    }
    Ok(config.resolve()?)
}

/// Resolves once the process is asked to stop: Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs the dispatcher until the work is done or a stop signal arrives.
///
/// # Errors
///
/// Returns an error if the run cannot start or fails fatally.
async fn run_dispatcher(config: SearchConfig, options: RunOptions) -> color_eyre::Result<()> {
    let processor = CommandProcessor::from_config(&config.dispatch)?;
    info!(
        program = processor.program(),
        timeout_secs = processor.timeout().map(|t| t.as_secs()),
        "Search command ready"
    );

    let summary = Engine::new(config, processor, options)
        .run(shutdown_signal())
        .await?;

    if summary.stats.faulted > 0 {
        warn!(
            faulted = summary.stats.faulted,
            "Some searches did not run to completion"
        );
    }
    Ok(())
}

/// Worker mode: searches one file in this process.
///
/// The exit code is the result code the dispatcher records.
fn run_search(file: &Utf8Path) -> ExitCode {
    match search_file(file) {
        Ok(bytes) => {
            info!(path = %file, bytes, "Search complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(path = %file, error = %format!("{err:#}"), "Search failed");
            ExitCode::FAILURE
        }
    }
}

fn search_file(file: &Utf8Path) -> anyhow::Result<u64> {
    let parameters: Map<String, Value> = match std::env::var(PARAMETERS_ENV) {
        Ok(json) => serde_json::from_str(&json)
            .with_context(|| format!("{PARAMETERS_ENV} is not a JSON object"))?,
        Err(_) => Map::new(),
    };
    debug!(path = %file, parameters = parameters.len(), "Reading data file");

    let mut data = File::open(file).with_context(|| format!("cannot open {file}"))?;
    io::copy(&mut data, &mut io::sink()).with_context(|| format!("cannot read {file}"))
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Worker mode searches one file and reports through the exit code
    if let Some(file) = &cli.run_search {
        return Ok(run_search(file));
    }

    // 5. Everything else is a dispatcher run
    let config = build_config(&cli)?;
    run_dispatcher(config, cli.run_options()).await?;
    Ok(ExitCode::SUCCESS)
}
