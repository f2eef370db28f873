//! tap-airtable: Singer tap that streams Airtable tables as newline-delimited JSON messages.
//!
//! Protocol output goes to stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tap_airtable::catalog::Catalog;
use tap_airtable::config::TapConfig;
use tap_airtable::observability::{CompositeObserver, FileObserver, TapObserver, Telemetry, TracingObserver};
use tap_airtable::runner::{TapMode, load_state, run};
use tap_airtable::source::AirtableClient;
use tap_airtable::TapResult;

/// Singer tap for Airtable.
#[derive(Parser, Debug)]
#[command(name = "tap-airtable")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Run discovery and print the catalog.
    #[arg(short, long)]
    discover: bool,

    /// Previously saved catalog to sync from (skips discovery).
    #[arg(long, conflicts_with = "discover")]
    catalog: Option<PathBuf>,

    /// Previously saved state (accepted, unused: replication is full-table).
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error, or a full EnvFilter directive).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append per-stream outcomes to this file.
    #[arg(long)]
    event_log: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "tap failed");
            ExitCode::FAILURE
        }
    }
}

fn execute(args: &Args) -> TapResult<()> {
    let config = TapConfig::from_path(&args.config)?;
    info!(base_id = %config.base_id, tables = config.tables.len(), "tap-airtable starting");

    let mode = if args.discover {
        TapMode::Discover
    } else {
        let catalog = args.catalog.as_ref().map(Catalog::from_path).transpose()?;
        let state = args.state.as_ref().map(load_state).transpose()?;
        TapMode::Sync { catalog, state }
    };

    let mut observers: Vec<Arc<dyn TapObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(path) = &args.event_log {
        observers.push(Arc::new(FileObserver::new(path)));
    }
    let observer = CompositeObserver::new(observers);

    let client = AirtableClient::new(&config)?;
    let stdout = std::io::stdout().lock();
    run(&config, mode, &client, stdout, Telemetry::new(&observer))?;
    Ok(())
}
