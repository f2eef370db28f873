//! Mode selection for one tap invocation.
//!
//! ```no_run
//! use tap_airtable::config::TapConfig;
//! use tap_airtable::observability::{Telemetry, TracingObserver};
//! use tap_airtable::runner::{run, TapMode};
//! use tap_airtable::source::AirtableClient;
//!
//! # fn main() -> Result<(), tap_airtable::TapError> {
//! let config = TapConfig::from_path("config.json")?;
//! let client = AirtableClient::new(&config)?;
//! let observer = TracingObserver;
//! run(&config, TapMode::Discover, &client, std::io::stdout().lock(), Telemetry::new(&observer))?;
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::Value as JsonValue;

use crate::catalog::{Catalog, discover};
use crate::config::TapConfig;
use crate::error::TapResult;
use crate::observability::Telemetry;
use crate::protocol::MessageWriter;
use crate::source::RowSource;
use crate::sync::{SyncOptions, SyncSummary, sync};

/// What one invocation does.
#[derive(Debug, Clone, PartialEq)]
pub enum TapMode {
    /// Build the catalog and print it. No records are emitted.
    Discover,
    /// Emit schema and record messages. Without a saved catalog, discovery runs first.
    Sync {
        catalog: Option<Catalog>,
        state: Option<JsonValue>,
    },
}

/// Result of [`run`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Discovery printed this catalog.
    Discovered(Catalog),
    /// Sync finished.
    Synced(SyncSummary),
}

/// Run one invocation, writing protocol output to `out`.
pub fn run<W: Write>(
    config: &TapConfig,
    mode: TapMode,
    source: &dyn RowSource,
    mut out: W,
    telemetry: Telemetry<'_>,
) -> TapResult<RunOutcome> {
    match mode {
        TapMode::Discover => {
            let catalog = discover(config, source, telemetry)?;
            catalog.dump(&mut out)?;
            Ok(RunOutcome::Discovered(catalog))
        }
        TapMode::Sync { catalog, state } => {
            let catalog = match catalog {
                Some(catalog) => {
                    tracing::info!(streams = catalog.streams.len(), "using provided catalog");
                    catalog
                }
                None => discover(config, source, telemetry)?,
            };
            let mut writer = MessageWriter::new(out);
            let summary = sync(
                &catalog,
                state.as_ref(),
                source,
                SyncOptions::from_config(config),
                &mut writer,
                telemetry,
            )?;
            tracing::info!(
                streams = summary.streams.len(),
                records = summary.records,
                "sync complete"
            );
            Ok(RunOutcome::Synced(summary))
        }
    }
}

/// Load a saved state file. It must be valid JSON; its content is not interpreted.
pub fn load_state(path: impl AsRef<Path>) -> TapResult<JsonValue> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
