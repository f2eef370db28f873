//! `tap-airtable` is a Singer tap for Airtable.
//!
//! It has two modes:
//!
//! - **discovery** samples every configured table, infers a JSON schema per table from the
//!   observed field values, and prints a catalog ([`catalog::discover`]);
//! - **sync** replays every row of each selected stream as newline-delimited Singer `SCHEMA` and
//!   `RECORD` messages ([`sync::sync`]).
//!
//! Replication is always full-table; no state or bookmark is ever written.
//!
//! ## Type inference
//!
//! Each field value is classified by its text ([`schema::infer_type`]):
//!
//! - `null` or `""` → no type
//! - optionally signed digits (`"42"`, `"007"`) → `integer`
//! - parses as a float (`"3.14"`, `"1e3"`) → `number`
//! - anything else → `string`
//!
//! Booleans and dates have no dedicated types. Property names are normalized with
//! [`schema::normalize_field_name`] (`"Task Name"` → `"task_name"`).
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use tap_airtable::config::TapConfig;
//! use tap_airtable::observability::{NoopObserver, Telemetry};
//! use tap_airtable::runner::{run, RunOutcome, TapMode};
//! use tap_airtable::source::InMemorySource;
//! use tap_airtable::types::Row;
//!
//! let fields = json!({"Task Name": "Buy milk"}).as_object().cloned().unwrap();
//! let source = InMemorySource::new().with_table("Tasks", vec![Row::new("rec1", None, fields)]);
//! let config = TapConfig::new("key", "appBASE", vec!["Tasks".to_string()]);
//!
//! let mut out = Vec::new();
//! let outcome = run(
//!     &config,
//!     TapMode::Sync { catalog: None, state: None },
//!     &source,
//!     &mut out,
//!     Telemetry::new(&NoopObserver),
//! )
//! .unwrap();
//!
//! let RunOutcome::Synced(summary) = outcome else { unreachable!() };
//! assert_eq!(summary.records, 1);
//! assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`config`]: configuration loading and validation
//! - [`types`]: rows and the [`types::SchemaNode`] tree
//! - [`schema`]: name normalization and type inference
//! - [`source`]: the [`source::RowSource`] seam, Airtable HTTP client, in-memory source
//! - [`catalog`]: catalog entries, metadata, discovery
//! - [`protocol`]: Singer message writer
//! - [`sync`]: record flattening and emission
//! - [`observability`]: observer hooks and the telemetry handle
//! - [`runner`]: mode selection
//! - [`error`]: the shared error type

pub mod catalog;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod runner;
pub mod schema;
pub mod source;
pub mod sync;
pub mod types;

pub use error::{TapError, TapResult};
