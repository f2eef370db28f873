//! Record emission.
//!
//! For every selected stream, in catalog order: one `SCHEMA` message, then one `RECORD` message
//! per source row, in source order. Records are written as each page arrives. Replication is
//! always full-table, so no state or bookmark is ever written.

use std::io::Write;

use serde_json::{Map, Value as JsonValue};

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::TapConfig;
use crate::error::TapResult;
use crate::observability::{StreamContext, StreamStats, TapPhase, Telemetry};
use crate::protocol::MessageWriter;
use crate::schema::{CREATED_TIME_PROPERTY, ID_PROPERTY, normalize_field_name};
use crate::source::RowSource;
use crate::types::Row;

/// Options for the record emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Rows requested per page.
    pub page_size: usize,
    /// Normalize record keys the way schema properties are normalized.
    pub normalize_record_keys: bool,
}

impl SyncOptions {
    /// Options taken from the tap configuration.
    pub fn from_config(config: &TapConfig) -> Self {
        Self {
            page_size: config.page_size,
            normalize_record_keys: config.normalize_record_keys,
        }
    }
}

/// Per-run totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Streams synced, in order.
    pub streams: Vec<String>,
    /// Record messages written across all streams.
    pub records: usize,
}

/// Flatten a row into a single-level record.
///
/// The record holds `airtable_id`, `created_time` and every field of the row. Field keys are
/// kept as-is unless `normalize_keys` is set; normalized keys that come out empty are dropped,
/// matching the schema, which has no property for them. Fields that would land on `airtable_id`
/// or `created_time` are dropped so the identifier and timestamp always come from the row itself.
pub fn flatten_row(row: &Row, normalize_keys: bool) -> Map<String, JsonValue> {
    let mut record = Map::with_capacity(row.fields.len() + 2);
    record.insert(ID_PROPERTY.to_string(), JsonValue::String(row.id.clone()));
    record.insert(
        CREATED_TIME_PROPERTY.to_string(),
        row.created_time.clone().map_or(JsonValue::Null, JsonValue::String),
    );

    for (field, value) in &row.fields {
        let key = if normalize_keys {
            normalize_field_name(field)
        } else {
            field.clone()
        };
        if key.is_empty() {
            tracing::debug!(record = %row.id, field = %field, "field name normalizes to nothing; dropped");
            continue;
        }
        if key == ID_PROPERTY || key == CREATED_TIME_PROPERTY {
            tracing::debug!(record = %row.id, field = %field, "field shadows a reserved key; dropped");
            continue;
        }
        record.insert(key, value.clone());
    }
    record
}

/// Emit one stream: its schema, then every row of its table. Returns the number of records.
pub fn sync_stream<W: Write>(
    entry: &CatalogEntry,
    source: &dyn RowSource,
    options: SyncOptions,
    writer: &mut MessageWriter<W>,
) -> TapResult<usize> {
    writer.write_schema(&entry.tap_stream_id, &entry.schema, &entry.key_properties)?;

    let mut records = 0usize;
    for page in source.pages(entry.source_table(), options.page_size)? {
        for row in page? {
            let record = flatten_row(&row, options.normalize_record_keys);
            writer.write_record(&entry.tap_stream_id, &record)?;
            records += 1;
        }
    }
    Ok(records)
}

/// Sync every selected stream of `catalog` in order.
///
/// `state` is accepted for interface compatibility and ignored. The first error aborts the
/// run; streams already written stay written.
pub fn sync<W: Write>(
    catalog: &Catalog,
    state: Option<&JsonValue>,
    source: &dyn RowSource,
    options: SyncOptions,
    writer: &mut MessageWriter<W>,
    telemetry: Telemetry<'_>,
) -> TapResult<SyncSummary> {
    if let Some(state) = state {
        tracing::debug!(state = %state, "ignoring state; replication is full-table");
    }

    let mut summary = SyncSummary::default();
    for entry in catalog.selected_streams() {
        let ctx = StreamContext {
            phase: TapPhase::Sync,
            table: entry.source_table().to_string(),
            stream: entry.tap_stream_id.clone(),
        };
        telemetry.start(&ctx);

        match sync_stream(entry, source, options, writer) {
            Ok(records) => {
                telemetry.success(&ctx, StreamStats { rows: records, emitted: records });
                summary.streams.push(entry.tap_stream_id.clone());
                summary.records += records;
            }
            Err(e) => {
                telemetry.failure(&ctx, &e);
                return Err(e);
            }
        }
    }
    Ok(summary)
}
