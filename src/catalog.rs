//! Catalog construction and (de)serialization.
//!
//! [`discover`] samples every configured table, infers its schema and assembles one
//! [`CatalogEntry`] per table. The resulting [`Catalog`] serializes to the Singer catalog layout
//! (`{"streams": [...]}`) and can be reloaded from it to skip rediscovery.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use crate::config::TapConfig;
use crate::error::{TapError, TapResult};
use crate::observability::{StreamContext, StreamStats, TapPhase, Telemetry};
use crate::schema::{ID_PROPERTY, infer_stream_schema, normalize_field_name};
use crate::source::RowSource;
use crate::types::SchemaNode;

/// Replication method written into every stream's metadata.
pub const FULL_TABLE: &str = "FULL_TABLE";

/// One Singer metadata entry: a breadcrumb path and the metadata at that path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// `[]` for the stream itself, `["properties", name]` for a property.
    pub breadcrumb: Vec<String>,
    /// Metadata key/values.
    pub metadata: Map<String, JsonValue>,
}

/// A stream schema with its selection metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stream identifier (normalized table name).
    pub tap_stream_id: String,
    /// Stream name, identical to `tap_stream_id`.
    pub stream: String,
    /// Remote table the stream reads from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Stream schema.
    pub schema: SchemaNode,
    /// Primary key properties.
    #[serde(default)]
    pub key_properties: Vec<String>,
    /// Breadcrumb metadata.
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

impl CatalogEntry {
    /// Build a full-table, auto-selected entry for `table`.
    pub fn new(stream_id: impl Into<String>, table: impl Into<String>, schema: SchemaNode) -> Self {
        let stream_id = stream_id.into();
        let key_properties = vec![ID_PROPERTY.to_string()];
        let metadata = standard_metadata(&schema, &key_properties);
        Self {
            tap_stream_id: stream_id.clone(),
            stream: stream_id,
            table_name: Some(table.into()),
            schema,
            key_properties,
            metadata,
        }
    }

    /// Table to read rows from. Catalogs without `table_name` fall back to the stream id.
    pub fn source_table(&self) -> &str {
        self.table_name.as_deref().unwrap_or(&self.tap_stream_id)
    }

    /// Stream-level (`[]` breadcrumb) metadata, if present.
    pub fn stream_metadata(&self) -> Option<&Map<String, JsonValue>> {
        self.metadata
            .iter()
            .find(|m| m.breadcrumb.is_empty())
            .map(|m| &m.metadata)
    }

    /// Whether the stream is selected for sync.
    ///
    /// Accepts `"selected": true` and the string form `"selected": "true"`.
    pub fn is_selected(&self) -> bool {
        match self.stream_metadata().and_then(|m| m.get("selected")) {
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// Singer standard metadata for a full-table stream, with every breadcrumb selected.
pub fn standard_metadata(schema: &SchemaNode, key_properties: &[String]) -> Vec<MetadataEntry> {
    let mut out = Vec::new();
    out.push(MetadataEntry {
        breadcrumb: Vec::new(),
        metadata: as_map(json!({
            "table-key-properties": key_properties,
            "forced-replication-method": FULL_TABLE,
            "inclusion": "available",
            "selected": true,
        })),
    });

    if let Some(props) = schema.properties() {
        for name in props.names() {
            let inclusion = if key_properties.iter().any(|k| k == name) {
                "automatic"
            } else {
                "available"
            };
            out.push(MetadataEntry {
                breadcrumb: vec!["properties".to_string(), name.to_string()],
                metadata: as_map(json!({ "inclusion": inclusion, "selected": true })),
            });
        }
    }
    out
}

fn as_map(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}

/// Ordered set of catalog entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Entries in configured table order.
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    /// Insert an entry, replacing one with the same `tap_stream_id` in place.
    ///
    /// Returns `true` if an existing entry was replaced.
    pub fn upsert(&mut self, entry: CatalogEntry) -> bool {
        match self
            .streams
            .iter_mut()
            .find(|e| e.tap_stream_id == entry.tap_stream_id)
        {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.streams.push(entry);
                false
            }
        }
    }

    /// Look up an entry by stream id.
    pub fn get_stream(&self, tap_stream_id: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|e| e.tap_stream_id == tap_stream_id)
    }

    /// Selected entries, in catalog order.
    pub fn selected_streams(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.streams.iter().filter(|e| e.is_selected())
    }

    /// Parse a catalog from JSON text.
    pub fn from_json_str(input: &str) -> TapResult<Self> {
        serde_json::from_str(input).map_err(|e| TapError::catalog(e.to_string()))
    }

    /// Load a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> TapResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Pretty-printed JSON with two-space indentation.
    pub fn to_pretty_json(&self) -> TapResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the pretty-printed catalog followed by a newline.
    pub fn dump<W: Write>(&self, out: &mut W) -> TapResult<()> {
        writeln!(out, "{}", self.to_pretty_json()?)?;
        out.flush()?;
        Ok(())
    }
}

/// Stream identifier for a configured table name.
pub fn stream_id_for_table(table: &str) -> TapResult<String> {
    let id = normalize_field_name(table);
    if id.is_empty() {
        return Err(TapError::config(format!(
            "table name '{table}' normalizes to an empty stream id"
        )));
    }
    Ok(id)
}

/// Sample every configured table and build the catalog.
///
/// Every table name is turned into a stream id before the first fetch, so an unusable name
/// fails discovery without touching the source. Tables are then processed in configured order,
/// one at a time. The first source error aborts discovery and is returned unmodified.
pub fn discover(config: &TapConfig, source: &dyn RowSource, telemetry: Telemetry<'_>) -> TapResult<Catalog> {
    tracing::info!(tables = config.tables.len(), "starting discovery");

    let stream_ids = config
        .tables
        .iter()
        .map(String::as_str)
        .map(stream_id_for_table)
        .collect::<TapResult<Vec<_>>>()?;

    let mut catalog = Catalog::default();
    for (table, stream_id) in config.tables.iter().zip(stream_ids) {
        let ctx = StreamContext {
            phase: TapPhase::Discover,
            table: table.clone(),
            stream: stream_id.clone(),
        };
        telemetry.start(&ctx);

        let rows = match source.all(table) {
            Ok(rows) => rows,
            Err(e) => {
                telemetry.failure(&ctx, &e);
                return Err(e);
            }
        };

        let schema = infer_stream_schema(table, &rows, config.type_merge);
        let properties = schema.properties().map_or(0, |p| p.len());
        telemetry.success(
            &ctx,
            StreamStats {
                rows: rows.len(),
                emitted: properties,
            },
        );

        if catalog.upsert(CatalogEntry::new(stream_id, table.as_str(), schema)) {
            tracing::warn!(table = %table, stream = %ctx.stream, "duplicate stream id; earlier entry replaced");
        }
    }

    tracing::info!(streams = catalog.streams.len(), "finished discovery");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::seed_properties;

    fn entry(stream: &str) -> CatalogEntry {
        CatalogEntry::new(
            stream,
            stream,
            SchemaNode::Object {
                nullable: true,
                properties: seed_properties(),
            },
        )
    }

    #[test]
    fn standard_metadata_marks_key_properties_automatic() {
        let e = entry("tasks");
        let stream_md = e.stream_metadata().unwrap();
        assert_eq!(stream_md["forced-replication-method"], json!("FULL_TABLE"));
        assert_eq!(stream_md["table-key-properties"], json!(["airtable_id"]));
        assert!(e.is_selected());

        let id_md = e
            .metadata
            .iter()
            .find(|m| m.breadcrumb == vec!["properties".to_string(), "airtable_id".to_string()])
            .unwrap();
        assert_eq!(id_md.metadata["inclusion"], json!("automatic"));

        let created_md = e
            .metadata
            .iter()
            .find(|m| m.breadcrumb == vec!["properties".to_string(), "created_time".to_string()])
            .unwrap();
        assert_eq!(created_md.metadata["inclusion"], json!("available"));
    }

    #[test]
    fn selection_accepts_string_true_and_rejects_missing() {
        let mut e = entry("tasks");
        e.metadata[0].metadata.insert("selected".to_string(), json!("true"));
        assert!(e.is_selected());

        e.metadata[0].metadata.insert("selected".to_string(), json!(false));
        assert!(!e.is_selected());

        e.metadata.clear();
        assert!(!e.is_selected());
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut catalog = Catalog::default();
        assert!(!catalog.upsert(entry("a")));
        assert!(!catalog.upsert(entry("b")));

        let mut replacement = entry("a");
        replacement.table_name = Some("A (v2)".to_string());
        assert!(catalog.upsert(replacement));

        let ids: Vec<&str> = catalog.streams.iter().map(|e| e.tap_stream_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(catalog.get_stream("a").unwrap().source_table(), "A (v2)");
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let mut catalog = Catalog::default();
        catalog.upsert(entry("tasks"));
        let text = catalog.to_pretty_json().unwrap();
        assert!(text.starts_with("{\n  \"streams\": ["));

        let reloaded = Catalog::from_json_str(&text).unwrap();
        assert_eq!(reloaded, catalog);
    }

    #[test]
    fn missing_table_name_falls_back_to_stream_id() {
        let text = r#"{"streams":[{"tap_stream_id":"Tasks","stream":"Tasks","schema":{"type":"object","properties":{}},"key_properties":["airtable_id"],"metadata":[{"breadcrumb":[],"metadata":{"selected":"true"}}]}]}"#;
        let catalog = Catalog::from_json_str(text).unwrap();
        let e = &catalog.streams[0];
        assert_eq!(e.source_table(), "Tasks");
        assert_eq!(catalog.selected_streams().count(), 1);
    }

    #[test]
    fn empty_stream_id_is_a_config_error() {
        let err = stream_id_for_table("2024").unwrap_err();
        assert!(err.to_string().contains("normalizes to an empty stream id"));
        assert_eq!(stream_id_for_table("My Tasks").unwrap(), "my_tasks");
    }
}
