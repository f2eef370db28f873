use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::config::TypeMerge;
use crate::types::{Properties, Row, ScalarKind, SchemaNode};

use super::normalize::normalize_field_name;

/// Property holding the remote record id.
pub const ID_PROPERTY: &str = "airtable_id";

/// Property holding the remote creation timestamp.
pub const CREATED_TIME_PROPERTY: &str = "created_time";

/// Infer the scalar kind of one observed value.
///
/// Returns `None` for `null` and the empty string. Otherwise the value's text (strings as-is,
/// everything else as its JSON text) is classified as `integer` if it is an optionally signed
/// run of ASCII digits (leading zeros allowed), `number` if it parses as a float, and `string`
/// otherwise. Booleans and dates have no dedicated kinds and land on `string`.
pub fn infer_type(value: &JsonValue) -> Option<ScalarKind> {
    let text: Cow<'_, str> = match value {
        JsonValue::Null => return None,
        JsonValue::String(s) if s.is_empty() => return None,
        JsonValue::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    };

    let trimmed = text.trim();
    if is_integer_text(trimmed) {
        Some(ScalarKind::Integer)
    } else if trimmed.parse::<f64>().is_ok() {
        Some(ScalarKind::Number)
    } else {
        Some(ScalarKind::String)
    }
}

fn is_integer_text(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// The two properties every stream schema starts with.
pub fn seed_properties() -> Properties {
    let mut props = Properties::new();
    props.insert(ID_PROPERTY, SchemaNode::Scalar(ScalarKind::String));
    props.insert(
        CREATED_TIME_PROPERTY,
        SchemaNode::AnyOf(vec![
            SchemaNode::NullableUnion {
                kinds: vec![ScalarKind::String],
                format: Some("date-time".to_string()),
            },
            SchemaNode::nullable(ScalarKind::String),
        ]),
    );
    props
}

/// Incremental schema builder over a stream of rows.
#[derive(Debug, Clone)]
pub struct SchemaInferrer {
    merge: TypeMerge,
    fields: Vec<(String, Option<ScalarKind>)>,
    index: HashMap<String, usize>,
    rows_seen: usize,
}

impl SchemaInferrer {
    /// Create an empty inferrer.
    pub fn new(merge: TypeMerge) -> Self {
        Self {
            merge,
            fields: Vec::new(),
            index: HashMap::new(),
            rows_seen: 0,
        }
    }

    /// Number of rows observed so far.
    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    /// Observe every field of `row`.
    pub fn observe_row(&mut self, row: &Row) {
        self.rows_seen += 1;
        for (name, value) in &row.fields {
            self.observe(name, value);
        }
    }

    /// Observe one field value. The name is normalized here; names that normalize to nothing
    /// (`"123"`, `"$"`) cannot become properties and are skipped.
    pub fn observe(&mut self, name: &str, value: &JsonValue) {
        let normalized = normalize_field_name(name);
        if normalized.is_empty() {
            tracing::debug!(field = name, "field name normalizes to nothing; ignored");
            return;
        }
        if normalized == ID_PROPERTY || normalized == CREATED_TIME_PROPERTY {
            tracing::debug!(field = name, "field shadows a seeded property; ignored");
            return;
        }

        let observed = infer_type(value);
        let i = match self.index.get(&normalized) {
            Some(&i) => i,
            None => {
                let i = self.fields.len();
                self.index.insert(normalized.clone(), i);
                self.fields.push((normalized, None));
                i
            }
        };

        let Some(kind) = observed else {
            return;
        };
        let slot = &mut self.fields[i].1;
        *slot = match (self.merge, *slot) {
            (TypeMerge::Widen, Some(existing)) => Some(existing.widen(kind)),
            _ => Some(kind),
        };
    }

    /// Build the object schema: seeded properties first, then fields in first-seen order.
    pub fn finish(self) -> SchemaNode {
        let mut properties = seed_properties();
        for (name, kind) in self.fields {
            let node = match kind {
                Some(kind) => SchemaNode::nullable(kind),
                None => SchemaNode::Any,
            };
            properties.insert(name, node);
        }
        SchemaNode::Object {
            nullable: true,
            properties,
        }
    }
}

/// Infer the schema of `table` from a full sample of its rows.
pub fn infer_stream_schema(table: &str, rows: &[Row], merge: TypeMerge) -> SchemaNode {
    let mut inferrer = SchemaInferrer::new(merge);
    for row in rows {
        inferrer.observe_row(row);
    }
    tracing::debug!(table, rows = inferrer.rows_seen(), fields = inferrer.fields.len(), "sampled table");
    inferrer.finish()
}
