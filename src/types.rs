//! Core data model types.
//!
//! Rows arrive from a [`crate::source::RowSource`] as [`Row`]s. Discovery turns a sample of rows
//! into a [`SchemaNode`] tree, which serializes to (and reloads from) the JSON Schema subset the
//! Singer protocol carries.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue, json};

use crate::error::{TapError, TapResult};

/// One remote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Opaque record identifier assigned by the remote source.
    pub id: String,
    /// Creation timestamp as reported by the source (RFC 3339 text).
    #[serde(rename = "createdTime", default)]
    pub created_time: Option<String>,
    /// Sparse field map; absent fields are simply missing.
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

impl Row {
    /// Create a row.
    pub fn new(id: impl Into<String>, created_time: Option<String>, fields: Map<String, JsonValue>) -> Self {
        Self {
            id: id.into(),
            created_time,
            fields,
        }
    }
}

/// Scalar type inferred from an observed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// JSON `null`.
    Null,
    /// Whole number.
    Integer,
    /// Floating point number.
    Number,
    /// Anything else.
    String,
}

impl ScalarKind {
    /// JSON Schema type keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
        }
    }

    /// Parse a JSON Schema type keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "null" => Some(Self::Null),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    /// Smallest kind that admits both `self` and `other`.
    ///
    /// `integer` widens to `number`; any other disagreement widens to `string`.
    pub fn widen(self, other: ScalarKind) -> ScalarKind {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Null, x) | (x, Self::Null) => x,
            (Self::Integer, Self::Number) | (Self::Number, Self::Integer) => Self::Number,
            _ => Self::String,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered mapping of property name to schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, SchemaNode)>,
}

impl Properties {
    /// Create an empty property list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, replacing an existing one in place (position is kept).
    pub fn insert(&mut self, name: impl Into<String>, node: SchemaNode) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = node,
            None => self.entries.push((name, node)),
        }
    }

    /// Look up a property by name.
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    /// Returns `true` if the property exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate property names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate `(name, schema)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.entries.iter().map(|(n, node)| (n.as_str(), node))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Schema tree for a stream.
///
/// Serializes to JSON Schema:
///
/// | variant | JSON |
/// |---|---|
/// | `Any` | `{}` |
/// | `Scalar(k)` | `{"type": "k"}` |
/// | `NullableUnion` | `{"type": ["null", ...], "format"?: "..."}` |
/// | `AnyOf` | `{"anyOf": [...]}` |
/// | `Object` | `{"type": "object" or ["null","object"], "additionalProperties": false, "properties": {...}}` |
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// No usable type information (never observed with a value).
    Any,
    /// Exactly one non-nullable kind.
    Scalar(ScalarKind),
    /// `null` or any of `kinds`.
    NullableUnion {
        kinds: Vec<ScalarKind>,
        format: Option<String>,
    },
    /// Valid if any alternative is valid.
    AnyOf(Vec<SchemaNode>),
    /// Object with a fixed, ordered property set.
    Object { nullable: bool, properties: Properties },
}

impl SchemaNode {
    /// `["null", kind]` without a format.
    pub fn nullable(kind: ScalarKind) -> Self {
        Self::NullableUnion {
            kinds: vec![kind],
            format: None,
        }
    }

    /// Properties of an object node.
    pub fn properties(&self) -> Option<&Properties> {
        match self {
            Self::Object { properties, .. } => Some(properties),
            _ => None,
        }
    }

    /// Render as a JSON Schema value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Any => JsonValue::Object(Map::new()),
            Self::Scalar(kind) => json!({ "type": kind.as_str() }),
            Self::NullableUnion { kinds, format } => {
                let mut types = vec![JsonValue::from("null")];
                types.extend(
                    kinds
                        .iter()
                        .filter(|k| **k != ScalarKind::Null)
                        .map(|k| JsonValue::from(k.as_str())),
                );
                let mut out = Map::new();
                out.insert("type".to_string(), JsonValue::Array(types));
                if let Some(format) = format {
                    out.insert("format".to_string(), JsonValue::from(format.as_str()));
                }
                JsonValue::Object(out)
            }
            Self::AnyOf(nodes) => json!({ "anyOf": nodes.iter().map(SchemaNode::to_json).collect::<Vec<_>>() }),
            Self::Object { nullable, properties } => {
                let type_value = if *nullable {
                    json!(["null", "object"])
                } else {
                    json!("object")
                };
                let props: Map<String, JsonValue> = properties
                    .iter()
                    .map(|(name, node)| (name.to_string(), node.to_json()))
                    .collect();
                json!({
                    "type": type_value,
                    "additionalProperties": false,
                    "properties": props,
                })
            }
        }
    }

    /// Parse the JSON Schema subset produced by [`Self::to_json`].
    pub fn from_json(value: &JsonValue) -> TapResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| TapError::catalog(format!("schema must be a json object, got {value}")))?;

        if let Some(any_of) = obj.get("anyOf") {
            let items = any_of
                .as_array()
                .ok_or_else(|| TapError::catalog("'anyOf' must be an array"))?;
            return items.iter().map(SchemaNode::from_json).collect::<TapResult<Vec<_>>>().map(Self::AnyOf);
        }

        let format = obj.get("format").and_then(JsonValue::as_str).map(str::to_string);
        let Some(type_value) = obj.get("type") else {
            return Ok(Self::Any);
        };

        let type_names: Vec<&str> = match type_value {
            JsonValue::String(s) => vec![s.as_str()],
            JsonValue::Array(items) => items
                .iter()
                .map(|t| {
                    t.as_str()
                        .ok_or_else(|| TapError::catalog(format!("schema type entries must be strings, got {t}")))
                })
                .collect::<TapResult<_>>()?,
            other => return Err(TapError::catalog(format!("unsupported schema 'type' value {other}"))),
        };

        let nullable = type_names.contains(&"null");
        if type_names.contains(&"object") {
            let mut properties = Properties::new();
            if let Some(props) = obj.get("properties") {
                let props = props
                    .as_object()
                    .ok_or_else(|| TapError::catalog("'properties' must be an object"))?;
                for (name, node) in props {
                    properties.insert(name.clone(), SchemaNode::from_json(node)?);
                }
            }
            return Ok(Self::Object { nullable, properties });
        }

        let mut kinds = Vec::with_capacity(type_names.len());
        for name in type_names.iter().filter(|t| **t != "null") {
            let kind = ScalarKind::from_keyword(name)
                .ok_or_else(|| TapError::catalog(format!("unsupported schema type '{name}'")))?;
            kinds.push(kind);
        }

        if nullable {
            return Ok(Self::NullableUnion { kinds, format });
        }
        match kinds.as_slice() {
            [kind] => Ok(Self::Scalar(*kind)),
            [] => Err(TapError::catalog("schema 'type' is empty")),
            _ => Err(TapError::catalog(format!(
                "non-nullable multi-type unions are not supported: {type_value}"
            ))),
        }
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        SchemaNode::from_json(&value).map_err(serde::de::Error::custom)
    }
}
