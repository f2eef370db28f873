//! Singer message output.
//!
//! Every message is one JSON object on its own line:
//!
//! - `{"type":"SCHEMA","stream":...,"schema":...,"key_properties":[...]}`
//! - `{"type":"RECORD","stream":...,"record":{...}}`

use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::TapResult;
use crate::types::SchemaNode;

/// A Singer message borrowing its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message<'a> {
    /// Declares the schema of a stream; precedes its records.
    Schema {
        stream: &'a str,
        schema: &'a SchemaNode,
        key_properties: &'a [String],
    },
    /// One record of a stream.
    Record {
        stream: &'a str,
        record: &'a Map<String, JsonValue>,
    },
}

/// Line-oriented message writer. Each message is flushed as soon as it is written.
#[derive(Debug)]
pub struct MessageWriter<W: Write> {
    out: W,
    schemas_written: usize,
    records_written: usize,
}

impl<W: Write> MessageWriter<W> {
    /// Wrap an output sink.
    pub fn new(out: W) -> Self {
        Self {
            out,
            schemas_written: 0,
            records_written: 0,
        }
    }

    /// Write one message as a single line.
    pub fn write_message(&mut self, message: &Message<'_>) -> TapResult<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        match message {
            Message::Schema { .. } => self.schemas_written += 1,
            Message::Record { .. } => self.records_written += 1,
        }
        Ok(())
    }

    /// Write a `SCHEMA` message.
    pub fn write_schema(&mut self, stream: &str, schema: &SchemaNode, key_properties: &[String]) -> TapResult<()> {
        self.write_message(&Message::Schema {
            stream,
            schema,
            key_properties,
        })
    }

    /// Write a `RECORD` message.
    pub fn write_record(&mut self, stream: &str, record: &Map<String, JsonValue>) -> TapResult<()> {
        self.write_message(&Message::Record { stream, record })
    }

    /// Number of `SCHEMA` messages written.
    pub fn schemas_written(&self) -> usize {
        self.schemas_written
    }

    /// Number of `RECORD` messages written.
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Recover the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ScalarKind;

    #[test]
    fn messages_are_single_lines_in_singer_shape() {
        let mut w = MessageWriter::new(Vec::new());
        let schema = SchemaNode::Scalar(ScalarKind::String);
        let keys = vec!["airtable_id".to_string()];
        let mut record = Map::new();
        record.insert("airtable_id".to_string(), json!("rec1"));

        w.write_schema("tasks", &schema, &keys).unwrap();
        w.write_record("tasks", &record).unwrap();
        assert_eq!((w.schemas_written(), w.records_written()), (1, 1));

        let text = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"type":"SCHEMA","stream":"tasks","schema":{"type":"string"},"key_properties":["airtable_id"]}"#,
                r#"{"type":"RECORD","stream":"tasks","record":{"airtable_id":"rec1"}}"#,
            ]
        );
    }
}
