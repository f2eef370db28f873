//! In-memory row source.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::TapResult;
use crate::types::Row;

use super::{RowPages, RowSource};

/// Rows held in memory, keyed by table name. Unknown tables are empty.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    tables: HashMap<String, Vec<Row>>,
}

impl InMemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table.
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }

    /// Parse `{"<table>": [<row>, ...], ...}` where rows use the Airtable wire shape.
    pub fn from_json_str(input: &str) -> TapResult<Self> {
        let tables: HashMap<String, Vec<Row>> = serde_json::from_str(input)?;
        Ok(Self { tables })
    }

    /// Load the JSON layout accepted by [`Self::from_json_str`] from a file.
    pub fn from_path(path: impl AsRef<Path>) -> TapResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

impl RowSource for InMemorySource {
    fn all(&self, table: &str) -> TapResult<Vec<Row>> {
        Ok(self.rows(table).to_vec())
    }

    fn pages<'a>(&'a self, table: &str, page_size: usize) -> TapResult<RowPages<'a>> {
        let rows = self.rows(table);
        Ok(RowPages::new(rows.chunks(page_size.max(1)).map(|chunk| Ok(chunk.to_vec()))))
    }
}
