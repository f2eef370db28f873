//! Row sources.
//!
//! A [`RowSource`] is the only seam between the tap and the remote service. Discovery samples a
//! table with [`RowSource::all`]; sync walks it page by page with [`RowSource::pages`].
//!
//! - [`airtable`]: HTTP client for the Airtable REST API
//! - [`memory`]: in-memory source, used by tests and for replaying captured tables

pub mod airtable;
pub mod memory;

use std::fmt;

use crate::error::TapResult;
use crate::types::Row;

pub use airtable::{AirtableClient, RateLimitPolicy};
pub use memory::InMemorySource;

/// Lazy, finite, non-restartable sequence of row batches.
///
/// Each item is one page. After an `Err` item the sequence ends.
pub struct RowPages<'a> {
    inner: Box<dyn Iterator<Item = TapResult<Vec<Row>>> + 'a>,
}

impl<'a> RowPages<'a> {
    /// Wrap any iterator of pages.
    pub fn new(inner: impl Iterator<Item = TapResult<Vec<Row>>> + 'a) -> Self {
        Self { inner: Box::new(inner) }
    }
}

impl fmt::Debug for RowPages<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowPages").finish_non_exhaustive()
    }
}

impl Iterator for RowPages<'_> {
    type Item = TapResult<Vec<Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Access to the rows of remote tables.
///
/// Implementations own authentication, pagination and rate-limit backoff. Every other error is
/// returned unmodified to the caller; nothing above this layer retries.
pub trait RowSource {
    /// Every row of `table`, fetched eagerly. Order is unspecified.
    fn all(&self, table: &str) -> TapResult<Vec<Row>>;

    /// Rows of `table` in pages of at most `page_size`, in source order.
    fn pages<'a>(&'a self, table: &str, page_size: usize) -> TapResult<RowPages<'a>>;
}
