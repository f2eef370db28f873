//! Airtable REST API client.
//!
//! Lists records with `GET {api_url}/v0/{base_id}/{table}?pageSize=N&offset=...`, following the
//! `offset` cursor until the response omits it. A `429 Too Many Requests` answer is waited out
//! and repeated a bounded number of times; every other error status is returned as-is.

use std::fmt;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::config::{MAX_PAGE_SIZE, TapConfig};
use crate::error::{TapError, TapResult};
use crate::types::Row;

use super::{RowPages, RowSource};

/// One page of the list-records response.
#[derive(Debug, Deserialize)]
pub(crate) struct ListRecordsPage {
    #[serde(default)]
    pub(crate) records: Vec<Row>,
    #[serde(default)]
    pub(crate) offset: Option<String>,
}

/// How rate-limited requests are repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Repeats allowed for one request after the first `429`.
    pub max_retries: u32,
    /// Wait between attempts when the response carries no `Retry-After`.
    pub backoff: Duration,
}

impl RateLimitPolicy {
    /// Policy taken from the tap configuration.
    pub fn from_config(config: &TapConfig) -> Self {
        Self {
            max_retries: config.rate_limit_retries,
            backoff: config.rate_limit_backoff(),
        }
    }

    /// Wait before the next attempt. A `Retry-After` in seconds wins over the configured backoff.
    fn delay(&self, response: &Response) -> Duration {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(self.backoff, Duration::from_secs)
    }
}

/// Blocking client for one Airtable base.
pub struct AirtableClient {
    http: Client,
    api_url: String,
    base_id: String,
    api_key: String,
    rate_limit: RateLimitPolicy,
}

impl fmt::Debug for AirtableClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirtableClient")
            .field("api_url", &self.api_url)
            .field("base_id", &self.base_id)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

impl AirtableClient {
    /// Build a client from the tap configuration.
    pub fn new(config: &TapConfig) -> TapResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("tap-airtable/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            base_id: config.base_id.clone(),
            api_key: config.api_key.clone(),
            rate_limit: RateLimitPolicy::from_config(config),
        })
    }

    /// URL of the list-records endpoint for `table`.
    pub fn table_url(&self, table: &str, page_size: usize, offset: Option<&str>) -> TapResult<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| TapError::config(format!("invalid api_url '{}': {e}", self.api_url)))?;
        url.path_segments_mut()
            .map_err(|_| TapError::config(format!("api_url '{}' cannot be a base", self.api_url)))?
            .pop_if_empty()
            .extend(["v0", self.base_id.as_str(), table]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &page_size.to_string());
            if let Some(offset) = offset {
                query.append_pair("offset", offset);
            }
        }
        Ok(url)
    }

    fn fetch_page(&self, table: &str, page_size: usize, offset: Option<&str>) -> TapResult<ListRecordsPage> {
        let url = self.table_url(table, page_size, offset)?;
        tracing::debug!(table, offset = ?offset, "fetching page");

        let mut retries = 0u32;
        loop {
            let response = self.http.get(url.clone()).bearer_auth(&self.api_key).send()?;
            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries < self.rate_limit.max_retries {
                retries += 1;
                let wait = self.rate_limit.delay(&response);
                tracing::warn!(
                    table,
                    retry = retries,
                    max_retries = self.rate_limit.max_retries,
                    wait_secs = wait.as_secs_f64(),
                    "rate limited; backing off"
                );
                thread::sleep(wait);
                continue;
            }
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(api_error(status.as_u16(), &body));
            }
            return Ok(response.json::<ListRecordsPage>()?);
        }
    }
}

impl RowSource for AirtableClient {
    fn all(&self, table: &str) -> TapResult<Vec<Row>> {
        let mut rows = Vec::new();
        for page in self.pages(table, MAX_PAGE_SIZE)? {
            rows.extend(page?);
        }
        Ok(rows)
    }

    fn pages<'a>(&'a self, table: &str, page_size: usize) -> TapResult<RowPages<'a>> {
        Ok(RowPages::new(AirtablePages {
            client: self,
            table: table.to_string(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            next_offset: None,
            done: false,
        }))
    }
}

struct AirtablePages<'a> {
    client: &'a AirtableClient,
    table: String,
    page_size: usize,
    next_offset: Option<String>,
    done: bool,
}

impl Iterator for AirtablePages<'_> {
    type Item = TapResult<Vec<Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self
            .client
            .fetch_page(&self.table, self.page_size, self.next_offset.as_deref())
        {
            Ok(page) => {
                self.next_offset = page.offset;
                self.done = self.next_offset.is_none();
                Some(Ok(page.records))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Turn an error response into [`TapError::Api`].
///
/// Airtable reports errors as `{"error": {"type": ..., "message": ...}}`, `{"error": "NOT_FOUND"}`
/// or, for 422 and 429, `{"errors": [{"error": ..., "message": ...}]}`. Only the first entry of
/// `errors` is used. Anything else is passed through as text.
pub(crate) fn api_error(status: u16, body: &str) -> TapError {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(structured_message)
        .unwrap_or_else(|| body.trim().to_string());
    TapError::Api { status, message }
}

fn structured_message(v: &serde_json::Value) -> Option<String> {
    match v.get("error") {
        Some(serde_json::Value::String(kind)) => return Some(kind.clone()),
        Some(serde_json::Value::Object(err)) => return Some(kind_and_message(err, "type")),
        _ => {}
    }
    let first = v.get("errors")?.as_array()?.first()?.as_object()?;
    Some(kind_and_message(first, "error"))
}

fn kind_and_message(err: &serde_json::Map<String, serde_json::Value>, kind_key: &str) -> String {
    let kind = err.get(kind_key).and_then(|t| t.as_str()).unwrap_or("UNKNOWN");
    match err.get("message").and_then(|m| m.as_str()) {
        Some(msg) => format!("{kind}: {msg}"),
        None => kind.to_string(),
    }
}
