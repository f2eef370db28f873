//! Tap configuration.
//!
//! Configuration is a JSON object. `api_key`, `base_id` and `tables` are required; every other
//! key has a default.
//!
//! ```
//! use tap_airtable::config::{TapConfig, TypeMerge};
//!
//! # fn main() -> Result<(), tap_airtable::TapError> {
//! let cfg = TapConfig::from_json_str(
//!     r#"{"api_key": "key", "base_id": "app123", "tables": ["Tasks"]}"#,
//! )?;
//! assert_eq!(cfg.page_size, 100);
//! assert_eq!(cfg.type_merge, TypeMerge::Widen);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{TapError, TapResult};
use crate::schema::normalize_field_name;

/// Keys that must be present in every configuration.
pub const REQUIRED_CONFIG_KEYS: [&str; 3] = ["api_key", "base_id", "tables"];

/// Airtable's maximum page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// How conflicting types observed for one field across rows are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeMerge {
    /// Widen across the whole sample (`integer` + `number` = `number`, anything + `string` = `string`).
    #[default]
    Widen,
    /// The last non-empty observation decides.
    LastWins,
}

/// Parsed tap configuration.
#[derive(Clone, PartialEq, Deserialize)]
pub struct TapConfig {
    /// Personal access token / API key.
    pub api_key: String,
    /// Base identifier (`app...`).
    pub base_id: String,
    /// Table names, in the order streams should be discovered and synced.
    pub tables: Vec<String>,
    /// API root.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Rows requested per page during sync.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Cross-row type reconciliation during discovery.
    #[serde(default)]
    pub type_merge: TypeMerge,
    /// Normalize field keys of emitted records the same way schema properties are.
    #[serde(default)]
    pub normalize_record_keys: bool,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How many times one request is repeated after a `429 Too Many Requests`.
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
    /// Wait before repeating a rate-limited request, unless the response names its own.
    /// Airtable locks a base out for 30 seconds after the limit is hit.
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
}

fn default_api_url() -> String {
    "https://api.airtable.com".to_string()
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_retries() -> u32 {
    3
}

fn default_rate_limit_backoff_secs() -> u64 {
    30
}

impl fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapConfig")
            .field("api_key", &"<redacted>")
            .field("base_id", &self.base_id)
            .field("tables", &self.tables)
            .field("api_url", &self.api_url)
            .field("page_size", &self.page_size)
            .field("type_merge", &self.type_merge)
            .field("normalize_record_keys", &self.normalize_record_keys)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("rate_limit_retries", &self.rate_limit_retries)
            .field("rate_limit_backoff_secs", &self.rate_limit_backoff_secs)
            .finish()
    }
}

impl TapConfig {
    /// Minimal configuration with defaults for every optional key.
    pub fn new(api_key: impl Into<String>, base_id: impl Into<String>, tables: Vec<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_id: base_id.into(),
            tables,
            api_url: default_api_url(),
            page_size: default_page_size(),
            type_merge: TypeMerge::default(),
            normalize_record_keys: false,
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_retries: default_rate_limit_retries(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
        }
    }

    /// Load configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> TapResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse configuration from JSON text.
    pub fn from_json_str(input: &str) -> TapResult<Self> {
        let value: serde_json::Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    /// Parse configuration from a JSON value, checking required keys first.
    pub fn from_value(value: serde_json::Value) -> TapResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| TapError::config("config must be a json object"))?;

        let missing: Vec<&str> = REQUIRED_CONFIG_KEYS
            .iter()
            .copied()
            .filter(|k| !obj.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(TapError::config(format!(
                "config is missing required keys: {missing:?}"
            )));
        }

        let cfg: TapConfig = serde_json::from_value(value).map_err(|e| TapError::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> TapResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(TapError::config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.base_id.trim().is_empty() {
            return Err(TapError::config("base_id must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(TapError::config("request_timeout_secs must be > 0"));
        }
        self.check_table_names()
    }

    /// Every configured table must normalize to a non-empty stream id. All names are reported.
    pub fn check_table_names(&self) -> TapResult<()> {
        let unnamable: Vec<&str> = self
            .tables
            .iter()
            .map(String::as_str)
            .filter(|t| normalize_field_name(t).is_empty())
            .collect();
        if unnamable.is_empty() {
            return Ok(());
        }
        Err(TapError::config(format!(
            "table names {unnamable:?} normalize to an empty stream id"
        )))
    }

    /// HTTP timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Rate-limit backoff as a [`Duration`].
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }
}
