use thiserror::Error;

/// Convenience result type for tap operations.
pub type TapResult<T> = Result<T, TapError>;

/// Error type returned by discovery, sync and the row sources.
///
/// A single enum shared by every stage; nothing in the crate retries on any variant.
#[derive(Debug, Error)]
pub enum TapError {
    /// Underlying I/O error (config/catalog/state files, writing to stdout).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON could not be parsed or produced.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure (connect, TLS, timeout, body decoding).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("api error: status {status}: {message}")]
    Api { status: u16, message: String },

    /// Missing or invalid configuration.
    #[error("config error: {message}")]
    Config { message: String },

    /// A catalog (or schema inside it) is malformed.
    #[error("catalog error: {message}")]
    Catalog { message: String },
}

impl TapError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }
}
