//! Error taxonomy for the retrieval and generation pipeline.
//!
//! Library code returns [`RagResult`]; the `docrag` binary converts these
//! into `anyhow` errors at the command boundary.

use std::path::PathBuf;

use thiserror::Error;

pub type RagResult<T> = Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    /// Missing credentials or invalid model/service configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `build` was called with no passages.
    #[error("cannot build an index from an empty passage list")]
    EmptyCorpus,

    /// `search` or `save` was called before `build`/`load`.
    #[error("index not built: build or load an index first")]
    IndexNotBuilt,

    /// The embedding or generation service failed.
    #[error("gateway error: {message}")]
    Gateway { message: String, retryable: bool },

    #[error("inconsistent index: {vectors} vectors but {passages} passages")]
    InconsistentIndex { vectors: usize, passages: usize },

    #[error("dimension mismatch: index has {expected} dims, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt index file {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("failed to load document {}: {reason}", path.display())]
    Document { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// A gateway failure that a caller-side retry may recover from
    /// (rate limiting, server errors, network failures).
    pub fn transient(message: impl Into<String>) -> Self {
        RagError::Gateway {
            message: message.into(),
            retryable: true,
        }
    }

    /// A gateway failure that will not succeed on retry (auth, bad request,
    /// malformed response).
    pub fn permanent(message: impl Into<String>) -> Self {
        RagError::Gateway {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::Gateway { retryable: true, .. })
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self, RagError::Gateway { .. })
    }
}

/// Map a non-success HTTP status from `service` to a gateway error.
///
/// HTTP 429 and 5xx are transient; other 4xx are permanent.
pub(crate) fn status_error(service: &str, status: reqwest::StatusCode, body: &str) -> RagError {
    let message = format!("{} API error {}: {}", service, status, body);
    if status.as_u16() == 429 || status.is_server_error() {
        RagError::transient(message)
    } else {
        RagError::permanent(message)
    }
}

/// Name an OpenAI-compatible endpoint in error messages: `"OpenAI"` for
/// `api.openai.com`, otherwise the host (and port) of `base_url`.
pub(crate) fn service_label(base_url: &str) -> String {
    let rest = base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base_url);
    let host = rest.split('/').next().unwrap_or(rest);

    if host == "api.openai.com" {
        "OpenAI".to_string()
    } else if host.is_empty() {
        base_url.to_string()
    } else {
        host.to_string()
    }
}

impl From<reqwest::Error> for RagError {
    fn from(e: reqwest::Error) -> Self {
        // Connection failures and timeouts are worth retrying; anything
        // else (decode errors, builder errors) is not.
        if e.is_connect() || e.is_timeout() || e.is_request() {
            RagError::transient(e.to_string())
        } else {
            RagError::permanent(e.to_string())
        }
    }
}
