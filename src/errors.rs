// Error types and error handling module
// This file defines the failure taxonomy of a collection cycle: discovery
// failures abort the cycle, query/parse failures abort a single service
//
// Numan Thabit 2025 Nov

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{url} returned {status} error code")]
    Status { url: String, status: u16 },
    #[error("reading response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed metrics payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("unknown metrics schema: {0}")]
    UnknownSchema(String),
    #[error("malformed dimension segment {segment:?} in metric {entry:?}")]
    MalformedDimension { entry: String, segment: String },
    #[error("discovery config {path}: {reason}")]
    Discovery { path: String, reason: String },
}

impl CollectorError {
    /// Short label used in logs and as the `kind` label of the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectorError::Request { .. } => "request",
            CollectorError::Timeout { .. } => "timeout",
            CollectorError::Status { .. } => "status",
            CollectorError::Body { .. } => "body",
            CollectorError::Payload(_) => "payload",
            CollectorError::UnknownSchema(_) => "unknown_schema",
            CollectorError::MalformedDimension { .. } => "malformed_dimension",
            CollectorError::Discovery { .. } => "discovery",
        }
    }
}
