//! Error types shared across the scraping pipeline.
//!
//! Each layer owns one enum:
//! - [`DecodeError`]: a document payload could not be reversed by the codec
//! - [`ExtractionError`]: a PDF could not be turned into text/tables/metadata
//! - [`TransportError`]: the HTTP client or the render step failed
//! - [`ScrapeError`]: everything the orchestrator branches on
//!
//! Expected, recoverable conditions (rate limits, a single broken PDF) travel
//! as `Err` values and are recorded by [`crate::errors::ErrorAggregator`];
//! only configuration problems escape to `main`.

use std::time::Duration;
use thiserror::Error;

/// Failure to reverse [`crate::codec::encode`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid zlib data: {0}")]
    Inflate(#[from] std::io::Error),
}

/// Failure to extract a PDF document. Extraction is all-or-nothing.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("not a parseable PDF: {0}")]
    Parse(String),

    #[error("page text could not be decoded: {0}")]
    PageDecode(String),

    #[error("PDF contains no extractable text")]
    NoText,

    #[error("extraction task aborted: {0}")]
    Aborted(String),
}

/// Failure reported by the transport collaborator itself, before any status
/// code is known.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("render of {url} did not finish within {timeout:?}")]
    RenderTimeout { url: String, timeout: Duration },
}

/// Errors surfaced to the orchestrator.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Non-2xx HTTP outcome; fatal to the current unit of work.
    #[error("{reason} ({status}) for {url}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    /// HTTP 429; recorded as a warning and fed back into pacing.
    #[error("rate limited (429) for {url}")]
    RateLimited { url: String },

    #[error("transport failure for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("PDF extraction failed for {url}: {source}")]
    Extraction {
        url: String,
        #[source]
        source: ExtractionError,
    },

    #[error("invalid seed URL {url:?}: {source}")]
    InvalidSeed {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Message stored in the `processing_error` field of an error record.
    pub fn processing_message(&self) -> String {
        match self {
            Self::Status { reason, .. } => reason.clone(),
            Self::RateLimited { .. } => "Too Many Requests".to_string(),
            other => other.to_string(),
        }
    }
}
