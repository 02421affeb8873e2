//! Error aggregation for a single run.
//!
//! The [`ErrorAggregator`] turns failed operations into [`ErrorRecord`]s,
//! mirrors them into the run log, and tells the caller whether the current
//! unit of work has to stop. It is append-only and owned by one orchestrator.

use crate::error::ScrapeError;
use crate::logging::RunLog;
use crate::models::{ErrorRecord, format_timestamp};
use chrono::Utc;
use reqwest::StatusCode;
use tracing::{Level, error, info, warn};

/// Human-readable reason for an HTTP status, e.g. `"Too Many Requests"`.
pub fn status_reason(code: u16) -> String {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {code}"))
}

#[derive(Debug)]
pub struct ErrorAggregator {
    log: RunLog,
    errors: Vec<ErrorRecord>,
}

impl ErrorAggregator {
    pub fn new(log: RunLog) -> Self {
        Self {
            log,
            errors: Vec::new(),
        }
    }

    /// Classify an HTTP outcome.
    ///
    /// 2xx is informational and returns `Ok`. Anything else is recorded and
    /// returned as `Err` so the caller abandons the current unit of work:
    /// 429 becomes [`ScrapeError::RateLimited`] (logged as a warning), every
    /// other code becomes [`ScrapeError::Status`].
    pub fn log_result(&mut self, status: u16, url: &str) -> Result<(), ScrapeError> {
        let reason = status_reason(status);

        if (200..=299).contains(&status) {
            info!(status, %url, "Request succeeded");
            self.log.record(Level::INFO, &format!("{reason} {url}"));
            return Ok(());
        }

        let err = if status == 429 {
            warn!(status, %url, "Rate limited");
            self.log.record(Level::WARN, &format!("{reason} {url}"));
            ScrapeError::RateLimited {
                url: url.to_string(),
            }
        } else {
            error!(status, %url, %reason, "Request failed");
            self.log.record(Level::ERROR, &format!("{reason} {url}"));
            ScrapeError::Status {
                url: url.to_string(),
                status,
                reason,
            }
        };

        self.push(url, err.processing_message());
        Err(err)
    }

    /// Record a per-document fault without aborting anything.
    pub fn log_extraction_error(&mut self, url: &str, message: &str) {
        error!(%url, %message, "Document processing failed");
        self.log.record(Level::ERROR, &format!("{message} {url}"));
        self.push(url, message.to_string());
    }

    /// Record a failure that carries no HTTP status (client error, render
    /// timeout, bad link).
    pub fn log_failure(&mut self, url: &str, err: &ScrapeError) {
        self.log_extraction_error(url, &err.processing_message());
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Flush the run log and hand over the collected records.
    pub fn finish(mut self) -> Vec<ErrorRecord> {
        self.log.flush();
        std::mem::take(&mut self.errors)
    }

    fn push(&mut self, url: &str, processing_error: String) {
        self.errors.push(ErrorRecord {
            datetime_accessed: format_timestamp(Utc::now()),
            document_url: url.to_string(),
            processing_error,
        });
    }
}
