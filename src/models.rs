//! Data models for the scrape result document.
//!
//! This module defines the records serialized into the output file:
//! - [`SuccessRecord`]: one processed document (article page or PDF)
//! - [`ErrorRecord`]: one failed or rate-limited operation
//! - [`RunMetadata`] and [`RunResult`]: the top-level output document
//! - [`DocumentType`]: the enumerated document kinds the consumer accepts
//!
//! Field names match the consumer's `v2` schema exactly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema tag written into every result document.
pub const SCHEMA_VERSION: &str = "v2";

/// Timestamp format used for `datetime_accessed` and `run_start_datetime`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Date format used for every calendar date in the output.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One table: rows of plain-text cells.
pub type Table = Vec<Vec<String>>;

/// All tables detected on a single PDF page.
pub type PageTables = Vec<Table>;

/// Format a UTC instant the way the output schema expects.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Kind of publication a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Speech,
    PressRelease,
    Interview,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Speech => "speech",
            DocumentType::PressRelease => "press_release",
            DocumentType::Interview => "interview",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speech" => Ok(DocumentType::Speech),
            "press_release" => Ok(DocumentType::PressRelease),
            "interview" | "interviews" => Ok(DocumentType::Interview),
            other => Err(format!(
                "unknown document type {other:?} (expected speech, press_release or interview)"
            )),
        }
    }
}

/// A successfully processed document.
///
/// `document_text` and `document_url` are never empty. PDF-derived fields
/// (`document_pdf_encoded`, `document_tables`) are only populated for records
/// built from a parsed PDF.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SuccessRecord {
    pub datetime_accessed: String,
    /// Two-letter language code.
    pub language: String,
    pub document_type: DocumentType,
    pub document_author: String,
    /// `YYYY-MM-DD`.
    pub document_date: String,
    pub document_title: String,
    pub document_text: String,
    pub document_html: String,
    pub document_url: String,
    /// Empty string when no PDF backs this record.
    pub document_pdf_encoded: String,
    /// One entry per PDF page that had at least one table.
    pub document_tables: Vec<PageTables>,
}

/// A failed operation. Created only by [`crate::errors::ErrorAggregator`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorRecord {
    pub datetime_accessed: String,
    pub document_url: String,
    pub processing_error: String,
}

/// Run-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunMetadata {
    pub query_start_date: String,
    pub query_end_date: String,
    pub run_start_datetime: String,
    pub schema: String,
}

impl RunMetadata {
    pub fn new(start: NaiveDate, end: NaiveDate, run_start: DateTime<Utc>) -> Self {
        Self {
            query_start_date: start.format(DATE_FORMAT).to_string(),
            query_end_date: end.format(DATE_FORMAT).to_string(),
            run_start_datetime: format_timestamp(run_start),
            schema: SCHEMA_VERSION.to_string(),
        }
    }
}

/// The pipeline's only externally observable output.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunResult {
    pub metadata: RunMetadata,
    pub errors: Vec<ErrorRecord>,
    pub successes: Vec<SuccessRecord>,
}
