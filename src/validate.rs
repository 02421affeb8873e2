//! Acceptance checks for a result document.
//!
//! These mirror what the downstream consumer asserts before ingesting a
//! file, and work on raw JSON so that a file produced by any version of the
//! scraper can be checked.

use crate::codec;
use crate::error::DecodeError;
use crate::models::{DATE_FORMAT, SCHEMA_VERSION};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

const DOCUMENT_TYPES: [&str; 3] = ["speech", "interview", "press_release"];

const SUCCESS_FIELDS: [&str; 11] = [
    "datetime_accessed",
    "language",
    "document_type",
    "document_author",
    "document_date",
    "document_title",
    "document_text",
    "document_html",
    "document_url",
    "document_pdf_encoded",
    "document_tables",
];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing key {0:?}")]
    MissingKey(String),

    #[error("schema must be \"v2\", found {0:?}")]
    Schema(String),

    #[error("{field} {value:?} is not a YYYY-MM-DD date")]
    Date { field: String, value: String },

    #[error("query_start_date {0} is not before the current time")]
    StartNotPast(String),

    #[error("successes[{index}]: {message}")]
    Success { index: usize, message: String },

    #[error("successes[{index}]: document_pdf_encoded does not decode: {source}")]
    Pdf {
        index: usize,
        #[source]
        source: DecodeError,
    },
}

/// Check a parsed document against the consumer's contract, using `now` as
/// the current time.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_value(data: &Value, now: DateTime<Utc>) -> Result<(), ValidationError> {
    let metadata = key(data, "metadata")?;
    key(data, "errors")?;
    let successes = key(data, "successes")?;

    let schema = str_key(metadata, "schema")?;
    if schema != SCHEMA_VERSION {
        return Err(ValidationError::Schema(schema.to_string()));
    }

    let start = date_key(metadata, "query_start_date")?;
    if start.and_time(NaiveTime::MIN).and_utc() >= now {
        return Err(ValidationError::StartNotPast(start.to_string()));
    }
    date_key(metadata, "query_end_date")?;

    let successes = successes
        .as_array()
        .ok_or_else(|| ValidationError::MissingKey("successes[]".to_string()))?;
    for (index, success) in successes.iter().enumerate() {
        validate_success(index, success)?;
    }
    Ok(())
}

/// Parse `body` and validate it against the current time.
pub fn validate_str(body: &str) -> Result<(), ValidationError> {
    let data: Value = serde_json::from_str(body)?;
    validate_value(&data, Utc::now())
}

/// Read and validate the file at `path`.
pub fn validate_file(path: impl AsRef<Path>) -> Result<(), ValidationError> {
    let path = path.as_ref();
    let body = std::fs::read_to_string(path).map_err(|source| ValidationError::Read {
        path: path.display().to_string(),
        source,
    })?;
    validate_str(&body)
}

fn validate_success(index: usize, success: &Value) -> Result<(), ValidationError> {
    let fail = |message: String| ValidationError::Success { index, message };

    if let Some(missing) = SUCCESS_FIELDS.iter().find(|f| success.get(**f).is_none()) {
        return Err(fail(format!("missing key {missing:?}")));
    }

    let text = |field: &str| success.get(field).and_then(Value::as_str).unwrap_or_default();

    let language = text("language");
    if language.chars().count() != 2 {
        return Err(fail(format!("language {language:?} is not a 2 letter code")));
    }

    let document_type = text("document_type");
    if !DOCUMENT_TYPES.contains(&document_type) {
        return Err(fail(format!(
            "document_type {document_type:?} must be one of {DOCUMENT_TYPES:?}"
        )));
    }

    let date = text("document_date");
    if NaiveDate::parse_from_str(date, DATE_FORMAT).is_err() {
        return Err(fail(format!("document_date {date:?} is not a YYYY-MM-DD date")));
    }

    for field in ["document_text", "document_url"] {
        if text(field).is_empty() {
            return Err(fail(format!("{field} must not be empty")));
        }
    }

    let encoded = text("document_pdf_encoded");
    if !encoded.is_empty() {
        let pdf = codec::decode(encoded).map_err(|source| ValidationError::Pdf { index, source })?;
        if pdf.is_empty() {
            return Err(fail("document_pdf_encoded decodes to nothing".to_string()));
        }
    }
    Ok(())
}

fn key<'a>(value: &'a Value, name: &str) -> Result<&'a Value, ValidationError> {
    value
        .get(name)
        .ok_or_else(|| ValidationError::MissingKey(name.to_string()))
}

fn str_key<'a>(value: &'a Value, name: &str) -> Result<&'a str, ValidationError> {
    key(value, name)?
        .as_str()
        .ok_or_else(|| ValidationError::MissingKey(name.to_string()))
}

fn date_key(value: &Value, name: &str) -> Result<NaiveDate, ValidationError> {
    let raw = str_key(value, name)?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| ValidationError::Date {
        field: name.to_string(),
        value: raw.to_string(),
    })
}
