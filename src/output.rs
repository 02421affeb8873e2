//! JSON output for a finished run.
//!
//! The result file is pretty-printed with four-space indentation. Non-ASCII
//! text (Estonian diacritics, Cyrillic) is written as-is rather than as
//! `\u` escapes.

use crate::error::ScrapeError;
use crate::models::RunResult;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `result` the way it is written to disk.
///
/// # Errors
///
/// Returns [`ScrapeError::Json`] if serialization fails.
pub fn to_pretty_json(result: &RunResult) -> Result<Vec<u8>, ScrapeError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    result.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Write `result` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if serialization, directory creation or the write fails.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn write_result(result: &RunResult, path: impl AsRef<Path>) -> Result<(), ScrapeError> {
    let path = path.as_ref();
    let json = to_pretty_json(result)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    fs::write(path, &json).await?;
    info!(
        bytes = json.len(),
        successes = result.successes.len(),
        errors = result.errors.len(),
        "Wrote result file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentType, ErrorRecord, RunMetadata, SuccessRecord};
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    fn sample() -> RunResult {
        let run_start = Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap();
        RunResult {
            metadata: RunMetadata::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                run_start,
            ),
            errors: vec![ErrorRecord {
                datetime_accessed: "2024-02-01T08:31:00Z".to_string(),
                document_url: "https://www.eestipank.ee/press/katki.pdf".to_string(),
                processing_error: "Not Found".to_string(),
            }],
            successes: vec![SuccessRecord {
                datetime_accessed: "2024-02-01T08:32:00Z".to_string(),
                language: "et".to_string(),
                document_type: DocumentType::PressRelease,
                document_author: String::new(),
                document_date: "2024-01-15".to_string(),
                document_title: "Eesti Pank: inflatsioon aeglustus".to_string(),
                document_text: "Tarbijahinnad tõusid jaanuaris 0,3%.".to_string(),
                document_html: String::new(),
                document_url: "https://www.eestipank.ee/press/teade".to_string(),
                document_pdf_encoded: String::new(),
                document_tables: vec![vec![vec![vec!["Kuu".to_string(), "Määr".to_string()]]]],
            }],
        }
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let json = String::from_utf8(to_pretty_json(&sample()).unwrap()).unwrap();
        assert!(json.starts_with("{\n    \"metadata\": {\n        \"query_start_date\""));
        assert!(json.contains("\"schema\": \"v2\""));
    }

    #[test]
    fn test_pretty_json_keeps_non_ascii() {
        let json = String::from_utf8(to_pretty_json(&sample()).unwrap()).unwrap();
        assert!(json.contains("tõusid"));
        assert!(json.contains("Määr"));
        assert!(!json.contains("\\u"));
    }

    #[tokio::test]
    async fn test_write_result_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs").join("2024-02-01.json");
        let result = sample();

        write_result(&result, &path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: RunResult = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, result);
    }
}
