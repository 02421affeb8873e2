//! PDF text, table and metadata extraction.
//!
//! Parsing is delegated to a [`PdfParser`] collaborator; [`LopdfParser`]
//! uses `pdf-extract` for per-page text and `lopdf` for the document info
//! dictionary. [`PdfExtractor`] assembles the caller-facing result and adds
//! the encoded copy of the original bytes.
//!
//! Extraction is all-or-nothing per document: any fault discards the pages
//! processed so far.

use crate::codec;
use crate::error::ExtractionError;
use crate::models::{PageTables, Table};
use lopdf::{Document, Object};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

/// One page as returned by a [`PdfParser`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub text: String,
    pub tables: PageTables,
}

/// Raw parser output before assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPdf {
    pub pages: Vec<ParsedPage>,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// PDF parsing collaborator.
pub trait PdfParser {
    /// # Errors
    ///
    /// Returns [`ExtractionError`] if `bytes` are not a parseable PDF or any
    /// page cannot be decoded.
    fn parse(&self, bytes: &[u8]) -> Result<ParsedPdf, ExtractionError>;
}

/// What the orchestrator gets back for one PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPdf {
    pub text: String,
    /// Empty when the document has no `Title`.
    pub title: String,
    /// Empty when the document has no `Author`.
    pub author: String,
    /// One entry per page with at least one table.
    pub tables: Vec<PageTables>,
    /// [`codec::encode`] of the full original bytes.
    pub encoded: String,
}

#[derive(Debug, Clone, Default)]
pub struct PdfExtractor<P> {
    parser: P,
}

impl<P: PdfParser> PdfExtractor<P> {
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    /// Extract text, tables and metadata from `bytes`.
    ///
    /// # Errors
    ///
    /// Propagates the parser's [`ExtractionError`].
    #[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedPdf, ExtractionError> {
        let parsed = self.parser.parse(bytes)?;
        let page_count = parsed.pages.len();

        let mut text = String::new();
        let mut tables = Vec::new();
        for page in parsed.pages {
            text.push_str(&page.text);
            if !page.tables.is_empty() {
                tables.push(page.tables);
            }
        }

        debug!(pages = page_count, chars = text.len(), table_pages = tables.len(), "Extracted PDF");

        Ok(ExtractedPdf {
            text,
            title: parsed.title.unwrap_or_default(),
            author: parsed.author.unwrap_or_default(),
            tables,
            encoded: codec::encode(bytes),
        })
    }
}

/// Pure-Rust parser: `pdf-extract` for text, `lopdf` for metadata, and
/// [`detect_tables`] for tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfParser;

impl PdfParser for LopdfParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedPdf, ExtractionError> {
        let document =
            Document::load_mem(bytes).map_err(|e| ExtractionError::Parse(e.to_string()))?;
        let title = info_string(&document, b"Title");
        let author = info_string(&document, b"Author");

        let page_texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ExtractionError::PageDecode(e.to_string()))?;

        let pages = page_texts
            .into_iter()
            .map(|text| {
                let tables = detect_tables(&text);
                ParsedPage { text, tables }
            })
            .collect();

        Ok(ParsedPdf {
            pages,
            title,
            author,
        })
    }
}

/// Read a text entry from the trailer's `Info` dictionary.
fn info_string(document: &Document, key: &[u8]) -> Option<String> {
    let info = document.trailer.get(b"Info").ok()?;
    let info = match info {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    let value = info.as_dict().ok()?.get(key).ok()?;
    let raw = match value {
        Object::String(bytes, _) => bytes.as_slice(),
        _ => return None,
    };
    let decoded = decode_text_string(raw);
    let trimmed = decoded.trim_matches(char::from(0)).trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// PDF text strings are UTF-16BE with a BOM or single-byte otherwise.
fn decode_text_string(raw: &[u8]) -> String {
    if let Some(rest) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}

static CELL_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+| {2,}").unwrap());

/// Split a line into cells on tabs or runs of two or more spaces.
fn split_cells(line: &str) -> Vec<String> {
    CELL_SEPARATOR
        .split(line.trim())
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

/// Find tables in one page of laid-out text.
///
/// A table is a run of at least two consecutive lines that each split into
/// the same number (two or more) of cells.
pub fn detect_tables(page_text: &str) -> PageTables {
    fn close(current: &mut Table, tables: &mut PageTables) {
        if current.len() >= 2 {
            tables.push(std::mem::take(current));
        } else {
            current.clear();
        }
    }

    let mut tables = Vec::new();
    let mut current: Table = Vec::new();

    for line in page_text.lines() {
        let cells = split_cells(line);
        if cells.len() < 2 {
            close(&mut current, &mut tables);
            continue;
        }
        if current.first().is_some_and(|row| row.len() != cells.len()) {
            close(&mut current, &mut tables);
        }
        current.push(cells);
    }
    close(&mut current, &mut tables);

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Stream, dictionary};

    /// Parser stub returning fixed pages.
    struct Pages(Vec<ParsedPage>, Option<&'static str>);

    impl PdfParser for Pages {
        fn parse(&self, _bytes: &[u8]) -> Result<ParsedPdf, ExtractionError> {
            Ok(ParsedPdf {
                pages: self.0.clone(),
                title: self.1.map(str::to_string),
                author: None,
            })
        }
    }

    struct Broken;

    impl PdfParser for Broken {
        fn parse(&self, _bytes: &[u8]) -> Result<ParsedPdf, ExtractionError> {
            Err(ExtractionError::PageDecode("bad font on page 3".to_string()))
        }
    }

    fn table(rows: &[&[&str]]) -> Table {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn page(text: &str, tables: PageTables) -> ParsedPage {
        ParsedPage {
            text: text.to_string(),
            tables,
        }
    }

    /// Build a small PDF with one text line per page.
    fn build_pdf(lines: &[&str], title: &str, author: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Author" => Object::string_literal(author),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_tables_on_pages_two_and_four_only() {
        let t2 = table(&[&["Year", "Rate"], &["2023", "4.0"]]);
        let t4 = table(&[&["Q1", "Q2", "Q3"], &["1", "2", "3"]]);
        let parser = Pages(
            vec![
                page("one ", vec![]),
                page("two ", vec![t2.clone()]),
                page("three ", vec![]),
                page("four", vec![t4.clone()]),
            ],
            Some("Report"),
        );
        let out = PdfExtractor::new(parser).extract(b"%PDF").unwrap();
        assert_eq!(out.tables.len(), 2);
        assert_eq!(out.tables[0], vec![t2]);
        assert_eq!(out.tables[1], vec![t4]);
        assert_eq!(out.text, "one two three four");
        assert_eq!(out.title, "Report");
        assert_eq!(out.author, "");
    }

    #[test]
    fn test_page_without_text_contributes_nothing() {
        let parser = Pages(vec![page("", vec![]), page("body", vec![])], None);
        let out = PdfExtractor::new(parser).extract(b"%PDF").unwrap();
        assert_eq!(out.text, "body");
        assert!(out.tables.is_empty());
        assert_eq!(out.title, "");
    }

    #[test]
    fn test_encoded_copy_round_trips() {
        let bytes = b"%PDF-1.5 original bytes".to_vec();
        let out = PdfExtractor::new(Pages(vec![], None)).extract(&bytes).unwrap();
        assert_eq!(codec::decode(&out.encoded).unwrap(), bytes);
    }

    #[test]
    fn test_parser_fault_is_all_or_nothing() {
        let err = PdfExtractor::new(Broken).extract(b"%PDF").unwrap_err();
        assert!(matches!(err, ExtractionError::PageDecode(_)));
    }

    #[test]
    fn test_lopdf_parser_rejects_non_pdf() {
        let err = LopdfParser.parse(b"<html>not a pdf</html>").unwrap_err();
        assert!(matches!(err, ExtractionError::Parse(_)));
    }

    #[test]
    fn test_lopdf_parser_reads_metadata_and_pages() {
        let bytes = build_pdf(&["Monetary policy", "Financial stability"], "Annual Report", "Eesti Pank");
        let parsed = LopdfParser.parse(&bytes).unwrap();
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.title.as_deref(), Some("Annual Report"));
        assert_eq!(parsed.author.as_deref(), Some("Eesti Pank"));
        assert!(parsed.pages[0].text.contains("Monetary"));
        assert!(parsed.pages[1].text.contains("Financial"));
    }

    #[test]
    fn test_missing_info_dictionary_means_empty_metadata() {
        let mut doc = Document::load_mem(&build_pdf(&["x"], "t", "a")).unwrap();
        doc.trailer.remove(b"Info");
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        let parsed = LopdfParser.parse(&buf).unwrap();
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.author, None);
    }

    #[test]
    fn test_detect_tables_finds_aligned_rows() {
        let text = "Key figures\n\
                    Indicator    2023    2024\n\
                    GDP growth   -3.0    1.2\n\
                    Inflation    9.1     3.5\n\
                    \n\
                    Commentary follows here.\n";
        let tables = detect_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[0][1], vec!["GDP growth", "-3.0", "1.2"]);
    }

    #[test]
    fn test_detect_tables_splits_on_column_change() {
        let text = "a\tb\nc\td\ne\tf\tg\nh\ti\tj\n";
        let tables = detect_tables(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1][0], vec!["e", "f", "g"]);
    }

    #[test]
    fn test_detect_tables_ignores_single_rows_and_prose() {
        assert!(detect_tables("Name    Value\nPlain sentence with single spaces.\n").is_empty());
        assert!(detect_tables("").is_empty());
    }

    #[test]
    fn test_decode_utf16_text_string() {
        let raw = [0xFE, 0xFF, 0x00, 0x45, 0x00, 0xE4];
        assert_eq!(decode_text_string(&raw), "Eä");
    }
}
