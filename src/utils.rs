//! Small text helpers shared by the discoverer and the orchestrator.
//!
//! - Whitespace normalisation for text pulled out of HTML
//! - Visible-text extraction from a parsed element
//! - String truncation for logging

use scraper::ElementRef;

/// Collapse every run of whitespace into a single space and trim the ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_whitespace("  Eesti \n\t Pank "), "Eesti Pank");
/// ```
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element with whitespace normalised.
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text a reader would see: like [`element_text`] but skipping the contents
/// of `script`, `style`, `noscript` and `template` elements.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let pieces: Vec<&str> = element
        .descendants()
        .filter(|node| {
            !node.ancestors().any(|a| {
                a.value().as_element().is_some_and(|e| {
                    matches!(e.name(), "script" | "style" | "noscript" | "template")
                })
            })
        })
        .filter_map(|node| node.value().as_text().map(|t| &**t))
        .collect();
    normalize_whitespace(&pieces.join(" "))
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}
