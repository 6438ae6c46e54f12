//! # Built-in Extractors
//!
//! The default three-step chain:
//!
//! | Slot | Extractor | Handles |
//! |------|-----------|---------|
//! | primary | [`StructuredExtractor`] | textual MIME types; pages split on form feed; tables detected |
//! | secondary | [`TemplateExtractor`] | any MIME type; markup stripped; pages estimated |
//! | tertiary | [`PassthroughExtractor`] | anything; content returned verbatim; never fails |
//!
//! Deployments with real document extractors substitute their own
//! [`ExtractionStrategy`] implementations.

use async_trait::async_trait;
use govpipe_core::{InputDocument, ParserError, ParsingMethod};

use crate::strategy::{Extraction, ExtractionStrategy};

/// Characters per page assumed when estimating page counts.
pub const CHARS_PER_PAGE: usize = 3_000;

const STRUCTURED_APPLICATION_TYPES: &[&str] =
    &["application/json", "application/xml", "application/xhtml+xml"];

/// MIME type without parameters.
fn mime_essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or("").trim()
}

// ---------------------------------------------------------------------------
// Primary
// ---------------------------------------------------------------------------

/// High-fidelity extraction of textual documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    /// Whether this extractor handles the MIME type.
    pub fn supports(mime_type: &str) -> bool {
        let essence = mime_essence(mime_type);
        essence.starts_with("text/") || STRUCTURED_APPLICATION_TYPES.contains(&essence)
    }
}

#[async_trait]
impl ExtractionStrategy for StructuredExtractor {
    fn name(&self) -> &'static str {
        "structured"
    }

    async fn extract(
        &self,
        doc: &InputDocument,
        method: ParsingMethod,
    ) -> Result<Extraction, ParserError> {
        if !Self::supports(doc.mime_type()) {
            return Err(ParserError::UnsupportedMimeType {
                method,
                mime_type: doc.mime_type().to_string(),
            });
        }
        let content = doc.content();
        if content.trim().is_empty() {
            return Err(ParserError::EmptyContent { method });
        }
        let pages = content.split('\u{c}').count().max(1);
        Ok(Extraction {
            text: normalize_lines(content),
            pages: saturate(pages),
            tables_found: saturate(count_tables(content)),
        })
    }
}

/// Count maximal runs of two or more consecutive tabular lines.
///
/// A line is tabular when it contains `|` or a tab.
pub fn count_tables(content: &str) -> usize {
    let mut tables = 0;
    let mut run = 0;
    for line in content.split(['\n', '\u{c}']) {
        if line.contains('|') || line.contains('\t') {
            run += 1;
        } else {
            if run >= 2 {
                tables += 1;
            }
            run = 0;
        }
    }
    if run >= 2 {
        tables += 1;
    }
    tables
}

/// Collapse whitespace within lines, drop repeated blank lines, and treat
/// form feeds as paragraph breaks.
fn normalize_lines(content: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in content.split(['\n', '\u{c}']) {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(collapsed);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

// ---------------------------------------------------------------------------
// Secondary
// ---------------------------------------------------------------------------

/// Template/heuristic extraction for any MIME type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExtractor;

#[async_trait]
impl ExtractionStrategy for TemplateExtractor {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn extract(
        &self,
        doc: &InputDocument,
        method: ParsingMethod,
    ) -> Result<Extraction, ParserError> {
        let text = strip_markup(doc.content())
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return Err(ParserError::EmptyContent { method });
        }
        let pages = text.chars().count().div_ceil(CHARS_PER_PAGE).max(1);
        Ok(Extraction {
            text,
            pages: saturate(pages),
            tables_found: 0,
        })
    }
}

/// Remove `<...>` tags, leaving a space in their place.
pub fn strip_markup(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tertiary
// ---------------------------------------------------------------------------

/// Returns the content verbatim. The guaranteed terminal strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExtractor;

#[async_trait]
impl ExtractionStrategy for PassthroughExtractor {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn extract(
        &self,
        doc: &InputDocument,
        _method: ParsingMethod,
    ) -> Result<Extraction, ParserError> {
        Ok(Extraction {
            text: doc.content().to_string(),
            pages: 1,
            tables_found: 0,
        })
    }
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str, mime: &str) -> InputDocument {
        InputDocument::from_content("ent", "t", content, mime, false).unwrap()
    }

    #[tokio::test]
    async fn structured_splits_pages_on_form_feed() {
        let d = doc("page one\u{c}page two\u{c}page three", "text/plain");
        let e = StructuredExtractor
            .extract(&d, ParsingMethod::Primary)
            .await
            .unwrap();
        assert_eq!(e.pages, 3);
        assert_eq!(e.text, "page one\npage two\npage three");
    }

    #[tokio::test]
    async fn structured_counts_tables() {
        let content = "Intro\n| a | b |\n| 1 | 2 |\nprose\nx\ty\nz\tw\nq\tr\nend\n|lonely|";
        let e = StructuredExtractor
            .extract(&doc(content, "text/markdown"), ParsingMethod::Primary)
            .await
            .unwrap();
        assert_eq!(e.tables_found, 2);
    }

    #[tokio::test]
    async fn structured_rejects_binary_mime_types() {
        let err = StructuredExtractor
            .extract(&doc("%PDF-1.7", "application/pdf"), ParsingMethod::Primary)
            .await
            .unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedMimeType { .. }));
    }

    #[tokio::test]
    async fn structured_rejects_blank_content() {
        let err = StructuredExtractor
            .extract(&doc("  \n\t ", "text/plain"), ParsingMethod::Primary)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ParserError::EmptyContent {
                method: ParsingMethod::Primary
            }
        );
    }

    #[tokio::test]
    async fn structured_accepts_json_with_parameters() {
        assert!(StructuredExtractor::supports("application/json; charset=utf-8"));
        assert!(!StructuredExtractor::supports("image/png"));
    }

    #[tokio::test]
    async fn template_strips_markup_and_estimates_pages() {
        let body = "word ".repeat(1_300);
        let content = format!("<html><body><p>{body}</p></body></html>");
        let e = TemplateExtractor
            .extract(&doc(&content, "application/pdf"), ParsingMethod::Secondary)
            .await
            .unwrap();
        assert!(!e.text.contains('<'));
        assert!(e.text.starts_with("word word"));
        // 1300 * 5 - 1 characters after collapsing
        assert_eq!(e.pages, 3);
        assert_eq!(e.tables_found, 0);
    }

    #[tokio::test]
    async fn template_fails_on_markup_only_content() {
        let err = TemplateExtractor
            .extract(&doc("<div></div>", "text/html"), ParsingMethod::Secondary)
            .await
            .unwrap_err();
        assert!(matches!(err, ParserError::EmptyContent { .. }));
    }

    #[tokio::test]
    async fn passthrough_never_fails() {
        let e = PassthroughExtractor
            .extract(&doc("", "application/octet-stream"), ParsingMethod::Tertiary)
            .await
            .unwrap();
        assert_eq!(e.text, "");
        assert_eq!(e.pages, 1);
    }

    #[test]
    fn strip_markup_keeps_text_between_tags() {
        assert_eq!(strip_markup("<b>bold</b> text"), " bold  text");
    }
}
