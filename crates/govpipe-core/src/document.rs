//! # Documents
//!
//! The input side of the pipeline ([`InputDocumentDraft`] and the validated
//! [`InputDocument`]) and the parser's output ([`ParsedDocument`]).
//!
//! An [`InputDocument`] cannot be constructed without passing schema
//! validation. Deserializing one goes through the same validation, so a
//! persisted audit record can never resurrect an invalid input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::content_checksum;
use crate::error::{FieldViolation, InputValidationError};
use crate::identity::{Checksum, DocumentId, EnterpriseId};

// ---------------------------------------------------------------------------
// Input documents
// ---------------------------------------------------------------------------

/// Unvalidated input document, exactly as a caller submitted it.
///
/// Every field is optional so that a malformed submission can still be
/// represented (and recorded in a failed-run audit record).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDocumentDraft {
    /// Owning enterprise.
    #[serde(default)]
    pub enterprise_id: Option<String>,
    /// Document title.
    #[serde(default)]
    pub title: Option<String>,
    /// Raw textual content.
    #[serde(default)]
    pub content: Option<String>,
    /// Declared MIME type, e.g. `text/plain`.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Content fingerprint supplied by the caller.
    #[serde(default, alias = "checksumSha256")]
    pub checksum: Option<String>,
    /// Whether the submitter flagged the document as carrying sensitive data.
    #[serde(default)]
    pub contains_sensitive_data: Option<bool>,
}

impl InputDocumentDraft {
    /// Validate the draft into an [`InputDocument`].
    ///
    /// All violations are collected before returning, in field order.
    pub fn validate(&self) -> Result<InputDocument, InputValidationError> {
        let mut violations = Vec::new();

        let enterprise_id = match self.enterprise_id.as_deref() {
            None => {
                violations.push(FieldViolation::new("enterpriseId", "is required"));
                None
            }
            Some(raw) => EnterpriseId::new(raw).map_err(|v| violations.push(v)).ok(),
        };

        let title = match self.title.as_deref().map(str::trim) {
            None => {
                violations.push(FieldViolation::new("title", "is required"));
                None
            }
            Some("") => {
                violations.push(FieldViolation::new("title", "must be non-empty"));
                None
            }
            Some(t) => Some(t.to_string()),
        };

        if self.content.is_none() {
            violations.push(FieldViolation::new("content", "is required"));
        }

        let mime_type = match self.mime_type.as_deref().map(str::trim) {
            None | Some("") => {
                violations.push(FieldViolation::new("mimeType", "is required"));
                None
            }
            Some(m) if !is_mime_type(m) => {
                violations.push(FieldViolation::new(
                    "mimeType",
                    format!("'{m}' is not of the form type/subtype"),
                ));
                None
            }
            Some(m) => Some(m.to_ascii_lowercase()),
        };

        let checksum = match self.checksum.as_deref() {
            None => {
                violations.push(FieldViolation::new("checksum", "is required"));
                None
            }
            Some(raw) => Checksum::new(raw).map_err(|v| violations.push(v)).ok(),
        };

        match (enterprise_id, title, &self.content, mime_type, checksum) {
            (Some(enterprise_id), Some(title), Some(content), Some(mime_type), Some(checksum))
                if violations.is_empty() =>
            {
                Ok(InputDocument {
                    enterprise_id,
                    title,
                    content: content.clone(),
                    mime_type,
                    checksum,
                    contains_sensitive_data: self.contains_sensitive_data.unwrap_or(false),
                })
            }
            _ => Err(InputValidationError { violations }),
        }
    }
}

fn is_mime_type(value: &str) -> bool {
    match value.split_once('/') {
        Some((kind, subtype)) => {
            let valid = |s: &str| {
                !s.is_empty()
                    && s.chars()
                        .all(|c| c.is_ascii_alphanumeric() || "!#$&^_.+-".contains(c))
            };
            // Parameters such as `; charset=utf-8` are tolerated after the subtype.
            let subtype = subtype.split(';').next().unwrap_or("").trim();
            valid(kind) && valid(subtype)
        }
        None => false,
    }
}

/// A schema-validated input document. Its identity is its checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "InputDocumentDraft")]
pub struct InputDocument {
    enterprise_id: EnterpriseId,
    title: String,
    content: String,
    mime_type: String,
    checksum: Checksum,
    contains_sensitive_data: bool,
}

impl InputDocument {
    /// Build a validated document whose checksum is the SHA-256 of `content`.
    pub fn from_content(
        enterprise_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        mime_type: impl Into<String>,
        contains_sensitive_data: bool,
    ) -> Result<Self, InputValidationError> {
        let content = content.into();
        InputDocumentDraft {
            enterprise_id: Some(enterprise_id.into()),
            title: Some(title.into()),
            checksum: Some(content_checksum(&content).into()),
            content: Some(content),
            mime_type: Some(mime_type.into()),
            contains_sensitive_data: Some(contains_sensitive_data),
        }
        .validate()
    }

    /// Owning enterprise.
    pub fn enterprise_id(&self) -> &EnterpriseId {
        &self.enterprise_id
    }

    /// Document title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Raw content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Declared MIME type, lowercased.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Content fingerprint.
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Whether the submitter flagged sensitive data.
    pub fn contains_sensitive_data(&self) -> bool {
        self.contains_sensitive_data
    }
}

impl TryFrom<InputDocumentDraft> for InputDocument {
    type Error = InputValidationError;

    fn try_from(draft: InputDocumentDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<&InputDocument> for InputDocumentDraft {
    fn from(doc: &InputDocument) -> Self {
        Self {
            enterprise_id: Some(doc.enterprise_id.to_string()),
            title: Some(doc.title.clone()),
            content: Some(doc.content.clone()),
            mime_type: Some(doc.mime_type.clone()),
            checksum: Some(doc.checksum.to_string()),
            contains_sensitive_data: Some(doc.contains_sensitive_data),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed documents
// ---------------------------------------------------------------------------

/// The extraction strategy that produced a [`ParsedDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsingMethod {
    /// Highest-fidelity structured extraction.
    Primary,
    /// Template/heuristic extraction.
    Secondary,
    /// Pass-through. The guaranteed terminal strategy.
    Tertiary,
    /// No strategy ran. Only used by failed-run placeholders.
    None,
}

impl ParsingMethod {
    /// The fixed confidence ceiling the organisation assigns to this method.
    pub fn confidence_ceiling(self) -> f64 {
        match self {
            Self::Primary => 0.9,
            Self::Secondary => 0.6,
            Self::Tertiary => 0.3,
            Self::None => 0.0,
        }
    }

    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for ParsingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed representation of an input document.
///
/// Produced once per distinct checksum and shared through the content cache
/// afterwards; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    /// Generated identifier.
    pub doc_id: DocumentId,
    /// Checksum of the input this was parsed from.
    pub input_checksum: Checksum,
    /// Extracted text.
    pub extracted_text: String,
    /// Page count.
    pub pages: u32,
    /// Number of tables detected.
    pub tables_found: u32,
    /// Strategy that produced this document.
    pub parsing_method: ParsingMethod,
    /// Declared confidence of the strategy, in [0, 1].
    pub parser_confidence: f64,
    /// When extraction finished.
    pub processed_at: DateTime<Utc>,
}

impl ParsedDocument {
    /// Placeholder for runs that never produced a parse.
    pub fn placeholder(input_checksum: Checksum, now: DateTime<Utc>) -> Self {
        Self {
            doc_id: DocumentId::new(),
            input_checksum,
            extracted_text: String::new(),
            pages: 0,
            tables_found: 0,
            parsing_method: ParsingMethod::None,
            parser_confidence: 0.0,
            processed_at: now,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn opt_string() -> impl Strategy<Value = Option<String>> {
        prop_oneof![Just(None), Just(Some(String::new())), "[ a-z/]{0,12}".prop_map(Some)]
    }

    proptest! {
        /// Validation is total: arbitrary drafts either validate or report
        /// at least one violation, never panic.
        #[test]
        fn validate_never_panics(
            enterprise_id in opt_string(),
            title in opt_string(),
            content in opt_string(),
            mime_type in opt_string(),
            checksum in opt_string(),
        ) {
            let draft = InputDocumentDraft {
                enterprise_id, title, content, mime_type, checksum,
                contains_sensitive_data: None,
            };
            match draft.validate() {
                Ok(doc) => prop_assert!(!doc.checksum().as_str().is_empty()),
                Err(e) => prop_assert!(!e.violations.is_empty()),
            }
        }

        /// A validated document's checksum from `from_content` is stable.
        #[test]
        fn from_content_checksum_is_deterministic(content in ".{0,64}") {
            let a = InputDocument::from_content("ent", "t", content.clone(), "text/plain", false).unwrap();
            let b = InputDocument::from_content("other", "u", content, "text/html", true).unwrap();
            prop_assert_eq!(a.checksum(), b.checksum());
            prop_assert_eq!(a.checksum().as_str().len(), 64);
        }
    }
}
