//! # Identity Newtypes
//!
//! Identifier newtypes used throughout the pipeline.
//!
//! UUID-based identifiers ([`TraceId`], [`DocumentId`]) are always valid by
//! construction. String-based identifiers ([`EnterpriseId`], [`Checksum`])
//! reject blank input, including when deserialized.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FieldViolation;

// ---------------------------------------------------------------------------
// UUID-based identifiers
// ---------------------------------------------------------------------------

/// Identifier of one pipeline run. Fresh per run, never reused across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Create a new random trace identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a trace identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generated identifier of a [`ParsedDocument`](crate::ParsedDocument).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Create a new random document identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// String-based identifiers (validated)
// ---------------------------------------------------------------------------

/// Identifier of the enterprise (tenant) a document belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnterpriseId(String);

impl EnterpriseId {
    /// Validate and wrap an enterprise identifier. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> Result<Self, FieldViolation> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FieldViolation::new("enterpriseId", "must be non-empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EnterpriseId {
    type Error = FieldViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EnterpriseId> for String {
    fn from(id: EnterpriseId) -> Self {
        id.0
    }
}

impl std::fmt::Display for EnterpriseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable content fingerprint of an input document.
///
/// The checksum is the identity of a document for caching: two documents
/// with the same checksum are the same document, whoever submitted them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(pub(crate) String);

impl Checksum {
    /// Validate and wrap a checksum string. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> Result<Self, FieldViolation> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FieldViolation::new("checksum", "must be non-empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the checksum as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl TryFrom<String> for Checksum {
    type Error = FieldViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(TraceId::new(), TraceId::new());
    }

    #[test]
    fn trace_id_serializes_as_bare_uuid() {
        let id = TraceId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn enterprise_id_rejects_blank() {
        let err = EnterpriseId::new("   ").unwrap_err();
        assert_eq!(err.field, "enterpriseId");
    }

    #[test]
    fn enterprise_id_trims() {
        assert_eq!(EnterpriseId::new("  ent-1 ").unwrap().as_str(), "ent-1");
    }

    #[test]
    fn checksum_rejects_blank_on_deserialize() {
        let result: Result<Checksum, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn checksum_round_trips_through_json() {
        let c = Checksum::new("abc123").unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"abc123\"");
        let back: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn checksum_short_prefix() {
        let c = Checksum::new("0123456789abcdef").unwrap();
        assert_eq!(c.short(), "01234567");
        let tiny = Checksum::new("abc").unwrap();
        assert_eq!(tiny.short(), "abc");
    }
}
