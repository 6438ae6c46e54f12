//! # Audit Records
//!
//! The immutable record of one pipeline run. A successful run produces an
//! [`AuditTrail`]; a run that fails at any stage produces a
//! [`FailedRunRecord`] with synthesized placeholders, so every run leaves
//! exactly one record and failed runs never pollute successful-run
//! statistics.
//!
//! ## Invariants
//!
//! [`AuditRecord::validate`] enforces the record schema before a writer
//! persists anything:
//!
//! - the parsed document's checksum equals the input's checksum,
//! - every confidence is finite and in [0, 1],
//! - the rule list is never empty,
//! - a strict-fail forces confidence 0 and outcome rejected, and (unless the
//!   run bypassed validation) confidence 0 implies a strict-fail.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::DecisionOutcome;
use crate::digest::{content_checksum, json_digest, ContentDigest};
use crate::document::{InputDocument, InputDocumentDraft, ParsedDocument, ParsingMethod};
use crate::error::AuditError;
use crate::identity::{Checksum, TraceId};
use crate::validation::{FinalOutcome, ValidationResult};

/// Schema version stamped on every record.
pub const SCHEMA_VERSION: &str = "v1.0";

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

/// Full input/output chain of a completed run. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrail {
    /// Fresh per run.
    pub trace_id: TraceId,
    /// Echo of the input's enterprise.
    pub enterprise_id: String,
    /// The validated input.
    pub input: InputDocument,
    /// Parser output.
    pub parsed: ParsedDocument,
    /// Decision output.
    pub decision: DecisionOutcome,
    /// Rule engine and gate output.
    pub validation: ValidationResult,
    /// Set when an operator bypassed rule validation.
    pub validation_bypassed: bool,
    /// Record schema version.
    pub schema_version: String,
    /// Component name to version.
    pub tool_versions: BTreeMap<String, String>,
    /// When the record was constructed.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Failed runs
// ---------------------------------------------------------------------------

/// Record of a run that failed or was cancelled before completing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRunRecord {
    /// Fresh per run.
    pub trace_id: TraceId,
    /// Enterprise, when the submission carried one.
    pub enterprise_id: Option<String>,
    /// The raw submission, which may be invalid.
    pub input: InputDocumentDraft,
    /// Stage the run was in when it failed.
    pub failed_stage: String,
    /// Why it failed.
    pub reason: String,
    /// Placeholder or real parse, if parsing completed before the failure.
    pub parsed: ParsedDocument,
    /// Placeholder decision.
    pub decision: DecisionOutcome,
    /// Placeholder validation (a single `processing-failed` strict-fail).
    pub validation: ValidationResult,
    /// Record schema version.
    pub schema_version: String,
    /// Component name to version.
    pub tool_versions: BTreeMap<String, String>,
    /// When the record was constructed.
    pub created_at: DateTime<Utc>,
}

impl FailedRunRecord {
    /// Build a failure record with placeholders for every stage output.
    pub fn new(
        trace_id: TraceId,
        input: InputDocumentDraft,
        failed_stage: impl Into<String>,
        reason: impl Into<String>,
        tool_versions: BTreeMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        let reason = reason.into();
        let checksum = placeholder_checksum(&input);
        let enterprise_id = input
            .enterprise_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            trace_id,
            enterprise_id,
            input,
            failed_stage: failed_stage.into(),
            parsed: ParsedDocument::placeholder(checksum, now),
            decision: DecisionOutcome::placeholder_failed(&reason, now),
            validation: ValidationResult::placeholder_failed(&reason, now),
            reason,
            schema_version: SCHEMA_VERSION.to_string(),
            tool_versions,
            created_at: now,
        }
    }
}

/// The submitted checksum if usable, else the content hash, else a sentinel.
fn placeholder_checksum(input: &InputDocumentDraft) -> Checksum {
    if let Some(c) = input.checksum.as_deref().and_then(|c| Checksum::new(c).ok()) {
        return c;
    }
    match input.content.as_deref() {
        Some(content) => content_checksum(content),
        None => Checksum("unavailable".to_string()),
    }
}

// ---------------------------------------------------------------------------
// AuditRecord
// ---------------------------------------------------------------------------

/// One audit record per pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuditRecord {
    /// The run completed.
    Completed(AuditTrail),
    /// The run failed or was cancelled.
    Failed(FailedRunRecord),
}

impl AuditRecord {
    /// Trace identifier of the run.
    pub fn trace_id(&self) -> TraceId {
        match self {
            Self::Completed(t) => t.trace_id,
            Self::Failed(f) => f.trace_id,
        }
    }

    /// Whether this records a failed run.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// SHA-256 over the record's JSON serialization.
    pub fn digest(&self) -> Result<ContentDigest, AuditError> {
        Ok(json_digest(self)?)
    }

    /// Enforce the record schema.
    pub fn validate(&self) -> Result<(), AuditError> {
        match self {
            Self::Completed(trail) => {
                if trail.parsed.input_checksum != *trail.input.checksum() {
                    return Err(AuditError::Schema(format!(
                        "parsed checksum {} does not match input checksum {}",
                        trail.parsed.input_checksum,
                        trail.input.checksum()
                    )));
                }
                if trail.parsed.parsing_method == ParsingMethod::None {
                    return Err(AuditError::Schema(
                        "completed run has no parsing method".to_string(),
                    ));
                }
                require_schema_version(&trail.schema_version)?;
                check_confidences(&trail.parsed, &trail.decision, &trail.validation)?;
                check_validation(&trail.validation, trail.validation_bypassed)
            }
            Self::Failed(failed) => {
                if failed.failed_stage.trim().is_empty() {
                    return Err(AuditError::Schema("failed stage is empty".to_string()));
                }
                require_schema_version(&failed.schema_version)?;
                check_confidences(&failed.parsed, &failed.decision, &failed.validation)?;
                if !failed.validation.has_strict_fail() {
                    return Err(AuditError::Schema(
                        "failed run validation must carry a strict-fail".to_string(),
                    ));
                }
                check_validation(&failed.validation, false)
            }
        }
    }
}

fn require_schema_version(version: &str) -> Result<(), AuditError> {
    if version.trim().is_empty() {
        return Err(AuditError::Schema("schema version is empty".to_string()));
    }
    Ok(())
}

fn check_confidences(
    parsed: &ParsedDocument,
    decision: &DecisionOutcome,
    validation: &ValidationResult,
) -> Result<(), AuditError> {
    for (field, value) in [
        ("parserConfidence", parsed.parser_confidence),
        ("decision.confidence", decision.confidence),
        ("finalConfidence", validation.final_confidence),
    ] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(AuditError::Schema(format!(
                "{field} = {value} is outside [0, 1]"
            )));
        }
    }
    Ok(())
}

fn check_validation(validation: &ValidationResult, bypassed: bool) -> Result<(), AuditError> {
    if validation.rule_results.is_empty() {
        return Err(AuditError::Schema("rule result list is empty".to_string()));
    }
    if validation.has_strict_fail() {
        if validation.final_confidence != 0.0 {
            return Err(AuditError::Schema(
                "strict-fail present but final confidence is not 0".to_string(),
            ));
        }
        if validation.final_outcome != FinalOutcome::Rejected {
            return Err(AuditError::Schema(
                "strict-fail present but outcome is not rejected".to_string(),
            ));
        }
    } else if !bypassed {
        if validation.final_confidence == 0.0 {
            return Err(AuditError::Schema(
                "final confidence is 0 without a strict-fail".to_string(),
            ));
        }
        if validation.final_outcome == FinalOutcome::Rejected {
            return Err(AuditError::Schema(
                "outcome is rejected without a strict-fail".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DecisionSource, RiskLevel, Verdict};
    use crate::identity::DocumentId;
    use crate::validation::RuleResult;

    fn input() -> InputDocument {
        InputDocument::from_content("ent-1", "Policy", "Standard operating procedure", "text/plain", false)
            .unwrap()
    }

    fn trail() -> AuditTrail {
        let input = input();
        let now = Utc::now();
        AuditTrail {
            trace_id: TraceId::new(),
            enterprise_id: "ent-1".into(),
            parsed: ParsedDocument {
                doc_id: DocumentId::new(),
                input_checksum: input.checksum().clone(),
                extracted_text: "Standard operating procedure".into(),
                pages: 1,
                tables_found: 0,
                parsing_method: ParsingMethod::Primary,
                parser_confidence: 0.9,
                processed_at: now,
            },
            input,
            decision: DecisionOutcome {
                verdict: Verdict::Approved,
                rationale: "Meets policy".into(),
                required_controls: vec![],
                confidence: 0.95,
                risk_level: RiskLevel::Low,
                source: DecisionSource::Service,
                processed_at: now,
            },
            validation: ValidationResult {
                rule_results: vec![RuleResult::strict_pass("all-rules-passed", "ok")],
                final_confidence: 0.935,
                final_outcome: FinalOutcome::Approved,
                processed_at: now,
            },
            validation_bypassed: false,
            schema_version: SCHEMA_VERSION.into(),
            tool_versions: BTreeMap::new(),
            created_at: now,
        }
    }

    #[test]
    fn valid_trail_passes() {
        AuditRecord::Completed(trail()).validate().unwrap();
    }

    #[test]
    fn checksum_linkage_is_enforced() {
        let mut t = trail();
        t.parsed.input_checksum = Checksum::new("other").unwrap();
        let err = AuditRecord::Completed(t).validate().unwrap_err();
        assert!(matches!(err, AuditError::Schema(_)));
    }

    #[test]
    fn empty_rule_list_is_rejected() {
        let mut t = trail();
        t.validation.rule_results.clear();
        assert!(AuditRecord::Completed(t).validate().is_err());
    }

    #[test]
    fn strict_fail_with_nonzero_confidence_is_rejected() {
        let mut t = trail();
        t.validation.rule_results = vec![RuleResult::strict_fail("x", "bad")];
        t.validation.final_outcome = FinalOutcome::Rejected;
        assert!(AuditRecord::Completed(t).validate().is_err());
    }

    #[test]
    fn bypassed_run_may_carry_zero_confidence() {
        let mut t = trail();
        t.validation_bypassed = true;
        t.validation.rule_results = vec![RuleResult::strict_pass("validation-bypassed", "override")];
        t.validation.final_confidence = 0.0;
        t.validation.final_outcome = FinalOutcome::Rejected;
        AuditRecord::Completed(t).validate().unwrap();
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let mut t = trail();
        t.decision.confidence = 1.2;
        assert!(AuditRecord::Completed(t).validate().is_err());
    }

    #[test]
    fn failed_record_from_invalid_input_validates() {
        let record = AuditRecord::Failed(FailedRunRecord::new(
            TraceId::new(),
            InputDocumentDraft::default(),
            "validating",
            "checksum: is required",
            BTreeMap::new(),
        ));
        record.validate().unwrap();
        assert!(record.is_failed());
        if let AuditRecord::Failed(f) = &record {
            assert_eq!(f.parsed.input_checksum.as_str(), "unavailable");
            assert_eq!(f.parsed.parsing_method, ParsingMethod::None);
            assert_eq!(f.decision.risk_level, RiskLevel::Critical);
            assert!(f.enterprise_id.is_none());
        }
    }

    #[test]
    fn failed_record_prefers_submitted_checksum() {
        let draft = InputDocumentDraft {
            checksum: Some("abc123".into()),
            enterprise_id: Some("ent-1".into()),
            ..Default::default()
        };
        let f = FailedRunRecord::new(TraceId::new(), draft, "parsing", "defect", BTreeMap::new());
        assert_eq!(f.parsed.input_checksum.as_str(), "abc123");
        assert_eq!(f.enterprise_id.as_deref(), Some("ent-1"));
    }

    #[test]
    fn record_is_tagged_by_status() {
        let v = serde_json::to_value(AuditRecord::Completed(trail())).unwrap();
        assert_eq!(v["status"], "completed");
        assert_eq!(v["schemaVersion"], "v1.0");
    }

    #[test]
    fn record_round_trips_and_digest_is_stable() {
        let record = AuditRecord::Completed(trail());
        let json = serde_json::to_string(&record).unwrap();
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trace_id(), record.trace_id());
        back.validate().unwrap();
        assert_eq!(record.digest().unwrap(), record.digest().unwrap());
    }
}
