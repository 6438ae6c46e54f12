//! # Rule Results and Validation Results
//!
//! Output types of the rule engine and the confidence blender/gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity tier of a single rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOutcome {
    /// The rule passed.
    StrictPass,
    /// The rule failed. Forces confidence to zero and the outcome to rejected.
    StrictFail,
    /// The rule raised a warning. Penalises confidence.
    SoftWarn,
}

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    /// Stable rule identifier, e.g. `high-risk-low-confidence`.
    pub rule_id: String,
    /// Severity tier.
    pub outcome: RuleOutcome,
    /// Human-readable explanation.
    pub message: String,
}

impl RuleResult {
    /// A strict-pass result.
    pub fn strict_pass(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule_id, RuleOutcome::StrictPass, message)
    }

    /// A strict-fail result.
    pub fn strict_fail(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule_id, RuleOutcome::StrictFail, message)
    }

    /// A soft-warn result.
    pub fn soft_warn(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule_id, RuleOutcome::SoftWarn, message)
    }

    fn new(rule_id: impl Into<String>, outcome: RuleOutcome, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            outcome,
            message: message.into(),
        }
    }
}

/// Final disposition of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalOutcome {
    /// Automatically approved.
    Approved,
    /// Automatically rejected.
    Rejected,
    /// Requires manual review.
    HumanInLoop,
}

impl FinalOutcome {
    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::HumanInLoop => "human-in-loop",
        }
    }
}

impl std::fmt::Display for FinalOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule results plus blended confidence and the gated outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Ordered, never empty.
    pub rule_results: Vec<RuleResult>,
    /// Blended confidence, rounded to four decimals, in [0, 1].
    pub final_confidence: f64,
    /// Gated disposition.
    pub final_outcome: FinalOutcome,
    /// When validation finished.
    pub processed_at: DateTime<Utc>,
}

impl ValidationResult {
    /// Whether any rule result is strict-fail.
    pub fn has_strict_fail(&self) -> bool {
        has_outcome(&self.rule_results, RuleOutcome::StrictFail)
    }

    /// Whether any rule result is soft-warn.
    pub fn has_soft_warn(&self) -> bool {
        has_outcome(&self.rule_results, RuleOutcome::SoftWarn)
    }

    /// Placeholder for runs that failed before validation.
    pub fn placeholder_failed(reason: &str, now: DateTime<Utc>) -> Self {
        Self {
            rule_results: vec![RuleResult::strict_fail(
                "processing-failed",
                format!("Pipeline processing failed: {reason}"),
            )],
            final_confidence: 0.0,
            final_outcome: FinalOutcome::Rejected,
            processed_at: now,
        }
    }
}

/// Whether `results` contains at least one result with `outcome`.
pub fn has_outcome(results: &[RuleResult], outcome: RuleOutcome) -> bool {
    results.iter().any(|r| r.outcome == outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_outcome_wire_labels() {
        assert_eq!(
            serde_json::to_string(&RuleOutcome::StrictFail).unwrap(),
            "\"STRICT_FAIL\""
        );
        assert_eq!(
            serde_json::to_string(&RuleOutcome::SoftWarn).unwrap(),
            "\"SOFT_WARN\""
        );
    }

    #[test]
    fn final_outcome_wire_labels() {
        assert_eq!(
            serde_json::to_string(&FinalOutcome::HumanInLoop).unwrap(),
            "\"human-in-loop\""
        );
        assert_eq!(FinalOutcome::Approved.to_string(), "approved");
    }

    #[test]
    fn placeholder_is_a_single_strict_fail() {
        let v = ValidationResult::placeholder_failed("parser defect", Utc::now());
        assert_eq!(v.rule_results.len(), 1);
        assert_eq!(v.rule_results[0].rule_id, "processing-failed");
        assert!(v.has_strict_fail());
        assert!(!v.has_soft_warn());
        assert_eq!(v.final_confidence, 0.0);
        assert_eq!(v.final_outcome, FinalOutcome::Rejected);
    }
}
