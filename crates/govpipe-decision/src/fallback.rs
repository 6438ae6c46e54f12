//! Local keyword heuristic used when the decision service is unavailable.
//!
//! Deliberately conservative: it never claims more confidence than a real
//! service answer would, and its rationale always starts with
//! [`FALLBACK_RATIONALE_PREFIX`] so audits can tell it apart.

use chrono::{DateTime, Utc};
use govpipe_core::{DecisionOutcome, DecisionSource, RiskLevel, Verdict};

/// Prefix of every fallback rationale.
pub const FALLBACK_RATIONALE_PREFIX: &str = "Fallback analysis:";

/// Terms whose presence rejects a document.
pub const RISK_TERMS: &[&str] = &["unauthorized", "violation", "breach", "illegal", "non-compliant"];

/// Confidence of a fallback rejection.
pub const FALLBACK_REJECT_CONFIDENCE: f64 = 0.6;

/// Confidence of a fallback approval.
pub const FALLBACK_APPROVE_CONFIDENCE: f64 = 0.7;

/// Decide locally from the parsed text.
pub fn heuristic_decision(text: &str, now: DateTime<Utc>) -> DecisionOutcome {
    let lowered = text.to_lowercase();
    let risky: Vec<&str> = RISK_TERMS
        .iter()
        .copied()
        .filter(|term| lowered.contains(term))
        .collect();

    if !risky.is_empty() {
        return DecisionOutcome {
            verdict: Verdict::Rejected,
            rationale: format!(
                "{FALLBACK_RATIONALE_PREFIX} Document contains potentially risky terms requiring review ({})",
                risky.join(", ")
            ),
            required_controls: ["legal_review", "compliance_check", "manual_verification"]
                .into_iter()
                .map(String::from)
                .collect(),
            confidence: FALLBACK_REJECT_CONFIDENCE,
            risk_level: RiskLevel::High,
            source: DecisionSource::Fallback,
            processed_at: now,
        };
    }

    DecisionOutcome {
        verdict: Verdict::Approved,
        rationale: format!(
            "{FALLBACK_RATIONALE_PREFIX} Document appears to meet basic compliance requirements"
        ),
        required_controls: vec!["standard_review".to_string()],
        confidence: FALLBACK_APPROVE_CONFIDENCE,
        risk_level: if lowered.contains("sensitive") {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        },
        source: DecisionSource::Fallback,
        processed_at: now,
    }
}
