//! # Confidence Blender and Outcome Gate
//!
//! Both functions are pure.
//!
//! ```text
//! base  = parser_confidence * 0.3 + decision_confidence * 0.7
//! final = 0                      if any strict-fail
//!       = round4(base * 0.85)    if any soft-warn
//!       = round4(base)           otherwise
//!
//! gate  = rejected       if any strict-fail
//!       = human-in-loop  if final < 0.85
//!       = approved       otherwise
//! ```
//!
//! Rounding is half-up at four decimal places: `floor(x * 10^4 + 0.5) / 10^4`.

use govpipe_core::{
    has_outcome, DecisionOutcome, FinalOutcome, ParsedDocument, RuleEvaluationError, RuleOutcome,
    RuleResult,
};
use serde::{Deserialize, Serialize};

/// Blend weights, penalty, and approval threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// Weight of the parser's confidence ceiling.
    pub parser_weight: f64,
    /// Weight of the decision confidence.
    pub decision_weight: f64,
    /// Multiplier applied when any rule soft-warns.
    pub soft_warn_penalty: f64,
    /// Minimum final confidence for automatic approval.
    pub approval_threshold: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            parser_weight: 0.3,
            decision_weight: 0.7,
            soft_warn_penalty: 0.85,
            approval_threshold: 0.85,
        }
    }
}

/// Round half-up to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0 + 0.5).floor() / 10_000.0
}

fn check_unit(field: &'static str, value: f64) -> Result<f64, RuleEvaluationError> {
    if !value.is_finite() {
        return Err(RuleEvaluationError::NonFiniteConfidence { field });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(RuleEvaluationError::ConfidenceOutOfRange { field, value });
    }
    Ok(value)
}

/// Blend parser and decision confidence, applying rule penalties.
///
/// # Errors
///
/// Returns [`RuleEvaluationError`] if either input confidence is non-finite
/// or outside [0, 1]. Upstream stages never produce such values, so an
/// error here is a defect.
pub fn calculate_final_confidence(
    config: &BlendConfig,
    decision: &DecisionOutcome,
    parsed: &ParsedDocument,
    rule_results: &[RuleResult],
) -> Result<f64, RuleEvaluationError> {
    let parser = check_unit("parser_confidence", parsed.parser_confidence)?;
    let decided = check_unit("decision_confidence", decision.confidence)?;

    if has_outcome(rule_results, RuleOutcome::StrictFail) {
        return Ok(0.0);
    }

    let mut blended = parser * config.parser_weight + decided * config.decision_weight;
    if has_outcome(rule_results, RuleOutcome::SoftWarn) {
        blended *= config.soft_warn_penalty;
    }
    Ok(round4(blended).clamp(0.0, 1.0))
}

/// Map a final confidence and the rule results to a disposition.
pub fn gate_outcome(
    config: &BlendConfig,
    final_confidence: f64,
    rule_results: &[RuleResult],
) -> FinalOutcome {
    if has_outcome(rule_results, RuleOutcome::StrictFail) {
        FinalOutcome::Rejected
    } else if final_confidence < config.approval_threshold {
        FinalOutcome::HumanInLoop
    } else {
        FinalOutcome::Approved
    }
}



#[cfg(test)]
mod tests_support {
    use super::*;
    use chrono::Utc;
    use govpipe_core::{Checksum, DecisionSource, DocumentId, ParsingMethod, RiskLevel, Verdict};

    pub(super) fn decision(confidence: f64) -> DecisionOutcome {
        DecisionOutcome {
            verdict: Verdict::Approved,
            rationale: "ok".into(),
            required_controls: vec![],
            confidence,
            risk_level: RiskLevel::Low,
            source: DecisionSource::Service,
            processed_at: Utc::now(),
        }
    }

    pub(super) fn parsed(confidence: f64) -> ParsedDocument {
        ParsedDocument {
            doc_id: DocumentId::new(),
            input_checksum: Checksum::new("abc").unwrap(),
            extracted_text: String::new(),
            pages: 1,
            tables_found: 0,
            parsing_method: ParsingMethod::Primary,
            parser_confidence: confidence,
            processed_at: Utc::now(),
        }
    }
}
