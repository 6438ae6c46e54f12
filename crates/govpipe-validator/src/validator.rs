//! Validator facade: rules, blend, and gate in one call.
//!
//! Callers that need a checkpoint between rule evaluation and blending use
//! [`Validator::evaluate_rules`] then [`Validator::blend_at`];
//! [`Validator::validate_at`] is exactly that composition.

use chrono::{DateTime, Utc};
use govpipe_core::{
    DecisionOutcome, FinalOutcome, ParsedDocument, RuleEvaluationError, RuleResult,
    ValidationResult, Verdict,
};

use crate::blend::{calculate_final_confidence, gate_outcome, round4, BlendConfig};
use crate::rules::{RuleConfig, RuleEngine};

/// Rule id of the pass-through result produced by [`Validator::bypass`].
pub const VALIDATION_BYPASSED: &str = "validation-bypassed";

/// Deterministic decision validator.
#[derive(Debug)]
pub struct Validator {
    engine: RuleEngine,
    blend: BlendConfig,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(RuleEngine::default(), BlendConfig::default())
    }
}

impl Validator {
    /// Validator over an explicit engine and blend configuration.
    pub fn new(engine: RuleEngine, blend: BlendConfig) -> Self {
        Self { engine, blend }
    }

    /// Validator built from configuration.
    pub fn from_config(rules: &RuleConfig, blend: BlendConfig) -> Self {
        Self::new(RuleEngine::new(rules), blend)
    }

    /// The rule engine.
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// The blend configuration.
    pub fn blend_config(&self) -> &BlendConfig {
        &self.blend
    }

    /// Validate with the current time as `processed_at`.
    pub fn validate(
        &self,
        decision: &DecisionOutcome,
        parsed: &ParsedDocument,
        enterprise_id: &str,
    ) -> Result<ValidationResult, RuleEvaluationError> {
        self.validate_at(decision, parsed, enterprise_id, Utc::now())
    }

    /// Validate with an explicit `processed_at`.
    ///
    /// For identical inputs and `now`, the result is identical.
    pub fn validate_at(
        &self,
        decision: &DecisionOutcome,
        parsed: &ParsedDocument,
        enterprise_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, RuleEvaluationError> {
        let rule_results = self.evaluate_rules(decision, parsed, enterprise_id);
        self.blend_at(decision, parsed, rule_results, now)
    }

    /// First step of [`Validator::validate_at`]: run the enabled rules.
    pub fn evaluate_rules(
        &self,
        decision: &DecisionOutcome,
        parsed: &ParsedDocument,
        enterprise_id: &str,
    ) -> Vec<RuleResult> {
        self.engine.evaluate(decision, parsed, enterprise_id)
    }

    /// Second step of [`Validator::validate_at`]: blend confidences and gate
    /// the outcome over already evaluated `rule_results`.
    pub fn blend_at(
        &self,
        decision: &DecisionOutcome,
        parsed: &ParsedDocument,
        rule_results: Vec<RuleResult>,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, RuleEvaluationError> {
        let final_confidence =
            calculate_final_confidence(&self.blend, decision, parsed, &rule_results)?;
        let final_outcome = gate_outcome(&self.blend, final_confidence, &rule_results);
        Ok(ValidationResult {
            rule_results,
            final_confidence,
            final_outcome,
            processed_at: now,
        })
    }

    /// Operator override: a pass-through result taken from the decision's
    /// own verdict and confidence, with no rules evaluated.
    pub fn bypass(decision: &DecisionOutcome, now: DateTime<Utc>) -> ValidationResult {
        ValidationResult {
            rule_results: vec![RuleResult::strict_pass(
                VALIDATION_BYPASSED,
                "Validation bypassed by operator override",
            )],
            final_confidence: round4(decision.confidence.clamp(0.0, 1.0)),
            final_outcome: match decision.verdict {
                Verdict::Approved => FinalOutcome::Approved,
                Verdict::Rejected => FinalOutcome::Rejected,
            },
            processed_at: now,
        }
    }
}
