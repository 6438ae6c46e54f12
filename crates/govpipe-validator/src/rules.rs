//! # Rule Engine
//!
//! Deterministic business rules evaluated against a (parsed document,
//! decision) pair. Every enabled rule is evaluated independently and every
//! rule that fires contributes one [`RuleResult`], in insertion order. When
//! nothing fires a single synthetic `all-rules-passed` strict-pass is
//! emitted, so the result list is never empty.
//!
//! ## Built-in rules
//!
//! | Id | Fires when | Tier |
//! |----|------------|------|
//! | `low-fidelity-parse` | lowest-fidelity method and parser confidence below the minimum | strict-fail |
//! | `insufficient-rationale` | rejected with a rationale shorter than the minimum | soft-warn |
//! | `high-risk-low-confidence` | critical risk and decision confidence below the minimum | strict-fail |
//! | `sensitive-health-information` | parsed text contains a health-information marker | soft-warn |
//!
//! The thresholds are policy, not structure: they live in [`RuleConfig`]
//! with defaults preserving the established behaviour.
//!
//! The engine counts, per rule, how often it was evaluated and how often it
//! fired in each tier ([`RuleEngine::stats`]).

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use govpipe_core::{
    DecisionOutcome, ParsedDocument, ParsingMethod, RiskLevel, RuleOutcome, RuleResult, Verdict,
};
use serde::{Deserialize, Serialize};

/// Rule id of the synthetic pass emitted when no rule fires.
pub const ALL_RULES_PASSED: &str = "all-rules-passed";
/// Rule id of the low-fidelity parse rule.
pub const LOW_FIDELITY_PARSE: &str = "low-fidelity-parse";
/// Rule id of the insufficient rationale rule.
pub const INSUFFICIENT_RATIONALE: &str = "insufficient-rationale";
/// Rule id of the critical-risk confidence rule.
pub const HIGH_RISK_LOW_CONFIDENCE: &str = "high-risk-low-confidence";
/// Rule id of the health-information marker rule.
pub const SENSITIVE_HEALTH_INFORMATION: &str = "sensitive-health-information";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Rule thresholds and toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Parser confidence below which a low-fidelity parse strict-fails.
    pub min_parser_confidence: f64,
    /// The method treated as lowest fidelity.
    pub low_fidelity_method: ParsingMethod,
    /// Minimum rationale length (characters) for a rejection.
    pub min_rationale_chars: usize,
    /// Decision confidence a critical-risk decision must reach.
    pub critical_risk_min_confidence: f64,
    /// Case-insensitive, word-bounded markers of protected health information.
    pub sensitive_health_markers: Vec<String>,
    /// Rule ids to skip.
    pub disabled_rules: Vec<String>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_parser_confidence: 0.7,
            low_fidelity_method: ParsingMethod::Tertiary,
            min_rationale_chars: 50,
            critical_risk_min_confidence: 0.9,
            sensitive_health_markers: [
                "phi",
                "protected health information",
                "hipaa",
                "medical record",
                "patient",
                "diagnosis",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            disabled_rules: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule trait
// ---------------------------------------------------------------------------

/// Inputs every rule sees.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// The decision under validation.
    pub decision: &'a DecisionOutcome,
    /// The parsed document the decision was made on.
    pub parsed: &'a ParsedDocument,
    /// Owning enterprise.
    pub enterprise_id: &'a str,
}

/// A deterministic business rule.
///
/// Rules are pure: the same context always yields the same result, and
/// evaluation has no side effects.
pub trait Rule: Send + Sync {
    /// Stable identifier, used in results and in `disabled_rules`.
    fn id(&self) -> &str;

    /// Evaluate. `None` means the rule did not fire.
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleResult>;
}

struct LowFidelityParse {
    method: ParsingMethod,
    min_confidence: f64,
}

impl Rule for LowFidelityParse {
    fn id(&self) -> &str {
        LOW_FIDELITY_PARSE
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleResult> {
        let parsed = ctx.parsed;
        (parsed.parsing_method == self.method && parsed.parser_confidence < self.min_confidence)
            .then(|| {
                RuleResult::strict_fail(
                    LOW_FIDELITY_PARSE,
                    format!(
                        "Document was parsed with the {} fallback at confidence {:.2}, below the {:.2} minimum",
                        parsed.parsing_method, parsed.parser_confidence, self.min_confidence
                    ),
                )
            })
    }
}

struct InsufficientRationale {
    min_chars: usize,
}

impl Rule for InsufficientRationale {
    fn id(&self) -> &str {
        INSUFFICIENT_RATIONALE
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleResult> {
        let len = ctx.decision.rationale.chars().count();
        (ctx.decision.verdict == Verdict::Rejected && len < self.min_chars).then(|| {
            RuleResult::soft_warn(
                INSUFFICIENT_RATIONALE,
                format!(
                    "Rejection rationale is {len} characters; at least {} are required for audit",
                    self.min_chars
                ),
            )
        })
    }
}

struct HighRiskLowConfidence {
    min_confidence: f64,
}

impl Rule for HighRiskLowConfidence {
    fn id(&self) -> &str {
        HIGH_RISK_LOW_CONFIDENCE
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleResult> {
        let d = ctx.decision;
        (d.risk_level == RiskLevel::Critical && d.confidence < self.min_confidence).then(|| {
            RuleResult::strict_fail(
                HIGH_RISK_LOW_CONFIDENCE,
                format!(
                    "Critical risk requires decision confidence of at least {:.2}, got {:.2}",
                    self.min_confidence, d.confidence
                ),
            )
        })
    }
}

struct SensitiveHealthInformation {
    markers: Vec<String>,
}

impl Rule for SensitiveHealthInformation {
    fn id(&self) -> &str {
        SENSITIVE_HEALTH_INFORMATION
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleResult> {
        let text = ctx.parsed.extracted_text.to_lowercase();
        let found: Vec<&str> = self
            .markers
            .iter()
            .map(String::as_str)
            .filter(|m| contains_word(&text, m))
            .collect();
        (!found.is_empty()).then(|| {
            RuleResult::soft_warn(
                SENSITIVE_HEALTH_INFORMATION,
                format!(
                    "Document references protected health information ({})",
                    found.join(", ")
                ),
            )
        })
    }
}

/// Whether `needle` occurs in `haystack` bounded by non-alphanumerics.
///
/// Both arguments are expected lowercase.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Execution counters of one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStats {
    /// Rule id.
    pub rule_id: String,
    /// Whether the rule is currently evaluated.
    pub enabled: bool,
    /// Times the rule was evaluated.
    pub evaluations: u64,
    /// Times it fired a strict-pass.
    pub strict_passes: u64,
    /// Times it fired a strict-fail.
    pub strict_fails: u64,
    /// Times it fired a soft-warn.
    pub soft_warns: u64,
    /// Fraction of evaluations that fired, 0 before the first evaluation.
    pub fire_rate: f64,
}

#[derive(Default)]
struct Counters {
    evaluations: AtomicU64,
    strict_passes: AtomicU64,
    strict_fails: AtomicU64,
    soft_warns: AtomicU64,
}

impl Counters {
    fn record(&self, fired: Option<RuleOutcome>) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let tier = match fired {
            None => return,
            Some(RuleOutcome::StrictPass) => &self.strict_passes,
            Some(RuleOutcome::StrictFail) => &self.strict_fails,
            Some(RuleOutcome::SoftWarn) => &self.soft_warns,
        };
        tier.fetch_add(1, Ordering::Relaxed);
    }
}

struct Registered {
    rule: Box<dyn Rule>,
    counters: Counters,
}

impl Registered {
    fn new(rule: Box<dyn Rule>) -> Self {
        Self {
            rule,
            counters: Counters::default(),
        }
    }
}

/// Ordered rule set with per-id disabling.
pub struct RuleEngine {
    rules: Vec<Registered>,
    disabled: BTreeSet<String>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rule_ids())
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(&RuleConfig::default())
    }
}

impl RuleEngine {
    /// Engine with the four built-in rules, configured by `config`.
    pub fn new(config: &RuleConfig) -> Self {
        let markers = config
            .sensitive_health_markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        let built_in: Vec<Box<dyn Rule>> = vec![
            Box::new(LowFidelityParse {
                method: config.low_fidelity_method,
                min_confidence: config.min_parser_confidence,
            }),
            Box::new(InsufficientRationale {
                min_chars: config.min_rationale_chars,
            }),
            Box::new(HighRiskLowConfidence {
                min_confidence: config.critical_risk_min_confidence,
            }),
            Box::new(SensitiveHealthInformation { markers }),
        ];
        Self {
            rules: built_in.into_iter().map(Registered::new).collect(),
            disabled: config.disabled_rules.iter().cloned().collect(),
        }
    }

    /// Append a custom rule after the existing ones.
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Registered::new(Box::new(rule)));
        self
    }

    /// Skip the rule with `id`.
    pub fn disable(&mut self, id: &str) {
        self.disabled.insert(id.to_string());
    }

    /// Re-enable the rule with `id`.
    pub fn enable(&mut self, id: &str) {
        self.disabled.remove(id);
    }

    /// Ids of all registered rules, in evaluation order.
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.rule.id()).collect()
    }

    /// Whether the rule with `id` will be evaluated.
    pub fn is_enabled(&self, id: &str) -> bool {
        !self.disabled.contains(id) && self.rules.iter().any(|r| r.rule.id() == id)
    }

    /// Evaluate every enabled rule. Never returns an empty list.
    pub fn evaluate(
        &self,
        decision: &DecisionOutcome,
        parsed: &ParsedDocument,
        enterprise_id: &str,
    ) -> Vec<RuleResult> {
        let ctx = RuleContext {
            decision,
            parsed,
            enterprise_id,
        };
        let mut results = Vec::new();
        let enabled = self
            .rules
            .iter()
            .filter(|r| !self.disabled.contains(r.rule.id()));
        for registered in enabled {
            let fired = registered.rule.evaluate(&ctx);
            registered.counters.record(fired.as_ref().map(|r| r.outcome));
            results.extend(fired);
        }
        if results.is_empty() {
            results.push(RuleResult::strict_pass(
                ALL_RULES_PASSED,
                "All validation rules passed",
            ));
        }
        tracing::debug!(
            enterprise_id,
            fired = results.len(),
            "rules evaluated"
        );
        results
    }

    /// Per-rule counters, in evaluation order.
    pub fn stats(&self) -> Vec<RuleStats> {
        self.rules
            .iter()
            .map(|r| {
                let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
                let evaluations = load(&r.counters.evaluations);
                let strict_passes = load(&r.counters.strict_passes);
                let strict_fails = load(&r.counters.strict_fails);
                let soft_warns = load(&r.counters.soft_warns);
                let fired = strict_passes + strict_fails + soft_warns;
                RuleStats {
                    rule_id: r.rule.id().to_string(),
                    enabled: !self.disabled.contains(r.rule.id()),
                    evaluations,
                    strict_passes,
                    strict_fails,
                    soft_warns,
                    fire_rate: if evaluations == 0 {
                        0.0
                    } else {
                        fired as f64 / evaluations as f64
                    },
                }
            })
            .collect()
    }
}
