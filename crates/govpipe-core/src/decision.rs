//! # Decision Outcomes
//!
//! The fixed shape every automated decision is normalised into, whether it
//! came from the external decision service or the local heuristic fallback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verdict of the automated decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The document was approved.
    Approved,
    /// The document was rejected. Also the conservative default.
    Rejected,
}

impl Verdict {
    /// Map a raw service value onto a verdict.
    ///
    /// Only an explicit `approve`/`approved` approves. Everything else,
    /// including a missing value, rejects.
    pub fn from_service_value(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("approve") | Some("approved") => Self::Approved,
            _ => Self::Rejected,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => f.write_str("approved"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

/// Risk level attached to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
    /// Critical risk.
    Critical,
}

impl RiskLevel {
    /// Case-insensitive parse. Returns `None` for unknown values.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// The external decision service answered.
    Service,
    /// The local keyword heuristic stood in for the service.
    Fallback,
    /// No decision was made; failed-run placeholder.
    Placeholder,
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Service => "service",
            Self::Fallback => "fallback",
            Self::Placeholder => "placeholder",
        };
        f.write_str(s)
    }
}

/// A normalised automated decision. Produced once per run; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    /// The verdict.
    #[serde(rename = "decision")]
    pub verdict: Verdict,
    /// Free-text rationale.
    pub rationale: String,
    /// Controls the decision requires before the document can be relied on.
    pub required_controls: Vec<String>,
    /// Decision confidence in [0, 1].
    pub confidence: f64,
    /// Assessed risk.
    pub risk_level: RiskLevel,
    /// Service response or local fallback.
    pub source: DecisionSource,
    /// When the decision was made.
    pub processed_at: DateTime<Utc>,
}

impl DecisionOutcome {
    /// Placeholder for runs that never reached a decision.
    pub fn placeholder_failed(reason: &str, now: DateTime<Utc>) -> Self {
        Self {
            verdict: Verdict::Rejected,
            rationale: format!("Processing failed: {reason}"),
            required_controls: vec!["manual_verification".to_string()],
            confidence: 0.0,
            risk_level: RiskLevel::Critical,
            source: DecisionSource::Placeholder,
            processed_at: now,
        }
    }
}
