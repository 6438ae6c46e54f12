//! # Error Hierarchy
//!
//! Structured error types for the pipeline, built with `thiserror`.
//!
//! Each stage has its own error enum carrying the context an operator needs:
//! which strategy or endpoint failed, the timeout that elapsed, the field
//! that was rejected. [`PipelineError`] is the only type that crosses the
//! orchestrator boundary, and only two of its variants ever reach a caller:
//! input validation failures and cancellations. The others abort a run into
//! its failed state and end up as the reason on the failure record.
//! Audit persistence errors never fail a run; they surface as an unaudited
//! result instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::ParsingMethod;
use crate::identity::TraceId;

/// Top-level error type for a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input document failed schema validation. Nothing was processed.
    #[error("input validation failed for run {trace_id}: {source}")]
    InputValidation {
        /// Trace identifier of the rejected run (its failure record carries the same id).
        trace_id: TraceId,
        /// The accumulated field violations.
        source: InputValidationError,
    },

    /// The run was cancelled between stages, before auditing began.
    #[error("run {trace_id} cancelled before stage {stage}")]
    Cancelled {
        /// Trace identifier of the cancelled run.
        trace_id: TraceId,
        /// The stage that would have executed next.
        stage: String,
    },

    /// Parsing failed in a way the failover chain cannot recover from.
    #[error("parser error: {0}")]
    Parser(#[from] ParserError),

    /// Rule evaluation or confidence blending hit a defect.
    #[error("rule evaluation error: {0}")]
    RuleEvaluation(#[from] RuleEvaluationError),

    /// Run stage machine violation.
    #[error("stage transition error: {0}")]
    StageTransition(#[from] StageTransitionError),
}

/// A single rejected field of an input document.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{field}: {reason}")]
pub struct FieldViolation {
    /// The offending field, in wire (camelCase) spelling.
    pub field: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl FieldViolation {
    /// Build a violation for `field`.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Structured input validation failure.
///
/// Validation accumulates every violation instead of stopping at the first,
/// so a caller can fix a malformed document in one round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{} violation(s): {}", .violations.len(), join_violations(.violations))]
pub struct InputValidationError {
    /// Every field that failed validation, in field order.
    pub violations: Vec<FieldViolation>,
}

impl InputValidationError {
    /// Whether `field` is among the violations.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by extraction strategies.
///
/// Every variant except [`ParserError::TerminalStrategyFailed`] is recovered
/// by falling through to the next strategy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    /// The strategy cannot handle the declared MIME type.
    #[error("{method} strategy does not support MIME type {mime_type}")]
    UnsupportedMimeType {
        /// Strategy that declined the document.
        method: ParsingMethod,
        /// The declared MIME type.
        mime_type: String,
    },

    /// The content was empty after normalisation.
    #[error("{method} strategy received blank content")]
    EmptyContent {
        /// Strategy that received the blank content.
        method: ParsingMethod,
    },

    /// The strategy did not finish within the caller-supplied timeout.
    #[error("{method} strategy timed out after {timeout_ms}ms")]
    Timeout {
        /// Strategy that timed out.
        method: ParsingMethod,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Any other strategy failure.
    #[error("{method} strategy failed: {reason}")]
    StrategyFailed {
        /// Strategy that failed.
        method: ParsingMethod,
        /// Human-readable cause.
        reason: String,
    },

    /// The terminal strategy failed. This is a configuration defect.
    #[error("terminal parsing strategy failed: {reason}")]
    TerminalStrategyFailed {
        /// Human-readable cause.
        reason: String,
    },
}

/// Errors talking to the external decision service.
///
/// None of these ever fail a run: the decision client converts every one
/// into a heuristic fallback decision.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    /// The circuit breaker is open; the service was not contacted.
    #[error("circuit breaker open after {consecutive_failures} consecutive failures")]
    CircuitOpen {
        /// Failure count at the time of the rejected call.
        consecutive_failures: u32,
    },

    /// The call exceeded its timeout.
    #[error("decision service timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Transport-level failure (connection refused, TLS, DNS).
    #[error("transport error calling {endpoint}: {reason}")]
    Transport {
        /// Endpoint that was called.
        endpoint: String,
        /// Underlying cause.
        reason: String,
    },

    /// The service answered with a non-2xx status.
    #[error("decision service {endpoint} returned {status}: {body}")]
    ServiceStatus {
        /// Endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// The service answered `success: false`.
    #[error("decision service rejected the request: {reason}")]
    ServiceRejected {
        /// Error text reported by the service.
        reason: String,
    },

    /// The response could not be normalised into a decision.
    #[error("malformed decision response: {reason}")]
    MalformedResponse {
        /// What was missing or invalid.
        reason: String,
    },

    /// No decision service is configured.
    #[error("decision service unavailable: {reason}")]
    Unavailable {
        /// Why the service is unavailable.
        reason: String,
    },
}

/// Defects detected while evaluating rules or blending confidence.
///
/// Rules and the blender are pure functions over validated data, so any of
/// these indicates a programming error upstream and aborts the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleEvaluationError {
    /// A confidence input was NaN or infinite.
    #[error("{field} is not a finite number")]
    NonFiniteConfidence {
        /// Name of the offending input.
        field: &'static str,
    },

    /// A confidence input fell outside [0, 1].
    #[error("{field} = {value} is outside [0, 1]")]
    ConfidenceOutOfRange {
        /// Name of the offending input.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Errors persisting an audit record.
#[derive(Error, Debug)]
pub enum AuditError {
    /// The record failed schema validation and was not written.
    #[error("audit record schema violation: {0}")]
    Schema(String),

    /// A record with this trace id already exists; records are write-once.
    #[error("audit record for trace {trace_id} already written")]
    Duplicate {
        /// The duplicated trace id.
        trace_id: TraceId,
    },

    /// The backing store could not be reached.
    #[error("audit store unavailable: {0}")]
    Unavailable(String),

    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors during run stage transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageTransitionError {
    /// The attempted transition is not valid from the current stage.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The current stage name.
        from: String,
        /// The attempted target stage name.
        to: String,
    },
}
