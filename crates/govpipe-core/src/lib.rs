#![deny(missing_docs)]

//! # govpipe-core — Foundational Types for the Decision Pipeline
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies: only `serde`, `serde_json`,
//! `thiserror`, `chrono`, `uuid`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`Checksum`] is not an
//!    [`EnterpriseId`], and a [`TraceId`] is not a [`DocumentId`].
//!
//! 2. **Validated construction at the boundary.** An [`InputDocument`] can
//!    only be obtained by validating an [`InputDocumentDraft`]; every
//!    violation is reported at once as an [`InputValidationError`].
//!
//! 3. **Write-once records.** [`ParsedDocument`], [`DecisionOutcome`],
//!    [`ValidationResult`] and [`AuditRecord`] are plain values produced
//!    exactly once per run and never mutated afterwards.
//!
//! 4. **Structured errors.** [`PipelineError`] and its sub-enums are built
//!    with `thiserror`: no `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod audit;
pub mod decision;
pub mod digest;
pub mod document;
pub mod error;
pub mod identity;
pub mod validation;

pub use audit::{AuditRecord, AuditTrail, FailedRunRecord, SCHEMA_VERSION};
pub use decision::{DecisionOutcome, DecisionSource, RiskLevel, Verdict};
pub use digest::{content_checksum, json_digest, sha256_digest, ContentDigest};
pub use document::{InputDocument, InputDocumentDraft, ParsedDocument, ParsingMethod};
pub use error::{
    AuditError, DecisionError, FieldViolation, InputValidationError, ParserError, PipelineError,
    RuleEvaluationError, StageTransitionError,
};
pub use identity::{Checksum, DocumentId, EnterpriseId, TraceId};
pub use validation::{has_outcome, FinalOutcome, RuleOutcome, RuleResult, ValidationResult};
