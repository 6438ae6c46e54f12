#![deny(missing_docs)]

//! # govpipe-validator — Rules, Confidence Blending, and Gating
//!
//! Validates an automated decision against deterministic business rules:
//!
//! - [`RuleEngine`]: ordered, independently evaluated rules producing
//!   strict-pass, strict-fail, or soft-warn results.
//! - [`calculate_final_confidence`] / [`gate_outcome`]: weighted blend of
//!   parser and decision confidence and the approved / rejected /
//!   human-in-loop gate.
//! - [`Validator`]: the three steps above as one call, plus the operator
//!   bypass result.
//!
//! Nothing here performs I/O. Every function is deterministic for its
//! inputs; the only clock read is `processed_at` in [`Validator::validate`].

pub mod blend;
pub mod rules;
pub mod validator;

pub use blend::{calculate_final_confidence, gate_outcome, round4, BlendConfig};
pub use rules::{Rule, RuleConfig, RuleContext, RuleEngine, RuleStats, ALL_RULES_PASSED};
pub use validator::{Validator, VALIDATION_BYPASSED};

/// Crate version, recorded in audit tool-version maps.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
