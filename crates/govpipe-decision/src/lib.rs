//! # govpipe-decision — Breaker-Guarded Decision Client
//!
//! Obtains a [`DecisionOutcome`](govpipe_core::DecisionOutcome) for a parsed
//! document from an external automated-decision service:
//!
//! - [`DecisionService`]: the request/response boundary, with an HTTP
//!   implementation ([`HttpDecisionService`]) configured through
//!   [`DecisionServiceConfig`].
//! - [`normalize_response`]: maps heterogeneous JSON answers onto the fixed
//!   decision shape; unknown or missing verdicts reject.
//! - [`CircuitBreaker`]: closed/open failure-count breaker with cooldown.
//! - [`heuristic_decision`]: the local keyword fallback.
//! - [`DecisionClient`]: ties them together and never fails.
//!
//! Service unavailability is never a pipeline failure: it routes to the
//! fallback and is visible in the decision's `source` and rationale.

pub mod breaker;
pub mod client;
pub mod config;
pub mod fallback;
pub mod normalize;
pub mod service;

pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use client::DecisionClient;
pub use config::{ConfigError, DecisionServiceConfig};
pub use fallback::{heuristic_decision, FALLBACK_RATIONALE_PREFIX};
pub use normalize::normalize_response;
pub use service::{
    DecisionRequest, DecisionService, HttpDecisionService, MockDecisionService,
    OfflineDecisionService,
};

/// Crate version, recorded in audit tool-version maps.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
