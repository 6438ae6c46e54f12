#![deny(missing_docs)]

//! # govpipe-orchestrator — The Deterministic Decision Pipeline
//!
//! [`PolicyOrchestrator`] sequences one run per submitted document:
//!
//! 1. **validating**: the draft is checked against the input schema.
//! 2. **parsing**: the failover parser, served from the content cache when
//!    the checksum was seen before.
//! 3. **deciding**: the breaker-guarded decision client, with heuristic
//!    fallback when the service is unavailable.
//! 4. **validating-rules** and **blending**: deterministic rules, weighted
//!    confidence, and the approval gate. Skipped under operator bypass.
//! 5. **auditing**: exactly one write-once audit record per run.
//!
//! Runs are independent; the content cache and the breaker are the only
//! shared mutable state. [`PolicyOrchestrator::process_batch`] runs many
//! submissions concurrently under a permit bound.

pub mod config;
pub mod orchestrator;
pub mod stage;

pub use config::{PipelineConfig, PipelineConfigError};
pub use orchestrator::{
    AuditStatus, BatchItem, BatchReport, BatchSummary, PolicyOrchestrator, ProcessingOptions,
    ProcessingResult, ProcessingStats, RunFailure, RunStatus,
};
pub use stage::{RunStage, RunTracker, StageTransition};

/// Crate version, recorded in audit tool-version maps.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
