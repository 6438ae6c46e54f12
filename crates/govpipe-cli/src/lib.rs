//! # govpipe-cli — Operator CLI for the Decision Pipeline
//!
//! Provides the `govpipe` command-line interface, a thin surface over
//! [`PolicyOrchestrator`](govpipe_orchestrator::PolicyOrchestrator).
//!
//! ## Subcommands
//!
//! - `govpipe process`: run one document through the pipeline.
//! - `govpipe batch`: run a JSON array or JSON Lines file of documents.
//! - `govpipe checksum`: print the content checksum the pipeline keys on.
//!
//! ## Decision service
//!
//! When `GOVPIPE_DECISION_URL` is set, decisions come from the HTTP service
//! it names (see [`DecisionServiceConfig::from_env`](govpipe_decision::DecisionServiceConfig::from_env)).
//! Otherwise every decision uses the local heuristic fallback.
//!
//! ```bash
//! govpipe -v process submission.json --audit-log audit.jsonl
//! govpipe process policy.txt --raw --enterprise-id acme --title "AUP"
//! govpipe batch submissions.jsonl --concurrency 4
//! govpipe checksum policy.txt
//! ```

pub mod batch;
pub mod checksum;
pub mod pipeline;
pub mod process;

use govpipe_core::FinalOutcome;
use govpipe_orchestrator::{ProcessingResult, RunStatus};

/// Process exit codes.
pub mod exit {
    /// The run completed and was approved, or the command succeeded.
    pub const APPROVED: u8 = 0;
    /// Unexpected error (I/O, configuration, defect).
    pub const ERROR: u8 = 1;
    /// The run completed and needs manual review.
    pub const HUMAN_IN_LOOP: u8 = 2;
    /// The run completed and was rejected.
    pub const REJECTED: u8 = 3;
    /// The run failed, or at least one batch item did not complete.
    pub const FAILED: u8 = 4;
    /// The submission failed input validation.
    pub const INVALID: u8 = 5;
    /// Interrupted before auditing began.
    pub const CANCELLED: u8 = 130;
}

/// Map a run result to its exit code.
pub fn exit_code(result: &ProcessingResult) -> u8 {
    match (result.run_status, result.final_outcome) {
        (RunStatus::Failed, _) => exit::FAILED,
        (RunStatus::Completed, FinalOutcome::Approved) => exit::APPROVED,
        (RunStatus::Completed, FinalOutcome::HumanInLoop) => exit::HUMAN_IN_LOOP,
        (RunStatus::Completed, FinalOutcome::Rejected) => exit::REJECTED,
    }
}

/// Print `value` as one line of JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
