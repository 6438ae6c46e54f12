//! # Run Stage Machine
//!
//! ```text
//! validating ─▶ parsing ─▶ deciding ─▶ validating-rules ─▶ blending ─▶ auditing ─▶ done
//!                              │                                          ▲
//!                              └──────────── bypass ──────────────────────┘
//!
//! any non-terminal stage ─▶ failed
//! ```
//!
//! A runtime enum with validated transitions: `failed` is reachable from
//! every non-terminal stage, which a typestate encoding would multiply out.

use std::time::Instant;

use govpipe_core::StageTransitionError;
use serde::{Deserialize, Serialize};

/// Stage of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStage {
    /// Input schema validation.
    Validating,
    /// Failover parsing.
    Parsing,
    /// Decision client call.
    Deciding,
    /// Rule engine evaluation.
    ValidatingRules,
    /// Confidence blending and gating.
    Blending,
    /// Audit write. Cancellation is no longer honoured from here on.
    Auditing,
    /// Finished (terminal).
    Done,
    /// Failed (terminal).
    Failed,
}

impl RunStage {
    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Parsing => "parsing",
            Self::Deciding => "deciding",
            Self::ValidatingRules => "validating-rules",
            Self::Blending => "blending",
            Self::Auditing => "auditing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether cancellation may still stop the run before this stage.
    pub fn is_cancellable(self) -> bool {
        !matches!(self, Self::Auditing | Self::Done | Self::Failed)
    }

    /// Whether `self -> to` is a valid transition.
    pub fn can_transition_to(self, to: RunStage) -> bool {
        use RunStage::*;
        match (self, to) {
            (from, Failed) => !from.is_terminal(),
            (Validating, Parsing)
            | (Parsing, Deciding)
            | (Deciding, ValidatingRules)
            | (Deciding, Auditing)
            | (ValidatingRules, Blending)
            | (Blending, Auditing)
            | (Auditing, Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTransition {
    /// Stage left.
    pub from: RunStage,
    /// Stage entered.
    pub to: RunStage,
    /// Milliseconds since the run started.
    pub at_ms: u64,
}

/// Tracks the stage of one run and its transition history.
#[derive(Debug, Clone)]
pub struct RunTracker {
    stage: RunStage,
    started: Instant,
    history: Vec<StageTransition>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    /// A run in `validating`.
    pub fn new() -> Self {
        Self {
            stage: RunStage::Validating,
            started: Instant::now(),
            history: Vec::new(),
        }
    }

    /// Current stage.
    pub fn stage(&self) -> RunStage {
        self.stage
    }

    /// Transitions so far, oldest first.
    pub fn history(&self) -> &[StageTransition] {
        &self.history
    }

    /// Milliseconds since the run started.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Move to `to`.
    pub fn advance(&mut self, to: RunStage) -> Result<(), StageTransitionError> {
        if !self.stage.can_transition_to(to) {
            return Err(StageTransitionError::InvalidTransition {
                from: self.stage.to_string(),
                to: to.to_string(),
            });
        }
        tracing::trace!(from = %self.stage, %to, "stage transition");
        self.history.push(StageTransition {
            from: self.stage,
            to,
            at_ms: self.elapsed_ms(),
        });
        self.stage = to;
        Ok(())
    }

    /// Move to `failed`, returning the stage the run failed in.
    ///
    /// A terminal run keeps its stage.
    pub fn fail(&mut self) -> RunStage {
        let at = self.stage;
        if self.advance(RunStage::Failed).is_err() {
            tracing::warn!(stage = %at, "fail() on a terminal run ignored");
        }
        at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(tracker: &mut RunTracker, stages: &[RunStage]) {
        for s in stages {
            tracker.advance(*s).unwrap();
        }
    }

    #[test]
    fn full_sequence() {
        let mut t = RunTracker::new();
        walk(
            &mut t,
            &[
                RunStage::Parsing,
                RunStage::Deciding,
                RunStage::ValidatingRules,
                RunStage::Blending,
                RunStage::Auditing,
                RunStage::Done,
            ],
        );
        assert_eq!(t.stage(), RunStage::Done);
        assert_eq!(t.history().len(), 6);
        assert!(t.stage().is_terminal());
    }

    #[test]
    fn bypass_skips_rules_and_blending() {
        let mut t = RunTracker::new();
        walk(&mut t, &[RunStage::Parsing, RunStage::Deciding, RunStage::Auditing]);
        assert_eq!(t.stage(), RunStage::Auditing);
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut t = RunTracker::new();
        let err = t.advance(RunStage::Deciding).unwrap_err();
        assert_eq!(
            err,
            StageTransitionError::InvalidTransition {
                from: "validating".into(),
                to: "deciding".into()
            }
        );
        assert_eq!(t.stage(), RunStage::Validating);
    }

    #[test]
    fn failed_is_reachable_from_every_non_terminal_stage() {
        for stage in [
            RunStage::Validating,
            RunStage::Parsing,
            RunStage::Deciding,
            RunStage::ValidatingRules,
            RunStage::Blending,
            RunStage::Auditing,
        ] {
            assert!(stage.can_transition_to(RunStage::Failed), "{stage}");
        }
        assert!(!RunStage::Done.can_transition_to(RunStage::Failed));
        assert!(!RunStage::Failed.can_transition_to(RunStage::Failed));
    }

    #[test]
    fn fail_reports_the_failing_stage() {
        let mut t = RunTracker::new();
        walk(&mut t, &[RunStage::Parsing]);
        assert_eq!(t.fail(), RunStage::Parsing);
        assert_eq!(t.stage(), RunStage::Failed);
        assert_eq!(t.fail(), RunStage::Failed);
    }

    #[test]
    fn auditing_is_not_cancellable() {
        assert!(RunStage::Blending.is_cancellable());
        assert!(!RunStage::Auditing.is_cancellable());
    }

    #[test]
    fn wire_labels() {
        assert_eq!(
            serde_json::to_string(&RunStage::ValidatingRules).unwrap(),
            "\"validating-rules\""
        );
    }
}
