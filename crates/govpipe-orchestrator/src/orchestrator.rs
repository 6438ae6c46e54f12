//! # Policy Orchestrator
//!
//! Sequences one pipeline run:
//!
//! ```text
//! validate input ─▶ parse (cache-checked) ─▶ decide (breaker-guarded)
//!   ─▶ evaluate rules ─▶ blend + gate ─▶ write audit ─▶ result
//! ```
//!
//! ## Failure handling
//!
//! | Where | What the caller gets | Audit record |
//! |-------|----------------------|--------------|
//! | input validation | `Err(PipelineError::InputValidation)` | failed run |
//! | cancellation before auditing | `Err(PipelineError::Cancelled)` | failed run |
//! | decision service down | normal result, heuristic decision | completed run |
//! | terminal parser failure, rule/blend defect | `Ok`, `run_status = failed`, rejected at 0 | failed run |
//! | audit write fails | normal result, `audit_status = unaudited` | none |
//!
//! Every run attempts exactly one audit write. The write runs on a spawned
//! task, so dropping the caller's future once auditing has started does not
//! interrupt it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use govpipe_audit::AuditWriter;
use govpipe_core::{
    AuditRecord, AuditTrail, DecisionOutcome, DecisionSource, FailedRunRecord, FinalOutcome,
    InputDocument, InputDocumentDraft, ParsedDocument, ParsingMethod, PipelineError, TraceId,
    ValidationResult,
};
use govpipe_decision::{
    BreakerSnapshot, CircuitBreaker, DecisionClient, DecisionRequest, DecisionService,
};
use govpipe_processor::{CacheStats, ContentCache, FailoverParser, ParseOptions, ParserStats};
use govpipe_validator::{RuleStats, Validator};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{PipelineConfig, PipelineConfigError};
use crate::stage::{RunStage, RunTracker};

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct ProcessingOptions {
    /// Bound for each fallible parser strategy and for the decision call.
    /// Falls back to [`PipelineConfig::default_timeout_ms`].
    pub timeout: Option<Duration>,
    /// Bypass the content cache and replace its entry.
    pub force_reprocess: bool,
    /// Operator override: skip rules and blending, take the decision's verdict.
    pub bypass_validation: bool,
    /// Checked between stages, up to (not including) auditing.
    pub cancel: Option<CancellationToken>,
}

/// Whether the run completed all stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every stage ran.
    Completed,
    /// A stage failed; the outcome is a conservative rejection.
    Failed,
}

/// Whether the run's audit record was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuditStatus {
    /// Persisted.
    Audited {
        /// Writer-specific identifier.
        stored_id: String,
        /// `sha256:<hex>` digest of the record.
        digest: String,
    },
    /// The write failed. The result is still valid but has no audit trail.
    Unaudited {
        /// Why the write failed.
        reason: String,
    },
}

/// Stage and reason of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    /// Stage the run failed in.
    pub stage: RunStage,
    /// Error message.
    pub reason: String,
}

/// Outcome of [`PolicyOrchestrator::process_policy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    /// Fresh per run.
    pub trace_id: TraceId,
    /// Gated disposition.
    pub final_outcome: FinalOutcome,
    /// Final blended confidence.
    pub confidence: f64,
    /// Wall time of the run.
    pub processing_time_ms: u64,
    /// Completed or failed.
    pub run_status: RunStatus,
    /// Audited or unaudited.
    pub audit_status: AuditStatus,
    /// Set when rules were bypassed.
    pub validation_bypassed: bool,
    /// Strategy that produced the parse (`none` when parsing failed).
    pub parsing_method: ParsingMethod,
    /// Where the decision came from.
    pub decision_source: DecisionSource,
    /// Present when `run_status` is failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl ProcessingResult {
    /// Whether the audit record was persisted.
    pub fn is_audited(&self) -> bool {
        matches!(self.audit_status, AuditStatus::Audited { .. })
    }
}

/// One entry of a [`BatchReport`].
#[derive(Debug)]
pub struct BatchItem {
    /// Position in the submitted batch.
    pub index: usize,
    /// The run's result. A panicked task is reported as `None`.
    pub result: Option<Result<ProcessingResult, PipelineError>>,
}

/// Per-disposition counts of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Documents submitted.
    pub total: usize,
    /// Completed and approved.
    pub approved: usize,
    /// Completed and rejected.
    pub rejected: usize,
    /// Completed and sent to manual review.
    pub human_in_loop: usize,
    /// Failed runs, cancellations, and aborted tasks.
    pub failed: usize,
    /// Rejected at input validation.
    pub invalid: usize,
    /// Results whose audit write failed.
    pub unaudited: usize,
}

/// Results of [`PolicyOrchestrator::process_batch`], in submission order.
#[derive(Debug)]
pub struct BatchReport {
    /// One item per submitted document.
    pub items: Vec<BatchItem>,
    /// Counts.
    pub summary: BatchSummary,
}

/// Snapshot of shared pipeline state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    /// Content cache occupancy and hit rate.
    pub cache: CacheStats,
    /// Parser request counters.
    pub parser: ParserStats,
    /// Decision service breaker.
    pub breaker: BreakerSnapshot,
    /// Records in the audit store, when it can report them.
    pub audit_records: Option<u64>,
    /// Per-rule evaluation counters.
    pub rules: Vec<RuleStats>,
}

// ---------------------------------------------------------------------------
// Run bookkeeping
// ---------------------------------------------------------------------------

enum StageFailure {
    Cancelled(RunStage),
    Failed(PipelineError),
}

impl From<PipelineError> for StageFailure {
    fn from(err: PipelineError) -> Self {
        Self::Failed(err)
    }
}

struct Run<'a> {
    trace_id: TraceId,
    tracker: RunTracker,
    options: &'a ProcessingOptions,
    parsed: Option<Arc<ParsedDocument>>,
}

impl<'a> Run<'a> {
    fn new(trace_id: TraceId, options: &'a ProcessingOptions) -> Self {
        Self {
            trace_id,
            tracker: RunTracker::new(),
            options,
            parsed: None,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Honour cancellation, then move to `stage`.
    fn enter(&mut self, stage: RunStage) -> Result<(), StageFailure> {
        if stage.is_cancellable() && self.is_cancelled() {
            return Err(StageFailure::Cancelled(stage));
        }
        self.tracker
            .advance(stage)
            .map_err(|e| StageFailure::Failed(e.into()))?;
        tracing::debug!(%stage, "stage entered");
        Ok(())
    }
}

struct Completed {
    parsed: Arc<ParsedDocument>,
    decision: DecisionOutcome,
    validation: ValidationResult,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The decision pipeline. Cheap to clone; clones share cache, breaker,
/// and audit writer.
#[derive(Clone)]
pub struct PolicyOrchestrator {
    config: Arc<PipelineConfig>,
    parser: Arc<FailoverParser>,
    decisions: DecisionClient,
    validator: Arc<Validator>,
    audit: Arc<dyn AuditWriter>,
}

impl std::fmt::Debug for PolicyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyOrchestrator")
            .field("config", &self.config)
            .field("decisions", &self.decisions)
            .field("audit", &self.audit.name())
            .finish()
    }
}

impl PolicyOrchestrator {
    /// Pipeline with a fresh cache, the built-in parser chain, and a breaker
    /// configured from `config`.
    ///
    /// Fails when `config` does not pass [`PipelineConfig::check`].
    pub fn new(
        config: PipelineConfig,
        service: Arc<dyn DecisionService>,
        audit: Arc<dyn AuditWriter>,
    ) -> Result<Self, PipelineConfigError> {
        let parser = FailoverParser::new(Arc::new(ContentCache::new()));
        let breaker = Arc::new(CircuitBreaker::new(&config.breaker));
        Self::from_parts(config, parser, DecisionClient::new(service, breaker), audit)
    }

    /// Pipeline from explicit components. Checks `config` like [`Self::new`].
    pub fn from_parts(
        config: PipelineConfig,
        parser: FailoverParser,
        decisions: DecisionClient,
        audit: Arc<dyn AuditWriter>,
    ) -> Result<Self, PipelineConfigError> {
        config.check()?;
        let validator = Validator::from_config(&config.rules, config.blend);
        Ok(Self {
            config: Arc::new(config),
            parser: Arc::new(parser),
            decisions,
            validator: Arc::new(validator),
            audit,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The failover parser.
    pub fn parser(&self) -> &FailoverParser {
        &self.parser
    }

    /// The decision client.
    pub fn decision_client(&self) -> &DecisionClient {
        &self.decisions
    }

    /// Component versions stamped on audit records.
    pub fn tool_versions(&self) -> BTreeMap<String, String> {
        [
            ("orchestrator", crate::VERSION),
            ("processor", govpipe_processor::VERSION),
            ("decision", govpipe_decision::VERSION),
            ("validator", govpipe_validator::VERSION),
            ("audit", govpipe_audit::VERSION),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Run the pipeline for one submission.
    pub async fn process_policy(
        &self,
        draft: InputDocumentDraft,
        options: ProcessingOptions,
    ) -> Result<ProcessingResult, PipelineError> {
        let trace_id = TraceId::new();
        let span = tracing::info_span!(
            "policy_run",
            %trace_id,
            enterprise_id = draft.enterprise_id.as_deref().unwrap_or("")
        );
        self.run(trace_id, draft, &options).instrument(span).await
    }

    async fn run(
        &self,
        trace_id: TraceId,
        draft: InputDocumentDraft,
        options: &ProcessingOptions,
    ) -> Result<ProcessingResult, PipelineError> {
        let mut run = Run::new(trace_id, options);

        if run.is_cancelled() {
            return Err(self.cancelled(run, draft, RunStage::Validating).await);
        }
        let input = match draft.validate() {
            Ok(input) => input,
            Err(violations) => {
                let stage = run.tracker.fail();
                let reason = violations.to_string();
                tracing::warn!(%reason, "input rejected");
                let record =
                    FailedRunRecord::new(trace_id, draft, stage.as_str(), reason, self.tool_versions());
                self.write_audit(AuditRecord::Failed(record)).await;
                metrics::counter!("govpipe_runs_total", "outcome" => "invalid").increment(1);
                return Err(PipelineError::InputValidation {
                    trace_id,
                    source: violations,
                });
            }
        };
        tracing::debug!(checksum = %input.checksum().short(), "input accepted");

        match self.execute(&mut run, &input).await {
            Ok(done) => Ok(self.complete(run, input, done).await),
            Err(StageFailure::Cancelled(stage)) => Err(self.cancelled(run, draft, stage).await),
            Err(StageFailure::Failed(err)) => Ok(self.fail(run, draft, err).await),
        }
    }

    /// Stages from parsing through entering `auditing`.
    async fn execute(
        &self,
        run: &mut Run<'_>,
        input: &InputDocument,
    ) -> Result<Completed, StageFailure> {
        let timeout = run
            .options
            .timeout
            .unwrap_or_else(|| self.config.default_timeout());

        run.enter(RunStage::Parsing)?;
        let parse_options = ParseOptions {
            force_reprocess: run.options.force_reprocess,
            timeout,
        };
        let parsed = self
            .parser
            .process(input, &parse_options)
            .await
            .map_err(PipelineError::from)?;
        run.parsed = Some(Arc::clone(&parsed));

        run.enter(RunStage::Deciding)?;
        let request = DecisionRequest::new(run.trace_id, input, &parsed);
        let decision = self.decisions.decide(&request, timeout).await;

        let validation = if run.options.bypass_validation {
            tracing::warn!(verdict = %decision.verdict, "rule validation bypassed by operator");
            Validator::bypass(&decision, Utc::now())
        } else {
            run.enter(RunStage::ValidatingRules)?;
            let rule_results = self.validator.evaluate_rules(
                &decision,
                &parsed,
                input.enterprise_id().as_str(),
            );

            run.enter(RunStage::Blending)?;
            self.validator
                .blend_at(&decision, &parsed, rule_results, Utc::now())
                .map_err(PipelineError::from)?
        };

        run.enter(RunStage::Auditing)?;
        Ok(Completed {
            parsed,
            decision,
            validation,
        })
    }

    async fn complete(
        &self,
        mut run: Run<'_>,
        input: InputDocument,
        done: Completed,
    ) -> ProcessingResult {
        let bypassed = run.options.bypass_validation;
        let parsing_method = done.parsed.parsing_method;
        let decision_source = done.decision.source;
        let final_outcome = done.validation.final_outcome;
        let confidence = done.validation.final_confidence;

        let trail = AuditTrail {
            trace_id: run.trace_id,
            enterprise_id: input.enterprise_id().to_string(),
            parsed: (*done.parsed).clone(),
            input,
            decision: done.decision,
            validation: done.validation,
            validation_bypassed: bypassed,
            schema_version: self.config.schema_version.clone(),
            tool_versions: self.tool_versions(),
            created_at: Utc::now(),
        };
        let audit_status = self.write_audit(AuditRecord::Completed(trail)).await;
        if let Err(e) = run.tracker.advance(RunStage::Done) {
            tracing::error!(error = %e, "run finished outside the auditing stage");
        }

        metrics::counter!("govpipe_runs_total", "outcome" => final_outcome.as_str()).increment(1);
        let processing_time_ms = run.tracker.elapsed_ms();
        tracing::info!(
            outcome = %final_outcome,
            confidence,
            method = %parsing_method,
            decision_source = %decision_source,
            processing_time_ms,
            audited = matches!(audit_status, AuditStatus::Audited { .. }),
            "policy run completed"
        );

        ProcessingResult {
            trace_id: run.trace_id,
            final_outcome,
            confidence,
            processing_time_ms,
            run_status: RunStatus::Completed,
            audit_status,
            validation_bypassed: bypassed,
            parsing_method,
            decision_source,
            failure: None,
        }
    }

    async fn fail(
        &self,
        mut run: Run<'_>,
        draft: InputDocumentDraft,
        err: PipelineError,
    ) -> ProcessingResult {
        let stage = run.tracker.fail();
        let reason = err.to_string();
        tracing::error!(%stage, error = %reason, "policy run failed");

        let mut record = FailedRunRecord::new(
            run.trace_id,
            draft,
            stage.as_str(),
            reason.clone(),
            self.tool_versions(),
        );
        if let Some(parsed) = run.parsed.take() {
            record.parsed = (*parsed).clone();
        }
        let parsing_method = record.parsed.parsing_method;
        let audit_status = self.write_audit(AuditRecord::Failed(record)).await;
        metrics::counter!("govpipe_runs_total", "outcome" => "failed").increment(1);

        ProcessingResult {
            trace_id: run.trace_id,
            final_outcome: FinalOutcome::Rejected,
            confidence: 0.0,
            processing_time_ms: run.tracker.elapsed_ms(),
            run_status: RunStatus::Failed,
            audit_status,
            validation_bypassed: run.options.bypass_validation,
            parsing_method,
            decision_source: DecisionSource::Placeholder,
            failure: Some(RunFailure { stage, reason }),
        }
    }

    async fn cancelled(
        &self,
        mut run: Run<'_>,
        draft: InputDocumentDraft,
        stage: RunStage,
    ) -> PipelineError {
        run.tracker.fail();
        tracing::info!(%stage, "policy run cancelled");
        let mut record = FailedRunRecord::new(
            run.trace_id,
            draft,
            stage.as_str(),
            format!("cancelled before {stage}"),
            self.tool_versions(),
        );
        if let Some(parsed) = run.parsed.take() {
            record.parsed = (*parsed).clone();
        }
        self.write_audit(AuditRecord::Failed(record)).await;
        metrics::counter!("govpipe_runs_total", "outcome" => "cancelled").increment(1);
        PipelineError::Cancelled {
            trace_id: run.trace_id,
            stage: stage.to_string(),
        }
    }

    /// Persist `record` on a spawned task. Never fails the run.
    async fn write_audit(&self, record: AuditRecord) -> AuditStatus {
        let writer = Arc::clone(&self.audit);
        let task = tokio::spawn(async move { writer.write(record).await }.in_current_span());
        let reason = match task.await {
            Ok(Ok(receipt)) => {
                return AuditStatus::Audited {
                    stored_id: receipt.stored_id,
                    digest: receipt.digest.to_string(),
                };
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("audit task aborted: {e}"),
        };
        tracing::error!(writer = self.audit.name(), %reason, "audit write failed, run is unaudited");
        metrics::counter!("govpipe_audit_failures_total").increment(1);
        AuditStatus::Unaudited { reason }
    }

    /// Process many submissions concurrently, at most
    /// [`PipelineConfig::batch_concurrency`] at a time.
    ///
    /// Every item shares `options`, including its cancellation token.
    pub async fn process_batch(
        &self,
        drafts: Vec<InputDocumentDraft>,
        options: ProcessingOptions,
    ) -> BatchReport {
        let permits = Arc::new(Semaphore::new(self.config.batch_concurrency.max(1)));
        let handles: Vec<_> = drafts
            .into_iter()
            .map(|draft| {
                let this = self.clone();
                let options = options.clone();
                let permits = Arc::clone(&permits);
                tokio::spawn(async move {
                    // The semaphore is never closed; a failed acquire only
                    // drops the concurrency bound.
                    let _permit = permits.acquire_owned().await.ok();
                    this.process_policy(draft, options).await
                })
            })
            .collect();

        let mut summary = BatchSummary {
            total: handles.len(),
            ..BatchSummary::default()
        };
        let mut items = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            let result = match handle.await {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::error!(index, error = %e, "batch task aborted");
                    None
                }
            };
            summary.count(result.as_ref());
            items.push(BatchItem { index, result });
        }
        tracing::info!(
            total = summary.total,
            approved = summary.approved,
            rejected = summary.rejected,
            human_in_loop = summary.human_in_loop,
            failed = summary.failed,
            invalid = summary.invalid,
            "batch processed"
        );
        BatchReport { items, summary }
    }

    /// Shared state snapshot.
    pub async fn processing_stats(&self) -> ProcessingStats {
        ProcessingStats {
            cache: self.parser.cache().stats(),
            parser: self.parser.stats(),
            breaker: self.decisions.breaker().snapshot(),
            audit_records: self.audit.record_count().await.ok(),
            rules: self.validator.engine().stats(),
        }
    }
}

impl BatchSummary {
    fn count(&mut self, result: Option<&Result<ProcessingResult, PipelineError>>) {
        match result {
            Some(Ok(r)) => {
                if !r.is_audited() {
                    self.unaudited += 1;
                }
                match (r.run_status, r.final_outcome) {
                    (RunStatus::Failed, _) => self.failed += 1,
                    (RunStatus::Completed, FinalOutcome::Approved) => self.approved += 1,
                    (RunStatus::Completed, FinalOutcome::Rejected) => self.rejected += 1,
                    (RunStatus::Completed, FinalOutcome::HumanInLoop) => self.human_in_loop += 1,
                }
            }
            Some(Err(PipelineError::InputValidation { .. })) => self.invalid += 1,
            Some(Err(_)) | None => self.failed += 1,
        }
    }
}
