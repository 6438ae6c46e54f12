//! # Batch CLI — Run many documents concurrently.
//!
//! The input file holds either a JSON array of submissions or one
//! submission per line (JSON Lines; blank lines are skipped). Output is
//! JSON Lines: one object per item in submission order, then a
//! `{"summary": ...}` line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};

use govpipe_core::{InputDocumentDraft, PipelineError};
use govpipe_orchestrator::{BatchItem, BatchSummary};

use crate::pipeline::{self, PipelineArgs};
use crate::{exit, print_json};

/// Arguments for `govpipe batch`.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// JSON array or JSON Lines file of submissions.
    pub input: PathBuf,

    /// Maximum runs in flight. Overrides `batch_concurrency`.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Execute the batch subcommand.
pub fn run_batch(args: &BatchArgs, config: Option<&Path>) -> Result<u8> {
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let drafts = parse_drafts(&text)
        .with_context(|| format!("parsing submissions in {}", args.input.display()))?;
    let mut config = pipeline::load_config(config)?;
    if let Some(n) = args.concurrency {
        config.batch_concurrency = usize::from(n);
    }
    tracing::info!(documents = drafts.len(), concurrency = config.batch_concurrency, "starting batch");

    pipeline::runtime()?.block_on(async {
        let orchestrator = pipeline::build(config, &args.pipeline).await?;
        let options = args.pipeline.options(pipeline::cancel_on_ctrl_c());
        let report = orchestrator.process_batch(drafts, options).await;
        for item in &report.items {
            print_json(&item_json(item))?;
        }
        print_json(&json!({ "summary": report.summary }))?;
        Ok(batch_exit_code(&report.summary))
    })
}

/// Parse a JSON array or JSON Lines document into submissions.
pub fn parse_drafts(text: &str) -> Result<Vec<InputDocumentDraft>> {
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(text)?);
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

/// Success only when every item completed.
pub fn batch_exit_code(summary: &BatchSummary) -> u8 {
    if summary.failed == 0 && summary.invalid == 0 {
        exit::APPROVED
    } else {
        exit::FAILED
    }
}

fn item_json(item: &BatchItem) -> Value {
    match &item.result {
        Some(Ok(result)) => json!({ "index": item.index, "result": result }),
        Some(Err(PipelineError::InputValidation { trace_id, source })) => json!({
            "index": item.index,
            "traceId": trace_id,
            "error": "input-validation",
            "violations": source.violations,
        }),
        Some(Err(e)) => json!({ "index": item.index, "error": e.to_string() }),
        None => json!({ "index": item.index, "error": "task aborted" }),
    }
}
