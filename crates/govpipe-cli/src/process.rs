//! # Process CLI — Run one document through the pipeline.
//!
//! The input is either a JSON submission (`enterpriseId`, `title`,
//! `content`, `mimeType`, `checksum`, `containsSensitiveData`) or, with
//! `--raw`, a plain content file whose checksum is computed here.
//!
//! The result is printed as one JSON object; the exit code carries the
//! disposition (see [`crate::exit`]).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use govpipe_core::{content_checksum, InputDocumentDraft, PipelineError};
use govpipe_orchestrator::ProcessingResult;

use crate::pipeline::{self, PipelineArgs};
use crate::{exit, exit_code, print_json};

/// Arguments for `govpipe process`.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// JSON submission, or a plain content file with `--raw`.
    pub input: PathBuf,

    /// Treat the input as document content rather than a JSON submission.
    #[arg(long)]
    pub raw: bool,

    /// Owning enterprise (with `--raw`).
    #[arg(long, requires = "raw")]
    pub enterprise_id: Option<String>,

    /// Document title (with `--raw`). Defaults to the file stem.
    #[arg(long, requires = "raw")]
    pub title: Option<String>,

    /// Declared MIME type (with `--raw`).
    #[arg(long, default_value = "text/plain")]
    pub mime_type: String,

    /// Flag the document as carrying sensitive data (with `--raw`).
    #[arg(long, requires = "raw")]
    pub sensitive: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Execute the process subcommand.
pub fn run_process(args: &ProcessArgs, config: Option<&Path>) -> Result<u8> {
    let draft = read_draft(args)?;
    let config = pipeline::load_config(config)?;
    pipeline::runtime()?.block_on(async {
        let orchestrator = pipeline::build(config, &args.pipeline).await?;
        let options = args.pipeline.options(pipeline::cancel_on_ctrl_c());
        report(orchestrator.process_policy(draft, options).await)
    })
}

/// Build the submission from the input file.
pub fn read_draft(args: &ProcessArgs) -> Result<InputDocumentDraft> {
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    if !args.raw {
        return serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON submission", args.input.display()));
    }
    let title = args.title.clone().or_else(|| {
        args.input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    });
    Ok(InputDocumentDraft {
        enterprise_id: args.enterprise_id.clone(),
        title,
        checksum: Some(content_checksum(&text).into()),
        content: Some(text),
        mime_type: Some(args.mime_type.clone()),
        contains_sensitive_data: Some(args.sensitive),
    })
}

fn report(outcome: Result<ProcessingResult, PipelineError>) -> Result<u8> {
    match outcome {
        Ok(result) => {
            print_json(&result)?;
            Ok(exit_code(&result))
        }
        Err(PipelineError::InputValidation { trace_id, source }) => {
            print_json(&json!({
                "traceId": trace_id,
                "error": "input-validation",
                "violations": source.violations,
            }))?;
            Ok(exit::INVALID)
        }
        Err(PipelineError::Cancelled { trace_id, stage }) => {
            tracing::warn!(%trace_id, %stage, "run cancelled");
            Ok(exit::CANCELLED)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: PathBuf, raw: bool) -> ProcessArgs {
        ProcessArgs {
            input,
            raw,
            enterprise_id: Some("acme".into()),
            title: None,
            mime_type: "text/plain".into(),
            sensitive: false,
            pipeline: PipelineArgs {
                offline: true,
                ..PipelineArgs::default()
            },
        }
    }

    #[test]
    fn raw_input_gets_a_computed_checksum_and_file_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acceptable-use.txt");
        std::fs::write(&path, "Standard operating procedure").unwrap();

        let draft = read_draft(&args(path, true)).unwrap();
        assert_eq!(draft.title.as_deref(), Some("acceptable-use"));
        assert_eq!(
            draft.checksum,
            Some(content_checksum("Standard operating procedure").into())
        );
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn json_input_is_taken_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.json");
        std::fs::write(
            &path,
            r#"{"enterpriseId":"acme","title":"AUP","content":"text","mimeType":"text/plain","checksum":"abc123"}"#,
        )
        .unwrap();

        let draft = read_draft(&args(path, false)).unwrap();
        assert_eq!(draft.checksum.as_deref(), Some("abc123"));
        assert_eq!(draft.enterprise_id.as_deref(), Some("acme"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(read_draft(&args(path, false)).is_err());
    }

    #[test]
    fn offline_run_goes_to_manual_review() {
        // Fallback approves at 0.7; 0.3 * 0.9 + 0.7 * 0.7 = 0.76.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.txt");
        std::fs::write(
            &path,
            "All staff complete annual security awareness training and acknowledge this policy.",
        )
        .unwrap();
        let mut args = args(path, true);
        args.pipeline.audit_log = Some(dir.path().join("audit.jsonl"));

        assert_eq!(run_process(&args, None).unwrap(), exit::HUMAN_IN_LOOP);
        let log = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        assert_eq!(log.lines().count(), 1);
    }

    #[test]
    fn invalid_submission_exits_with_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.json");
        std::fs::write(&path, r#"{"enterpriseId":"acme","content":"text"}"#).unwrap();
        assert_eq!(run_process(&args(path, false), None).unwrap(), exit::INVALID);
    }
}
