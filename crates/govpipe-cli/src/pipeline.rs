//! Pipeline assembly shared by `process` and `batch`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use govpipe_audit::{AuditWriter, InMemoryAuditLog, JsonLinesAuditWriter};
use govpipe_decision::{
    DecisionService, DecisionServiceConfig, HttpDecisionService, OfflineDecisionService,
};
use govpipe_orchestrator::{PipelineConfig, PolicyOrchestrator, ProcessingOptions};

/// Options shared by every subcommand that runs the pipeline.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Append audit records to this JSON Lines file.
    /// Without it, records are kept in memory and lost on exit.
    #[arg(long, value_name = "PATH")]
    pub audit_log: Option<PathBuf>,

    /// Timeout for each parser strategy and decision call, in milliseconds.
    /// Defaults to `default_timeout_ms` from the configuration.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Ignore the content cache and replace its entry.
    #[arg(long)]
    pub force_reprocess: bool,

    /// Operator override: skip rules and blending and take the decision's
    /// own verdict. Flagged in the audit record.
    #[arg(long)]
    pub bypass_validation: bool,

    /// Never contact the decision service, even if `GOVPIPE_DECISION_URL` is set.
    #[arg(long)]
    pub offline: bool,
}

impl PipelineArgs {
    /// Per-run options, cancelled through `cancel`.
    pub fn options(&self, cancel: CancellationToken) -> ProcessingOptions {
        ProcessingOptions {
            timeout: self.timeout_ms.map(Duration::from_millis),
            force_reprocess: self.force_reprocess,
            bypass_validation: self.bypass_validation,
            cancel: Some(cancel),
        }
    }
}

/// Load the pipeline configuration, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            tracing::info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// The decision service selected by the environment.
pub fn decision_service(offline: bool) -> Result<Arc<dyn DecisionService>> {
    if offline || std::env::var_os("GOVPIPE_DECISION_URL").is_none() {
        tracing::info!("no decision service configured, using local fallback");
        return Ok(Arc::new(OfflineDecisionService));
    }
    let config =
        DecisionServiceConfig::from_env().context("reading decision service configuration")?;
    tracing::info!(endpoint = %config.endpoint, "using HTTP decision service");
    Ok(Arc::new(HttpDecisionService::new(config)?))
}

/// The audit writer: a JSON Lines file when `path` is given, memory otherwise.
pub async fn audit_writer(path: Option<&Path>) -> Result<Arc<dyn AuditWriter>> {
    match path {
        Some(path) => {
            let writer = JsonLinesAuditWriter::open(path)
                .await
                .with_context(|| format!("opening audit log {}", path.display()))?;
            Ok(Arc::new(writer))
        }
        None => {
            tracing::warn!("no --audit-log given, audit records are not persisted");
            Ok(Arc::new(InMemoryAuditLog::new()))
        }
    }
}

/// Assemble an orchestrator.
pub async fn build(config: PipelineConfig, args: &PipelineArgs) -> Result<PolicyOrchestrator> {
    let service = decision_service(args.offline)?;
    let audit = audit_writer(args.audit_log.as_deref()).await?;
    Ok(PolicyOrchestrator::new(config, service, audit)?)
}

/// A token cancelled on the first Ctrl-C.
///
/// Must be called inside the runtime.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling runs that have not reached auditing");
            trigger.cancel();
        }
    });
    token
}

/// Multi-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_path_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, "batch_concurrency: 3\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().batch_concurrency, 3);
    }

    #[test]
    fn invalid_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, "batch_concurrency: 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("pipeline.yaml"));
    }

    #[test]
    fn options_carry_flags() {
        let args = PipelineArgs {
            timeout_ms: Some(250),
            bypass_validation: true,
            ..PipelineArgs::default()
        };
        let options = args.options(CancellationToken::new());
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert!(options.bypass_validation);
        assert!(!options.force_reprocess);
        assert!(options.cancel.is_some());
    }

    #[test]
    fn offline_flag_skips_the_http_service() {
        let service = decision_service(true).unwrap();
        assert_eq!(service.name(), "offline");
    }

    #[tokio::test]
    async fn audit_log_path_opens_a_file_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("log.jsonl");
        let writer = audit_writer(Some(&path)).await.unwrap();
        assert_eq!(writer.record_count().await.unwrap(), 0);
        assert!(path.parent().unwrap().exists());
    }
}
