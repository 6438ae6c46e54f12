//! Pipeline configuration.
//!
//! Every field has a serde default, so an empty or partial YAML document is
//! a valid configuration:
//!
//! ```yaml
//! default_timeout_ms: 10000
//! batch_concurrency: 4
//! rules:
//!   min_rationale_chars: 80
//!   disabled_rules: [sensitive-health-information]
//! breaker:
//!   failure_threshold: 3
//! ```

use std::path::Path;
use std::time::Duration;

use govpipe_core::SCHEMA_VERSION;
use govpipe_decision::BreakerConfig;
use govpipe_validator::{BlendConfig, RuleConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a [`PipelineConfig`].
#[derive(Error, Debug)]
pub enum PipelineConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not valid YAML for this shape.
    #[error("invalid pipeline config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid pipeline config: {field} {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Tunables for a [`PolicyOrchestrator`](crate::PolicyOrchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Schema version stamped on audit records.
    pub schema_version: String,
    /// Per-stage timeout when the caller supplies none.
    pub default_timeout_ms: u64,
    /// Maximum documents processed at once by a batch.
    pub batch_concurrency: usize,
    /// Rule thresholds.
    pub rules: RuleConfig,
    /// Blend weights and approval threshold.
    pub blend: BlendConfig,
    /// Decision service circuit breaker.
    pub breaker: BreakerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            default_timeout_ms: 30_000,
            batch_concurrency: 8,
            rules: RuleConfig::default(),
            blend: BlendConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and check a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PipelineConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.check()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self, PipelineConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PipelineConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Default timeout as a [`Duration`].
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Reject out-of-range values. Run by [`Self::from_yaml_str`] and by the
    /// orchestrator constructors.
    pub fn check(&self) -> Result<(), PipelineConfigError> {
        let invalid = |field: &'static str, reason: &str| -> Result<(), PipelineConfigError> {
            Err(PipelineConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if self.schema_version.trim().is_empty() {
            return invalid("schema_version", "must not be empty");
        }
        if self.default_timeout_ms == 0 {
            return invalid("default_timeout_ms", "must be positive");
        }
        if self.batch_concurrency == 0 {
            return invalid("batch_concurrency", "must be positive");
        }
        for (field, value) in [
            ("blend.parser_weight", self.blend.parser_weight),
            ("blend.decision_weight", self.blend.decision_weight),
            ("blend.soft_warn_penalty", self.blend.soft_warn_penalty),
            ("blend.approval_threshold", self.blend.approval_threshold),
            ("rules.min_parser_confidence", self.rules.min_parser_confidence),
            (
                "rules.critical_risk_min_confidence",
                self.rules.critical_risk_min_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(field, "must be within [0, 1]");
            }
        }
        if (self.blend.parser_weight + self.blend.decision_weight - 1.0).abs() > 1e-9 {
            return invalid("blend", "weights must sum to 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govpipe_core::ParsingMethod;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(PipelineConfig::from_yaml_str("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let cfg = PipelineConfig::from_yaml_str(
            "batch_concurrency: 2\nrules:\n  low_fidelity_method: secondary\nbreaker:\n  failure_threshold: 3\n",
        )
        .unwrap();
        assert_eq!(cfg.batch_concurrency, 2);
        assert_eq!(cfg.rules.low_fidelity_method, ParsingMethod::Secondary);
        assert_eq!(cfg.rules.min_rationale_chars, 50);
        assert_eq!(cfg.breaker.failure_threshold, 3);
        assert_eq!(cfg.breaker.cooldown_secs, 60);
        assert_eq!(cfg.blend, BlendConfig::default());
        assert_eq!(cfg.default_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = PipelineConfig::from_yaml_str("blend:\n  approval_threshold: 1.5\n").unwrap_err();
        assert!(matches!(
            err,
            PipelineConfigError::Invalid {
                field: "blend.approval_threshold",
                ..
            }
        ));
        let err = PipelineConfig::from_yaml_str("batch_concurrency: 0\n").unwrap_err();
        assert!(matches!(err, PipelineConfigError::Invalid { field: "batch_concurrency", .. }));
        let err =
            PipelineConfig::from_yaml_str("blend:\n  parser_weight: 0.5\n").unwrap_err();
        assert!(matches!(err, PipelineConfigError::Invalid { field: "blend", .. }));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = PipelineConfig::from_yaml_str("batch_concurrency: [").unwrap_err();
        assert!(matches!(err, PipelineConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, "default_timeout_ms: 500\n").unwrap();
        let cfg = PipelineConfig::load(&path).unwrap();
        assert_eq!(cfg.default_timeout(), Duration::from_millis(500));
        assert!(matches!(
            PipelineConfig::load(&dir.path().join("missing.yaml")).unwrap_err(),
            PipelineConfigError::Read { .. }
        ));
    }
}
