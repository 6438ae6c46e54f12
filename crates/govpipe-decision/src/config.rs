//! Decision service configuration.
//!
//! Points the HTTP decision service at its endpoint. Load from the
//! environment with [`DecisionServiceConfig::from_env`] or build one for a
//! local mock server with [`DecisionServiceConfig::local_mock`].

use url::Url;

/// Path appended to a bare base URL.
pub const DEFAULT_DECISION_PATH: &str = "/v1/decisions";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the external decision service.
///
/// Custom `Debug` implementation redacts the `api_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct DecisionServiceConfig {
    /// Full URL decision requests are POSTed to.
    pub endpoint: Url,
    /// Optional bearer token.
    pub api_token: Option<String>,
    /// Transport-level request timeout in seconds. The decision client
    /// applies its own per-call timeout on top.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for DecisionServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl DecisionServiceConfig {
    /// Build a configuration for `endpoint`.
    ///
    /// A URL with an empty path gets [`DEFAULT_DECISION_PATH`] appended.
    pub fn new(endpoint: &str, api_token: Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_endpoint("endpoint", endpoint)?,
            api_token,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `GOVPIPE_DECISION_URL` (required)
    /// - `GOVPIPE_DECISION_TOKEN` (optional)
    /// - `GOVPIPE_DECISION_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("GOVPIPE_DECISION_URL").map_err(|_| ConfigError::MissingUrl)?;
        Ok(Self {
            endpoint: parse_endpoint("GOVPIPE_DECISION_URL", &raw)?,
            api_token: std::env::var("GOVPIPE_DECISION_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            timeout_secs: std::env::var("GOVPIPE_DECISION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Create a configuration pointing to a local mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the localhost URL cannot be parsed.
    pub fn local_mock(port: u16, token: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_endpoint("localhost", &format!("http://127.0.0.1:{port}"))?,
            api_token: token.map(str::to_string),
            timeout_secs: 5,
        })
    }
}

fn parse_endpoint(var: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(
            var.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.path() == "/" || url.path().is_empty() {
        url.set_path(DEFAULT_DECISION_PATH);
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `GOVPIPE_DECISION_URL` is not set.
    #[error("GOVPIPE_DECISION_URL environment variable is required")]
    MissingUrl,
    /// A URL failed to parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = DecisionServiceConfig::local_mock(9000, Some("test-token")).unwrap();
        assert_eq!(cfg.api_token.as_deref(), Some("test-token"));
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.endpoint.as_str(), "http://127.0.0.1:9000/v1/decisions");
    }

    #[test]
    fn explicit_path_is_kept() {
        let cfg = DecisionServiceConfig::new("https://agents.example.com/functions/v1/decide", None)
            .unwrap();
        assert_eq!(cfg.endpoint.path(), "/functions/v1/decide");
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        assert!(DecisionServiceConfig::new("ftp://example.com", None).is_err());
        assert!(DecisionServiceConfig::new("not a url", None).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = DecisionServiceConfig::local_mock(9000, Some("super-secret")).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
