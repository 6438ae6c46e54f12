//! Decision service boundary.
//!
//! [`DecisionService`] is the request/response seam to the external
//! automated-decision engine. It returns the raw JSON answer; shaping that
//! answer into a [`DecisionOutcome`](govpipe_core::DecisionOutcome) is the
//! normalizer's job, so every implementation gets the same fallback
//! defaults.
//!
//! Implementations:
//! - [`HttpDecisionService`]: POSTs to a configured endpoint with `reqwest`.
//! - [`OfflineDecisionService`]: always unavailable; every call falls back.
//! - [`MockDecisionService`]: scripted answers for tests and demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use govpipe_core::{DecisionError, InputDocument, ParsedDocument, ParsingMethod, TraceId};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::config::DecisionServiceConfig;

/// Longest response body excerpt kept in an error.
const MAX_ERROR_BODY: usize = 512;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Outbound decision request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    /// Agent the service should route to.
    pub agent_name: String,
    /// Requested action.
    pub action: String,
    /// Parsed document and extraction metadata.
    pub input: DecisionInput,
    /// Enterprise and correlation context.
    pub context: DecisionContext,
}

/// Document section of a [`DecisionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInput {
    /// Document title.
    pub title: String,
    /// Extracted text.
    pub content: String,
    /// Page count.
    pub pages: u32,
    /// Tables detected.
    pub tables_found: u32,
    /// Strategy that produced the text.
    pub extraction_method: ParsingMethod,
    /// Parser confidence.
    pub confidence: f64,
    /// Submitter's sensitive-data flag.
    pub contains_sensitive_data: bool,
}

/// Context section of a [`DecisionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionContext {
    /// Owning enterprise.
    pub enterprise_id: String,
    /// Correlation id: the run's trace id.
    pub request_id: TraceId,
    /// Input checksum.
    pub checksum: String,
    /// When the request was built.
    pub timestamp: DateTime<Utc>,
    /// Calling component.
    pub processing_source: String,
}

impl DecisionRequest {
    /// Build the request for one run.
    pub fn new(trace_id: TraceId, input: &InputDocument, parsed: &ParsedDocument) -> Self {
        Self {
            agent_name: "policy".to_string(),
            action: "analyze".to_string(),
            input: DecisionInput {
                title: input.title().to_string(),
                content: parsed.extracted_text.clone(),
                pages: parsed.pages,
                tables_found: parsed.tables_found,
                extraction_method: parsed.parsing_method,
                confidence: parsed.parser_confidence,
                contains_sensitive_data: input.contains_sensitive_data(),
            },
            context: DecisionContext {
                enterprise_id: input.enterprise_id().to_string(),
                request_id: trace_id,
                checksum: input.checksum().to_string(),
                timestamp: Utc::now(),
                processing_source: "govpipe-orchestrator".to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// External automated-decision service.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Ask for a decision. Returns the raw JSON answer.
    async fn decide(&self, request: &DecisionRequest) -> Result<Value, DecisionError>;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// `reqwest`-backed decision service.
#[derive(Debug, Clone)]
pub struct HttpDecisionService {
    client: reqwest::Client,
    endpoint: url::Url,
    timeout_ms: u64,
}

impl HttpDecisionService {
    /// Build the HTTP client from configuration.
    pub fn new(config: DecisionServiceConfig) -> Result<Self, DecisionError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {token}")).map_err(
                    |_| DecisionError::Unavailable {
                        reason: "invalid API token characters".into(),
                    },
                )?,
            );
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| DecisionError::Unavailable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
            timeout_ms: config.timeout_secs.saturating_mul(1_000),
        })
    }

    /// Endpoint requests are sent to.
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

#[async_trait]
impl DecisionService for HttpDecisionService {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn decide(&self, request: &DecisionRequest) -> Result<Value, DecisionError> {
        let endpoint = self.endpoint.to_string();
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DecisionError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    DecisionError::Transport {
                        endpoint: endpoint.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(DecisionError::ServiceStatus {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| DecisionError::MalformedResponse {
                reason: format!("response body is not JSON: {e}"),
            })
    }
}

// ---------------------------------------------------------------------------
// Offline
// ---------------------------------------------------------------------------

/// A decision service that is never reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineDecisionService;

#[async_trait]
impl DecisionService for OfflineDecisionService {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn decide(&self, _request: &DecisionRequest) -> Result<Value, DecisionError> {
        Err(DecisionError::Unavailable {
            reason: "no decision service configured".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Scripted decision service.
///
/// Answers from a queue of scripted responses; once the queue is empty every
/// call returns the default response.
#[derive(Debug)]
pub struct MockDecisionService {
    scripted: Mutex<VecDeque<Result<Value, DecisionError>>>,
    default: Result<Value, DecisionError>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl MockDecisionService {
    /// Always answer `response`.
    pub fn always(response: Value) -> Self {
        Self::with_default(Ok(response))
    }

    /// Always fail with `error`.
    pub fn failing(error: DecisionError) -> Self {
        Self::with_default(Err(error))
    }

    fn with_default(default: Result<Value, DecisionError>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            default,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Queue a one-off answer ahead of the default.
    pub fn then(self, response: Result<Value, DecisionError>) -> Self {
        self.scripted.lock().push_back(response);
        self
    }

    /// Sleep before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionService for MockDecisionService {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn decide(&self, _request: &DecisionRequest) -> Result<Value, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.scripted.lock().pop_front();
        next.unwrap_or_else(|| self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed_pair() -> (InputDocument, ParsedDocument) {
        let input =
            InputDocument::from_content("ent-1", "Policy", "Some text", "text/plain", true).unwrap();
        let parsed = ParsedDocument {
            doc_id: govpipe_core::DocumentId::new(),
            input_checksum: input.checksum().clone(),
            extracted_text: "Some text".into(),
            pages: 2,
            tables_found: 1,
            parsing_method: ParsingMethod::Primary,
            parser_confidence: 0.9,
            processed_at: Utc::now(),
        };
        (input, parsed)
    }

    #[test]
    fn request_wire_shape() {
        let (input, parsed) = parsed_pair();
        let trace = TraceId::new();
        let v = serde_json::to_value(DecisionRequest::new(trace, &input, &parsed)).unwrap();
        assert_eq!(v["agentName"], "policy");
        assert_eq!(v["action"], "analyze");
        assert_eq!(v["input"]["content"], "Some text");
        assert_eq!(v["input"]["extractionMethod"], "primary");
        assert_eq!(v["input"]["tablesFound"], 1);
        assert_eq!(v["input"]["containsSensitiveData"], true);
        assert_eq!(v["context"]["enterpriseId"], "ent-1");
        assert_eq!(v["context"]["requestId"], trace.to_string());
    }

    #[tokio::test]
    async fn offline_service_is_unavailable() {
        let (input, parsed) = parsed_pair();
        let req = DecisionRequest::new(TraceId::new(), &input, &parsed);
        let err = OfflineDecisionService.decide(&req).await.unwrap_err();
        assert!(matches!(err, DecisionError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn mock_plays_script_then_default() {
        let (input, parsed) = parsed_pair();
        let req = DecisionRequest::new(TraceId::new(), &input, &parsed);
        let mock = MockDecisionService::always(serde_json::json!({"confidence": 0.9})).then(Err(
            DecisionError::Timeout { timeout_ms: 10 },
        ));
        assert!(mock.decide(&req).await.is_err());
        assert!(mock.decide(&req).await.is_ok());
        assert!(mock.decide(&req).await.is_ok());
        assert_eq!(mock.calls(), 3);
    }
}
