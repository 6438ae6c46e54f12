//! Breaker-guarded decision client.
//!
//! [`DecisionClient::decide`] never fails: when the breaker is open, the
//! call times out, the service errors, or its answer cannot be normalised,
//! the client logs the cause, records the failure on the breaker, and
//! returns the local heuristic decision instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use govpipe_core::{DecisionError, DecisionOutcome};

use crate::breaker::CircuitBreaker;
use crate::fallback::heuristic_decision;
use crate::normalize::normalize_response;
use crate::service::{DecisionRequest, DecisionService};

/// Decision service access behind a circuit breaker, with local fallback.
#[derive(Clone)]
pub struct DecisionClient {
    service: Arc<dyn DecisionService>,
    breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for DecisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionClient")
            .field("service", &self.service.name())
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl DecisionClient {
    /// Wrap `service` with `breaker`. The breaker is shared state; pass the
    /// same `Arc` to every client that talks to the same service.
    pub fn new(service: Arc<dyn DecisionService>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { service, breaker }
    }

    /// The shared breaker.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Obtain a decision, falling back to the heuristic on any failure.
    pub async fn decide(&self, request: &DecisionRequest, timeout: Duration) -> DecisionOutcome {
        match self.try_service(request, timeout).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    trace_id = %request.context.request_id,
                    service = self.service.name(),
                    error = %err,
                    "decision service unavailable, using heuristic fallback"
                );
                metrics::counter!("govpipe_decision_fallback_total").increment(1);
                heuristic_decision(&request.input.content, Utc::now())
            }
        }
    }

    /// One guarded call to the service, without fallback.
    ///
    /// Refused calls do not touch the breaker; every attempted call records
    /// exactly one success or failure.
    pub async fn try_service(
        &self,
        request: &DecisionRequest,
        timeout: Duration,
    ) -> Result<DecisionOutcome, DecisionError> {
        if !self.breaker.allow() {
            return Err(DecisionError::CircuitOpen {
                consecutive_failures: self.breaker.consecutive_failures(),
            });
        }

        let result = match tokio::time::timeout(timeout, self.service.decide(request)).await {
            Ok(Ok(raw)) => normalize_response(&raw, Utc::now()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DecisionError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        self.breaker.record_result(result.is_ok());
        if let Ok(outcome) = &result {
            tracing::debug!(
                trace_id = %request.context.request_id,
                verdict = %outcome.verdict,
                confidence = outcome.confidence,
                risk = %outcome.risk_level,
                "decision service answered"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerConfig, CircuitState};
    use crate::fallback::FALLBACK_RATIONALE_PREFIX;
    use crate::service::MockDecisionService;
    use govpipe_core::{
        DecisionSource, InputDocument, ParsedDocument, ParsingMethod, TraceId, Verdict,
    };
    use serde_json::json;

    fn request(text: &str) -> DecisionRequest {
        let input = InputDocument::from_content("ent", "Policy", text, "text/plain", false).unwrap();
        let parsed = ParsedDocument {
            doc_id: govpipe_core::DocumentId::new(),
            input_checksum: input.checksum().clone(),
            extracted_text: text.into(),
            pages: 1,
            tables_found: 0,
            parsing_method: ParsingMethod::Primary,
            parser_confidence: 0.9,
            processed_at: Utc::now(),
        };
        DecisionRequest::new(TraceId::new(), &input, &parsed)
    }

    fn client(service: Arc<MockDecisionService>) -> DecisionClient {
        DecisionClient::new(
            service,
            Arc::new(CircuitBreaker::new(&BreakerConfig::default())),
        )
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn service_answer_is_normalised() {
        let mock = Arc::new(MockDecisionService::always(json!({
            "success": true,
            "result": { "decision": "approve", "reasoning": "fine", "confidence": 0.95, "riskLevel": "low" }
        })));
        let d = client(mock).decide(&request("text"), TIMEOUT).await;
        assert_eq!(d.verdict, Verdict::Approved);
        assert_eq!(d.source, DecisionSource::Service);
        assert_eq!(d.confidence, 0.95);
    }

    #[tokio::test]
    async fn service_error_falls_back() {
        let mock = Arc::new(MockDecisionService::failing(DecisionError::ServiceStatus {
            endpoint: "/v1/decisions".into(),
            status: 500,
            body: "boom".into(),
        }));
        let c = client(mock);
        let d = c.decide(&request("an illegal transfer"), TIMEOUT).await;
        assert_eq!(d.source, DecisionSource::Fallback);
        assert_eq!(d.verdict, Verdict::Rejected);
        assert!(d.rationale.starts_with(FALLBACK_RATIONALE_PREFIX));
        assert_eq!(c.breaker().consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn malformed_answer_counts_as_failure() {
        let mock = Arc::new(MockDecisionService::always(json!({ "decision": "approve" })));
        let c = client(mock);
        let d = c.decide(&request("text"), TIMEOUT).await;
        assert_eq!(d.source, DecisionSource::Fallback);
        assert_eq!(c.breaker().consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_service_times_out_and_falls_back() {
        let mock = Arc::new(
            MockDecisionService::always(json!({ "confidence": 0.9 }))
                .with_delay(Duration::from_secs(120)),
        );
        let c = client(Arc::clone(&mock));
        let d = c.decide(&request("text"), Duration::from_millis(100)).await;
        assert_eq!(d.source, DecisionSource::Fallback);
        assert_eq!(c.breaker().consecutive_failures(), 1);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn sixth_call_after_five_failures_skips_the_service() {
        let mock = Arc::new(MockDecisionService::failing(DecisionError::Transport {
            endpoint: "/v1/decisions".into(),
            reason: "connection refused".into(),
        }));
        let c = client(Arc::clone(&mock));
        for _ in 0..5 {
            c.decide(&request("text"), TIMEOUT).await;
        }
        assert_eq!(mock.calls(), 5);
        assert_eq!(c.breaker().state(), CircuitState::Open);

        let d = c.decide(&request("text"), TIMEOUT).await;
        assert_eq!(mock.calls(), 5, "open breaker must not contact the service");
        assert_eq!(d.source, DecisionSource::Fallback);

        let err = c.try_service(&request("text"), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, DecisionError::CircuitOpen { consecutive_failures: 5 }));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let mock = Arc::new(
            MockDecisionService::always(json!({ "decision": "approve", "confidence": 0.9 }))
                .then(Err(DecisionError::Timeout { timeout_ms: 1 }))
                .then(Err(DecisionError::Timeout { timeout_ms: 1 })),
        );
        let c = client(mock);
        c.decide(&request("text"), TIMEOUT).await;
        c.decide(&request("text"), TIMEOUT).await;
        assert_eq!(c.breaker().consecutive_failures(), 2);
        let d = c.decide(&request("text"), TIMEOUT).await;
        assert_eq!(d.source, DecisionSource::Service);
        assert_eq!(c.breaker().consecutive_failures(), 0);
    }
}
