//! Typed normalization of decision service responses.
//!
//! The service may answer with an envelope
//! `{ "success": bool, "error": ..., "result": { ... } }` or with a bare
//! decision object, and field names vary between deployments. The envelope
//! is deserialized into a loose typed struct; the decision body is read as a
//! JSON map, taking the first non-null spelling of each field in the order
//! below, and mapped onto [`DecisionOutcome`] with fixed defaults:
//!
//! | Field | Accepted names | Missing / unknown |
//! |-------|----------------|-------------------|
//! | verdict | `decision`, `verdict` | rejected |
//! | rationale | `reasoning`, `rationale` | `"No rationale provided"` |
//! | confidence | `confidence` | **malformed** (required) |
//! | risk | `riskLevel`, `risk_level`, `risk` | medium |
//! | controls | `recommendations`, `requiredControls`, `required_controls`, `metadata.recommendations` | empty |
//!
//! Unknown fields are ignored, and so are extra spellings of a field already
//! found. Confidence is clamped into [0, 1].

use chrono::{DateTime, Utc};
use govpipe_core::{DecisionError, DecisionOutcome, DecisionSource, RiskLevel, Verdict};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Rationale used when the service omits one.
pub const MISSING_RATIONALE: &str = "No rationale provided";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
}

const VERDICT_KEYS: &[&str] = &["decision", "verdict"];
const RATIONALE_KEYS: &[&str] = &["reasoning", "rationale"];
const RISK_KEYS: &[&str] = &["riskLevel", "risk_level", "risk"];
const CONTROL_KEYS: &[&str] = &["recommendations", "requiredControls", "required_controls"];

/// First non-null value among `keys`, in order.
fn field<'a>(body: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .find(|value| !value.is_null())
}

fn malformed(reason: impl Into<String>) -> DecisionError {
    DecisionError::MalformedResponse {
        reason: reason.into(),
    }
}

/// Normalise a raw service response into a [`DecisionOutcome`].
pub fn normalize_response(raw: &Value, now: DateTime<Utc>) -> Result<DecisionOutcome, DecisionError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| malformed("response is not a JSON object"))?;

    let body = if obj.contains_key("result") || obj.contains_key("success") {
        let envelope: Envelope = serde_json::from_value(raw.clone())
            .map_err(|e| malformed(format!("invalid envelope: {e}")))?;
        if envelope.success == Some(false) {
            return Err(DecisionError::ServiceRejected {
                reason: envelope
                    .error
                    .as_ref()
                    .map(error_text)
                    .unwrap_or_else(|| "unspecified error".to_string()),
            });
        }
        envelope
            .result
            .ok_or_else(|| malformed("envelope has no result"))?
    } else {
        raw.clone()
    };

    let body = body
        .as_object()
        .ok_or_else(|| malformed("result is not a JSON object"))?;

    let confidence = match body.get("confidence") {
        None | Some(Value::Null) => return Err(malformed("confidence is missing")),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|c| c.is_finite())
            .ok_or_else(|| malformed("confidence is not a finite number"))?,
        Some(other) => return Err(malformed(format!("confidence is not a number: {other}"))),
    };

    let risk_level = field(body, RISK_KEYS)
        .and_then(Value::as_str)
        .and_then(RiskLevel::parse_lenient)
        .unwrap_or(RiskLevel::Medium);

    let rationale = field(body, RATIONALE_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(MISSING_RATIONALE)
        .to_string();

    let controls = field(body, CONTROL_KEYS)
        .or_else(|| body.get("metadata").and_then(|m| m.get("recommendations")));

    Ok(DecisionOutcome {
        verdict: Verdict::from_service_value(field(body, VERDICT_KEYS).and_then(Value::as_str)),
        rationale,
        required_controls: string_list(controls),
        confidence: confidence.clamp(0.0, 1.0),
        risk_level,
        source: DecisionSource::Service,
        processed_at: now,
    })
}

fn error_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(o) => o
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn norm(v: Value) -> Result<DecisionOutcome, DecisionError> {
        normalize_response(&v, Utc::now())
    }

    #[test]
    fn envelope_shape_is_normalised() {
        let d = norm(json!({
            "success": true,
            "result": {
                "decision": "approve",
                "reasoning": "Policy aligns with framework",
                "confidence": 0.92,
                "riskLevel": "LOW",
                "metadata": { "recommendations": ["annual_review"] },
                "extra": { "ignored": true }
            }
        }))
        .unwrap();
        assert_eq!(d.verdict, Verdict::Approved);
        assert_eq!(d.rationale, "Policy aligns with framework");
        assert_eq!(d.confidence, 0.92);
        assert_eq!(d.risk_level, RiskLevel::Low);
        assert_eq!(d.required_controls, vec!["annual_review"]);
        assert_eq!(d.source, DecisionSource::Service);
    }

    #[test]
    fn bare_shape_with_aliases() {
        let d = norm(json!({
            "verdict": "approved",
            "rationale": "ok",
            "confidence": 0.8,
            "risk_level": "critical",
            "requiredControls": ["dpo_signoff", 7, ""]
        }))
        .unwrap();
        assert_eq!(d.verdict, Verdict::Approved);
        assert_eq!(d.risk_level, RiskLevel::Critical);
        assert_eq!(d.required_controls, vec!["dpo_signoff"]);
    }

    #[test]
    fn both_spellings_of_a_field_resolve_to_the_canonical_one() {
        let d = norm(json!({
            "decision": "approve",
            "verdict": "reject",
            "reasoning": "primary rationale",
            "rationale": "secondary rationale",
            "confidence": 0.9,
            "riskLevel": "low",
            "risk": "critical",
            "recommendations": ["annual_review"],
            "required_controls": ["legal_review"]
        }))
        .unwrap();
        assert_eq!(d.verdict, Verdict::Approved);
        assert_eq!(d.rationale, "primary rationale");
        assert_eq!(d.risk_level, RiskLevel::Low);
        assert_eq!(d.required_controls, vec!["annual_review"]);
    }

    #[test]
    fn null_canonical_spelling_falls_through_to_alias() {
        let d = norm(json!({
            "reasoning": null,
            "rationale": "from alias",
            "riskLevel": null,
            "risk_level": "high",
            "confidence": 0.5
        }))
        .unwrap();
        assert_eq!(d.rationale, "from alias");
        assert_eq!(d.risk_level, RiskLevel::High);
    }

    #[test]
    fn unknown_or_missing_decision_rejects() {
        let d = norm(json!({ "decision": "escalate", "confidence": 0.99 })).unwrap();
        assert_eq!(d.verdict, Verdict::Rejected);
        let d = norm(json!({ "confidence": 0.99 })).unwrap();
        assert_eq!(d.verdict, Verdict::Rejected);
        let d = norm(json!({ "decision": 1, "confidence": 0.99 })).unwrap();
        assert_eq!(d.verdict, Verdict::Rejected);
    }

    #[test]
    fn defaults_for_optional_fields() {
        let d = norm(json!({ "decision": "reject", "confidence": 0.4, "riskLevel": "severe" })).unwrap();
        assert_eq!(d.rationale, MISSING_RATIONALE);
        assert_eq!(d.risk_level, RiskLevel::Medium);
        assert!(d.required_controls.is_empty());
    }

    #[test]
    fn missing_confidence_is_malformed() {
        let err = norm(json!({ "decision": "approve" })).unwrap_err();
        assert!(matches!(err, DecisionError::MalformedResponse { .. }));
        let err = norm(json!({ "decision": "approve", "confidence": null })).unwrap_err();
        assert!(matches!(err, DecisionError::MalformedResponse { .. }));
    }

    #[test]
    fn non_numeric_confidence_is_malformed() {
        let err = norm(json!({ "decision": "approve", "confidence": "0.9" })).unwrap_err();
        assert!(matches!(err, DecisionError::MalformedResponse { .. }));
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(norm(json!({ "confidence": 7.5 })).unwrap().confidence, 1.0);
        assert_eq!(norm(json!({ "confidence": -2 })).unwrap().confidence, 0.0);
    }

    #[test]
    fn unsuccessful_envelope_is_service_rejection() {
        let err = norm(json!({ "success": false, "error": "model overloaded" })).unwrap_err();
        assert_eq!(
            err,
            DecisionError::ServiceRejected {
                reason: "model overloaded".into()
            }
        );
        let err = norm(json!({ "success": false, "error": { "message": "quota" } })).unwrap_err();
        assert_eq!(
            err,
            DecisionError::ServiceRejected {
                reason: "quota".into()
            }
        );
    }

    #[test]
    fn successful_envelope_without_result_is_malformed() {
        let err = norm(json!({ "success": true })).unwrap_err();
        assert!(matches!(err, DecisionError::MalformedResponse { .. }));
    }

    #[test]
    fn non_object_response_is_malformed() {
        assert!(norm(json!([1, 2, 3])).is_err());
        assert!(norm(json!({ "result": "approve" })).is_err());
    }
}
