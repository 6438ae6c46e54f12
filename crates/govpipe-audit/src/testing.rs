//! Record fixtures shared by the writer tests.

use std::collections::BTreeMap;

use chrono::Utc;
use govpipe_core::{
    AuditRecord, AuditTrail, DecisionOutcome, DecisionSource, DocumentId, FailedRunRecord,
    FinalOutcome, InputDocument, InputDocumentDraft, ParsedDocument, ParsingMethod, RiskLevel,
    RuleResult, TraceId, ValidationResult, Verdict, SCHEMA_VERSION,
};

pub(crate) fn completed_record() -> AuditRecord {
    let now = Utc::now();
    let input = InputDocument::from_content(
        "ent-1",
        "Acceptable Use",
        "Employees must use company systems responsibly.",
        "text/plain",
        false,
    )
    .unwrap();
    let parsed = ParsedDocument {
        doc_id: DocumentId::new(),
        input_checksum: input.checksum().clone(),
        extracted_text: input.content().to_string(),
        pages: 1,
        tables_found: 0,
        parsing_method: ParsingMethod::Primary,
        parser_confidence: 0.9,
        processed_at: now,
    };
    AuditRecord::Completed(AuditTrail {
        trace_id: TraceId::new(),
        enterprise_id: input.enterprise_id().to_string(),
        input,
        parsed,
        decision: DecisionOutcome {
            verdict: Verdict::Approved,
            rationale: "Meets the acceptable use baseline.".into(),
            required_controls: vec![],
            confidence: 0.95,
            risk_level: RiskLevel::Low,
            source: DecisionSource::Service,
            processed_at: now,
        },
        validation: ValidationResult {
            rule_results: vec![RuleResult::strict_pass("all-rules-passed", "ok")],
            final_confidence: 0.935,
            final_outcome: FinalOutcome::Approved,
            processed_at: now,
        },
        validation_bypassed: false,
        schema_version: SCHEMA_VERSION.to_string(),
        tool_versions: BTreeMap::from([("audit".to_string(), crate::VERSION.to_string())]),
        created_at: now,
    })
}

pub(crate) fn failed_record() -> AuditRecord {
    let draft = InputDocumentDraft {
        enterprise_id: Some("ent-1".into()),
        ..InputDocumentDraft::default()
    };
    AuditRecord::Failed(FailedRunRecord::new(
        TraceId::new(),
        draft,
        "validating",
        "title is required",
        BTreeMap::new(),
    ))
}
