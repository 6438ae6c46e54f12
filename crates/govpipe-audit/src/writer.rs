//! The audit writer boundary.

use async_trait::async_trait;
use govpipe_core::{AuditError, AuditRecord, ContentDigest};
use serde::Serialize;

/// Proof that a record was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReceipt {
    /// Store-specific identifier of the persisted record.
    pub stored_id: String,
    /// SHA-256 over the record's JSON serialization.
    pub digest: ContentDigest,
}

/// Durable, append-only sink for audit records.
///
/// Implementations must call [`AuditRecord::validate`] before persisting
/// and must reject a record whose trace id was already written.
#[async_trait]
pub trait AuditWriter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Persist `record`. Write-once per trace id.
    async fn write(&self, record: AuditRecord) -> Result<AuditReceipt, AuditError>;

    /// Number of records persisted so far.
    async fn record_count(&self) -> Result<u64, AuditError>;
}
