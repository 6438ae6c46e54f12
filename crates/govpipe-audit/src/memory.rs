//! In-memory append-only audit log.

use std::collections::HashSet;

use async_trait::async_trait;
use govpipe_core::{AuditError, AuditRecord, TraceId};
use parking_lot::RwLock;

use crate::writer::{AuditReceipt, AuditWriter};

#[derive(Debug, Default)]
struct Inner {
    records: Vec<AuditRecord>,
    trace_ids: HashSet<TraceId>,
}

/// Audit log held in memory. Records are never removed.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    inner: RwLock<Inner>,
}

impl InMemoryAuditLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in write order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.read().records.clone()
    }

    /// The record for `trace_id`, if written.
    pub fn get(&self, trace_id: TraceId) -> Option<AuditRecord> {
        self.inner
            .read()
            .records
            .iter()
            .find(|r| r.trace_id() == trace_id)
            .cloned()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditWriter for InMemoryAuditLog {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write(&self, record: AuditRecord) -> Result<AuditReceipt, AuditError> {
        record.validate()?;
        let digest = record.digest()?;
        let trace_id = record.trace_id();

        let mut inner = self.inner.write();
        if !inner.trace_ids.insert(trace_id) {
            return Err(AuditError::Duplicate { trace_id });
        }
        inner.records.push(record);
        let stored_id = format!("memory:{}", inner.records.len());
        drop(inner);

        tracing::debug!(%trace_id, %stored_id, %digest, "audit record stored");
        Ok(AuditReceipt { stored_id, digest })
    }

    async fn record_count(&self) -> Result<u64, AuditError> {
        Ok(self.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{completed_record, failed_record};

    #[tokio::test]
    async fn stores_and_returns_receipt() {
        let log = InMemoryAuditLog::new();
        let record = completed_record();
        let expected = record.digest().unwrap();
        let trace_id = record.trace_id();

        let receipt = log.write(record).await.unwrap();
        assert_eq!(receipt.stored_id, "memory:1");
        assert_eq!(receipt.digest, expected);
        assert_eq!(log.record_count().await.unwrap(), 1);
        assert!(log.get(trace_id).is_some());
    }

    #[tokio::test]
    async fn second_write_for_same_trace_is_rejected() {
        let log = InMemoryAuditLog::new();
        let record = failed_record();
        log.write(record.clone()).await.unwrap();
        let err = log.write(record).await.unwrap_err();
        assert!(matches!(err, AuditError::Duplicate { .. }));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn invalid_record_is_not_stored() {
        let log = InMemoryAuditLog::new();
        let mut record = completed_record();
        if let AuditRecord::Completed(trail) = &mut record {
            trail.validation.final_confidence = 1.5;
        }
        let err = log.write(record).await.unwrap_err();
        assert!(matches!(err, AuditError::Schema(_)));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn keeps_write_order() {
        let log = InMemoryAuditLog::new();
        let a = completed_record();
        let b = failed_record();
        let (ta, tb) = (a.trace_id(), b.trace_id());
        log.write(a).await.unwrap();
        log.write(b).await.unwrap();
        let ids: Vec<_> = log.records().iter().map(AuditRecord::trace_id).collect();
        assert_eq!(ids, vec![ta, tb]);
    }
}
