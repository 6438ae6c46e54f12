//! Append-only JSON Lines audit file.
//!
//! One record per line, written with a single `write_all` of the line plus
//! its terminator and flushed before the receipt is returned. Opening an
//! existing file replays it to restore the write-once trace-id index.
//!
//! A failed append is rolled back to the previous file length. If the
//! process died mid-append instead, the unterminated final line is dropped
//! on the next open.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use govpipe_core::{AuditError, AuditRecord, TraceId};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::writer::{AuditReceipt, AuditWriter};

#[derive(Debug, Default)]
struct Index {
    trace_ids: HashSet<TraceId>,
    lines: u64,
}

/// File-backed append-only audit writer.
#[derive(Debug)]
pub struct JsonLinesAuditWriter {
    path: PathBuf,
    // Held across the append so lines never interleave.
    index: Mutex<Index>,
}

impl JsonLinesAuditWriter {
    /// Open (or create) the log at `path`.
    ///
    /// # Errors
    ///
    /// I/O errors, or a terminated line in an existing file that is not an
    /// audit record.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        let mut index = Index::default();
        if tokio::fs::try_exists(&path).await? {
            repair_tail(&path).await?;
            for record in read_records(&path).await? {
                index.trace_ids.insert(record.trace_id());
                index.lines += 1;
            }
        } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tracing::debug!(path = %path.display(), records = index.lines, "audit log opened");
        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record, in write order.
    pub async fn read_all(&self) -> Result<Vec<AuditRecord>, AuditError> {
        let _guard = self.index.lock().await;
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        read_records(&self.path).await
    }
}

async fn read_records(path: &Path) -> Result<Vec<AuditRecord>, AuditError> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut records = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Terminate or drop an unterminated final line.
async fn repair_tail(path: &Path) -> Result<(), AuditError> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(());
    }
    let keep = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
    let tail = &bytes[keep..];
    let mut file = OpenOptions::new().append(true).open(path).await?;
    if serde_json::from_slice::<AuditRecord>(tail).is_ok() {
        file.write_all(b"\n").await?;
    } else {
        tracing::warn!(
            path = %path.display(),
            dropped_bytes = tail.len(),
            "dropping torn final line of audit log"
        );
        file.set_len(keep as u64).await?;
    }
    file.sync_data().await?;
    Ok(())
}

async fn append_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await?;
    file.sync_data().await
}

#[async_trait]
impl AuditWriter for JsonLinesAuditWriter {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn write(&self, record: AuditRecord) -> Result<AuditReceipt, AuditError> {
        record.validate()?;
        let digest = record.digest()?;
        let trace_id = record.trace_id();
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut index = self.index.lock().await;
        if index.trace_ids.contains(&trace_id) {
            return Err(AuditError::Duplicate { trace_id });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let start = file.metadata().await?.len();
        if let Err(e) = append_line(&mut file, line.as_bytes()).await {
            if let Err(undo) = file.set_len(start).await {
                tracing::error!(%trace_id, error = %undo, "could not roll back partial audit line");
            }
            return Err(e.into());
        }

        index.trace_ids.insert(trace_id);
        index.lines += 1;
        let stored_id = format!("{}:{}", self.path.display(), index.lines);
        drop(index);

        tracing::debug!(%trace_id, %stored_id, %digest, "audit record appended");
        Ok(AuditReceipt { stored_id, digest })
    }

    async fn record_count(&self) -> Result<u64, AuditError> {
        Ok(self.index.lock().await.lines)
    }
}
