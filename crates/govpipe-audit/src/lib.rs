#![deny(missing_docs)]

//! # govpipe-audit — Append-Only Audit Writers
//!
//! Every pipeline run, successful or not, leaves exactly one
//! [`AuditRecord`](govpipe_core::AuditRecord). Writers in this crate:
//!
//! - validate the record schema before persisting anything,
//! - refuse a second record for the same trace id,
//! - stamp the receipt with the record's SHA-256 digest.
//!
//! Two writers are provided: [`InMemoryAuditLog`] for tests and embedding,
//! and [`JsonLinesAuditWriter`] for durable local persistence.

pub mod jsonl;
pub mod memory;
pub mod writer;

#[cfg(test)]
mod testing;

pub use jsonl::JsonLinesAuditWriter;
pub use memory::InMemoryAuditLog;
pub use writer::{AuditReceipt, AuditWriter};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
