#![deny(missing_docs)]

//! # govpipe-processor — Failover Parsing with a Content Cache
//!
//! Turns a validated [`InputDocument`](govpipe_core::InputDocument) into a
//! [`ParsedDocument`](govpipe_core::ParsedDocument):
//!
//! - [`ContentCache`]: checksum-keyed, concurrent, compare-and-set writes.
//! - [`ExtractionStrategy`] / [`StrategySlot`]: one extraction method and
//!   the label plus confidence ceiling the chain assigns it.
//! - [`FailoverParser`]: walks the chain until a strategy succeeds.
//!
//! The cache is constructor-injected so several independent pipelines can
//! coexist in one process and tests can isolate state.

pub mod cache;
pub mod extractors;
pub mod parser;
pub mod strategy;

pub use cache::{CacheStats, ContentCache};
pub use extractors::{PassthroughExtractor, StructuredExtractor, TemplateExtractor};
pub use parser::{FailoverParser, ParseOptions, ParserStats, DEFAULT_STRATEGY_TIMEOUT};
pub use strategy::{Extraction, ExtractionStrategy, StrategySlot};

/// Crate version, recorded in audit tool-version maps.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
