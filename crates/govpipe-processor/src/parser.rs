//! # Failover Parser
//!
//! Produces a [`ParsedDocument`] by walking an ordered chain of
//! [`StrategySlot`]s until one succeeds.
//!
//! ## Algorithm
//!
//! 1. Unless reprocessing is forced, return the cached document for the
//!    input's checksum without running any strategy.
//! 2. Try each non-terminal slot in order, each bounded by the caller's
//!    timeout. Errors and timeouts are logged and fall through.
//! 3. Run the terminal slot unbounded. Its failure is a configuration defect
//!    and surfaces as [`ParserError::TerminalStrategyFailed`].
//! 4. Tag the result with the slot's method label and declared confidence
//!    ceiling. Confidence is never derived from content.
//! 5. Offer the result to the cache with a compare-and-set. If a concurrent
//!    run stored one first, that entry wins and is returned.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use govpipe_core::{DocumentId, InputDocument, ParsedDocument, ParserError, ParsingMethod};
use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::ContentCache;
use crate::extractors::{PassthroughExtractor, StructuredExtractor, TemplateExtractor};
use crate::strategy::StrategySlot;

/// Default per-strategy timeout.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call parser options.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Skip the cache lookup and replace the cached entry.
    pub force_reprocess: bool,
    /// Upper bound for each fallible strategy.
    pub timeout: Duration,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            force_reprocess: false,
            timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }
}

/// Running parser statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParserStats {
    /// Calls to [`FailoverParser::process`] that returned a document.
    pub total_requests: u64,
    /// Calls served from the cache.
    pub cache_hits: u64,
    /// Fresh parses per method.
    pub method_breakdown: BTreeMap<ParsingMethod, u64>,
    /// Mean wall time per request, cache hits included.
    pub average_processing_time_ms: f64,
}

impl ParserStats {
    fn record(&mut self, method: Option<ParsingMethod>, elapsed: Duration) {
        let n = self.total_requests as f64;
        let ms = elapsed.as_secs_f64() * 1_000.0;
        self.average_processing_time_ms = (self.average_processing_time_ms * n + ms) / (n + 1.0);
        self.total_requests += 1;
        match method {
            Some(m) => *self.method_breakdown.entry(m).or_insert(0) += 1,
            None => self.cache_hits += 1,
        }
    }
}

/// Ordered-strategy parser with a shared content cache.
#[derive(Debug)]
pub struct FailoverParser {
    cache: Arc<ContentCache>,
    chain: Vec<StrategySlot>,
    stats: Mutex<ParserStats>,
}

impl FailoverParser {
    /// Parser with the built-in structured → template → passthrough chain.
    pub fn new(cache: Arc<ContentCache>) -> Self {
        Self::with_chain(
            cache,
            vec![
                StrategySlot::new(ParsingMethod::Primary, Arc::new(StructuredExtractor)),
                StrategySlot::new(ParsingMethod::Secondary, Arc::new(TemplateExtractor)),
                StrategySlot::new(ParsingMethod::Tertiary, Arc::new(PassthroughExtractor)),
            ],
        )
    }

    /// Parser with a custom chain. The last slot is the terminal strategy.
    pub fn with_chain(cache: Arc<ContentCache>, chain: Vec<StrategySlot>) -> Self {
        Self {
            cache,
            chain,
            stats: Mutex::new(ParserStats::default()),
        }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// The configured chain, in order.
    pub fn chain(&self) -> &[StrategySlot] {
        &self.chain
    }

    /// Snapshot of running statistics.
    pub fn stats(&self) -> ParserStats {
        self.stats.lock().clone()
    }

    /// Parse `doc`, serving from the cache unless `options.force_reprocess`.
    pub async fn process(
        &self,
        doc: &InputDocument,
        options: &ParseOptions,
    ) -> Result<Arc<ParsedDocument>, ParserError> {
        let started = Instant::now();
        let checksum = doc.checksum();

        if !options.force_reprocess {
            if let Some(cached) = self.cache.get(checksum) {
                tracing::debug!(
                    checksum = checksum.short(),
                    method = %cached.parsing_method,
                    "parse served from cache"
                );
                metrics::counter!("govpipe_cache_hits_total").increment(1);
                self.stats.lock().record(None, started.elapsed());
                return Ok(cached);
            }
        }

        let parsed = Arc::new(self.run_chain(doc, options.timeout).await?);
        let method = parsed.parsing_method;
        let stored = if options.force_reprocess {
            self.cache.put(checksum.clone(), parsed)
        } else {
            self.cache.insert_if_absent(checksum.clone(), parsed)
        };

        tracing::info!(
            checksum = checksum.short(),
            method = %method,
            confidence = stored.parser_confidence,
            forced = options.force_reprocess,
            "document parsed"
        );
        self.stats.lock().record(Some(method), started.elapsed());
        Ok(stored)
    }

    async fn run_chain(
        &self,
        doc: &InputDocument,
        timeout: Duration,
    ) -> Result<ParsedDocument, ParserError> {
        let Some((terminal, fallible)) = self.chain.split_last() else {
            return Err(ParserError::TerminalStrategyFailed {
                reason: "no extraction strategies configured".to_string(),
            });
        };

        for slot in fallible {
            let attempt = tokio::time::timeout(timeout, slot.strategy.extract(doc, slot.method));
            let err = match attempt.await {
                Ok(Ok(extraction)) => return Ok(build(doc, slot, extraction)),
                Ok(Err(e)) => e,
                Err(_) => ParserError::Timeout {
                    method: slot.method,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
            };
            tracing::warn!(
                checksum = doc.checksum().short(),
                method = %slot.method,
                strategy = slot.strategy.name(),
                error = %err,
                "extraction strategy failed, falling through"
            );
            metrics::counter!("govpipe_parser_fallthrough_total", "method" => slot.method.as_str())
                .increment(1);
        }

        match terminal.strategy.extract(doc, terminal.method).await {
            Ok(extraction) => Ok(build(doc, terminal, extraction)),
            Err(e) => {
                tracing::error!(
                    checksum = doc.checksum().short(),
                    strategy = terminal.strategy.name(),
                    error = %e,
                    "terminal extraction strategy failed"
                );
                Err(ParserError::TerminalStrategyFailed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn build(
    doc: &InputDocument,
    slot: &StrategySlot,
    extraction: crate::strategy::Extraction,
) -> ParsedDocument {
    ParsedDocument {
        doc_id: DocumentId::new(),
        input_checksum: doc.checksum().clone(),
        extracted_text: extraction.text,
        pages: extraction.pages.max(1),
        tables_found: extraction.tables_found,
        parsing_method: slot.method,
        parser_confidence: slot.confidence_ceiling,
        processed_at: Utc::now(),
    }
}
