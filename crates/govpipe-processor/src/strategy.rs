//! # Extraction Strategies
//!
//! An [`ExtractionStrategy`] turns an [`InputDocument`] into raw extracted
//! text plus page and table counts. Strategies know nothing about
//! confidence: the failover chain assigns each one a method label and a
//! declared confidence ceiling through a [`StrategySlot`].

use std::sync::Arc;

use async_trait::async_trait;
use govpipe_core::{InputDocument, ParserError, ParsingMethod};

/// What a strategy extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Extracted text.
    pub text: String,
    /// Page count (at least 1).
    pub pages: u32,
    /// Tables detected.
    pub tables_found: u32,
}

/// One way of extracting text from a document.
///
/// Implementations must be `Send + Sync` so a single chain can serve many
/// concurrent runs. A strategy placed last in a chain must never fail.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Extract `doc`. `method` is the slot label, for error reporting.
    async fn extract(
        &self,
        doc: &InputDocument,
        method: ParsingMethod,
    ) -> Result<Extraction, ParserError>;
}

/// A strategy together with the method label and confidence ceiling the
/// failover chain tags its output with.
#[derive(Clone)]
pub struct StrategySlot {
    /// Method label written into the parsed document.
    pub method: ParsingMethod,
    /// Declared confidence ceiling written into the parsed document.
    pub confidence_ceiling: f64,
    /// The strategy itself.
    pub strategy: Arc<dyn ExtractionStrategy>,
}

impl StrategySlot {
    /// A slot using the method's standard ceiling.
    pub fn new(method: ParsingMethod, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        Self {
            method,
            confidence_ceiling: method.confidence_ceiling(),
            strategy,
        }
    }

    /// Override the ceiling. Clamped into [0, 1].
    pub fn with_ceiling(mut self, ceiling: f64) -> Self {
        self.confidence_ceiling = if ceiling.is_finite() {
            ceiling.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

impl std::fmt::Debug for StrategySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategySlot")
            .field("method", &self.method)
            .field("confidence_ceiling", &self.confidence_ceiling)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
