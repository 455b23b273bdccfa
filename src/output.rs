//! Results of an enrichment pass.

use crate::document::WriteStatus;
use crate::error::{ConversionError, StoreError};
use serde::Serialize;

/// What happened to one document during a pass.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub id: String,
    /// Converter result, kept structured.
    pub conversion: Result<String, ConversionError>,
    /// The text actually assigned to the document: the converted text, or
    /// sentinel error text when conversion failed.
    pub text: String,
    /// Result of assigning and persisting `text`.
    pub write: Result<WriteStatus, StoreError>,
    /// Wall-clock time spent on this document.
    pub duration_ms: u64,
}

impl DocumentOutcome {
    pub fn is_converted(&self) -> bool {
        self.conversion.is_ok()
    }
}

/// Aggregate counters for a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentStats {
    /// Documents listed by the store.
    pub total: usize,
    /// Documents whose conversion succeeded.
    pub converted: usize,
    /// Documents whose conversion failed (sentinel text written instead).
    pub failed: usize,
    /// Descriptions pushed back to the store.
    pub written: usize,
    /// Descriptions that already carried the text.
    pub unchanged: usize,
    /// Persistence attempts that failed.
    pub write_failed: usize,
    pub duration_ms: u64,
}

impl EnrichmentStats {
    /// Tally counters from outcomes.
    pub fn from_outcomes(outcomes: &[DocumentOutcome], duration_ms: u64) -> Self {
        let mut stats = Self {
            total: outcomes.len(),
            duration_ms,
            ..Self::default()
        };
        for outcome in outcomes {
            if outcome.conversion.is_ok() {
                stats.converted += 1;
            } else {
                stats.failed += 1;
            }
            match outcome.write {
                Ok(WriteStatus::Updated) => stats.written += 1,
                Ok(WriteStatus::Unchanged) => stats.unchanged += 1,
                Err(_) => stats.write_failed += 1,
            }
        }
        stats
    }
}

/// Everything a pass produced. Outcomes are in completion order.
#[derive(Debug)]
pub struct EnrichmentReport {
    pub outcomes: Vec<DocumentOutcome>,
    pub stats: EnrichmentStats,
}

impl EnrichmentReport {
    /// Outcome for `id`, if that document was part of the pass.
    pub fn outcome(&self, id: &str) -> Option<&DocumentOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }
}

/// Text assigned to a document for a conversion result.
pub fn render_text(conversion: &Result<String, ConversionError>) -> String {
    match conversion {
        Ok(text) => text.clone(),
        Err(e) => format!("<error: {e}>"),
    }
}
