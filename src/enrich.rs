//! The enrichment pass: list, fan out, convert, write back.
//!
//! ## Per-document unit
//!
//! ```text
//! registry.convert(doc)      (bounded by unit_timeout_secs)
//!   │ Ok(text) | Err(e)
//!   ▼
//! render_text                text | "<error: e>"
//!   ▼
//! doc.set_text(text)         rewrite OCR section in memory
//!   │ Updated | Unchanged
//!   ▼
//! store.persist_text(...)    only when Updated
//! ```
//!
//! Units never share mutable state and one unit's failure never reaches
//! another. Only a failed listing aborts the pass.

use crate::config::EnrichConfig;
use crate::converter::{Converter, ConverterRegistry};
use crate::document::{Document, WriteStatus};
use crate::error::{ConversionError, EnrichError};
use crate::output::{render_text, DocumentOutcome, EnrichmentReport, EnrichmentStats};
use crate::store::DocumentStore;
use crate::stream::{enrich_stream, OutcomeStream};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Runs enrichment passes over one store with one converter registry.
///
/// # Example
/// ```rust,no_run
/// use bibai::{ConverterRegistry, EnrichConfig, Enricher, ImageOcrConverter};
/// use bibai::store::{ImmichConfig, ImmichStore};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EnrichConfig::default();
/// let store = ImmichStore::new(ImmichConfig::new("http://photos.local/api", "key"))?;
/// let registry = ConverterRegistry::new().with(ImageOcrConverter::new(&config));
///
/// let report = Enricher::new(Arc::new(store), Arc::new(registry), config)
///     .run()
///     .await?;
/// println!("{} converted, {} failed", report.stats.converted, report.stats.failed);
/// # Ok(())
/// # }
/// ```
pub struct Enricher {
    store: Arc<dyn DocumentStore>,
    registry: Arc<ConverterRegistry>,
    config: EnrichConfig,
}

impl Enricher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<ConverterRegistry>,
        config: EnrichConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Process every listed document once and wait for all of them.
    ///
    /// # Errors
    /// Only pass-level failures are returned: the store could not list its
    /// documents, or the configuration is unusable. Per-document failures are
    /// in the report.
    pub async fn run(&self) -> Result<EnrichmentReport, EnrichError> {
        let start = Instant::now();
        let outcomes: Vec<DocumentOutcome> = self.stream().await?.collect().await;
        let stats = EnrichmentStats::from_outcomes(&outcomes, start.elapsed().as_millis() as u64);

        info!(
            "Enrichment complete: {}/{} converted, {} written, {} unchanged, {} write failures, {}ms",
            stats.converted,
            stats.total,
            stats.written,
            stats.unchanged,
            stats.write_failed,
            stats.duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_pass_complete(stats.total, stats.converted);
        }

        Ok(EnrichmentReport { outcomes, stats })
    }

    /// The same pass as [`run`](Self::run), yielding outcomes as they
    /// complete. `on_pass_complete` is not fired; the caller sees the end of
    /// the stream instead.
    pub async fn stream(&self) -> Result<OutcomeStream, EnrichError> {
        enrich_stream(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            &self.config,
        )
        .await
    }

    /// Blocking wrapper around [`run`](Self::run).
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn run_sync(&self) -> Result<EnrichmentReport, EnrichError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| EnrichError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run())
    }
}

/// Convert, assign and persist one document.
pub(crate) async fn process_document(
    mut document: Document,
    registry: &ConverterRegistry,
    store: &dyn DocumentStore,
    timeout_secs: u64,
) -> DocumentOutcome {
    let start = Instant::now();
    let id = document.id().to_string();

    let conversion = convert_with_timeout(registry, &document, timeout_secs).await;
    if let Err(ref e) = conversion {
        warn!("{}: {}", id, e);
    }

    let text = render_text(&conversion);
    debug!("{} -> '{}'", id, text);

    let write = match document.set_text(text.as_str()) {
        WriteStatus::Unchanged => Ok(WriteStatus::Unchanged),
        WriteStatus::Updated => match store.persist_text(&id, document.description()).await {
            Ok(()) => Ok(WriteStatus::Updated),
            Err(e) => {
                error!("{}: failed to persist description: {}", id, e);
                Err(e)
            }
        },
    };

    DocumentOutcome {
        id,
        conversion,
        text,
        write,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

async fn convert_with_timeout(
    registry: &ConverterRegistry,
    document: &Document,
    timeout_secs: u64,
) -> Result<String, ConversionError> {
    if timeout_secs == 0 {
        return registry.convert(document).await;
    }
    match tokio::time::timeout(Duration::from_secs(timeout_secs), registry.convert(document)).await
    {
        Ok(result) => result,
        Err(_) => Err(ConversionError::Timeout {
            id: document.id().to_string(),
            secs: timeout_secs,
        }),
    }
}
