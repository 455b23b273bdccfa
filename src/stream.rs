//! Streaming enrichment: emit document outcomes as they complete.
//!
//! [`crate::Enricher::run`] waits for the whole pass and returns a report.
//! [`enrich_stream`] yields each [`DocumentOutcome`] as soon as its document
//! has been converted, assigned and persisted, so callers can log or display
//! results while the rest of the pass is still in flight. Outcomes arrive in
//! completion order, not listing order.

use crate::config::EnrichConfig;
use crate::converter::ConverterRegistry;
use crate::enrich::process_document;
use crate::error::EnrichError;
use crate::output::DocumentOutcome;
use crate::store::DocumentStore;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// List the store's documents and return a stream that processes them with
/// at most `config.concurrency` units in flight.
///
/// # Errors
/// Listing failures and an invalid concurrency are fatal; nothing is
/// dispatched in that case. Per-document failures are carried inside the
/// yielded outcomes.
pub async fn enrich_stream(
    store: Arc<dyn DocumentStore>,
    registry: Arc<ConverterRegistry>,
    config: &EnrichConfig,
) -> Result<OutcomeStream, EnrichError> {
    if config.concurrency == 0 {
        return Err(EnrichError::InvalidConfig(
            "concurrency must be at least 1".into(),
        ));
    }

    let documents = store
        .list_documents()
        .await
        .map_err(EnrichError::StoreListing)?;
    let total = documents.len();
    info!(
        "Enriching {} documents with up to {} in flight",
        total, config.concurrency
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_pass_start(total);
    }

    let done = Arc::new(AtomicUsize::new(0));
    let callback = config.progress_callback.clone();
    let timeout_secs = config.unit_timeout_secs;

    let s = stream::iter(documents.into_iter().map(move |document| {
        let registry = Arc::clone(&registry);
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        let callback = callback.clone();
        async move {
            if let Some(ref cb) = callback {
                cb.on_document_start(document.id());
            }

            let outcome = process_document(document, &registry, store.as_ref(), timeout_secs).await;
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            info!("Processed {}/{} documents", n, total);

            if let Some(ref cb) = callback {
                match (&outcome.conversion, &outcome.write) {
                    (Err(e), _) => cb.on_document_error(&outcome.id, n, total, &e.to_string()),
                    (Ok(_), Err(e)) => cb.on_document_error(&outcome.id, n, total, &e.to_string()),
                    (Ok(text), Ok(_)) => cb.on_document_complete(&outcome.id, n, total, text.len()),
                }
            }
            outcome
        }
    }))
    .buffer_unordered(config.concurrency);

    Ok(Box::pin(s))
}
