//! Progress-callback trait for per-document enrichment events.
//!
//! Inject an [`Arc<dyn EnrichProgressCallback>`] via
//! [`crate::config::EnrichConfigBuilder::progress_callback`] to receive events
//! as the pass processes each document. The trait is `Send + Sync` because
//! documents complete concurrently and out of order.
//!
//! # Example
//!
//! ```rust
//! use bibai::{EnrichConfig, EnrichProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl EnrichProgressCallback for Counter {
//!     fn on_document_complete(&self, id: &str, done: usize, total: usize, _len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{done}/{total} {id}");
//!     }
//! }
//!
//! let config = EnrichConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `done` counts completed documents including the
/// current one, so it always ends at `total`.
pub trait EnrichProgressCallback: Send + Sync {
    /// Called once after the document list is known, before any conversion.
    fn on_pass_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a worker picks up a document.
    fn on_document_start(&self, id: &str) {
        let _ = id;
    }

    /// Called when a document was converted and its write (if any) succeeded.
    fn on_document_complete(&self, id: &str, done: usize, total: usize, text_len: usize) {
        let _ = (id, done, total, text_len);
    }

    /// Called when a document's conversion or write failed.
    fn on_document_error(&self, id: &str, done: usize, total: usize, error: &str) {
        let _ = (id, done, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_pass_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl EnrichProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::EnrichConfig`].
pub type ProgressCallback = Arc<dyn EnrichProgressCallback>;
