//! # bibai
//!
//! Enrich a photo catalog with text recognised in its images.
//!
//! Each catalog item carries a free-form description. bibai reads the text
//! visible in every image with a Vision Language Model and writes it into a
//! marker-delimited section of that description, leaving everything else the
//! user wrote untouched:
//!
//! ```text
//! Holiday in Lisbon
//!
//! %OCR_BEG%
//! rua augusta 24
//! %OCR_END%
//! ```
//!
//! Running a pass twice over the same catalog rewrites nothing: the section
//! codec is idempotent and unchanged descriptions are never sent back.
//!
//! ## Pass Overview
//!
//! ```text
//! DocumentStore::list_documents
//!  │
//!  ├─ fan out, at most `concurrency` documents in flight
//!  │    ├─ ConverterRegistry  first capable converter wins
//!  │    │    ├─ CachedTextConverter  known ids from an OCR cache file
//!  │    │    └─ ImageOcrConverter    preview → VLM → cleaned text
//!  │    ├─ render text or `<error: …>`
//!  │    ├─ Document::set_text        rewrite the OCR section
//!  │    └─ DocumentStore::persist_text   only when it changed
//!  └─ EnrichmentReport (per-document outcomes + stats)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bibai::store::{ImmichConfig, ImmichStore};
//! use bibai::{ConverterRegistry, EnrichConfig, Enricher, ImageOcrConverter};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = EnrichConfig::builder().language("de").build()?;
//!     let store = ImmichStore::new(ImmichConfig::new(
//!         "https://photos.example.com/api",
//!         std::env::var("IMMICH_API_KEY")?,
//!     ))?;
//!     let registry = ConverterRegistry::new().with(ImageOcrConverter::new(&config));
//!
//!     let report = Enricher::new(Arc::new(store), Arc::new(registry), config)
//!         .run()
//!         .await?;
//!     eprintln!("{} written, {} failed", report.stats.written, report.stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bibai` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! bibai = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod converter;
pub mod document;
pub mod enrich;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod sections;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EnrichConfig, EnrichConfigBuilder};
pub use converter::{CachedTextConverter, Converter, ConverterRegistry, ImageOcrConverter, OcrCache};
pub use document::{Document, MediaKind, MediaSource, RawMedia, WriteStatus};
pub use enrich::Enricher;
pub use error::{ConversionError, EnrichError, StoreError};
pub use output::{render_text, DocumentOutcome, EnrichmentReport, EnrichmentStats};
pub use progress::{EnrichProgressCallback, NoopProgressCallback, ProgressCallback};
pub use sections::Section;
pub use store::DocumentStore;
pub use stream::{enrich_stream, OutcomeStream};
