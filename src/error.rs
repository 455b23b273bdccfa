//! Error types for the bibai library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`EnrichError`] — **Fatal**: the pass cannot proceed at all (the store
//!   could not list documents, the configuration is invalid, the cache file is
//!   unreadable). Returned as `Err(EnrichError)` from [`crate::Enricher::run`].
//!
//! * [`ConversionError`] — **Non-fatal**: a single document could not be
//!   converted. Stored inside [`crate::output::DocumentOutcome`] and rendered
//!   as `<error: …>` sentinel text in that document's OCR section.
//!
//! * [`StoreError`] — raised by a [`crate::store::DocumentStore`]. Fatal when
//!   it comes from listing, per-document when it comes from a write or from
//!   loading a document's media.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by an enrichment pass.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// The store could not produce the document list; nothing was dispatched.
    #[error("Failed to list documents: {0}")]
    StoreListing(#[source] StoreError),

    /// The derived-text cache file could not be read or parsed.
    #[error("Failed to load OCR cache '{path}': {reason}")]
    CacheLoad { path: PathBuf, reason: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// The `Display` form is what ends up inside the sentinel text, so messages
/// are written for a human reading the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ConversionError {
    /// No registered converter declared itself capable of the document.
    #[error("no converter capable of handling document {id}")]
    NoCapableConverter { id: String },

    /// The document's raw content could not be fetched.
    #[error("failed to load media for {id}: {detail}")]
    LoadFailed { id: String, detail: String },

    /// The content was fetched but is not a decodable image.
    #[error("failed to decode image {id}: {detail}")]
    DecodeFailed { id: String, detail: String },

    /// The recognition engine could not be constructed.
    #[error("recognition engine unavailable: {detail}")]
    EngineUnavailable { detail: String },

    /// The recognition engine failed after all retries.
    #[error("recognition failed after {retries} retries: {detail}")]
    RecognitionFailed { retries: u32, detail: String },

    /// The unit of work exceeded the configured timeout.
    #[error("conversion of {id} timed out after {secs}s")]
    Timeout { id: String, secs: u64 },
}

/// Errors raised by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Host or API key was not provided.
    #[error("Store credentials missing: {0}")]
    MissingCredentials(String),

    /// The request never produced a response.
    #[error("Request to '{url}' failed: {reason}")]
    Request { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("Request to '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body was not what the API promises.
    #[error("Unexpected response from '{url}': {reason}")]
    Decode { url: String, reason: String },

    /// Media was served with a content type other than an image.
    #[error("Unexpected MIME type '{mime_type}' for asset {id}")]
    UnexpectedMime { id: String, mime_type: String },
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if let Some(status) = e.status() {
            StoreError::Status {
                url,
                status: status.as_u16(),
            }
        } else if e.is_decode() {
            StoreError::Decode {
                url,
                reason: e.to_string(),
            }
        } else {
            StoreError::Request {
                url,
                reason: e.to_string(),
            }
        }
    }
}
