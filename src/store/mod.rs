//! Document stores: where documents come from and where rewritten
//! descriptions go back to.

pub mod immich;

pub use self::immich::{ImmichConfig, ImmichStore, ThumbnailSize};

use crate::document::Document;
use crate::error::StoreError;
use async_trait::async_trait;

/// A catalog of documents that can be listed and written back.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Snapshot of every document to process in this pass.
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;

    /// Push the rewritten description of one document.
    async fn persist_text(&self, id: &str, description: &str) -> Result<(), StoreError>;
}
