//! The document model passed between store, registry and orchestrator.
//!
//! A [`Document`] is built by a store from one catalog record. Its OCR text and
//! tags are parsed out of the record's description when it is listed, and its
//! raw content stays behind a [`MediaSource`] until a converter asks for it.
//!
//! Assigning text ([`Document::set_text`]) only rewrites the in-memory
//! description. Pushing it back is an explicit
//! [`crate::store::DocumentStore::persist_text`] call, so tests can observe or
//! suppress the write.

use crate::error::StoreError;
use crate::sections::{self, Section};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Raw content fetched for a document.
#[derive(Debug, Clone)]
pub struct RawMedia {
    pub bytes: Vec<u8>,
    /// Content type declared by the source, e.g. `image/jpeg`.
    pub mime_type: String,
}

/// Something that can fetch a document's raw content by id.
///
/// Implemented by stores; shared by every document the store lists.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn load(&self, id: &str) -> Result<RawMedia, StoreError>;
}

/// Coarse kind of a document, derived from its declared media type.
///
/// Converters decide capability from this, and it never changes during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let top = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match top.as_str() {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

/// Whether assigning text changed the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WriteStatus {
    /// The description changed and must be persisted.
    Updated,
    /// The description already carried this text.
    Unchanged,
}

/// One catalog item.
pub struct Document {
    id: String,
    tags: Option<Vec<String>>,
    text: Option<String>,
    description: String,
    mime_type: String,
    kind: MediaKind,
    source: Arc<dyn MediaSource>,
}

impl Document {
    /// Build a document from its stored description, pre-populating the OCR
    /// text and tags from the description's sections.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        mime_type: impl Into<String>,
        source: Arc<dyn MediaSource>,
    ) -> Self {
        let description = description.into();
        let mime_type = mime_type.into();
        Self {
            id: id.into(),
            tags: sections::extract_tags(&description),
            text: sections::extract_text(&description, Section::Ocr),
            kind: MediaKind::from_mime(&mime_type),
            description,
            mime_type,
            source,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tags parsed from the TAG section. `None` when the description has none.
    pub fn tags(&self) -> Option<&[String]> {
        self.tags.as_deref()
    }

    /// Current OCR text. `None` when the description has no OCR section yet.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The full description including all sections.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Fetch the raw content from the document's source.
    pub async fn load_media(&self) -> Result<RawMedia, StoreError> {
        self.source.load(&self.id).await
    }

    /// Assign the OCR text and rewrite the OCR section of the description.
    ///
    /// The orchestrator calls this once per pass. Returns whether the
    /// description changed; persisting it is the caller's job.
    pub fn set_text(&mut self, text: impl Into<String>) -> WriteStatus {
        let text = sections::strip_markers(&text.into());
        let updated = sections::update_text(&self.description, Section::Ocr, &text);
        self.text = Some(text);

        if updated == self.description {
            return WriteStatus::Unchanged;
        }
        self.description = updated;
        WriteStatus::Updated
    }

    /// Replace the tag list and rewrite the TAG section of the description.
    pub fn set_tags(&mut self, tags: Vec<String>) -> WriteStatus {
        let updated = sections::update_tags(&self.description, &tags);
        self.tags = Some(tags.iter().map(|t| sections::normalize_tag(t)).collect());

        if updated == self.description {
            return WriteStatus::Unchanged;
        }
        self.description = updated;
        WriteStatus::Updated
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("mime_type", &self.mime_type)
            .field("tags", &self.tags)
            .field("text", &self.text)
            .finish()
    }
}
