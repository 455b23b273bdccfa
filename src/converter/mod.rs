//! Converters and the capability registry that dispatches to them.
//!
//! A [`Converter`] declares which documents it can handle and turns a capable
//! document into text. The [`ConverterRegistry`] holds converters in
//! registration order and hands each document to the **first** capable one,
//! so a specialised converter registered early shadows a generic one
//! registered later:
//!
//! ```text
//! [ CachedTextConverter, ImageOcrConverter ]
//!   known id? ──yes──▶ cached text
//!      │no
//!      ▼
//!   image? ──yes──▶ vision OCR
//!      │no
//!      ▼
//!   NoCapableConverter
//! ```
//!
//! Capability must come from immutable document state (its media kind, or a
//! cache built before the pass). The registry does not re-check capability
//! after dispatch.

mod cache;
mod ocr;

pub use self::cache::{CachedTextConverter, OcrCache};
pub use self::ocr::{ImageOcrConverter, RecognizerInit};

use crate::document::Document;
use crate::error::ConversionError;
use async_trait::async_trait;
use tracing::debug;

/// Turns a capable document into text.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Human-readable converter name for tracing.
    fn name(&self) -> &str;

    /// Whether this converter handles `document`. Must be pure: no I/O, no
    /// mutation.
    fn is_capable_of(&self, document: &Document) -> bool;

    /// Produce the text for `document`. May perform I/O; never mutates the
    /// document.
    async fn convert(&self, document: &Document) -> Result<String, ConversionError>;
}

/// Ordered list of converters; first capable converter wins.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: Vec<Box<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a converter. Later registrations only see documents that every
    /// earlier converter declined.
    pub fn register(&mut self, converter: impl Converter + 'static) {
        self.converters.push(Box::new(converter));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, converter: impl Converter + 'static) -> Self {
        self.register(converter);
        self
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// The converter that would handle `document`, if any.
    pub fn find(&self, document: &Document) -> Option<&dyn Converter> {
        self.converters
            .iter()
            .find(|c| c.is_capable_of(document))
            .map(|c| c.as_ref())
    }
}

#[async_trait]
impl Converter for ConverterRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    fn is_capable_of(&self, document: &Document) -> bool {
        self.find(document).is_some()
    }

    async fn convert(&self, document: &Document) -> Result<String, ConversionError> {
        match self.find(document) {
            Some(converter) => {
                debug!("{}: dispatched to {}", document.id(), converter.name());
                converter.convert(document).await
            }
            None => Err(ConversionError::NoCapableConverter {
                id: document.id().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MediaKind, MediaSource, RawMedia};
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NoMedia;

    #[async_trait]
    impl MediaSource for NoMedia {
        async fn load(&self, _id: &str) -> Result<RawMedia, StoreError> {
            Err(StoreError::MissingCredentials("unused".into()))
        }
    }

    /// Answers with a fixed string for one kind (or all kinds) and counts calls.
    struct Fixed {
        name: &'static str,
        kind: Option<MediaKind>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(name: &'static str, kind: Option<MediaKind>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    kind,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Converter for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn is_capable_of(&self, document: &Document) -> bool {
            self.kind.map_or(true, |k| k == document.kind())
        }

        async fn convert(&self, _document: &Document) -> Result<String, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.name.to_string())
        }
    }

    fn doc(id: &str, mime: &str) -> Document {
        Document::new(id, "", mime, Arc::new(NoMedia))
    }

    #[test]
    fn first_capable_converter_wins() {
        let (images, image_calls) = Fixed::new("images", Some(MediaKind::Image));
        let (generic, generic_calls) = Fixed::new("generic", None);
        let registry = ConverterRegistry::new().with(images).with(generic);

        for _ in 0..5 {
            let text = tokio_test::block_on(registry.convert(&doc("a", "image/jpeg"))).unwrap();
            assert_eq!(text, "images");
        }
        assert_eq!(image_calls.load(Ordering::SeqCst), 5);
        assert_eq!(generic_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fallback_handles_other_kinds() {
        let (images, _) = Fixed::new("images", Some(MediaKind::Image));
        let (generic, _) = Fixed::new("generic", None);
        let registry = ConverterRegistry::new().with(images).with(generic);

        let text = tokio_test::block_on(registry.convert(&doc("v", "video/mp4"))).unwrap();
        assert_eq!(text, "generic");
    }

    #[test]
    fn no_capable_converter_names_document() {
        let (images, _) = Fixed::new("images", Some(MediaKind::Image));
        let registry = ConverterRegistry::new().with(images);
        let d = doc("clip-7", "video/mp4");

        assert!(!registry.is_capable_of(&d));
        let err = tokio_test::block_on(registry.convert(&d)).unwrap_err();
        assert_eq!(
            err,
            ConversionError::NoCapableConverter {
                id: "clip-7".into()
            }
        );
    }

    #[test]
    fn empty_registry_is_capable_of_nothing() {
        let registry = ConverterRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.is_capable_of(&doc("a", "image/png")));
    }

    #[test]
    fn registries_nest() {
        let (images, _) = Fixed::new("images", Some(MediaKind::Image));
        let inner = ConverterRegistry::new().with(images);
        let (generic, _) = Fixed::new("generic", None);
        let outer = ConverterRegistry::new().with(inner).with(generic);

        assert_eq!(outer.len(), 2);
        let text = tokio_test::block_on(outer.convert(&doc("a", "image/png"))).unwrap();
        assert_eq!(text, "images");
    }
}
