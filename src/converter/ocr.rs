//! Image OCR converter: preview bytes → vision model → cleaned text.

use super::Converter;
use crate::config::EnrichConfig;
use crate::document::{Document, MediaKind};
use crate::error::ConversionError;
use crate::pipeline::llm::{TextRecognizer, VisionRecognizer};
use crate::pipeline::{encode, postprocess};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Builds the recogniser on first use.
pub type RecognizerInit =
    Box<dyn Fn() -> Result<Arc<dyn TextRecognizer>, ConversionError> + Send + Sync>;

/// Converts image documents by running their preview through a
/// [`TextRecognizer`].
///
/// The recogniser is built lazily, at most once per converter: concurrent
/// first callers wait on the same initialisation and then share the instance.
/// A failed initialisation is not cached, so the next document retries it.
pub struct ImageOcrConverter {
    engine: OnceCell<Arc<dyn TextRecognizer>>,
    init: RecognizerInit,
    max_image_pixels: u32,
    lowercase: bool,
}

impl ImageOcrConverter {
    /// Converter backed by a [`VisionRecognizer`] resolved from `config`.
    pub fn new(config: &EnrichConfig) -> Self {
        let init_config = config.clone();
        Self::with_init(
            config,
            Box::new(move || {
                let recognizer = VisionRecognizer::from_config(&init_config)?;
                Ok(Arc::new(recognizer) as Arc<dyn TextRecognizer>)
            }),
        )
    }

    /// Converter whose recogniser is built by `init` on first use.
    pub fn with_init(config: &EnrichConfig, init: RecognizerInit) -> Self {
        Self {
            engine: OnceCell::new(),
            init,
            max_image_pixels: config.max_image_pixels,
            lowercase: config.lowercase,
        }
    }

    /// Converter around an already-built recogniser.
    pub fn with_recognizer(config: &EnrichConfig, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            engine: OnceCell::new_with(Some(recognizer)),
            init: Box::new(|| {
                Err(ConversionError::EngineUnavailable {
                    detail: "recogniser was injected and cannot be rebuilt".into(),
                })
            }),
            max_image_pixels: config.max_image_pixels,
            lowercase: config.lowercase,
        }
    }

    async fn engine(&self) -> Result<&Arc<dyn TextRecognizer>, ConversionError> {
        self.engine
            .get_or_try_init(|| async {
                info!("Initialising recognition engine");
                (self.init)()
            })
            .await
    }
}

#[async_trait]
impl Converter for ImageOcrConverter {
    fn name(&self) -> &str {
        "image-ocr"
    }

    fn is_capable_of(&self, document: &Document) -> bool {
        document.kind() == MediaKind::Image
    }

    async fn convert(&self, document: &Document) -> Result<String, ConversionError> {
        let id = document.id();
        let media = document
            .load_media()
            .await
            .map_err(|e| ConversionError::LoadFailed {
                id: id.to_string(),
                detail: e.to_string(),
            })?;

        if MediaKind::from_mime(&media.mime_type) != MediaKind::Image {
            return Err(ConversionError::LoadFailed {
                id: id.to_string(),
                detail: format!("unexpected MIME type '{}'", media.mime_type),
            });
        }
        debug!("{}: loaded {} bytes ({})", id, media.bytes.len(), media.mime_type);

        // Decoding and resizing are CPU-bound; keep them off the async workers.
        let max_pixels = self.max_image_pixels;
        let image = tokio::task::spawn_blocking(move || {
            encode::prepare_image(&media.bytes, max_pixels)
        })
        .await
        .map_err(|e| ConversionError::DecodeFailed {
            id: id.to_string(),
            detail: format!("decode task failed: {e}"),
        })?
        .map_err(|e| ConversionError::DecodeFailed {
            id: id.to_string(),
            detail: e.to_string(),
        })?;

        let raw = self.engine().await?.recognize(image).await?;
        Ok(postprocess::clean_text(&raw, self.lowercase))
    }
}
