//! Derived-text cache: reuse OCR results produced outside this tool.
//!
//! The cache file holds one entry per line:
//!
//! ```text
//! <asset id> [{"text": "STOP"}, {"text": "AHEAD"}]
//! ```
//!
//! Each entry's text is its `text` values joined by single spaces. Registered
//! ahead of the image converter, [`CachedTextConverter`] answers for every id
//! in the cache so those images never reach the vision model.

use super::Converter;
use crate::document::Document;
use crate::error::{ConversionError, EnrichError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CachedSegment {
    text: String,
}

/// In-memory map from document id to previously recognised text.
#[derive(Debug, Clone, Default)]
pub struct OcrCache {
    entries: HashMap<String, String>,
}

impl OcrCache {
    /// Read and parse a cache file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EnrichError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| EnrichError::CacheLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let cache = Self::parse(&content).map_err(|reason| EnrichError::CacheLoad {
            path: path.to_path_buf(),
            reason,
        })?;
        info!("Loaded {} cached OCR entries from {}", cache.len(), path.display());
        Ok(cache)
    }

    /// Parse cache file content. Blank lines are skipped; the error names the
    /// first malformed line (1-indexed).
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut entries = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (id, json) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| format!("line {}: expected '<id> <json>'", idx + 1))?;
            let segments: Vec<CachedSegment> = serde_json::from_str(json.trim())
                .map_err(|e| format!("line {}: {}", idx + 1, e))?;
            let text = segments
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            entries.insert(id.to_string(), text);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Answers from an [`OcrCache`] for every document id it holds.
pub struct CachedTextConverter {
    cache: OcrCache,
    lowercase: bool,
}

impl CachedTextConverter {
    pub fn new(cache: OcrCache, lowercase: bool) -> Self {
        Self { cache, lowercase }
    }
}

#[async_trait]
impl Converter for CachedTextConverter {
    fn name(&self) -> &str {
        "ocr-cache"
    }

    fn is_capable_of(&self, document: &Document) -> bool {
        self.cache.contains(document.id())
    }

    async fn convert(&self, document: &Document) -> Result<String, ConversionError> {
        let text = self.cache.get(document.id()).ok_or_else(|| {
            ConversionError::NoCapableConverter {
                id: document.id().to_string(),
            }
        })?;
        tracing::debug!("Cache hit for document {}", document.id());
        if self.lowercase {
            Ok(text.to_lowercase())
        } else {
            Ok(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MediaSource, RawMedia, WriteStatus};
    use crate::error::StoreError;
    use std::io::Write;
    use std::sync::Arc;

    struct NoMedia;

    #[async_trait]
    impl MediaSource for NoMedia {
        async fn load(&self, _id: &str) -> Result<RawMedia, StoreError> {
            panic!("cached documents must not load media");
        }
    }

    const SAMPLE: &str = r#"abc [{"text": "STOP", "score": 0.98}, {"text": "Ahead"}]

def []
"#;

    #[test]
    fn parse_joins_segments() {
        let cache = OcrCache::parse(SAMPLE).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("abc"), Some("STOP Ahead"));
        assert_eq!(cache.get("def"), Some(""));
        assert!(!cache.contains("xyz"));
    }

    #[test]
    fn parse_reports_malformed_line() {
        let err = OcrCache::parse("ok []\nbroken {not json}").unwrap_err();
        assert!(err.starts_with("line 2"), "{err}");
    }

    #[test]
    fn parse_requires_id_and_json() {
        let err = OcrCache::parse("lonely-id").unwrap_err();
        assert!(err.contains("line 1"), "{err}");
    }

    #[test]
    fn load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(SAMPLE.as_bytes()).unwrap();
        let cache = OcrCache::load(f.path()).unwrap();
        assert_eq!(cache.get("abc"), Some("STOP Ahead"));
    }

    #[test]
    fn load_missing_file_is_cache_error() {
        let err = OcrCache::load("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, EnrichError::CacheLoad { .. }));
    }

    #[tokio::test]
    async fn converter_answers_for_cached_ids_only() {
        let c = CachedTextConverter::new(OcrCache::parse(SAMPLE).unwrap(), true);
        let hit = Document::new("abc", "", "image/jpeg", Arc::new(NoMedia));
        let miss = Document::new("zzz", "", "image/jpeg", Arc::new(NoMedia));

        assert!(c.is_capable_of(&hit));
        assert!(!c.is_capable_of(&miss));
        assert_eq!(c.convert(&hit).await.unwrap(), "stop ahead");
    }

    #[tokio::test]
    async fn cached_text_with_marker_is_written_once() {
        let cache = OcrCache::parse(r#"abc [{"text": "sale %OCR_END% today"}]"#).unwrap();
        let c = CachedTextConverter::new(cache, false);
        let mut doc = Document::new("abc", "Caption", "image/jpeg", Arc::new(NoMedia));

        let text = c.convert(&doc).await.unwrap();
        assert_eq!(doc.set_text(text.as_str()), WriteStatus::Updated);
        let first = doc.description().to_string();
        assert_eq!(first.matches("%OCR_END%").count(), 1);

        for _ in 0..2 {
            let mut next = Document::new("abc", first.as_str(), "image/jpeg", Arc::new(NoMedia));
            let text = c.convert(&next).await.unwrap();
            assert_eq!(next.set_text(text), WriteStatus::Unchanged);
            assert_eq!(next.description(), first);
        }
    }
}
