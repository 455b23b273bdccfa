//! Immich photo catalog over its REST API.
//!
//! ## Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | list buckets | `GET  /timeline/buckets?size=MONTH` |
//! | list assets  | `GET  /timeline/bucket?timeBucket=<b>&size=MONTH` |
//! | media        | `GET  /assets/<id>/thumbnail?size=<preview\|thumbnail>` |
//! | write back   | `PUT  /assets/<id>` with `{"description": …}` |
//!
//! Every request carries the `x-api-key` header. Only image assets are
//! listed; videos and other media are skipped at listing time.

use super::DocumentStore;
use crate::document::{Document, MediaKind, MediaSource, RawMedia};
use crate::error::StoreError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Which rendition of an asset to fetch for recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailSize {
    /// Large rendition; better recognition, more bytes.
    #[default]
    Preview,
    Thumbnail,
}

impl ThumbnailSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbnailSize::Preview => "preview",
            ThumbnailSize::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for ThumbnailSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThumbnailSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preview" => Ok(ThumbnailSize::Preview),
            "thumbnail" => Ok(ThumbnailSize::Thumbnail),
            other => Err(format!(
                "unknown thumbnail size '{other}' (expected 'preview' or 'thumbnail')"
            )),
        }
    }
}

/// Connection settings for [`ImmichStore`].
#[derive(Debug, Clone)]
pub struct ImmichConfig {
    /// API base URL, e.g. `https://photos.example.com/api`.
    pub api_host: String,
    pub api_key: String,
    /// Buckets fetched in parallel while listing. Default: 5.
    pub listing_concurrency: usize,
    pub thumbnail_size: ThumbnailSize,
    /// Per-request timeout. Default: 60.
    pub request_timeout_secs: u64,
    /// Log writes instead of sending them.
    pub dry_run: bool,
}

impl Default for ImmichConfig {
    fn default() -> Self {
        Self {
            api_host: String::new(),
            api_key: String::new(),
            listing_concurrency: 5,
            thumbnail_size: ThumbnailSize::Preview,
            request_timeout_secs: 60,
            dry_run: false,
        }
    }
}

impl ImmichConfig {
    pub fn new(api_host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_host: api_host.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimeBucket {
    #[serde(rename = "timeBucket")]
    time_bucket: String,
    #[serde(default)]
    count: usize,
}

#[derive(Debug, Deserialize)]
struct Asset {
    id: String,
    #[serde(rename = "originalMimeType", default)]
    original_mime_type: String,
    #[serde(rename = "exifInfo", default)]
    exif_info: Option<ExifInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ExifInfo {
    #[serde(default)]
    description: Option<String>,
}

/// HTTP session shared by the store and every document it lists.
struct ImmichClient {
    http: reqwest::Client,
    api_host: String,
    thumbnail_size: ThumbnailSize,
}

impl ImmichClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_host, path)
    }

    async fn time_buckets(&self) -> Result<Vec<TimeBucket>, StoreError> {
        let url = self.url("/timeline/buckets");
        debug!("Requesting time buckets from {}", url);
        let buckets: Vec<TimeBucket> = self
            .http
            .get(&url)
            .query(&[("size", "MONTH")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Retrieved {} time buckets", buckets.len());
        Ok(buckets)
    }

    async fn bucket_documents(
        self: &Arc<Self>,
        bucket: &TimeBucket,
    ) -> Result<Vec<Document>, StoreError> {
        let url = self.url("/timeline/bucket");
        let assets: Vec<Asset> = self
            .http
            .get(&url)
            .query(&[("timeBucket", bucket.time_bucket.as_str()), ("size", "MONTH")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let source: Arc<dyn MediaSource> = Arc::clone(self) as Arc<dyn MediaSource>;
        let documents: Vec<Document> = assets
            .into_iter()
            .filter(|asset| {
                let keep = MediaKind::from_mime(&asset.original_mime_type) == MediaKind::Image;
                if !keep {
                    debug!(
                        "Skipping asset {} with unsupported mime type {}",
                        asset.id, asset.original_mime_type
                    );
                }
                keep
            })
            .map(|asset| {
                let description = asset
                    .exif_info
                    .and_then(|exif| exif.description)
                    .unwrap_or_default();
                Document::new(
                    asset.id,
                    description,
                    asset.original_mime_type,
                    Arc::clone(&source),
                )
            })
            .collect();

        debug!(
            "Bucket {}: {} listed, {} images",
            bucket.time_bucket,
            bucket.count,
            documents.len()
        );
        Ok(documents)
    }
}

#[async_trait]
impl MediaSource for ImmichClient {
    async fn load(&self, id: &str) -> Result<RawMedia, StoreError> {
        let url = self.url(&format!("/assets/{id}/thumbnail"));
        let response = self
            .http
            .get(&url)
            .query(&[("size", self.thumbnail_size.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !mime_type.starts_with("image/") {
            return Err(StoreError::UnexpectedMime {
                id: id.to_string(),
                mime_type,
            });
        }

        let bytes = response.bytes().await?;
        Ok(RawMedia {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }
}

/// [`DocumentStore`] backed by an Immich server.
pub struct ImmichStore {
    client: Arc<ImmichClient>,
    listing_concurrency: usize,
    dry_run: bool,
}

impl ImmichStore {
    pub fn new(config: ImmichConfig) -> Result<Self, StoreError> {
        let api_host = config.api_host.trim().trim_end_matches('/').to_string();
        let api_key = config.api_key.trim();
        if api_host.is_empty() || api_key.is_empty() {
            return Err(StoreError::MissingCredentials(
                "IMMICH_API_HOST and IMMICH_API_KEY must both be set".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|_| {
            StoreError::MissingCredentials("API key is not a valid header value".into())
        })?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| StoreError::Request {
                url: api_host.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        debug!("Initialised Immich client for {}", api_host);
        Ok(Self {
            client: Arc::new(ImmichClient {
                http,
                api_host,
                thumbnail_size: config.thumbnail_size,
            }),
            listing_concurrency: config.listing_concurrency.max(1),
            dry_run: config.dry_run,
        })
    }

    /// API base URL with any trailing `/` removed.
    pub fn api_host(&self) -> &str {
        &self.client.api_host
    }
}

#[async_trait]
impl DocumentStore for ImmichStore {
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let buckets = self.client.time_buckets().await?;
        info!(
            "Fetching documents for {} buckets with {} workers",
            buckets.len(),
            self.listing_concurrency
        );

        let per_bucket: Vec<Vec<Document>> = stream::iter(buckets)
            .map(|bucket| {
                let client = Arc::clone(&self.client);
                async move { client.bucket_documents(&bucket).await }
            })
            .buffered(self.listing_concurrency)
            .try_collect()
            .await?;

        let documents: Vec<Document> = per_bucket.into_iter().flatten().collect();
        info!("Listed {} image documents", documents.len());
        Ok(documents)
    }

    async fn persist_text(&self, id: &str, description: &str) -> Result<(), StoreError> {
        let url = self.client.url(&format!("/assets/{id}"));
        if self.dry_run {
            info!("[dry-run] PUT {} ({} chars)", url, description.len());
            return Ok(());
        }

        self.client
            .http
            .put(&url)
            .json(&serde_json::json!({ "description": description }))
            .send()
            .await?
            .error_for_status()?;
        debug!("Updated description of {}", id);
        Ok(())
    }
}
