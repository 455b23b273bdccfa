//! Integration tests for the Immich store against a mock HTTP server.

use async_trait::async_trait;
use bibai::pipeline::llm::TextRecognizer;
use bibai::store::{ImmichConfig, ImmichStore, ThumbnailSize};
use bibai::{
    ConversionError, ConverterRegistry, DocumentStore, EnrichConfig, Enricher, ImageOcrConverter,
    StoreError,
};
use edgequake_llm::ImageData;
use serde_json::json;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const KEY: &str = "secret-key";
const JAN: &str = "2024-01-01T00:00:00.000Z";
const FEB: &str = "2024-02-01T00:00:00.000Z";

// ── Test helpers ─────────────────────────────────────────────────────────────

fn store(server: &MockServer) -> ImmichStore {
    // Trailing slash on purpose: the store must not produce `//timeline`.
    ImmichStore::new(ImmichConfig::new(format!("{}/", server.uri()), KEY)).unwrap()
}

fn png() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(12, 12));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

async fn mount_buckets(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/timeline/buckets"))
        .and(query_param("size", "MONTH"))
        .and(header("x-api-key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "timeBucket": JAN, "count": 2 },
            { "timeBucket": FEB, "count": 1 }
        ])))
        .mount(server)
        .await;
}

async fn mount_bucket(server: &MockServer, bucket: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/timeline/bucket"))
        .and(query_param("timeBucket", bucket))
        .and(query_param("size", "MONTH"))
        .and(header("x-api-key", KEY))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Two buckets: a captioned image plus a video, then an image without EXIF.
async fn mount_catalog(server: &MockServer) {
    mount_buckets(server).await;
    mount_bucket(
        server,
        JAN,
        ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "img-1",
                "originalMimeType": "image/jpeg",
                "exifInfo": {
                    "description": "Trip\n\n%OCR_BEG%\nhello\n%OCR_END%\n%TAG_BEG%beach, sun%TAG_END%"
                }
            },
            {
                "id": "vid-1",
                "originalMimeType": "video/mp4",
                "exifInfo": { "description": "Clip" }
            }
        ])),
    )
    .await;
    mount_bucket(
        server,
        FEB,
        ResponseTemplate::new(200).set_body_json(json!([
            { "id": "img-2", "originalMimeType": "image/png" }
        ])),
    )
    .await;
}

struct Fixed(&'static str);

#[async_trait]
impl TextRecognizer for Fixed {
    async fn recognize(&self, _image: ImageData) -> Result<String, ConversionError> {
        Ok(self.0.to_string())
    }
}

// ── Listing ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lists_images_and_parses_sections() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let docs = store(&server).list_documents().await.unwrap();

    let ids: Vec<&str> = docs.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec!["img-1", "img-2"]);

    assert_eq!(docs[0].text(), Some("hello"));
    assert_eq!(
        docs[0].tags(),
        Some(&["beach".to_string(), "sun".to_string()][..])
    );
    assert_eq!(docs[1].text(), None);
    assert_eq!(docs[1].description(), "");
}

#[tokio::test]
async fn failing_bucket_fails_the_listing() {
    let server = MockServer::start().await;
    mount_buckets(&server).await;
    mount_bucket(&server, JAN, ResponseTemplate::new(200).set_body_json(json!([]))).await;
    mount_bucket(&server, FEB, ResponseTemplate::new(500)).await;

    let err = store(&server).list_documents().await.unwrap_err();

    assert!(matches!(err, StoreError::Status { status: 500, .. }), "{err:?}");
}

#[tokio::test]
async fn rejected_api_key_fails_the_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timeline/buckets"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = store(&server).list_documents().await.unwrap_err();

    assert!(matches!(err, StoreError::Status { status: 401, .. }), "{err:?}");
}

/// Answers bucket requests after `delay` and records how many were being
/// served at once. Every request stays open for the full delay, so the
/// arrivals within the last `delay` are all still in flight.
struct SlowBucket {
    delay: Duration,
    arrivals: Mutex<Vec<Instant>>,
    peak: AtomicUsize,
}

struct SlowBucketHandle(Arc<SlowBucket>);

impl Respond for SlowBucketHandle {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let now = Instant::now();
        let mut arrivals = self.0.arrivals.lock().unwrap();
        arrivals.push(now);
        let open = arrivals
            .iter()
            .filter(|t| now.duration_since(**t) < self.0.delay)
            .count();
        self.0.peak.fetch_max(open, Ordering::SeqCst);
        ResponseTemplate::new(200)
            .set_body_json(json!([]))
            .set_delay(self.0.delay)
    }
}

#[tokio::test]
async fn bucket_fetches_respect_listing_concurrency() {
    let server = MockServer::start().await;
    let buckets: Vec<_> = (1..=12)
        .map(|m| json!({ "timeBucket": format!("2023-{m:02}-01T00:00:00.000Z"), "count": 1 }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/timeline/buckets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(buckets)))
        .mount(&server)
        .await;
    let slow = Arc::new(SlowBucket {
        delay: Duration::from_millis(300),
        arrivals: Mutex::new(Vec::new()),
        peak: AtomicUsize::new(0),
    });
    Mock::given(method("GET"))
        .and(path("/timeline/bucket"))
        .respond_with(SlowBucketHandle(Arc::clone(&slow)))
        .expect(12)
        .mount(&server)
        .await;

    let config = ImmichConfig {
        listing_concurrency: 3,
        ..ImmichConfig::new(server.uri(), KEY)
    };
    let docs = ImmichStore::new(config)
        .unwrap()
        .list_documents()
        .await
        .unwrap();

    assert!(docs.is_empty());
    let peak = slow.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak of {peak} concurrent bucket requests");
    assert!(peak > 1, "bucket requests never overlapped");
}

// ── Media ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn loads_preview_rendition() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/assets/img-1/thumbnail"))
        .and(query_param("size", "preview"))
        .and(header("x-api-key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let docs = store(&server).list_documents().await.unwrap();
    let media = docs[0].load_media().await.unwrap();

    assert_eq!(media.mime_type, "image/png");
    assert_eq!(media.bytes, png());
}

#[tokio::test]
async fn thumbnail_size_is_configurable() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/assets/img-2/thumbnail"))
        .and(query_param("size", "thumbnail"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png(), "image/webp"))
        .expect(1)
        .mount(&server)
        .await;

    let config = ImmichConfig {
        thumbnail_size: ThumbnailSize::Thumbnail,
        ..ImmichConfig::new(server.uri(), KEY)
    };
    let docs = ImmichStore::new(config)
        .unwrap()
        .list_documents()
        .await
        .unwrap();

    assert_eq!(docs[1].load_media().await.unwrap().mime_type, "image/webp");
}

#[tokio::test]
async fn non_image_content_type_is_rejected() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/assets/img-1/thumbnail"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let docs = store(&server).list_documents().await.unwrap();
    let err = docs[0].load_media().await.unwrap_err();

    assert!(
        matches!(err, StoreError::UnexpectedMime { ref mime_type, .. } if mime_type.starts_with("text/html")),
        "{err:?}"
    );
}

// ── Writes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn persist_sends_description() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/assets/img-1"))
        .and(header("x-api-key", KEY))
        .and(body_json(json!({ "description": "Trip\n\n%OCR_BEG%\nhi\n%OCR_END%" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "img-1" })))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .persist_text("img-1", "Trip\n\n%OCR_BEG%\nhi\n%OCR_END%")
        .await
        .unwrap();
}

#[tokio::test]
async fn persist_surfaces_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/assets/img-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = store(&server).persist_text("img-1", "x").await.unwrap_err();

    assert!(matches!(err, StoreError::Status { status: 404, .. }), "{err:?}");
}

#[tokio::test]
async fn dry_run_sends_no_writes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = ImmichConfig {
        dry_run: true,
        ..ImmichConfig::new(server.uri(), KEY)
    };
    ImmichStore::new(config)
        .unwrap()
        .persist_text("img-1", "anything")
        .await
        .unwrap();
}

// ── Full pass ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_pass_writes_only_changed_descriptions() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    for id in ["img-1", "img-2"] {
        Mock::given(method("GET"))
            .and(path(format!("/assets/{id}/thumbnail")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(png(), "image/jpeg"))
            .mount(&server)
            .await;
    }
    // img-1 already carries "hello"; only img-2 is written.
    Mock::given(method("PUT"))
        .and(path("/assets/img-2"))
        .and(body_json(json!({ "description": "\n\n%OCR_BEG%\nhello\n%OCR_END%" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/assets/img-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = EnrichConfig::default();
    let registry = ConverterRegistry::new().with(ImageOcrConverter::with_recognizer(
        &config,
        Arc::new(Fixed("HELLO")),
    ));
    let report = Enricher::new(Arc::new(store(&server)), Arc::new(registry), config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.stats.total, 2);
    assert_eq!(report.stats.converted, 2);
    assert_eq!(report.stats.written, 1);
    assert_eq!(report.stats.unchanged, 1);
}
