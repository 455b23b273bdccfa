//! CLI binary for bibai.
//!
//! A thin shim over the library crate that maps CLI flags to `EnrichConfig`
//! and `ImmichConfig`, runs one pass and prints a summary.

use anyhow::{Context, Result};
use bibai::store::{ImmichConfig, ImmichStore, ThumbnailSize};
use bibai::{
    CachedTextConverter, ConverterRegistry, EnrichConfig, EnrichProgressCallback, Enricher,
    ImageOcrConverter, OcrCache, ProgressCallback,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per document. Documents complete out
/// of order, so start times are keyed by id.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_pass_start` tells us how many documents there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Listing");
        bar.set_message("Reading catalog…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>5}/{len} assets  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Enriching");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, id: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(id))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl EnrichProgressCallback for CliProgressCallback {
    fn on_pass_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Enriching {total} assets…"))
        ));
    }

    fn on_document_start(&self, id: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(id.to_string(), Instant::now());
        }
        self.bar.set_message(id.to_string());
    }

    fn on_document_complete(&self, id: &str, _done: usize, _total: usize, text_len: usize) {
        let secs = self.elapsed_secs(id);
        self.bar.println(format!(
            "  {} {}  {:<8}  {}",
            green("✓"),
            id,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, id: &str, _done: usize, _total: usize, error: &str) {
        let secs = self.elapsed_secs(id);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            id,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_pass_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} assets processed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} assets converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Enrich every image in the catalog (credentials from .env or environment)
  bibai

  # German text, fewer parallel model calls
  bibai --lang de --concurrency 8

  # Reuse results from an earlier OCR run, recognise only the rest
  bibai --ocr-cache ocr_results.txt

  # See what would be written without touching the catalog
  bibai --dry-run -v

  # Machine-readable summary
  bibai --json --no-progress > stats.json

DESCRIPTION FORMAT:
  Recognised text is stored in the asset description between markers:

    Holiday in Lisbon

    %OCR_BEG%
    rua augusta 24
    %OCR_END%

  Text outside the markers is never modified. Failed assets get
  "<error: …>" inside the markers instead of text.

ENVIRONMENT VARIABLES:
  IMMICH_API_HOST         Immich API base URL (e.g. https://photos.example.com/api)
  IMMICH_API_KEY          Immich API key
  OCR_LANG                Expected language of the text (ISO 639-1, default: en)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter

  A .env file in the working directory is loaded automatically.
"#;

/// Write text recognised in Immich photos into their descriptions.
#[derive(Parser, Debug)]
#[command(
    name = "bibai",
    version,
    about = "Write text recognised in Immich photos into their descriptions",
    long_about = "Read the text visible in every image of an Immich library with a Vision \
Language Model and store it in a marker-delimited section of the asset description. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint \
(Ollama, vLLM, LiteLLM, etc.).",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Immich API base URL.
    #[arg(long, env = "IMMICH_API_HOST")]
    api_host: String,

    /// Immich API key.
    #[arg(long, env = "IMMICH_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Expected language of the text (ISO 639-1).
    #[arg(long, env = "OCR_LANG", default_value = "en")]
    lang: String,

    /// Number of assets processed at once.
    #[arg(short, long, env = "BIBAI_CONCURRENCY", default_value_t = 32)]
    concurrency: usize,

    /// Number of timeline buckets fetched at once while listing.
    #[arg(long, env = "BIBAI_LISTING_CONCURRENCY", default_value_t = 5)]
    listing_concurrency: usize,

    /// Per-asset timeout in seconds (0 disables it).
    #[arg(long, env = "BIBAI_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Per-request HTTP timeout against Immich, in seconds.
    #[arg(long, env = "BIBAI_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Retries per asset on LLM failure.
    #[arg(long, env = "BIBAI_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Max LLM output tokens per asset.
    #[arg(long, env = "BIBAI_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "BIBAI_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// OCR cache file: one `<asset id> <json>` line per asset.
    #[arg(long, env = "BIBAI_OCR_CACHE")]
    ocr_cache: Option<PathBuf>,

    /// Rendition fetched for recognition.
    #[arg(long, env = "BIBAI_THUMBNAIL_SIZE", value_enum, default_value = "preview")]
    thumbnail_size: ThumbnailArg,

    /// Keep the recognised text's original case.
    #[arg(long, env = "BIBAI_NO_LOWERCASE")]
    no_lowercase: bool,

    /// Log description updates instead of sending them.
    #[arg(long, env = "BIBAI_DRY_RUN")]
    dry_run: bool,

    /// Print pass statistics as JSON on stdout.
    #[arg(long, env = "BIBAI_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "BIBAI_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BIBAI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BIBAI_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ThumbnailArg {
    Preview,
    Thumbnail,
}

impl From<ThumbnailArg> for ThumbnailSize {
    fn from(v: ThumbnailArg) -> Self {
        match v {
            ThumbnailArg::Preview => ThumbnailSize::Preview,
            ThumbnailArg::Thumbnail => ThumbnailSize::Thumbnail,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `env = ...` fallbacks see values from .env.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are noise while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn EnrichProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    let store = ImmichStore::new(ImmichConfig {
        api_host: cli.api_host.clone(),
        api_key: cli.api_key.clone(),
        listing_concurrency: cli.listing_concurrency,
        thumbnail_size: cli.thumbnail_size.clone().into(),
        request_timeout_secs: cli.request_timeout,
        dry_run: cli.dry_run,
    })
    .context("Failed to set up Immich client")?;

    // ── Build registry: cache first, then the vision model ───────────────
    let mut registry = ConverterRegistry::new();
    if let Some(ref path) = cli.ocr_cache {
        let cache = OcrCache::load(path).context("Failed to load OCR cache")?;
        if !cli.quiet && !cli.json {
            eprintln!("{} {} cached entries", dim("◆"), cache.len());
        }
        registry.register(CachedTextConverter::new(cache, config.lowercase));
    }
    registry.register(ImageOcrConverter::new(&config));

    // ── Run pass ─────────────────────────────────────────────────────────
    let report = Enricher::new(Arc::new(store), Arc::new(registry), config)
        .run()
        .await
        .context("Enrichment failed")?;
    let stats = &report.stats;

    if cli.json {
        let json = serde_json::to_string_pretty(stats).context("Failed to serialise stats")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Converted {}/{} assets in {}ms",
                stats.converted, stats.total, stats.duration_ms
            );
            if stats.failed > 0 {
                eprintln!("  {} assets failed", stats.failed);
            }
        }
        eprintln!(
            "   {} written  /  {} unchanged  /  {} write failures{}",
            bold(&stats.written.to_string()),
            dim(&stats.unchanged.to_string()),
            if stats.write_failed == 0 {
                dim("0")
            } else {
                red(&stats.write_failed.to_string())
            },
            if cli.dry_run { dim("  (dry run)") } else { String::new() },
        );
    }

    Ok(())
}

/// Map CLI args to `EnrichConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<EnrichConfig> {
    let mut builder = EnrichConfig::builder()
        .concurrency(cli.concurrency)
        .unit_timeout_secs(cli.timeout)
        .language(cli.lang.trim())
        .max_retries(cli.max_retries)
        .max_tokens(cli.max_tokens)
        .lowercase(!cli.no_lowercase);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
