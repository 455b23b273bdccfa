//! Configuration for an enrichment pass.
//!
//! All orchestration and recognition behaviour is controlled through
//! [`EnrichConfig`], built via its [`EnrichConfigBuilder`]. Store-specific
//! settings live with the store (see [`crate::store::ImmichConfig`]).

use crate::error::EnrichError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for one enrichment pass.
///
/// Built via [`EnrichConfig::builder()`] or using [`EnrichConfig::default()`].
///
/// # Example
/// ```rust
/// use bibai::EnrichConfig;
///
/// let config = EnrichConfig::builder()
///     .concurrency(16)
///     .language("de")
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct EnrichConfig {
    /// Maximum number of documents converted at once. Default: 32.
    ///
    /// Each unit fetches a preview over the network and waits on the vision
    /// model, so units spend most of their time blocked. The bound protects
    /// both the catalog server and the model endpoint.
    pub concurrency: usize,

    /// Per-document timeout in seconds; `0` disables it. Default: 120.
    ///
    /// Expiry is reported like any other conversion failure.
    pub unit_timeout_secs: u64,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Language hint passed to the recogniser (ISO 639-1). Default: "en".
    pub language: String,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 2048.
    pub max_tokens: usize,

    /// Retry attempts on a failed recognition call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in OCR prompt.
    pub system_prompt: Option<String>,

    /// Longest side of the image sent to the model, in pixels. Default: 2000.
    pub max_image_pixels: u32,

    /// Lowercase recognised and cached text before writing it. Default: true.
    pub lowercase: bool,

    /// Receives per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            unit_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            language: "en".to_string(),
            temperature: 0.0,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
            max_image_pixels: 2000,
            lowercase: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for EnrichConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichConfig")
            .field("concurrency", &self.concurrency)
            .field("unit_timeout_secs", &self.unit_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("language", &self.language)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("lowercase", &self.lowercase)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn EnrichProgressCallback>"),
            )
            .finish()
    }
}

impl EnrichConfig {
    /// Create a new builder for `EnrichConfig`.
    pub fn builder() -> EnrichConfigBuilder {
        EnrichConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`EnrichConfig`].
pub struct EnrichConfigBuilder {
    config: EnrichConfig,
}

impl EnrichConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn unit_timeout_secs(mut self, secs: u64) -> Self {
        self.config.unit_timeout_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(64);
        self
    }

    pub fn lowercase(mut self, v: bool) -> Self {
        self.config.lowercase = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EnrichConfig, EnrichError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(EnrichError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.language.trim().is_empty() {
            return Err(EnrichError::InvalidConfig(
                "Recognition language must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(EnrichError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EnrichConfig::default();
        assert_eq!(c.concurrency, 32);
        assert_eq!(c.unit_timeout_secs, 120);
        assert_eq!(c.language, "en");
        assert!(c.lowercase);
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = EnrichConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_empty_language() {
        let err = EnrichConfig::builder().language("  ").build().unwrap_err();
        assert!(err.to_string().contains("language"));
    }

    #[test]
    fn debug_hides_provider() {
        let c = EnrichConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("concurrency: 32"));
    }
}
