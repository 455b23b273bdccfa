//! VLM interaction: send one prepared image to a vision model and read back
//! the text it contains.
//!
//! [`TextRecognizer`] is the seam the image converter depends on;
//! [`VisionRecognizer`] is the production implementation on top of
//! `edgequake-llm`. Prompts live in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors are frequent under 32-way concurrency. Exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`) spreads retries out: with a
//! 500 ms base and 3 retries the waits are 500 ms → 1 s → 2 s.

use crate::config::EnrichConfig;
use crate::error::ConversionError;
use crate::prompts::{language_hint, DEFAULT_OCR_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Turns an image into raw (not yet post-processed) text.
///
/// Implementations are shared across concurrent conversions and must be safe
/// to call from many tasks at once.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: ImageData) -> Result<String, ConversionError>;
}

/// Recognises text with a vision LLM.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    language: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &EnrichConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_OCR_PROMPT.to_string()),
            language: config.language.clone(),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve the provider from `config` and the environment, then build the
    /// recogniser. This is the expensive step the image converter defers until
    /// the first image arrives.
    pub fn from_config(config: &EnrichConfig) -> Result<Self, ConversionError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn messages(&self, image: ImageData) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::system(language_hint(&self.language)),
            // The image carries all the content; the user turn only needs to exist.
            ChatMessage::user_with_images("", vec![image]),
        ]
    }
}

#[async_trait]
impl TextRecognizer for VisionRecognizer {
    async fn recognize(&self, image: ImageData) -> Result<String, ConversionError> {
        let start = Instant::now();
        let messages = self.messages(image);
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Recognition retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "Recognised image: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Recognition attempt {} failed — {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(ConversionError::RecognitionFailed {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Build `CompletionOptions` from the enrichment config.
fn build_options(config: &EnrichConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **OpenAI** when `OPENAI_API_KEY` is set
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
pub fn resolve_provider(config: &EnrichConfig) -> Result<Arc<dyn LLMProvider>, ConversionError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ConversionError::EngineUnavailable {
            detail: format!(
                "no LLM provider could be auto-detected from the environment \
                (set OPENAI_API_KEY, ANTHROPIC_API_KEY, or --provider): {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ConversionError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ConversionError::EngineUnavailable {
            detail: format!("provider '{provider_name}': {e}"),
        }
    })
}

/// Delay before retry `attempt` (1-based): doubles each time, saturating.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = EnrichConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(500, 64), u64::MAX);
        assert_eq!(backoff_ms(500, u32::MAX), u64::MAX);
    }
}
