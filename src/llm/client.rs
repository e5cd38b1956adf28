//! Generation provider abstraction.
//!
//! All language-model backends implement [`GenerationProvider`], so the
//! orchestrator can swap between hosted and local models without code
//! changes. Backends are selected via [`GenProvider`] configuration at
//! process start; there is no runtime provider switching per request.

use crate::types::{RagError, Result};
use async_trait::async_trait;

/// Highest accepted sampling temperature (the OpenAI-documented range).
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Sampling and length options for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Sampling randomness; 0 is deterministic.
    pub temperature: f32,
    /// Output length cap in tokens.
    pub max_tokens: u32,
    /// Strings that terminate generation early.
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            stop_sequences: Vec::new(),
        }
    }
}

impl GenerationOptions {
    /// Validate option ranges.
    ///
    /// `temperature` must be within `[0, MAX_TEMPERATURE]` and
    /// `max_tokens` positive.
    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite()
            || self.temperature < 0.0
            || self.temperature > MAX_TEMPERATURE
        {
            return Err(RagError::Configuration(format!(
                "temperature {} outside [0, {}]",
                self.temperature, MAX_TEMPERATURE
            )));
        }
        if self.max_tokens == 0 {
            return Err(RagError::Configuration("max_tokens must be > 0".into()));
        }
        Ok(())
    }
}

/// Generic language-model client trait for provider abstraction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for an assembled prompt.
    ///
    /// Failure modes: `ProviderUnavailable` (transient, retryable),
    /// `ContentPolicyRejected` (surfaced, not retried),
    /// `ContextLengthExceeded` (caller shrinks context and retries once).
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Model name or identifier of this backend.
    fn model_name(&self) -> &str;

    /// Reachability probe with no payload.
    async fn liveness(&self) -> Result<()>;
}

/// Provider configuration for runtime backend selection.
#[derive(Debug, Clone)]
pub enum GenProvider {
    /// OpenAI API (including compatible endpoints such as OpenRouter).
    #[cfg(feature = "openai")]
    OpenAi {
        /// API key.
        api_key: String,
        /// API base URL.
        api_base: String,
        /// Chat model, e.g. `gpt-4o-mini`.
        model: String,
    },

    /// Local inference via an Ollama server.
    #[cfg(feature = "ollama")]
    Ollama {
        /// Server URL, e.g. `http://localhost:11434`.
        base_url: String,
        /// Model name, e.g. `llama3.2`.
        model: String,
    },
}

impl GenProvider {
    /// Select a provider from configuration: OpenAI when an API key is
    /// configured, otherwise Ollama.
    pub fn from_config(llm: &crate::utils::config::LlmConfig) -> Result<Self> {
        #[cfg(feature = "openai")]
        if let Some(api_key) = &llm.openai_api_key {
            return Ok(GenProvider::OpenAi {
                api_key: api_key.clone(),
                api_base: llm.openai_api_base.clone(),
                model: llm.openai_model.clone(),
            });
        }

        #[cfg(feature = "ollama")]
        return Ok(GenProvider::Ollama {
            base_url: llm.ollama_url.clone(),
            model: llm.ollama_model.clone(),
        });

        #[allow(unreachable_code)]
        {
            let _ = llm;
            Err(RagError::Configuration(
                "no generation backend enabled; check feature flags".into(),
            ))
        }
    }

    /// Create a client instance for this provider.
    pub fn create_client(&self) -> Result<std::sync::Arc<dyn GenerationProvider>> {
        match self {
            #[cfg(feature = "openai")]
            GenProvider::OpenAi {
                api_key,
                api_base,
                model,
            } => Ok(std::sync::Arc::new(super::openai::OpenAiClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            GenProvider::Ollama { base_url, model } => Ok(std::sync::Arc::new(
                super::ollama::OllamaClient::new(base_url, model.clone()),
            )),

            #[allow(unreachable_patterns)]
            _ => Err(RagError::Configuration(
                "generation provider not enabled; check feature flags".into(),
            )),
        }
    }

    /// Human-readable provider name.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "openai")]
            GenProvider::OpenAi { .. } => "OpenAI",
            #[cfg(feature = "ollama")]
            GenProvider::Ollama { .. } => "Ollama",
            #[allow(unreachable_patterns)]
            _ => "unknown",
        }
    }
}
