//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::consultant::ConsultationTier;
use crate::error::AgentError;

/// Default model for local-tier consultations.
const DEFAULT_LOCAL_MODEL: &str = "gpt-4o-mini";
/// Default model for medium-tier consultations.
const DEFAULT_MEDIUM_MODEL: &str = "gpt-4.1-mini";
/// Default model for high-tier consultations.
const DEFAULT_HIGH_MODEL: &str = "gpt-4o";
/// Default decomposer max tokens.
const DEFAULT_DECOMPOSER_MAX_TOKENS: u32 = 1024;
/// Default researcher max tokens.
const DEFAULT_RESEARCHER_MAX_TOKENS: u32 = 2048;
/// Default sub- and meta-synthesizer max tokens.
const DEFAULT_SYNTHESIZER_MAX_TOKENS: u32 = 4096;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Per-million-token pricing for a model, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens.
    pub input_per_m: f64,
    /// Price per 1M output tokens.
    pub output_per_m: f64,
}

impl ModelPricing {
    /// Creates a pricing entry.
    #[must_use]
    pub const fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Cost of a call with the given token counts.
    #[must_use]
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        f64::from(input_tokens).mul_add(
            self.input_per_m,
            f64::from(output_tokens) * self.output_per_m,
        ) / 1_000_000.0
    }
}

/// Response-length limits for each agent role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    /// Maximum tokens for decomposer responses.
    pub decomposer: u32,
    /// Maximum tokens for researcher responses.
    pub researcher: u32,
    /// Maximum tokens for sub- and meta-synthesizer responses.
    pub synthesizer: u32,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            decomposer: DEFAULT_DECOMPOSER_MAX_TOKENS,
            researcher: DEFAULT_RESEARCHER_MAX_TOKENS,
            synthesizer: DEFAULT_SYNTHESIZER_MAX_TOKENS,
        }
    }
}

/// Configuration for model access.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for local-tier consultations (research tasks).
    pub local_model: String,
    /// Model for medium-tier consultations (decomposition, sub-synthesis).
    pub medium_model: String,
    /// Model for high-tier consultations (meta-synthesis).
    pub high_model: String,
    /// Pricing of the local-tier model.
    pub local_pricing: ModelPricing,
    /// Pricing of the medium-tier model.
    pub medium_pricing: ModelPricing,
    /// Pricing of the high-tier model.
    pub high_pricing: ModelPricing,
    /// Maximum tokens for decomposer responses.
    pub decomposer_max_tokens: u32,
    /// Maximum tokens for researcher responses.
    pub researcher_max_tokens: u32,
    /// Maximum tokens for sub- and meta-synthesizer responses.
    pub synthesizer_max_tokens: u32,
    /// Request timeout.
    pub timeout: Duration,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for any missing
    /// files.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Response-length limits per agent role.
    #[must_use]
    pub const fn token_limits(&self) -> TokenLimits {
        TokenLimits {
            decomposer: self.decomposer_max_tokens,
            researcher: self.researcher_max_tokens,
            synthesizer: self.synthesizer_max_tokens,
        }
    }

    /// Model used for `tier`.
    #[must_use]
    pub fn model_for(&self, tier: ConsultationTier) -> &str {
        match tier {
            ConsultationTier::Local => &self.local_model,
            ConsultationTier::Medium => &self.medium_model,
            ConsultationTier::High => &self.high_model,
        }
    }

    /// Pricing used for `tier`.
    #[must_use]
    pub const fn pricing_for(&self, tier: ConsultationTier) -> ModelPricing {
        match tier {
            ConsultationTier::Local => self.local_pricing,
            ConsultationTier::Medium => self.medium_pricing,
            ConsultationTier::High => self.high_pricing,
        }
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    local_model: Option<String>,
    medium_model: Option<String>,
    high_model: Option<String>,
    local_pricing: Option<ModelPricing>,
    medium_pricing: Option<ModelPricing>,
    high_pricing: Option<ModelPricing>,
    decomposer_max_tokens: Option<u32>,
    researcher_max_tokens: Option<u32>,
    synthesizer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("HRESEARCH_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("HRESEARCH_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("HRESEARCH_BASE_URL"))
                .ok();
        }
        if self.local_model.is_none() {
            self.local_model = std::env::var("HRESEARCH_LOCAL_MODEL").ok();
        }
        if self.medium_model.is_none() {
            self.medium_model = std::env::var("HRESEARCH_MEDIUM_MODEL").ok();
        }
        if self.high_model.is_none() {
            self.high_model = std::env::var("HRESEARCH_HIGH_MODEL").ok();
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("HRESEARCH_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the local-tier model.
    #[must_use]
    pub fn local_model(mut self, model: impl Into<String>) -> Self {
        self.local_model = Some(model.into());
        self
    }

    /// Sets the medium-tier model.
    #[must_use]
    pub fn medium_model(mut self, model: impl Into<String>) -> Self {
        self.medium_model = Some(model.into());
        self
    }

    /// Sets the high-tier model.
    #[must_use]
    pub fn high_model(mut self, model: impl Into<String>) -> Self {
        self.high_model = Some(model.into());
        self
    }

    /// Sets pricing for one tier.
    #[must_use]
    pub const fn pricing(mut self, tier: ConsultationTier, pricing: ModelPricing) -> Self {
        match tier {
            ConsultationTier::Local => self.local_pricing = Some(pricing),
            ConsultationTier::Medium => self.medium_pricing = Some(pricing),
            ConsultationTier::High => self.high_pricing = Some(pricing),
        }
        self
    }

    /// Sets the decomposer max tokens.
    #[must_use]
    pub const fn decomposer_max_tokens(mut self, n: u32) -> Self {
        self.decomposer_max_tokens = Some(n);
        self
    }

    /// Sets the researcher max tokens.
    #[must_use]
    pub const fn researcher_max_tokens(mut self, n: u32) -> Self {
        self.researcher_max_tokens = Some(n);
        self
    }

    /// Sets the synthesizer max tokens.
    #[must_use]
    pub const fn synthesizer_max_tokens(mut self, n: u32) -> Self {
        self.synthesizer_max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::ApiKeyMissing)?;

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            local_model: self
                .local_model
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            medium_model: self
                .medium_model
                .unwrap_or_else(|| DEFAULT_MEDIUM_MODEL.to_string()),
            high_model: self
                .high_model
                .unwrap_or_else(|| DEFAULT_HIGH_MODEL.to_string()),
            local_pricing: self
                .local_pricing
                .unwrap_or(ModelPricing::new(0.15, 0.6)),
            medium_pricing: self
                .medium_pricing
                .unwrap_or(ModelPricing::new(0.4, 1.6)),
            high_pricing: self
                .high_pricing
                .unwrap_or(ModelPricing::new(2.5, 10.0)),
            decomposer_max_tokens: self
                .decomposer_max_tokens
                .unwrap_or(DEFAULT_DECOMPOSER_MAX_TOKENS),
            researcher_max_tokens: self
                .researcher_max_tokens
                .unwrap_or(DEFAULT_RESEARCHER_MAX_TOKENS),
            synthesizer_max_tokens: self
                .synthesizer_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIZER_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            prompt_dir: self.prompt_dir,
        })
    }
}
