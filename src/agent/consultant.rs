//! The model consultant: the single gateway every model call goes through.
//!
//! A consultation takes a prompt, a cost ceiling, and a tier hint, and
//! always yields a [`ConsultationResult`]. Failures are reported in the
//! result (`success = false`, `error = Some(..)`) rather than as `Err`, so
//! callers decide how to degrade.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::message::{ChatRequest, system_message, user_message};
use super::provider::LlmProvider;

/// Rough characters-per-token ratio used to estimate prompt size.
const CHARS_PER_TOKEN: usize = 4;

/// Model capability tier requested for a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationTier {
    /// Cheapest model, for high-volume research tasks.
    Local,
    /// Mid-range model, for decomposition and sub-synthesis.
    Medium,
    /// Strongest model, for the final integration.
    High,
}

impl ConsultationTier {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for ConsultationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One consultation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsultRequest {
    /// Name of the calling role, for logs and routing.
    pub label: &'static str,
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Most this call may spend.
    pub cost_ceiling: f64,
    /// Capability tier.
    pub tier: ConsultationTier,
    /// Request JSON output.
    pub json_mode: bool,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum response tokens.
    pub max_tokens: u32,
}

/// Outcome of a consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationResult {
    /// Whether the call produced a usable result.
    pub success: bool,
    /// Response text. Empty on failure.
    pub result: String,
    /// Spend incurred, even on failure.
    pub cost: f64,
    /// Wall-clock latency.
    pub latency_ms: u64,
    /// Model that served the call.
    pub model_used: String,
    /// Failure description.
    pub error: Option<String>,
}

impl ConsultationResult {
    /// A successful result.
    #[must_use]
    pub fn ok(result: impl Into<String>, cost: f64, latency_ms: u64, model_used: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
            cost,
            latency_ms,
            model_used: model_used.into(),
            error: None,
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failed(error: impl Into<String>, cost: f64, latency_ms: u64, model_used: impl Into<String>) -> Self {
        Self {
            success: false,
            result: String::new(),
            cost,
            latency_ms,
            model_used: model_used.into(),
            error: Some(error.into()),
        }
    }

    /// The failure message, or a generic one.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "consultation failed".to_string())
    }
}

/// Stateless request/response model service.
#[async_trait]
pub trait ModelConsultant: Send + Sync {
    /// Runs one consultation. Never fails: errors are folded into the
    /// result.
    async fn consult(&self, request: &ConsultRequest) -> ConsultationResult;
}

/// [`ModelConsultant`] backed by an [`LlmProvider`].
///
/// Maps tiers to models and pricing from [`AgentConfig`], caps response
/// length so the worst case stays within the ceiling, and bounds each call
/// by the configured timeout.
pub struct ProviderConsultant {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl ProviderConsultant {
    /// Creates a consultant over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self { provider, config }
    }

    /// Estimates prompt tokens from text length.
    fn estimate_tokens(request: &ConsultRequest) -> u32 {
        let chars = request.system.len() + request.prompt.len();
        u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
    }

    /// Largest response length that keeps the worst case within `ceiling`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn affordable_tokens(&self, request: &ConsultRequest, prompt_tokens: u32) -> u32 {
        let pricing = self.config.pricing_for(request.tier);
        let prompt_cost = pricing.cost(prompt_tokens, 0);
        let left = request.cost_ceiling - prompt_cost;
        if left <= 0.0 {
            return 0;
        }
        if pricing.output_per_m <= 0.0 {
            return request.max_tokens;
        }
        let affordable = (left * 1_000_000.0 / pricing.output_per_m).floor();
        if affordable >= f64::from(request.max_tokens) {
            request.max_tokens
        } else {
            affordable as u32
        }
    }
}

impl std::fmt::Debug for ProviderConsultant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConsultant")
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelConsultant for ProviderConsultant {
    async fn consult(&self, request: &ConsultRequest) -> ConsultationResult {
        let model = self.config.model_for(request.tier).to_string();
        if !request.cost_ceiling.is_finite() || request.cost_ceiling <= 0.0 {
            return ConsultationResult::failed("cost ceiling exhausted", 0.0, 0, model);
        }

        let prompt_tokens = Self::estimate_tokens(request);
        let max_tokens = self.affordable_tokens(request, prompt_tokens);
        if max_tokens == 0 {
            return ConsultationResult::failed(
                format!(
                    "prompt of ~{prompt_tokens} tokens exceeds cost ceiling {:.4}",
                    request.cost_ceiling
                ),
                0.0,
                0,
                model,
            );
        }

        let chat = ChatRequest {
            model: model.clone(),
            messages: vec![system_message(&request.system), user_message(&request.prompt)],
            temperature: Some(request.temperature),
            max_tokens: Some(max_tokens),
            json_mode: request.json_mode,
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.config.timeout, self.provider.chat(&chat)).await;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok(response)) => {
                let pricing = self.config.pricing_for(request.tier);
                let cost = if response.usage.total_tokens == 0 {
                    pricing.cost(prompt_tokens, 0)
                } else {
                    pricing.cost(response.usage.prompt_tokens, response.usage.completion_tokens)
                };
                debug!(
                    label = request.label,
                    tier = %request.tier,
                    model = %response.model,
                    latency_ms,
                    cost,
                    tokens = response.usage.total_tokens,
                    "consultation complete"
                );
                if response.content.trim().is_empty() {
                    return ConsultationResult::failed("empty response", cost, latency_ms, response.model);
                }
                ConsultationResult::ok(response.content, cost, latency_ms, response.model)
            }
            Ok(Err(e)) => {
                warn!(label = request.label, error = %e, "consultation failed");
                ConsultationResult::failed(e.to_string(), 0.0, latency_ms, model)
            }
            Err(_) => {
                let secs = self.config.timeout.as_secs();
                warn!(label = request.label, secs, "consultation timed out");
                ConsultationResult::failed(format!("timed out after {secs}s"), 0.0, latency_ms, model)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::agent::config::ModelPricing;
    use crate::agent::message::{ChatResponse, TokenUsage};
    use crate::error::AgentError;

    struct MockProvider {
        calls: AtomicUsize,
        reply: Result<String, String>,
        delay: Duration,
    }

    impl MockProvider {
        fn replying(text: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    content: text.clone(),
                    usage: TokenUsage {
                        prompt_tokens: 1_000,
                        completion_tokens: 500,
                        total_tokens: 1_500,
                    },
                    model: request.model.clone(),
                    finish_reason: Some("stop".to_string()),
                }),
                Err(message) => Err(AgentError::ApiRequest {
                    message: message.clone(),
                    status: Some(500),
                }),
            }
        }
    }

    fn config() -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .pricing(ConsultationTier::Medium, ModelPricing::new(2.5, 10.0))
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn request(ceiling: f64) -> ConsultRequest {
        ConsultRequest {
            label: "test",
            system: "You are terse.".to_string(),
            prompt: "Say hi.".to_string(),
            cost_ceiling: ceiling,
            tier: ConsultationTier::Medium,
            json_mode: false,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }

    #[tokio::test]
    async fn test_successful_consultation_reports_cost() {
        let provider = Arc::new(MockProvider::replying("hi"));
        let consultant = ProviderConsultant::new(provider.clone(), config());
        let result = consultant.consult(&request(1.0)).await;
        assert!(result.success);
        assert_eq!(result.result, "hi");
        assert!((result.cost - 0.0075).abs() < 1e-12);
        assert_eq!(result.model_used, "gpt-4.1-mini");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ceiling_refused_without_calling() {
        let provider = Arc::new(MockProvider::replying("hi"));
        let consultant = ProviderConsultant::new(provider.clone(), config());
        let result = consultant.consult(&request(0.0)).await;
        assert!(!result.success);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_error_folded_into_result() {
        let provider = Arc::new(MockProvider {
            reply: Err("boom".to_string()),
            ..MockProvider::replying("")
        });
        let consultant = ProviderConsultant::new(provider, config());
        let result = consultant.consult(&request(1.0)).await;
        assert!(!result.success);
        assert!(result.error_message().contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_folded_into_result() {
        let provider = Arc::new(MockProvider {
            delay: Duration::from_secs(5),
            ..MockProvider::replying("late")
        });
        let consultant = ProviderConsultant::new(provider, config());
        let result = consultant.consult(&request(1.0)).await;
        assert!(!result.success);
        assert!(result.error_message().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_response_is_failure() {
        let provider = Arc::new(MockProvider::replying("   "));
        let consultant = ProviderConsultant::new(provider, config());
        let result = consultant.consult(&request(1.0)).await;
        assert!(!result.success);
        assert!(result.cost > 0.0);
    }

    #[test]
    fn test_affordable_tokens_caps_response() {
        let consultant = ProviderConsultant::new(Arc::new(MockProvider::replying("")), config());
        let req = request(0.001);
        let tokens = consultant.affordable_tokens(&req, 0);
        // 0.001 USD at 10 USD per 1M output tokens
        assert_eq!(tokens, 100);
        assert_eq!(consultant.affordable_tokens(&request(5.0), 0), 1024);
    }
}
