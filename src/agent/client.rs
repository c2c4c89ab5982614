//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations and
//! wraps them in a [`ModelConsultant`].

use std::sync::Arc;

use crate::agent::config::AgentConfig;
use crate::agent::consultant::{ModelConsultant, ProviderConsultant};
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default): OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &AgentConfig) -> Result<Arc<dyn LlmProvider>, AgentError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config))),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Creates the model consultant for `config`.
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_consultant(config: &AgentConfig) -> Result<Arc<dyn ModelConsultant>, AgentError> {
    let provider = create_provider(config)?;
    Ok(Arc::new(ProviderConsultant::new(provider, config.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .provider(provider)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_create_openai_provider() {
        let provider = create_provider(&config("openai"));
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap_or_else(|_| unreachable!()).name(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = create_provider(&config("unknown"));
        assert!(matches!(result, Err(AgentError::UnsupportedProvider { .. })));
        assert!(create_consultant(&config("unknown")).is_err());
    }

    #[test]
    fn test_create_consultant() {
        assert!(create_consultant(&config("openai")).is_ok());
    }
}
