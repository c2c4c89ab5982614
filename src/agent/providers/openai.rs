//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`AgentConfig`].

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, ResponseFormat,
};
use async_trait::async_trait;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::error::AgentError;

/// `OpenAI`-compatible LLM provider.
///
/// Wraps the `async-openai` client for chat completions. Compatible
/// with any API that follows the `OpenAI` chat completion spec.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a new provider from agent configuration.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let response_format = if request.json_mode {
            Some(ResponseFormat::JsonObject)
        } else {
            None
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature.filter(|&t| t != 0.0),
            max_completion_tokens: request.max_tokens,
            response_format,
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
                status: None,
            })?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            model: response.model,
            finish_reason,
        })
    }
}
