//! Agent trait definition.
//!
//! All agents (decomposer, researcher, sub- and meta-synthesizer) implement
//! this trait, which provides a uniform way to turn a user message into a
//! [`ConsultRequest`].

use async_trait::async_trait;

use super::consultant::{ConsultRequest, ConsultationResult, ConsultationTier, ModelConsultant};

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role with a fixed system prompt and a
/// consultation tier. They never call a model directly: every call goes
/// through a [`ModelConsultant`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Consultation tier this agent asks for.
    fn tier(&self) -> ConsultationTier;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Builds the consultation for `user_msg`.
    fn request(&self, user_msg: String, cost_ceiling: f64) -> ConsultRequest {
        ConsultRequest {
            label: self.name(),
            system: self.system_prompt().to_string(),
            prompt: user_msg,
            cost_ceiling,
            tier: self.tier(),
            json_mode: self.json_mode(),
            temperature: self.temperature(),
            max_tokens: self.max_tokens(),
        }
    }

    /// Consults the model with the given user message.
    async fn consult(
        &self,
        consultant: &dyn ModelConsultant,
        user_msg: String,
        cost_ceiling: f64,
    ) -> ConsultationResult {
        consultant
            .consult(&self.request(user_msg, cost_ceiling))
            .await
    }
}
