//! Model access for the research engine.
//!
//! Every model call goes through a [`ModelConsultant`]: a stateless
//! request/response service taking a prompt, a cost ceiling, and a tier
//! hint. The role agents build prompts and parse responses on top of it.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//!   ├── DecomposerAgent      (medium tier, query → sub-questions)
//!   ├── ResearchAgent        (local tier, task → findings + sources)
//!   ├── SubSynthesizerAgent  (medium tier, local evidence → sub-answer)
//!   └── MetaSynthesizerAgent (high tier, sub-answers → final answer)
//!           │
//!           ▼
//!   ModelConsultant ── ProviderConsultant ── LlmProvider (OpenAI-compatible)
//! ```

pub mod client;
pub mod config;
pub mod consultant;
pub mod decomposer;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod researcher;
pub mod synthesizer;
pub mod traits;

// Re-export key types
pub use client::{create_consultant, create_provider};
pub use config::{AgentConfig, ModelPricing, TokenLimits};
pub use consultant::{
    ConsultRequest, ConsultationResult, ConsultationTier, ModelConsultant, ProviderConsultant,
};
pub use decomposer::DecomposerAgent;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use researcher::{ConsultantTaskExecutor, ResearchAgent};
pub use synthesizer::{MetaSynthesizerAgent, SubSynthesizerAgent};
pub use traits::Agent;
