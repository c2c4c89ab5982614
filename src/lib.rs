//! # hresearch
//!
//! Hierarchical research orchestration over language models.
//!
//! A query is decomposed into prioritized sub-questions. Each one gets an
//! iteration budget from a shared pool, is researched in its own
//! plan/execute/validate loop, and is synthesized into a sub-answer. A
//! meta-synthesis step integrates the sub-answers into the final answer.
//! Global caps on iterations, spend, external calls, and wall-clock time
//! bound the whole session, and every failure degrades to a partial answer
//! rather than an error.
//!
//! ## Example
//!
//! ```no_run
//! use hresearch::{AgentConfig, Orchestrator, ResearchConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let agent_config = AgentConfig::from_env()?;
//! let orchestrator = Orchestrator::from_agent_config(&agent_config)?;
//! let session = orchestrator
//!     .run("How do CRDTs resolve concurrent edits?", ResearchConfig::from_env()?)
//!     .await?;
//! println!("{}", session.final_answer().unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`research`]: session model, budget allocation, stopping rules, and
//!   the orchestrator state machine
//! - [`agent`]: model consultant, role agents, and prompts
//! - [`store`]: `SQLite` history of finished sessions
//! - [`cli`]: the `hresearch` command line
//! - [`core`]: shared value types
//! - [`error`]: error types

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod research;
pub mod store;

// Re-exports for convenience
pub use agent::{AgentConfig, ConsultRequest, ConsultationResult, ConsultationTier, ModelConsultant};
pub use error::{Error, Result};
pub use research::{
    Orchestrator, ResearchConfig, ResearchSession, SessionStatus, StrategyPlanner, SubQuestion,
    TaskExecutor,
};
pub use store::SqliteSessionStore;
