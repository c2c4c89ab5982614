//! The hierarchical research engine.
//!
//! A query is decomposed into prioritized sub-questions, each researched
//! in its own budgeted loop and synthesized, and the sub-answers are then
//! integrated into one final answer. When decomposition is disabled or
//! fails, the same loop runs once over the whole query.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::run(query, config)
//!   ├── DecomposerAgent        → Vec<SubQuestion>
//!   ├── budget::allocate       → next sub-question + iteration budget
//!   ├── research loop (per sub-question, or once in flat mode)
//!   │   ├── StrategyPlanner    → 1..=3 tasks
//!   │   ├── TaskExecutor       → raw findings + sources
//!   │   ├── quality::validate  → evidence logs
//!   │   ├── quality::score_quality
//!   │   └── stopping::check_stopping
//!   ├── SubSynthesizerAgent    → sub-answer per completed sub-question
//!   └── MetaSynthesizerAgent   → final answer (concatenation fallback)
//! ```

pub mod budget;
pub mod config;
pub mod evidence;
pub mod executor;
pub mod orchestrator;
pub mod quality;
pub mod session;
pub mod stopping;
pub mod strategy;
pub mod sub_question;

pub use budget::{Allocation, allocate};
pub use config::ResearchConfig;
pub use evidence::{EvidenceLog, Finding, Source};
pub use executor::{TaskExecutor, TaskOutcome};
pub use orchestrator::Orchestrator;
pub use quality::{QualitySignals, Validation};
pub use session::{ResearchSession, SessionMetadata, SessionStatus};
pub use stopping::{StopAction, StopReason, StoppingDecision, StoppingInput, check_stopping};
pub use strategy::{HeuristicPlanner, PlanningContext, StrategyKind, StrategyPlanner, Task};
pub use sub_question::{SubQuestion, SubQuestionId, SubQuestionStatus};
