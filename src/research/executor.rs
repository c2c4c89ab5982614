//! Task execution seam.
//!
//! The orchestrator hands each planned [`Task`] to a [`TaskExecutor`] and
//! gets back raw findings and sources. Validation happens afterwards, in
//! the orchestrator, so executors need not be trusted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::evidence::{Finding, Source};
use super::strategy::Task;
use crate::error::ResearchError;

/// Result of running one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Raw findings. Tags are applied by the orchestrator.
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// Raw sources. Tags are applied by the orchestrator.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Spend incurred.
    #[serde(default)]
    pub cost: f64,
    /// Whether the task completed.
    pub success: bool,
}

impl TaskOutcome {
    /// A successful outcome.
    #[must_use]
    pub const fn succeeded(findings: Vec<Finding>, sources: Vec<Source>, cost: f64) -> Self {
        Self {
            findings,
            sources,
            cost,
            success: true,
        }
    }

    /// A failed outcome that still incurred `cost`.
    #[must_use]
    pub const fn failed(cost: f64) -> Self {
        Self {
            findings: Vec::new(),
            sources: Vec::new(),
            cost,
            success: false,
        }
    }
}

/// Runs research tasks against some tool or search backend.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Executes `task` within `cost_ceiling`.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ToolExecution`] when the backend fails. The
    /// orchestrator logs the error and the task contributes no findings.
    async fn execute(&self, task: &Task, cost_ceiling: f64) -> Result<TaskOutcome, ResearchError>;
}
