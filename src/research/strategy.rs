//! Strategy selection and task planning.
//!
//! The research loop asks a [`StrategyPlanner`] for a small batch of tasks
//! each iteration. The strategy itself is a closed set of variants chosen
//! by [`select_strategy_kind`] from the remaining local budget and the
//! evidence gathered so far.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::evidence::Finding;
use super::sub_question::SubQuestionId;
use crate::core::text::preview;
use crate::error::ResearchError;

/// Research angles used for breadth-first exploration.
const ANGLES: &[&str] = &[
    "background and key definitions",
    "primary evidence and data",
    "competing views and limitations",
    "recent developments",
    "practical implications",
];

/// Preview length of a finding quoted in a verification task.
const VERIFY_PREVIEW_CHARS: usize = 160;

/// Task-planning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Explore several angles at once.
    BreadthFirst,
    /// Drill into the weakest existing evidence.
    DepthFirst,
    /// One new angle plus one verification.
    Hybrid,
}

impl StrategyKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BreadthFirst => "breadth_first",
            Self::DepthFirst => "depth_first",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete unit of research work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier, unique within the session.
    pub id: String,
    /// What to look into.
    pub description: String,
    /// Strategy that produced the task.
    pub strategy: StrategyKind,
    /// Sub-question the task serves. Absent in flat mode.
    pub sub_question_id: Option<SubQuestionId>,
    /// Original session query, for context.
    pub query: String,
    /// Text of the sub-question the task serves. Absent in flat mode.
    pub scope: Option<String>,
}

/// What a planner knows about the current scope.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningContext {
    /// Original session query.
    pub query: String,
    /// Sub-question being researched, if any.
    pub sub_question_id: Option<SubQuestionId>,
    /// Session-wide iteration number the tasks will run in.
    pub global_iteration: usize,
    /// Iterations already run in this scope.
    pub local_iteration: usize,
    /// Iterations left in this scope, including the upcoming one.
    pub remaining_iterations: usize,
    /// Validated findings gathered in this scope.
    pub findings: Vec<Finding>,
    /// Most tasks the orchestrator will run.
    pub max_tasks: usize,
}

impl PlanningContext {
    /// Strategy for this context.
    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        select_strategy_kind(self.remaining_iterations, self.local_iteration, self.findings.len())
    }
}

/// Chooses the strategy for the next iteration.
///
/// Breadth-first opens a scope or recovers one that has no findings;
/// depth-first spends a final iteration verifying; hybrid covers the rest.
#[must_use]
pub const fn select_strategy_kind(
    remaining_iterations: usize,
    local_iteration: usize,
    finding_count: usize,
) -> StrategyKind {
    if local_iteration == 0 || finding_count == 0 {
        StrategyKind::BreadthFirst
    } else if remaining_iterations <= 1 {
        StrategyKind::DepthFirst
    } else {
        StrategyKind::Hybrid
    }
}

/// Supplies the task batch for each research iteration.
#[async_trait]
pub trait StrategyPlanner: Send + Sync {
    /// Plans tasks for `scope_text`.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Planning`] when no plan can be produced.
    /// The orchestrator treats this as unrecoverable for the session.
    async fn plan(
        &self,
        scope_text: &str,
        context: &PlanningContext,
    ) -> Result<Vec<Task>, ResearchError>;
}

/// Rule-based planner with no external calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPlanner;

impl HeuristicPlanner {
    /// Creates the planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn angle_tasks(scope_text: &str, context: &PlanningContext, count: usize) -> Vec<String> {
        let offset = context.local_iteration * count;
        (0..count)
            .map(|i| {
                let angle = ANGLES[(offset + i) % ANGLES.len()];
                format!("Research the {angle} for: {scope_text}")
            })
            .collect()
    }

    fn verification_task(scope_text: &str, context: &PlanningContext) -> Option<String> {
        let weakest = context
            .findings
            .iter()
            .min_by(|a, b| a.confidence.total_cmp(&b.confidence))?;
        Some(format!(
            "Verify and find corroborating sources for \"{}\" in the context of: {scope_text}",
            preview(&weakest.content, VERIFY_PREVIEW_CHARS)
        ))
    }
}

#[async_trait]
impl StrategyPlanner for HeuristicPlanner {
    async fn plan(
        &self,
        scope_text: &str,
        context: &PlanningContext,
    ) -> Result<Vec<Task>, ResearchError> {
        let strategy = context.strategy();
        let max_tasks = context.max_tasks.max(1);

        let descriptions = match strategy {
            StrategyKind::BreadthFirst => Self::angle_tasks(scope_text, context, max_tasks),
            StrategyKind::DepthFirst => Self::verification_task(scope_text, context)
                .into_iter()
                .collect(),
            StrategyKind::Hybrid => {
                let mut tasks = Self::angle_tasks(scope_text, context, 1);
                tasks.extend(Self::verification_task(scope_text, context));
                tasks
            }
        };
        if descriptions.is_empty() {
            return Err(ResearchError::Planning {
                message: format!("{strategy} produced no tasks"),
            });
        }

        let scope = context.sub_question_id.map(|_| scope_text.to_string());
        let scope_tag = context
            .sub_question_id
            .map_or_else(|| "flat".to_string(), |id| id.to_string());
        Ok(descriptions
            .into_iter()
            .take(max_tasks)
            .enumerate()
            .map(|(n, description)| Task {
                id: format!("{scope_tag}-i{}-t{}", context.global_iteration, n + 1),
                description,
                strategy,
                sub_question_id: context.sub_question_id,
                query: context.query.clone(),
                scope: scope.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn context(local_iteration: usize, remaining: usize, findings: Vec<Finding>) -> PlanningContext {
        PlanningContext {
            query: "q".to_string(),
            sub_question_id: Some(SubQuestionId(2)),
            global_iteration: 7,
            local_iteration,
            remaining_iterations: remaining,
            findings,
            max_tasks: 3,
        }
    }

    #[test_case(5, 0, 0, StrategyKind::BreadthFirst ; "first iteration")]
    #[test_case(5, 2, 0, StrategyKind::BreadthFirst ; "no findings yet")]
    #[test_case(1, 2, 4, StrategyKind::DepthFirst ; "last iteration")]
    #[test_case(3, 2, 4, StrategyKind::Hybrid ; "middle")]
    fn test_select_strategy_kind(remaining: usize, local: usize, found: usize, expected: StrategyKind) {
        assert_eq!(select_strategy_kind(remaining, local, found), expected);
    }

    #[tokio::test]
    async fn test_breadth_first_plans_three_angles() {
        let tasks = HeuristicPlanner::new()
            .plan("scope", &context(0, 4, Vec::new()))
            .await
            .unwrap_or_default();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.strategy == StrategyKind::BreadthFirst));
        assert_eq!(tasks[0].id, "sq-2-i7-t1");
        assert_eq!(tasks[0].sub_question_id, Some(SubQuestionId(2)));
        assert_eq!(tasks[0].scope.as_deref(), Some("scope"));
        assert_eq!(tasks[0].query, "q");
    }

    #[tokio::test]
    async fn test_depth_first_targets_weakest_finding() {
        let findings = vec![Finding::new("solid", 0.9), Finding::new("shaky claim", 0.2)];
        let tasks = HeuristicPlanner::new()
            .plan("scope", &context(2, 1, findings))
            .await
            .unwrap_or_default();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].description.contains("shaky claim"));
    }

    #[tokio::test]
    async fn test_hybrid_mixes_angle_and_verification() {
        let findings = vec![Finding::new("claim", 0.5)];
        let tasks = HeuristicPlanner::new()
            .plan("scope", &context(1, 3, findings))
            .await
            .unwrap_or_default();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[1].description.starts_with("Verify"));
    }

    #[tokio::test]
    async fn test_respects_max_tasks() {
        let mut ctx = context(0, 4, Vec::new());
        ctx.max_tasks = 1;
        ctx.sub_question_id = None;
        let tasks = HeuristicPlanner::new().plan("scope", &ctx).await.unwrap_or_default();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].id.starts_with("flat-"));
        assert!(tasks[0].scope.is_none());
    }
}
