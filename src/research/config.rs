//! Research session configuration with builder pattern and environment
//! variable support.
//!
//! Configuration is resolved in order: explicit values → environment
//! variables → defaults. A [`ResearchConfig`] is immutable once a session
//! starts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default lower bound on sub-questions per decomposition.
const DEFAULT_MIN_SUB_QUESTIONS: usize = 2;
/// Default upper bound on sub-questions per decomposition.
const DEFAULT_MAX_SUB_QUESTIONS: usize = 5;
/// Default minimum local iterations per sub-question.
const DEFAULT_SUB_MIN_ITERATIONS: usize = 2;
/// Default maximum local iterations per sub-question.
const DEFAULT_SUB_MAX_ITERATIONS: usize = 6;
/// Default global iteration cap.
const DEFAULT_MAX_ITERATIONS: usize = 20;
/// Default total spend per session.
const DEFAULT_MAX_TOTAL_COST: f64 = 1.0;
/// Remaining budget below which research is forced to finish.
const DEFAULT_BUDGET_FLOOR: f64 = 0.01;
/// Default cap on model and tool calls per session.
const DEFAULT_MAX_EXTERNAL_CALLS: usize = 200;
/// Default per-call timeout in seconds.
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
/// Default ceiling passed to a single consultation.
const DEFAULT_PER_CALL_COST_CEILING: f64 = 0.25;
/// Hard upper bound on tasks per iteration.
pub const MAX_TASKS_PER_ITERATION: usize = 3;

/// Configuration for one research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Decompose the query into sub-questions before researching.
    pub enable_hierarchical: bool,
    /// Fewest sub-questions a decomposition should yield.
    pub min_sub_questions: usize,
    /// Most sub-questions kept from a decomposition.
    pub max_sub_questions: usize,
    /// Lower clamp on a sub-question's iteration budget.
    pub sub_question_min_iterations: usize,
    /// Upper clamp on a sub-question's iteration budget.
    pub sub_question_max_iterations: usize,
    /// Global research iteration cap.
    pub max_iterations: usize,
    /// Total spend allowed for the session.
    pub max_total_cost: f64,
    /// Research stops once the remaining budget drops below this.
    pub budget_floor: f64,
    /// Maximum model and tool calls for the session.
    pub max_external_calls: usize,
    /// Wall-clock limit for the whole session.
    pub deadline: Option<Duration>,
    /// Timeout applied to each external call.
    pub call_timeout: Duration,
    /// Cost ceiling handed to a single consultation.
    pub per_call_cost_ceiling: f64,
    /// Tasks requested from the planner per iteration (1..=3).
    pub max_tasks_per_iteration: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enable_hierarchical: true,
            min_sub_questions: DEFAULT_MIN_SUB_QUESTIONS,
            max_sub_questions: DEFAULT_MAX_SUB_QUESTIONS,
            sub_question_min_iterations: DEFAULT_SUB_MIN_ITERATIONS,
            sub_question_max_iterations: DEFAULT_SUB_MAX_ITERATIONS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_total_cost: DEFAULT_MAX_TOTAL_COST,
            budget_floor: DEFAULT_BUDGET_FLOOR,
            max_external_calls: DEFAULT_MAX_EXTERNAL_CALLS,
            deadline: None,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            per_call_cost_ceiling: DEFAULT_PER_CALL_COST_CEILING,
            max_tasks_per_iteration: MAX_TASKS_PER_ITERATION,
        }
    }
}

impl ResearchConfig {
    /// Creates a new builder for `ResearchConfig`.
    #[must_use]
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the resolved values violate an
    /// invariant.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }

    /// Checks the cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, message: String| {
            Err(ConfigError::Invalid { field, message })
        };

        if self.max_iterations == 0 {
            return invalid("max_iterations", "must be at least 1".to_string());
        }
        if self.min_sub_questions == 0 {
            return invalid("min_sub_questions", "must be at least 1".to_string());
        }
        if self.min_sub_questions > self.max_sub_questions {
            return invalid(
                "min_sub_questions",
                format!(
                    "{} exceeds max_sub_questions {}",
                    self.min_sub_questions, self.max_sub_questions
                ),
            );
        }
        if self.sub_question_min_iterations > self.sub_question_max_iterations {
            return invalid(
                "sub_question_min_iterations",
                format!(
                    "{} exceeds sub_question_max_iterations {}",
                    self.sub_question_min_iterations, self.sub_question_max_iterations
                ),
            );
        }
        if self.sub_question_max_iterations > self.max_iterations {
            return invalid(
                "sub_question_max_iterations",
                format!(
                    "{} exceeds max_iterations {}",
                    self.sub_question_max_iterations, self.max_iterations
                ),
            );
        }
        for (field, value) in [
            ("max_total_cost", self.max_total_cost),
            ("budget_floor", self.budget_floor),
            ("per_call_cost_ceiling", self.per_call_cost_ceiling),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(field, format!("{value} is not a non-negative amount"));
            }
        }
        if !(1..=MAX_TASKS_PER_ITERATION).contains(&self.max_tasks_per_iteration) {
            return invalid(
                "max_tasks_per_iteration",
                format!("must be between 1 and {MAX_TASKS_PER_ITERATION}"),
            );
        }
        if self.call_timeout.is_zero() {
            return invalid("call_timeout", "must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Builder for [`ResearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResearchConfigBuilder {
    enable_hierarchical: Option<bool>,
    min_sub_questions: Option<usize>,
    max_sub_questions: Option<usize>,
    sub_question_min_iterations: Option<usize>,
    sub_question_max_iterations: Option<usize>,
    max_iterations: Option<usize>,
    max_total_cost: Option<f64>,
    budget_floor: Option<f64>,
    max_external_calls: Option<usize>,
    deadline: Option<Duration>,
    call_timeout: Option<Duration>,
    per_call_cost_ceiling: Option<f64>,
    max_tasks_per_iteration: Option<usize>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl ResearchConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.enable_hierarchical.is_none() {
            self.enable_hierarchical = env_parse("HRESEARCH_HIERARCHICAL");
        }
        if self.min_sub_questions.is_none() {
            self.min_sub_questions = env_parse("HRESEARCH_MIN_SUB_QUESTIONS");
        }
        if self.max_sub_questions.is_none() {
            self.max_sub_questions = env_parse("HRESEARCH_MAX_SUB_QUESTIONS");
        }
        if self.sub_question_min_iterations.is_none() {
            self.sub_question_min_iterations = env_parse("HRESEARCH_SUB_MIN_ITERATIONS");
        }
        if self.sub_question_max_iterations.is_none() {
            self.sub_question_max_iterations = env_parse("HRESEARCH_SUB_MAX_ITERATIONS");
        }
        if self.max_iterations.is_none() {
            self.max_iterations = env_parse("HRESEARCH_MAX_ITERATIONS");
        }
        if self.max_total_cost.is_none() {
            self.max_total_cost = env_parse("HRESEARCH_MAX_COST");
        }
        if self.max_external_calls.is_none() {
            self.max_external_calls = env_parse("HRESEARCH_MAX_CALLS");
        }
        if self.deadline.is_none() {
            self.deadline = env_parse::<u64>("HRESEARCH_DEADLINE_SECS").map(Duration::from_secs);
        }
        self
    }

    /// Enables or disables hierarchical decomposition.
    #[must_use]
    pub const fn enable_hierarchical(mut self, enabled: bool) -> Self {
        self.enable_hierarchical = Some(enabled);
        self
    }

    /// Sets the minimum sub-question count.
    #[must_use]
    pub const fn min_sub_questions(mut self, n: usize) -> Self {
        self.min_sub_questions = Some(n);
        self
    }

    /// Sets the maximum sub-question count.
    #[must_use]
    pub const fn max_sub_questions(mut self, n: usize) -> Self {
        self.max_sub_questions = Some(n);
        self
    }

    /// Sets the minimum local iterations per sub-question.
    #[must_use]
    pub const fn sub_question_min_iterations(mut self, n: usize) -> Self {
        self.sub_question_min_iterations = Some(n);
        self
    }

    /// Sets the maximum local iterations per sub-question.
    #[must_use]
    pub const fn sub_question_max_iterations(mut self, n: usize) -> Self {
        self.sub_question_max_iterations = Some(n);
        self
    }

    /// Sets the global iteration cap.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the total spend allowed for the session.
    #[must_use]
    pub const fn max_total_cost(mut self, cost: f64) -> Self {
        self.max_total_cost = Some(cost);
        self
    }

    /// Sets the remaining-budget floor that forces completion.
    #[must_use]
    pub const fn budget_floor(mut self, floor: f64) -> Self {
        self.budget_floor = Some(floor);
        self
    }

    /// Sets the maximum number of external calls.
    #[must_use]
    pub const fn max_external_calls(mut self, n: usize) -> Self {
        self.max_external_calls = Some(n);
        self
    }

    /// Sets the session deadline.
    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Sets the cost ceiling for a single consultation.
    #[must_use]
    pub const fn per_call_cost_ceiling(mut self, ceiling: f64) -> Self {
        self.per_call_cost_ceiling = Some(ceiling);
        self
    }

    /// Sets the number of tasks requested per iteration.
    #[must_use]
    pub const fn max_tasks_per_iteration(mut self, n: usize) -> Self {
        self.max_tasks_per_iteration = Some(n);
        self
    }

    /// Builds and validates the [`ResearchConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an invariant is violated.
    pub fn build(self) -> Result<ResearchConfig, ConfigError> {
        let defaults = ResearchConfig::default();
        let config = ResearchConfig {
            enable_hierarchical: self
                .enable_hierarchical
                .unwrap_or(defaults.enable_hierarchical),
            min_sub_questions: self.min_sub_questions.unwrap_or(defaults.min_sub_questions),
            max_sub_questions: self.max_sub_questions.unwrap_or(defaults.max_sub_questions),
            sub_question_min_iterations: self
                .sub_question_min_iterations
                .unwrap_or(defaults.sub_question_min_iterations),
            sub_question_max_iterations: self
                .sub_question_max_iterations
                .unwrap_or(defaults.sub_question_max_iterations),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            max_total_cost: self.max_total_cost.unwrap_or(defaults.max_total_cost),
            budget_floor: self.budget_floor.unwrap_or(defaults.budget_floor),
            max_external_calls: self
                .max_external_calls
                .unwrap_or(defaults.max_external_calls),
            deadline: self.deadline.or(defaults.deadline),
            call_timeout: self.call_timeout.unwrap_or(defaults.call_timeout),
            per_call_cost_ceiling: self
                .per_call_cost_ceiling
                .unwrap_or(defaults.per_call_cost_ceiling),
            max_tasks_per_iteration: self
                .max_tasks_per_iteration
                .unwrap_or(defaults.max_tasks_per_iteration),
        };
        config.validate()?;
        Ok(config)
    }
}
