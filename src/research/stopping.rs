//! Stopping criteria for the research loop.
//!
//! [`check_stopping`] is a pure function over a [`StoppingInput`] snapshot:
//! evaluating it twice on the same state yields the same decision. Rules
//! apply in a fixed precedence:
//!
//! 1. Global safety caps (iterations, budget floor, call limit, deadline)
//!    force final synthesis.
//! 2. Local completion ends the current scope.
//! 3. Below the local iteration minimum, research continues.
//! 4. Otherwise research continues.

use serde::{Deserialize, Serialize};

use super::evidence::average_confidence;
use super::session::ResearchSession;

/// Local finding count that completes a scope on its own.
pub const FINDING_TARGET: usize = 3;
/// Average confidence that completes a scope once the minimum is met.
pub const CONFIDENCE_TARGET: f64 = 0.7;
/// Findings needed before the confidence rule applies.
pub const CONFIDENT_FINDING_MIN: usize = 2;

/// What the orchestrator should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopAction {
    /// Run another iteration in the current scope.
    Continue,
    /// Synthesize the current sub-question and move on.
    SynthesizeSubQuestion,
    /// Stop researching and produce the final answer.
    SynthesizeFinal,
}

impl StopAction {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::SynthesizeSubQuestion => "synthesize_sub_question",
            Self::SynthesizeFinal => "synthesize_final",
        }
    }
}

impl std::fmt::Display for StopAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a [`StoppingDecision`] was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Global iteration cap reached.
    MaxIterations,
    /// Remaining budget fell below the floor.
    BudgetFloor,
    /// No external calls left.
    CallLimit,
    /// Session deadline passed.
    Deadline,
    /// Enough local findings gathered.
    FindingCount,
    /// Local iteration budget used up.
    LocalIterationCap,
    /// Local findings are confident enough.
    ConfidenceReached,
    /// Local minimum iterations not yet reached.
    MinimumNotMet,
    /// Evidence is still insufficient.
    InsufficientEvidence,
    /// Every sub-question has been synthesized.
    AllSubQuestionsComplete,
    /// An unrecoverable error ended research early.
    Error,
}

impl StopReason {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MaxIterations => "max_iterations",
            Self::BudgetFloor => "budget_floor",
            Self::CallLimit => "call_limit",
            Self::Deadline => "deadline",
            Self::FindingCount => "finding_count",
            Self::LocalIterationCap => "local_iteration_cap",
            Self::ConfidenceReached => "confidence_reached",
            Self::MinimumNotMet => "minimum_not_met",
            Self::InsufficientEvidence => "insufficient_evidence",
            Self::AllSubQuestionsComplete => "all_sub_questions_complete",
            Self::Error => "error",
        }
    }

    /// Returns `true` for the global safety caps.
    #[must_use]
    pub const fn is_global_cap(self) -> bool {
        matches!(
            self,
            Self::MaxIterations | Self::BudgetFloor | Self::CallLimit | Self::Deadline
        )
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged outcome of [`check_stopping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppingDecision {
    /// Next step.
    pub action: StopAction,
    /// The rule that fired.
    pub reason: StopReason,
}

impl StoppingDecision {
    const fn new(action: StopAction, reason: StopReason) -> Self {
        Self { action, reason }
    }
}

/// Snapshot of everything the stopping rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingInput {
    /// Research iterations executed across the session.
    pub global_iteration: usize,
    /// Global iteration cap.
    pub max_iterations: usize,
    /// Spend left.
    pub budget_remaining: f64,
    /// Floor below which research is forced to finish.
    pub budget_floor: f64,
    /// External calls left.
    pub external_calls_remaining: usize,
    /// Whether the session deadline has passed.
    pub deadline_elapsed: bool,
    /// Whether the current scope is a sub-question.
    pub hierarchical: bool,
    /// Iterations run in the current scope.
    pub local_iterations: usize,
    /// Minimum iterations for the current scope.
    pub local_min: usize,
    /// Maximum iterations for the current scope.
    pub local_max: usize,
    /// Validated findings in the current scope.
    pub local_finding_count: usize,
    /// Mean confidence of those findings.
    pub local_average_confidence: f64,
}

impl StoppingInput {
    /// Builds a snapshot from the session's current scope.
    ///
    /// In hierarchical mode the scope is the researching sub-question and
    /// its allocated budget; in flat mode it is the whole session bounded
    /// by `max_iterations`.
    #[must_use]
    pub fn from_session(session: &ResearchSession, deadline_elapsed: bool) -> Self {
        let config = session.config();
        let current = session
            .current_sub_question_id()
            .and_then(|id| session.sub_question(id));
        let findings = session.scoped_findings();

        let (local_iterations, local_max) = current.map_or(
            (session.global_iteration(), config.max_iterations),
            |sq| {
                (
                    sq.iteration_count,
                    sq.allocated_iterations
                        .unwrap_or(config.sub_question_max_iterations),
                )
            },
        );

        Self {
            global_iteration: session.global_iteration(),
            max_iterations: config.max_iterations,
            budget_remaining: session.budget_remaining(),
            budget_floor: config.budget_floor,
            external_calls_remaining: session.external_calls_remaining(),
            deadline_elapsed,
            hierarchical: current.is_some(),
            local_iterations,
            local_min: config.sub_question_min_iterations,
            local_max,
            local_finding_count: findings.len(),
            local_average_confidence: average_confidence(findings),
        }
    }
}

/// Evaluates the stopping rules in precedence order.
#[must_use]
pub fn check_stopping(input: &StoppingInput) -> StoppingDecision {
    use StopAction::{Continue, SynthesizeFinal, SynthesizeSubQuestion};

    if input.global_iteration >= input.max_iterations {
        return StoppingDecision::new(SynthesizeFinal, StopReason::MaxIterations);
    }
    if input.budget_remaining < input.budget_floor {
        return StoppingDecision::new(SynthesizeFinal, StopReason::BudgetFloor);
    }
    if input.external_calls_remaining == 0 {
        return StoppingDecision::new(SynthesizeFinal, StopReason::CallLimit);
    }
    if input.deadline_elapsed {
        return StoppingDecision::new(SynthesizeFinal, StopReason::Deadline);
    }

    let complete = if input.hierarchical {
        SynthesizeSubQuestion
    } else {
        SynthesizeFinal
    };
    if input.local_finding_count >= FINDING_TARGET {
        return StoppingDecision::new(complete, StopReason::FindingCount);
    }
    if input.local_iterations >= input.local_max {
        return StoppingDecision::new(complete, StopReason::LocalIterationCap);
    }
    if input.local_iterations >= input.local_min
        && input.local_average_confidence >= CONFIDENCE_TARGET
        && input.local_finding_count >= CONFIDENT_FINDING_MIN
    {
        return StoppingDecision::new(complete, StopReason::ConfidenceReached);
    }

    if input.local_iterations < input.local_min {
        return StoppingDecision::new(Continue, StopReason::MinimumNotMet);
    }
    StoppingDecision::new(Continue, StopReason::InsufficientEvidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    use crate::research::config::ResearchConfig;
    use crate::research::evidence::Finding;
    use crate::research::sub_question::{SubQuestion, SubQuestionId};

    fn base() -> StoppingInput {
        StoppingInput {
            global_iteration: 3,
            max_iterations: 20,
            budget_remaining: 0.5,
            budget_floor: 0.01,
            external_calls_remaining: 100,
            deadline_elapsed: false,
            hierarchical: true,
            local_iterations: 1,
            local_min: 2,
            local_max: 5,
            local_finding_count: 0,
            local_average_confidence: 0.0,
        }
    }

    #[test]
    fn test_global_cap_overrides_local_state() {
        let input = StoppingInput {
            global_iteration: 20,
            local_iterations: 0,
            ..base()
        };
        let decision = check_stopping(&input);
        assert_eq!(decision.action, StopAction::SynthesizeFinal);
        assert_eq!(decision.reason, StopReason::MaxIterations);
    }

    #[test_case(StoppingInput { budget_remaining: 0.001, ..base() }, StopReason::BudgetFloor ; "budget floor")]
    #[test_case(StoppingInput { external_calls_remaining: 0, ..base() }, StopReason::CallLimit ; "call limit")]
    #[test_case(StoppingInput { deadline_elapsed: true, ..base() }, StopReason::Deadline ; "deadline")]
    fn test_safety_caps_force_final(input: StoppingInput, reason: StopReason) {
        let decision = check_stopping(&input);
        assert_eq!(decision.action, StopAction::SynthesizeFinal);
        assert_eq!(decision.reason, reason);
        assert!(reason.is_global_cap());
    }

    #[test]
    fn test_confident_findings_complete_sub_question() {
        let input = StoppingInput {
            local_iterations: 2,
            local_finding_count: 3,
            local_average_confidence: 0.8,
            ..base()
        };
        let decision = check_stopping(&input);
        assert_eq!(decision.action, StopAction::SynthesizeSubQuestion);
    }

    #[test]
    fn test_confidence_rule_needs_minimum() {
        let below = StoppingInput {
            local_iterations: 1,
            local_finding_count: 2,
            local_average_confidence: 0.9,
            ..base()
        };
        assert_eq!(check_stopping(&below).reason, StopReason::MinimumNotMet);

        let met = StoppingInput {
            local_iterations: 2,
            ..below
        };
        assert_eq!(check_stopping(&met).reason, StopReason::ConfidenceReached);
    }

    #[test]
    fn test_local_cap_completes() {
        let input = StoppingInput {
            local_iterations: 5,
            ..base()
        };
        let decision = check_stopping(&input);
        assert_eq!(decision.action, StopAction::SynthesizeSubQuestion);
        assert_eq!(decision.reason, StopReason::LocalIterationCap);
    }

    #[test]
    fn test_flat_completion_goes_final() {
        let input = StoppingInput {
            hierarchical: false,
            local_finding_count: 3,
            ..base()
        };
        assert_eq!(check_stopping(&input).action, StopAction::SynthesizeFinal);
    }

    #[test]
    fn test_low_confidence_continues() {
        let input = StoppingInput {
            local_iterations: 3,
            local_finding_count: 2,
            local_average_confidence: 0.5,
            ..base()
        };
        let decision = check_stopping(&input);
        assert_eq!(decision.action, StopAction::Continue);
        assert_eq!(decision.reason, StopReason::InsufficientEvidence);
    }

    #[test]
    fn test_from_session_uses_sub_question_scope() {
        let mut session = crate::research::session::ResearchSession::new(
            "q",
            ResearchConfig::default(),
        );
        let mut sq = SubQuestion::new(SubQuestionId(1), "a", 1.0, "");
        sq.start_research(4).unwrap_or_else(|_| unreachable!());
        sq.iteration_count = 2;
        session.set_sub_questions(vec![sq]);
        session.set_current_sub_question(Some(SubQuestionId(1)));
        session.push_finding(Finding {
            sub_question_id: Some(SubQuestionId(1)),
            ..Finding::new("x", 0.9)
        });
        session.push_finding(Finding::new("untagged", 0.1));

        let input = StoppingInput::from_session(&session, false);
        assert!(input.hierarchical);
        assert_eq!(input.local_iterations, 2);
        assert_eq!(input.local_max, 4);
        assert_eq!(input.local_finding_count, 1);
        assert!((input.local_average_confidence - 0.9).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_check_stopping_is_idempotent(
            global in 0usize..30,
            budget in 0.0f64..2.0,
            calls in 0usize..5,
            deadline in any::<bool>(),
            hierarchical in any::<bool>(),
            local in 0usize..10,
            count in 0usize..6,
            confidence in 0.0f64..=1.0,
        ) {
            let input = StoppingInput {
                global_iteration: global,
                budget_remaining: budget,
                external_calls_remaining: calls,
                deadline_elapsed: deadline,
                hierarchical,
                local_iterations: local,
                local_finding_count: count,
                local_average_confidence: confidence,
                ..base()
            };
            let first = check_stopping(&input);
            prop_assert_eq!(first, check_stopping(&input));
            if global >= input.max_iterations {
                prop_assert_eq!(first.action, StopAction::SynthesizeFinal);
            }
        }
    }
}
