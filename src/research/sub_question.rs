//! Sub-questions: the decomposition units of a research query.

use serde::{Deserialize, Serialize};

use crate::error::ResearchError;

/// Stable identifier of a sub-question within one session.
///
/// Assigned sequentially from 1 in creation order, so comparing ids
/// compares creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubQuestionId(pub u32);

impl std::fmt::Display for SubQuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sq-{}", self.0)
    }
}

/// Lifecycle of a sub-question. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubQuestionStatus {
    /// Waiting to be selected by the allocator.
    Pending,
    /// Currently being researched. At most one per session.
    Researching,
    /// Synthesized (successfully or with a failure placeholder).
    Completed,
}

impl SubQuestionStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Researching => "researching",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SubQuestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decomposition unit, researched and synthesized on its own.
///
/// Findings and sources are not stored here: they live in the session's
/// evidence logs, tagged with this sub-question's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuestion {
    /// Stable identifier.
    pub id: SubQuestionId,
    /// The question to research.
    pub question_text: String,
    /// Relative importance in `0.0..=1.0`.
    pub priority: f64,
    /// Why the decomposer proposed this question. Informational only.
    pub rationale: String,
    /// Nesting depth. Always 0: nested decomposition is not supported.
    pub depth_level: u32,
    /// Current lifecycle state.
    status: SubQuestionStatus,
    /// Local research iterations performed.
    pub iteration_count: usize,
    /// Iteration budget assigned when the sub-question was selected.
    pub allocated_iterations: Option<usize>,
    /// Focused answer, or a failure placeholder.
    pub synthesis: Option<String>,
    /// Quality score of the local evidence at completion.
    pub quality_score: f64,
}

impl SubQuestion {
    /// Creates a pending sub-question. Priority is clamped into `0.0..=1.0`.
    #[must_use]
    pub fn new(
        id: SubQuestionId,
        question_text: impl Into<String>,
        priority: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            id,
            question_text: question_text.into(),
            priority: clamp_priority(priority),
            rationale: rationale.into(),
            depth_level: 0,
            status: SubQuestionStatus::Pending,
            iteration_count: 0,
            allocated_iterations: None,
            synthesis: None,
            quality_score: 0.0,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SubQuestionStatus {
        self.status
    }

    /// Returns `true` while the sub-question awaits selection.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == SubQuestionStatus::Pending
    }

    /// Returns `true` once synthesized.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SubQuestionStatus::Completed
    }

    /// Moves `Pending → Researching` and records the iteration budget.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidTransition`] from any other state.
    pub fn start_research(&mut self, allocated_iterations: usize) -> Result<(), ResearchError> {
        self.transition(SubQuestionStatus::Pending, SubQuestionStatus::Researching)?;
        self.allocated_iterations = Some(allocated_iterations);
        Ok(())
    }

    /// Moves `Researching → Completed`, storing the synthesis text.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidTransition`] from any other state.
    pub fn complete(&mut self, synthesis: String, quality_score: f64) -> Result<(), ResearchError> {
        self.transition(SubQuestionStatus::Researching, SubQuestionStatus::Completed)?;
        self.synthesis = Some(synthesis);
        self.quality_score = quality_score;
        Ok(())
    }

    fn transition(
        &mut self,
        expected: SubQuestionStatus,
        next: SubQuestionStatus,
    ) -> Result<(), ResearchError> {
        if self.status != expected {
            return Err(ResearchError::InvalidTransition {
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Clamps a priority into `0.0..=1.0`; non-finite values become 0.
#[must_use]
pub fn clamp_priority(priority: f64) -> f64 {
    if priority.is_finite() {
        priority.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> SubQuestion {
        SubQuestion::new(SubQuestionId(1), "What changed?", 0.8, "core question")
    }

    #[test]
    fn test_new_is_pending() {
        let sq = sample();
        assert!(sq.is_pending());
        assert_eq!(sq.depth_level, 0);
        assert_eq!(sq.iteration_count, 0);
        assert!(sq.synthesis.is_none());
    }

    #[test]
    fn test_priority_clamped() {
        assert!((SubQuestion::new(SubQuestionId(1), "q", 3.0, "").priority - 1.0).abs() < f64::EPSILON);
        assert!(SubQuestion::new(SubQuestionId(1), "q", -1.0, "").priority.abs() < f64::EPSILON);
        assert!(SubQuestion::new(SubQuestionId(1), "q", f64::NAN, "").priority.abs() < f64::EPSILON);
    }

    #[test]
    fn test_forward_transitions() {
        let mut sq = sample();
        assert!(sq.start_research(4).is_ok());
        assert_eq!(sq.status(), SubQuestionStatus::Researching);
        assert_eq!(sq.allocated_iterations, Some(4));
        assert!(sq.complete("answer".to_string(), 0.9).is_ok());
        assert!(sq.is_completed());
        assert_eq!(sq.synthesis.as_deref(), Some("answer"));
    }

    #[test]
    fn test_cannot_reopen_completed() {
        let mut sq = sample();
        sq.start_research(2).unwrap_or_else(|_| unreachable!());
        sq.complete("done".to_string(), 0.5)
            .unwrap_or_else(|_| unreachable!());
        let err = sq.start_research(2);
        assert!(matches!(err, Err(ResearchError::InvalidTransition { .. })));
        assert!(sq.is_completed());
    }

    #[test]
    fn test_cannot_skip_researching() {
        let mut sq = sample();
        assert!(sq.complete("early".to_string(), 0.0).is_err());
        assert!(sq.is_pending());
        assert!(sq.synthesis.is_none());
    }

    #[test]
    fn test_id_display_and_order() {
        assert_eq!(SubQuestionId(3).to_string(), "sq-3");
        assert!(SubQuestionId(1) < SubQuestionId(2));
    }

    const fn rank(status: SubQuestionStatus) -> u8 {
        match status {
            SubQuestionStatus::Pending => 0,
            SubQuestionStatus::Researching => 1,
            SubQuestionStatus::Completed => 2,
        }
    }

    proptest! {
        #[test]
        fn prop_status_never_moves_backward(steps in prop::collection::vec(any::<bool>(), 0..12)) {
            let mut sq = sample();
            for start in steps {
                let before = rank(sq.status());
                let result = if start {
                    sq.start_research(2)
                } else {
                    sq.complete("answer".to_string(), 0.5)
                };
                let after = rank(sq.status());
                prop_assert!(after >= before);
                if result.is_ok() {
                    prop_assert_eq!(after, before + 1);
                } else {
                    prop_assert_eq!(after, before);
                }
            }
        }
    }
}
