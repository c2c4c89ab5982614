//! Budget allocation across pending sub-questions.
//!
//! The allocator is a pure function of the sub-question list and the
//! session config. It is re-run every time a sub-question is selected, so
//! shares re-balance as sub-questions complete.
//!
//! # Allocation
//!
//! 1. The research pool is `max_iterations − reserved`, where
//!    `reserved = 1 + n_sub_questions + 1` (decomposition, one synthesis per
//!    sub-question, meta-synthesis).
//! 2. Each pending sub-question is first guaranteed
//!    `sub_question_min_iterations`.
//! 3. The rest of the pool is split proportionally to priority, rounded
//!    with the largest-remainder method (ties to the lower id).
//! 4. Each budget is clamped to `sub_question_max_iterations`.
//!
//! Whenever `min × pending ≤ pool` the budgets sum to at most the pool.
//! When the pool is too small for every minimum, each pending sub-question
//! still gets its minimum and the global iteration cap does the rest.

use std::cmp::Ordering;

use super::config::ResearchConfig;
use super::session::ResearchSession;
use super::sub_question::{SubQuestion, SubQuestionId};

/// Iteration budget assigned to one sub-question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    /// The sub-question the budget belongs to.
    pub sub_question_id: SubQuestionId,
    /// Local iteration budget, within the configured min/max clamp.
    pub iteration_budget: usize,
    /// Unrounded, unclamped share of the research pool.
    pub raw_share: f64,
}

/// Iterations reserved for decomposition and synthesis calls.
#[must_use]
pub const fn reserved_iterations(sub_question_count: usize) -> usize {
    1 + sub_question_count + 1
}

/// Research-only iteration pool for a session with `sub_question_count`
/// sub-questions.
#[must_use]
pub const fn research_pool(max_iterations: usize, sub_question_count: usize) -> usize {
    max_iterations.saturating_sub(reserved_iterations(sub_question_count))
}

/// Picks the pending sub-question to research next.
///
/// Highest priority wins; equal priorities go to the lowest id (earliest
/// created).
#[must_use]
pub fn select_next(sub_questions: &[SubQuestion]) -> Option<SubQuestionId> {
    sub_questions
        .iter()
        .filter(|sq| sq.is_pending())
        .max_by(|a, b| {
            a.priority
                .total_cmp(&b.priority)
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|sq| sq.id)
}

/// Computes budgets for every pending sub-question, in id order.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn allocate_all(sub_questions: &[SubQuestion], config: &ResearchConfig) -> Vec<Allocation> {
    let mut pending: Vec<&SubQuestion> = sub_questions.iter().filter(|sq| sq.is_pending()).collect();
    if pending.is_empty() {
        return Vec::new();
    }
    pending.sort_by_key(|sq| sq.id);

    let min = config.sub_question_min_iterations;
    let max = config.sub_question_max_iterations;
    let pool = research_pool(config.max_iterations, sub_questions.len());
    let leftover = pool.saturating_sub(min * pending.len());

    let total_priority: f64 = pending.iter().map(|sq| sq.priority).sum();
    let weights: Vec<f64> = if total_priority > 0.0 {
        pending.iter().map(|sq| sq.priority / total_priority).collect()
    } else {
        vec![1.0 / pending.len() as f64; pending.len()]
    };

    let raw: Vec<f64> = weights.iter().map(|w| leftover as f64 * w).collect();
    let mut extra: Vec<usize> = raw.iter().map(|r| r.floor() as usize).collect();

    // Largest remainder: hand out what flooring lost, biggest fraction first.
    let assigned: usize = extra.iter().sum();
    let mut order: Vec<usize> = (0..pending.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = raw[a] - raw[a].floor();
        let fb = raw[b] - raw[b].floor();
        fb.partial_cmp(&fa).unwrap_or(Ordering::Equal).then(a.cmp(&b))
    });
    for &i in order.iter().take(leftover.saturating_sub(assigned)) {
        extra[i] += 1;
    }

    pending
        .iter()
        .zip(raw.iter().zip(extra))
        .map(|(sq, (&share, extra))| Allocation {
            sub_question_id: sq.id,
            iteration_budget: (min + extra).min(max).max(min),
            raw_share: min as f64 + share,
        })
        .collect()
}

/// Selects the next sub-question and computes its budget.
#[must_use]
pub fn allocate_from(sub_questions: &[SubQuestion], config: &ResearchConfig) -> Option<Allocation> {
    let id = select_next(sub_questions)?;
    allocate_all(sub_questions, config)
        .into_iter()
        .find(|a| a.sub_question_id == id)
}

/// Selects the next sub-question for `session` and computes its budget.
///
/// Returns `None` when no sub-question is pending.
#[must_use]
pub fn allocate(session: &ResearchSession) -> Option<Allocation> {
    allocate_from(session.sub_questions(), session.config())
}
