//! The research session: all state for one query, owned by the orchestrator.
//!
//! Counters (`global_iteration`, `budget_remaining`,
//! `external_calls_remaining`) and the evidence logs are only mutable from
//! inside the crate. Callers read a finished session through accessors.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::ResearchConfig;
use super::evidence::{EvidenceLog, Finding, Source};
use super::quality::QualitySignals;
use super::stopping::StopReason;
use super::sub_question::{SubQuestion, SubQuestionId};

/// Overall session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Research in progress.
    Running,
    /// Finished with a model-integrated answer.
    Completed,
    /// Finished with the deterministic fallback answer.
    Failed,
}

impl SessionStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostics recorded while the session ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Whether hierarchical mode was requested by the config.
    pub hierarchical_requested: bool,
    /// Why decomposition failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decomposition_error: Option<String>,
    /// Per-task failures that contributed no findings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_errors: Vec<String>,
    /// Sub- or meta-synthesis failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synthesis_errors: Vec<String>,
    /// Unrecoverable error that forced final synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The stopping reason that ended research.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Signals from the most recent quality scoring of the active scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quality: Option<QualitySignals>,
    /// Findings rejected by validation.
    pub rejected_findings: usize,
    /// Total spend across all external calls.
    pub cost_spent: f64,
    /// Wall-clock duration of the session.
    pub elapsed_ms: u64,
}

/// All state for one research query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSession {
    id: Uuid,
    query: String,
    config: ResearchConfig,
    hierarchical: bool,
    global_iteration: usize,
    budget_remaining: f64,
    external_calls_remaining: usize,
    findings: EvidenceLog<Finding>,
    sources: EvidenceLog<Source>,
    sub_questions: Vec<SubQuestion>,
    current_sub_question_id: Option<SubQuestionId>,
    final_answer: Option<String>,
    status: SessionStatus,
    metadata: SessionMetadata,
}

impl ResearchSession {
    /// Creates a running session with a full budget.
    #[must_use]
    pub fn new(query: impl Into<String>, config: ResearchConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            hierarchical: config.enable_hierarchical,
            global_iteration: 0,
            budget_remaining: config.max_total_cost,
            external_calls_remaining: config.max_external_calls,
            findings: EvidenceLog::new(),
            sources: EvidenceLog::new(),
            sub_questions: Vec::new(),
            current_sub_question_id: None,
            final_answer: None,
            status: SessionStatus::Running,
            metadata: SessionMetadata {
                hierarchical_requested: config.enable_hierarchical,
                ..SessionMetadata::default()
            },
            config,
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The original query.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The configuration the session started with.
    #[must_use]
    pub const fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Whether the session is (still) running hierarchically.
    ///
    /// Starts as the config's `enable_hierarchical` and is cleared for good
    /// if decomposition fails.
    #[must_use]
    pub const fn hierarchical(&self) -> bool {
        self.hierarchical
    }

    /// Research iterations executed so far, across all scopes.
    #[must_use]
    pub const fn global_iteration(&self) -> usize {
        self.global_iteration
    }

    /// Spend left before the budget is exhausted. Never negative.
    #[must_use]
    pub const fn budget_remaining(&self) -> f64 {
        self.budget_remaining
    }

    /// External calls left.
    #[must_use]
    pub const fn external_calls_remaining(&self) -> usize {
        self.external_calls_remaining
    }

    /// All findings, in gathering order.
    #[must_use]
    pub const fn findings(&self) -> &EvidenceLog<Finding> {
        &self.findings
    }

    /// All sources, in gathering order.
    #[must_use]
    pub const fn sources(&self) -> &EvidenceLog<Source> {
        &self.sources
    }

    /// Sub-questions in creation order.
    #[must_use]
    pub fn sub_questions(&self) -> &[SubQuestion] {
        &self.sub_questions
    }

    /// Looks up a sub-question by id.
    #[must_use]
    pub fn sub_question(&self, id: SubQuestionId) -> Option<&SubQuestion> {
        self.sub_questions.iter().find(|sq| sq.id == id)
    }

    /// The sub-question currently being researched.
    #[must_use]
    pub const fn current_sub_question_id(&self) -> Option<SubQuestionId> {
        self.current_sub_question_id
    }

    /// The final answer, once produced.
    #[must_use]
    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Diagnostics recorded so far.
    #[must_use]
    pub const fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Findings in the current research scope.
    #[must_use]
    pub fn scoped_findings(&self) -> Vec<&Finding> {
        self.findings.scope(self.current_sub_question_id)
    }

    /// Renders the decomposition as an indented outline.
    #[must_use]
    pub fn decomposition_tree(&self) -> String {
        let mut out = format!("{}\n", self.query);
        if self.sub_questions.is_empty() {
            let _ = writeln!(
                out,
                "└── (flat research: {} iterations, {} findings)",
                self.global_iteration,
                self.findings.len()
            );
            return out;
        }
        let last = self.sub_questions.len() - 1;
        for (i, sq) in self.sub_questions.iter().enumerate() {
            let branch = if i == last { "└──" } else { "├──" };
            let _ = writeln!(
                out,
                "{branch} [{status}] {id} (p={priority:.2}, {iters} iter, {found} findings) {text}",
                status = sq.status(),
                id = sq.id,
                priority = sq.priority,
                iters = sq.iteration_count,
                found = self.findings.count_for(sq.id),
                text = sq.question_text,
            );
        }
        out
    }

    // ── Orchestrator-only mutation ──────────────────────────────

    pub(crate) fn advance_iteration(&mut self) -> usize {
        self.global_iteration += 1;
        self.global_iteration
    }

    /// Deducts `cost` from the budget, saturating at zero. Negative or
    /// non-finite costs are ignored.
    pub(crate) fn spend(&mut self, cost: f64) {
        if !cost.is_finite() || cost <= 0.0 {
            return;
        }
        self.budget_remaining = (self.budget_remaining - cost).max(0.0);
        self.metadata.cost_spent += cost;
    }

    pub(crate) const fn consume_call(&mut self) {
        self.external_calls_remaining = self.external_calls_remaining.saturating_sub(1);
    }

    pub(crate) fn push_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub(crate) fn push_source(&mut self, source: Source) {
        self.sources.push(source);
    }

    pub(crate) fn set_sub_questions(&mut self, sub_questions: Vec<SubQuestion>) {
        self.sub_questions = sub_questions;
    }

    pub(crate) fn sub_question_mut(&mut self, id: SubQuestionId) -> Option<&mut SubQuestion> {
        self.sub_questions.iter_mut().find(|sq| sq.id == id)
    }

    pub(crate) const fn set_current_sub_question(&mut self, id: Option<SubQuestionId>) {
        self.current_sub_question_id = id;
    }

    pub(crate) fn disable_hierarchical(&mut self, reason: String) {
        self.hierarchical = false;
        self.sub_questions.clear();
        self.current_sub_question_id = None;
        self.metadata.decomposition_error = Some(reason);
    }

    pub(crate) const fn metadata_mut(&mut self) -> &mut SessionMetadata {
        &mut self.metadata
    }

    pub(crate) fn finish(&mut self, answer: String, status: SessionStatus) {
        self.final_answer = Some(answer);
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session() -> ResearchSession {
        ResearchSession::new("why is the sky blue", ResearchConfig::default())
    }

    #[test]
    fn test_new_session_defaults() {
        let s = session();
        assert_eq!(s.status(), SessionStatus::Running);
        assert_eq!(s.global_iteration(), 0);
        assert!((s.budget_remaining() - 1.0).abs() < f64::EPSILON);
        assert!(s.hierarchical());
        assert!(s.metadata().hierarchical_requested);
        assert!(s.final_answer().is_none());
    }

    #[test]
    fn test_spend_never_negative() {
        let mut s = session();
        s.spend(0.75);
        s.spend(0.75);
        assert!(s.budget_remaining().abs() < f64::EPSILON);
        assert!((s.metadata().cost_spent - 1.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_budget_never_negative(costs in prop::collection::vec(-1.0f64..3.0, 0..20)) {
            let mut s = session();
            let mut charged = 0.0;
            for cost in costs {
                s.spend(cost);
                if cost > 0.0 {
                    charged += cost;
                }
                prop_assert!(s.budget_remaining() >= 0.0);
            }
            prop_assert!((s.metadata().cost_spent - charged).abs() < 1e-9);
        }
    }

    #[test]
    fn test_spend_ignores_invalid_costs() {
        let mut s = session();
        s.spend(-2.0);
        s.spend(f64::NAN);
        assert!((s.budget_remaining() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disable_hierarchical_clears_tree() {
        let mut s = session();
        s.set_sub_questions(vec![SubQuestion::new(SubQuestionId(1), "q", 0.5, "")]);
        s.disable_hierarchical("bad json".to_string());
        assert!(!s.hierarchical());
        assert!(s.sub_questions().is_empty());
        assert_eq!(s.metadata().decomposition_error.as_deref(), Some("bad json"));
    }

    #[test]
    fn test_decomposition_tree_renders_each_sub_question() {
        let mut s = session();
        s.set_sub_questions(vec![
            SubQuestion::new(SubQuestionId(1), "What is scattering?", 1.0, ""),
            SubQuestion::new(SubQuestionId(2), "Why not violet?", 0.6, ""),
        ]);
        let tree = s.decomposition_tree();
        assert!(tree.starts_with("why is the sky blue\n"));
        assert!(tree.contains("├── [pending] sq-1 (p=1.00"));
        assert!(tree.contains("└── [pending] sq-2 (p=0.60"));
    }

    #[test]
    fn test_flat_tree() {
        let s = session();
        assert!(s.decomposition_tree().contains("flat research"));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(SessionStatus::Running.to_string(), "running");
        assert_eq!(SessionStatus::Failed.as_str(), "failed");
    }
}
