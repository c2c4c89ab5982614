//! Synthesizer agents.
//!
//! [`SubSynthesizerAgent`] turns one sub-question's local evidence into a
//! focused answer; [`MetaSynthesizerAgent`] integrates all sub-answers (or,
//! in flat mode, all findings) into the final response. Both fall back to
//! deterministic text when the model call fails.

use std::fmt::Write;

use async_trait::async_trait;

use super::consultant::ConsultationTier;
use super::traits::Agent;
use crate::research::evidence::Finding;
use crate::research::sub_question::SubQuestion;

/// Agent that answers a single sub-question from its findings.
pub struct SubSynthesizerAgent {
    max_tokens: u32,
    system_prompt: String,
}

impl SubSynthesizerAgent {
    /// Creates a sub-synthesizer with the given response limit and system prompt.
    #[must_use]
    pub const fn new(max_tokens: u32, system_prompt: String) -> Self {
        Self {
            max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for SubSynthesizerAgent {
    fn name(&self) -> &'static str {
        "sub_synthesizer"
    }

    fn tier(&self) -> ConsultationTier {
        ConsultationTier::Medium
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Agent that integrates sub-answers into the final response.
pub struct MetaSynthesizerAgent {
    max_tokens: u32,
    system_prompt: String,
}

impl MetaSynthesizerAgent {
    /// Creates a meta-synthesizer with the given response limit and system prompt.
    #[must_use]
    pub const fn new(max_tokens: u32, system_prompt: String) -> Self {
        Self {
            max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for MetaSynthesizerAgent {
    fn name(&self) -> &'static str {
        "meta_synthesizer"
    }

    fn tier(&self) -> ConsultationTier {
        ConsultationTier::High
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Placeholder stored on a sub-question whose synthesis failed.
#[must_use]
pub fn failed_synthesis_placeholder(reason: &str) -> String {
    format!("synthesis failed: {reason}")
}

/// Orders sub-questions by descending priority, ties by id.
#[must_use]
pub fn by_priority<'a>(sub_questions: impl IntoIterator<Item = &'a SubQuestion>) -> Vec<&'a SubQuestion> {
    let mut ordered: Vec<&SubQuestion> = sub_questions.into_iter().collect();
    ordered.sort_by(|a, b| b.priority.total_cmp(&a.priority).then(a.id.cmp(&b.id)));
    ordered
}

/// Deterministic final answer from sub-answers.
///
/// One `## <question>` block per sub-question, in the order given.
#[must_use]
pub fn concatenate_sub_answers(sub_questions: &[&SubQuestion]) -> String {
    sub_questions
        .iter()
        .map(|sq| {
            format!(
                "## {}\n\n{}",
                sq.question_text,
                sq.synthesis.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Deterministic final answer for flat mode: the query as a heading and
/// one bullet per finding.
#[must_use]
pub fn concatenate_findings(query: &str, findings: &[&Finding]) -> String {
    let mut answer = format!("## {query}\n\n");
    if findings.is_empty() {
        answer.push_str("No findings were gathered.");
        return answer;
    }
    for f in findings {
        let _ = writeln!(answer, "- {} (confidence {:.2})", f.content, f.confidence);
    }
    answer.truncate(answer.trim_end().len());
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::sub_question::SubQuestionId;

    fn answered(id: u32, text: &str, priority: f64, synthesis: &str) -> SubQuestion {
        let mut sq = SubQuestion::new(SubQuestionId(id), text, priority, "");
        sq.start_research(2).unwrap_or_else(|_| unreachable!());
        sq.complete(synthesis.to_string(), 0.5)
            .unwrap_or_else(|_| unreachable!());
        sq
    }

    #[test]
    fn test_agent_properties() {
        let sub = SubSynthesizerAgent::new(1000, "s".to_string());
        assert_eq!(sub.name(), "sub_synthesizer");
        assert_eq!(sub.tier(), ConsultationTier::Medium);
        assert!(!sub.json_mode());
        assert_eq!(sub.max_tokens(), 1000);

        let meta = MetaSynthesizerAgent::new(4000, "m".to_string());
        assert_eq!(meta.name(), "meta_synthesizer");
        assert_eq!(meta.tier(), ConsultationTier::High);
        assert!((meta.temperature() - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(failed_synthesis_placeholder("timeout"), "synthesis failed: timeout");
    }

    #[test]
    fn test_concatenate_in_priority_order() {
        let sqs = [
            answered(1, "Low?", 0.2, "low answer"),
            answered(2, "High?", 0.9, "high answer"),
            answered(3, "Also high?", 0.9, "tie answer"),
        ];
        let ordered = by_priority(&sqs);
        assert_eq!(
            concatenate_sub_answers(&ordered),
            "## High?\n\nhigh answer\n\n## Also high?\n\ntie answer\n\n## Low?\n\nlow answer"
        );
    }

    #[test]
    fn test_concatenate_findings() {
        let a = Finding::new("first", 0.8);
        let b = Finding::new("second", 0.4);
        let answer = concatenate_findings("query", &[&a, &b]);
        assert_eq!(
            answer,
            "## query\n\n- first (confidence 0.80)\n- second (confidence 0.40)"
        );
        assert_eq!(
            concatenate_findings("q", &[]),
            "## q\n\nNo findings were gathered."
        );
    }
}
