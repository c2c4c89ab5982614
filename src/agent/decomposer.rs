//! Decomposer agent.
//!
//! Turns the original query into a prioritized batch of
//! [`SubQuestion`]s with one consultation. The model's output is treated as
//! best-effort JSON: parsing is an explicit fallible step returning a
//! [`DecompositionError`], and there is no automatic retry.

use async_trait::async_trait;
use regex::RegexBuilder;
use serde::Deserialize;
use tracing::{debug, warn};

use super::consultant::{ConsultationResult, ConsultationTier};
use super::traits::Agent;
use crate::error::DecompositionError;
use crate::research::sub_question::{SubQuestion, SubQuestionId};

/// Priority assumed when the model omits one.
const DEFAULT_PRIORITY: f64 = 0.5;
/// Longest sub-question kept, in grapheme clusters.
const MAX_QUESTION_LEN: usize = 1_000;
/// Longest rationale kept, in grapheme clusters.
const MAX_RATIONALE_LEN: usize = 1_000;

/// Sub-question as proposed by the model, before validation.
#[derive(Debug, Deserialize)]
struct Proposal {
    #[serde(alias = "sub_question", alias = "text")]
    question: String,
    #[serde(default)]
    priority: Option<f64>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Agent that decomposes a query into sub-questions.
pub struct DecomposerAgent {
    max_tokens: u32,
    system_prompt: String,
}

impl DecomposerAgent {
    /// Creates a decomposer with the given response limit and system prompt.
    #[must_use]
    pub const fn new(max_tokens: u32, system_prompt: String) -> Self {
        Self {
            max_tokens,
            system_prompt,
        }
    }

    /// Interprets a finished decomposition consultation.
    ///
    /// # Errors
    ///
    /// Returns [`DecompositionError::Consultation`] if the call failed, and
    /// otherwise whatever [`Self::parse_sub_questions`] reports.
    pub fn from_consultation(
        consultation: &ConsultationResult,
        min: usize,
        max: usize,
    ) -> Result<Vec<SubQuestion>, DecompositionError> {
        if !consultation.success {
            return Err(DecompositionError::Consultation {
                message: consultation.error_message(),
            });
        }
        Self::parse_sub_questions(&consultation.result, min, max)
    }

    /// Parses and normalizes the model's answer.
    ///
    /// Accepts a bare JSON array, a `{"sub_questions": [...]}` wrapper, a
    /// fenced code block, or an array embedded in prose. Items without a
    /// question are skipped. Above `max`, the highest-priority items are
    /// kept in their original order; below `min`, a warning is logged and
    /// the items are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DecompositionError::Parse`] if no array can be found and
    /// [`DecompositionError::Empty`] if it holds no usable item.
    pub fn parse_sub_questions(
        content: &str,
        min: usize,
        max: usize,
    ) -> Result<Vec<SubQuestion>, DecompositionError> {
        let items = Self::extract_items(content)?;

        let mut proposals: Vec<Proposal> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Proposal>(item).ok())
            .filter(|p| !p.question.trim().is_empty())
            .collect();
        if proposals.is_empty() {
            return Err(DecompositionError::Empty);
        }

        if proposals.len() > max {
            let mut ranked: Vec<usize> = (0..proposals.len()).collect();
            ranked.sort_by(|&a, &b| {
                priority_of(&proposals[b]).total_cmp(&priority_of(&proposals[a]))
            });
            let mut keep = vec![false; proposals.len()];
            for &i in ranked.iter().take(max) {
                keep[i] = true;
            }
            let mut flags = keep.into_iter();
            proposals.retain(|_| flags.next().unwrap_or(false));
            debug!(kept = max, "truncated decomposition to highest-priority sub-questions");
        }
        if proposals.len() < min {
            warn!(
                count = proposals.len(),
                min, "decomposition returned fewer sub-questions than requested"
            );
        }

        Ok(proposals
            .into_iter()
            .zip(1u32..)
            .map(|(p, n)| {
                let priority = priority_of(&p);
                SubQuestion::new(
                    SubQuestionId(n),
                    clip(p.question.trim(), MAX_QUESTION_LEN),
                    priority,
                    clip(p.rationale.as_deref().unwrap_or_default().trim(), MAX_RATIONALE_LEN),
                )
            })
            .collect())
    }

    /// Locates the JSON array of proposals in `content`.
    fn extract_items(content: &str) -> Result<Vec<serde_json::Value>, DecompositionError> {
        let trimmed = content.trim();
        let json_str = if trimmed.starts_with("```") {
            trimmed
                .trim_start_matches("```json")
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim()
        } else {
            trimmed
        };

        let parse_err = match serde_json::from_str::<serde_json::Value>(json_str) {
            Ok(serde_json::Value::Array(items)) => return Ok(items),
            Ok(serde_json::Value::Object(map)) => {
                for key in ["sub_questions", "questions", "subquestions"] {
                    if let Some(serde_json::Value::Array(items)) = map.get(key) {
                        return Ok(items.clone());
                    }
                }
                if map.contains_key("question") {
                    return Ok(vec![serde_json::Value::Object(map)]);
                }
                "JSON object has no sub_questions array".to_string()
            }
            Ok(other) => format!("expected a JSON array, got {other}"),
            Err(e) => e.to_string(),
        };

        // Last resort: an array embedded in surrounding prose.
        let embedded = RegexBuilder::new(r"\[.*\]")
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| DecompositionError::Parse {
                message: e.to_string(),
                content: content.to_string(),
            })?;
        if let Some(m) = embedded.find(json_str)
            && let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(m.as_str())
        {
            return Ok(items);
        }

        Err(DecompositionError::Parse {
            message: parse_err,
            content: content.to_string(),
        })
    }
}

fn priority_of(proposal: &Proposal) -> f64 {
    proposal.priority.unwrap_or(DEFAULT_PRIORITY)
}

fn clip(text: &str, max: usize) -> String {
    crate::core::truncate_graphemes(text, max).to_string()
}

#[async_trait]
impl Agent for DecomposerAgent {
    fn name(&self) -> &'static str {
        "decomposer"
    }

    fn tier(&self) -> ConsultationTier {
        ConsultationTier::Medium
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        false
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(sqs: &[SubQuestion]) -> Vec<&str> {
        sqs.iter().map(|sq| sq.question_text.as_str()).collect()
    }

    #[test]
    fn test_parse_valid_array() {
        let json = r#"[
            {"question": "What is A?", "priority": 0.9, "rationale": "core"},
            {"question": "What is B?", "priority": 0.4}
        ]"#;
        let sqs = DecomposerAgent::parse_sub_questions(json, 2, 5).unwrap_or_default();
        assert_eq!(sqs.len(), 2);
        assert_eq!(sqs[0].id, SubQuestionId(1));
        assert_eq!(sqs[1].id, SubQuestionId(2));
        assert_eq!(sqs[0].rationale, "core");
        assert!(sqs[1].rationale.is_empty());
        assert!(sqs.iter().all(SubQuestion::is_pending));
        assert!(sqs.iter().all(|sq| sq.depth_level == 0));
    }

    #[test]
    fn test_parse_code_block_and_wrapper() {
        let json = "```json\n{\"sub_questions\": [{\"question\": \"Q1\"}, {\"question\": \"Q2\"}]}\n```";
        let sqs = DecomposerAgent::parse_sub_questions(json, 2, 5).unwrap_or_default();
        assert_eq!(texts(&sqs), vec!["Q1", "Q2"]);
        assert!((sqs[0].priority - DEFAULT_PRIORITY).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_array_embedded_in_prose() {
        let content = "Sure! Here you go:\n[{\"question\": \"Only one\", \"priority\": 1.0}]\nHope that helps.";
        let sqs = DecomposerAgent::parse_sub_questions(content, 1, 5).unwrap_or_default();
        assert_eq!(texts(&sqs), vec!["Only one"]);
    }

    #[test]
    fn test_truncates_to_highest_priority_preserving_order() {
        let json = r#"[
            {"question": "low", "priority": 0.1},
            {"question": "high", "priority": 0.9},
            {"question": "mid", "priority": 0.5},
            {"question": "top", "priority": 1.0}
        ]"#;
        let sqs = DecomposerAgent::parse_sub_questions(json, 1, 2).unwrap_or_default();
        assert_eq!(texts(&sqs), vec!["high", "top"]);
        assert_eq!(sqs[1].id, SubQuestionId(2));
    }

    #[test]
    fn test_fewer_than_min_accepted() {
        let sqs = DecomposerAgent::parse_sub_questions(r#"[{"question": "lonely"}]"#, 3, 5)
            .unwrap_or_default();
        assert_eq!(sqs.len(), 1);
    }

    #[test]
    fn test_priority_clamped() {
        let sqs = DecomposerAgent::parse_sub_questions(
            r#"[{"question": "a", "priority": 4.0}, {"question": "b", "priority": -1}]"#,
            1,
            5,
        )
        .unwrap_or_default();
        assert!((sqs[0].priority - 1.0).abs() < f64::EPSILON);
        assert!(sqs[1].priority.abs() < f64::EPSILON);
    }

    #[test]
    fn test_long_question_clipped_by_grapheme() {
        let json = serde_json::json!([{ "question": "日".repeat(MAX_QUESTION_LEN + 200) }]);
        let sqs = DecomposerAgent::parse_sub_questions(&json.to_string(), 1, 5).unwrap_or_default();
        assert_eq!(sqs[0].question_text.chars().count(), MAX_QUESTION_LEN);
    }

    #[test]
    fn test_malformed_is_parse_error() {
        let result = DecomposerAgent::parse_sub_questions("I cannot help with that.", 2, 5);
        assert!(matches!(result, Err(DecompositionError::Parse { .. })));
    }

    #[test]
    fn test_no_usable_items_is_empty_error() {
        let result = DecomposerAgent::parse_sub_questions(r#"[{"question": "  "}, {"foo": 1}]"#, 2, 5);
        assert!(matches!(result, Err(DecompositionError::Empty)));
        let result = DecomposerAgent::parse_sub_questions("[]", 2, 5);
        assert!(matches!(result, Err(DecompositionError::Empty)));
    }

    #[test]
    fn test_from_failed_consultation() {
        let failed = ConsultationResult::failed("rate limited", 0.0, 3, "m");
        let result = DecomposerAgent::from_consultation(&failed, 2, 5);
        assert!(matches!(
            result,
            Err(DecompositionError::Consultation { ref message }) if message == "rate limited"
        ));

        let ok = ConsultationResult::ok(r#"[{"question": "a"}, {"question": "b"}]"#, 0.01, 3, "m");
        let sqs = DecomposerAgent::from_consultation(&ok, 2, 5).unwrap_or_default();
        assert_eq!(sqs.len(), 2);
    }

    #[test]
    fn test_agent_properties() {
        let agent = DecomposerAgent::new(512, "prompt".to_string());
        assert_eq!(agent.name(), "decomposer");
        assert_eq!(agent.tier(), ConsultationTier::Medium);
        assert_eq!(agent.max_tokens(), 512);
        let request = agent.request("msg".to_string(), 0.1);
        assert_eq!(request.label, "decomposer");
        assert_eq!(request.system, "prompt");
    }
}
