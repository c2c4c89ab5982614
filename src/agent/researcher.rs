//! Researcher agent and the model-backed task executor.
//!
//! The researcher carries out one [`Task`] and reports raw findings and
//! sources in JSON. [`ConsultantTaskExecutor`] adapts it to the
//! [`TaskExecutor`] seam so the research loop can run tasks through a
//! [`ModelConsultant`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::consultant::{ConsultationTier, ModelConsultant};
use super::prompt::build_research_prompt;
use super::traits::Agent;
use crate::error::{AgentError, ResearchError};
use crate::research::evidence::{Finding, Source};
use crate::research::executor::{TaskExecutor, TaskOutcome};
use crate::research::strategy::Task;

/// Maximum number of findings a single task may return.
const MAX_FINDINGS_PER_TASK: usize = 20;

/// Maximum number of sources a single task may return.
const MAX_SOURCES_PER_TASK: usize = 20;

/// Maximum length of a source title or URL, in grapheme clusters.
const MAX_SOURCE_FIELD_LEN: usize = 2_000;

/// Confidence assumed when the model omits one.
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Relevance assumed when the model omits one.
const DEFAULT_RELEVANCE: f64 = 0.5;

#[derive(Debug, Deserialize)]
struct RawReport {
    findings: Vec<RawFinding>,
    #[serde(default)]
    sources: Vec<serde_json::Value>,
}

/// Source as reported by the model. Missing fields are left empty for
/// validation to reject.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSource {
    title: String,
    #[serde(alias = "link", alias = "href")]
    url: String,
    relevance: Option<f64>,
}

impl From<RawSource> for Source {
    fn from(raw: RawSource) -> Self {
        Self::new(raw.title, raw.url, raw.relevance.unwrap_or(DEFAULT_RELEVANCE))
    }
}

/// Keeps every source item that has the shape of a source at all.
fn lenient_sources(items: Vec<serde_json::Value>) -> Vec<Source> {
    let total = items.len();
    let sources: Vec<Source> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawSource>(item).ok())
        .map(Source::from)
        .collect();
    if sources.len() < total {
        debug!(dropped = total - sources.len(), "ignored malformed source entries");
    }
    sources
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFinding {
    Structured {
        #[serde(alias = "finding", alias = "text", alias = "claim")]
        content: String,
        #[serde(default)]
        confidence: Option<f64>,
    },
    Plain(String),
}

impl From<RawFinding> for Finding {
    fn from(raw: RawFinding) -> Self {
        match raw {
            RawFinding::Structured {
                content,
                confidence,
            } => Self::new(content, confidence.unwrap_or(DEFAULT_CONFIDENCE)),
            RawFinding::Plain(content) => Self::new(content, DEFAULT_CONFIDENCE),
        }
    }
}

/// Agent that researches one task and extracts findings.
pub struct ResearchAgent {
    max_tokens: u32,
    system_prompt: String,
}

impl ResearchAgent {
    /// Creates a researcher with the given response limit and system prompt.
    #[must_use]
    pub const fn new(max_tokens: u32, system_prompt: String) -> Self {
        Self {
            max_tokens,
            system_prompt,
        }
    }

    /// Caps counts and truncates oversized source fields.
    ///
    /// Findings are length-checked later by validation; only their count
    /// is capped here.
    fn sanitize(mut findings: Vec<Finding>, mut sources: Vec<Source>) -> (Vec<Finding>, Vec<Source>) {
        findings.truncate(MAX_FINDINGS_PER_TASK);
        sources.truncate(MAX_SOURCES_PER_TASK);
        for s in &mut sources {
            clip_field(&mut s.title);
            clip_field(&mut s.url);
            s.sub_question_id = None;
        }
        (findings, sources)
    }

    /// Parses the agent's JSON response into findings and sources.
    ///
    /// Accepts `{"findings": [...], "sources": [...]}`, a bare array of
    /// findings, or a single finding object, optionally wrapped in a
    /// markdown code block or `<findings>` tags.
    fn parse_report(content: &str) -> Result<(Vec<Finding>, Vec<Source>), AgentError> {
        let trimmed = content.trim();

        let json_str = trimmed
            .strip_prefix("<findings>")
            .and_then(|s| s.strip_suffix("</findings>"))
            .map_or_else(
                || {
                    if trimmed.starts_with("```") {
                        trimmed
                            .trim_start_matches("```json")
                            .trim_start_matches("```")
                            .trim_end_matches("```")
                            .trim()
                    } else {
                        trimmed
                    }
                },
                str::trim,
            );

        let report_err = match serde_json::from_str::<RawReport>(json_str) {
            Ok(report) => {
                let findings = report.findings.into_iter().map(Finding::from).collect();
                return Ok((findings, lenient_sources(report.sources)));
            }
            Err(e) => e,
        };

        // Bare array of findings
        if let Ok(raw) = serde_json::from_str::<Vec<RawFinding>>(json_str) {
            return Ok((raw.into_iter().map(Finding::from).collect(), Vec::new()));
        }

        // Single finding object
        if let Ok(raw @ RawFinding::Structured { .. }) = serde_json::from_str::<RawFinding>(json_str) {
            return Ok((vec![Finding::from(raw)], Vec::new()));
        }

        let preview = crate::core::truncate_graphemes(json_str, 200);
        Err(AgentError::ResponseParse {
            message: format!(
                "Failed to parse research JSON: {report_err}. \
                 Response length: {} bytes, preview: {preview:?}",
                json_str.len(),
            ),
            content: content.to_string(),
        })
    }
}

fn clip_field(field: &mut String) {
    let clipped = crate::core::truncate_graphemes(field, MAX_SOURCE_FIELD_LEN);
    if clipped.len() < field.len() {
        *field = clipped.to_string();
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn name(&self) -> &'static str {
        "researcher"
    }

    fn tier(&self) -> ConsultationTier {
        ConsultationTier::Local
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// [`TaskExecutor`] that runs each task as a researcher consultation.
pub struct ConsultantTaskExecutor {
    consultant: Arc<dyn ModelConsultant>,
    agent: ResearchAgent,
}

impl ConsultantTaskExecutor {
    /// Creates an executor consulting `consultant` through `agent`.
    #[must_use]
    pub fn new(consultant: Arc<dyn ModelConsultant>, agent: ResearchAgent) -> Self {
        Self { consultant, agent }
    }
}

#[async_trait]
impl TaskExecutor for ConsultantTaskExecutor {
    async fn execute(&self, task: &Task, cost_ceiling: f64) -> Result<TaskOutcome, ResearchError> {
        let prompt = build_research_prompt(&task.query, task.scope.as_deref(), &task.description);
        let consultation = self
            .agent
            .consult(self.consultant.as_ref(), prompt, cost_ceiling)
            .await;
        if !consultation.success && consultation.cost > 0.0 {
            debug!(
                task = %task.id,
                error = %consultation.error_message(),
                "research consultation failed after spending"
            );
            return Ok(TaskOutcome::failed(consultation.cost));
        }
        if !consultation.success {
            return Err(ResearchError::ToolExecution {
                task_id: task.id.clone(),
                message: consultation.error_message(),
            });
        }

        match ResearchAgent::parse_report(&consultation.result) {
            Ok((findings, sources)) => {
                let (findings, sources) = ResearchAgent::sanitize(findings, sources);
                debug!(
                    task = %task.id,
                    findings = findings.len(),
                    sources = sources.len(),
                    cost = consultation.cost,
                    "research task complete"
                );
                Ok(TaskOutcome::succeeded(findings, sources, consultation.cost))
            }
            Err(e) => {
                debug!(task = %task.id, error = %e, "unparseable research response");
                Ok(TaskOutcome::failed(consultation.cost))
            }
        }
    }
}
