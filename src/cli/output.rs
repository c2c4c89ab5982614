//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::text::preview;
use crate::research::session::ResearchSession;
use crate::store::SessionSummary;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON.
    ///
    /// Serialization of the crate's own types cannot fail; an error object
    /// is returned if it somehow does.
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("serialization failed: {e}") }).to_string()
        })
    }
}

/// One-line summary appended below an answer.
#[must_use]
pub fn format_footer(session: &ResearchSession) -> String {
    let metadata = session.metadata();
    let completed = session
        .sub_questions()
        .iter()
        .filter(|sq| sq.is_completed())
        .count();
    let mode = if session.hierarchical() {
        format!(
            "Sub-questions: {completed}/{} completed",
            session.sub_questions().len()
        )
    } else {
        "Mode: flat".to_string()
    };
    format!(
        "Status: {} | {mode} | Iterations: {} | Findings: {} | Sources: {} | Cost: ${:.4} | Time: {:.1}s",
        session.status(),
        session.global_iteration(),
        session.findings().len(),
        session.sources().len(),
        metadata.cost_spent,
        millis_to_secs(metadata.elapsed_ms),
    )
}

/// Renders a finished session: answer, footer, and any recorded problems.
#[must_use]
pub fn format_session(session: &ResearchSession, verbose: bool) -> String {
    let metadata = session.metadata();
    let mut output = session.final_answer().unwrap_or_default().to_string();
    let _ = write!(output, "\n\n---\n{}", format_footer(session));

    if let Some(reason) = metadata.stop_reason {
        let _ = write!(output, "\nStopped: {reason}");
    }
    if let Some(err) = &metadata.decomposition_error {
        let _ = write!(output, "\nDecomposition fell back to flat mode: {err}");
    }
    if let Some(err) = &metadata.error {
        let _ = write!(output, "\nError: {err}");
    }
    for err in &metadata.synthesis_errors {
        let _ = write!(output, "\nSynthesis error: {err}");
    }
    if verbose {
        for err in &metadata.tool_errors {
            let _ = write!(output, "\nTool error: {err}");
        }
        if !session.sub_questions().is_empty() {
            let _ = write!(output, "\n\n{}", session.decomposition_tree());
        }
    } else if !metadata.tool_errors.is_empty() {
        let _ = write!(output, "\nTool errors: {}", metadata.tool_errors.len());
    }
    output.push('\n');
    output
}

/// Renders the session history as a table.
#[must_use]
pub fn format_history(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No saved sessions.\n".to_string();
    }

    let mut output = format!(
        "{:<36}  {:<19}  {:<9}  {:>4}  {:>5}  {:>8}  {}\n",
        "ID", "Saved", "Status", "Subq", "Iter", "Cost", "Query"
    );
    for s in sessions {
        let _ = writeln!(
            output,
            "{:<36}  {:<19}  {:<9}  {:>4}  {:>5}  {:>8.4}  {}",
            s.id,
            s.created_at,
            s.status,
            s.sub_questions,
            s.iterations,
            s.cost_spent,
            preview(&s.query, 60),
        );
    }
    output
}

#[allow(clippy::cast_precision_loss)]
fn millis_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
