//! System prompts and template builders for agents.
//!
//! Prompts are the core instructions that define each agent's behavior.
//! Template builders format user messages with the query, evidence, and
//! sub-answers.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::research::evidence::{Finding, Source};
use crate::research::sub_question::SubQuestion;

/// System prompt for the decomposer agent.
pub const DECOMPOSER_SYSTEM_PROMPT: &str = r#"You are a research planner. You break a complex question into a small set of focused sub-questions that can each be researched independently and together answer the original question.

## Instructions

1. Identify the distinct aspects the question depends on.
2. Write one self-contained sub-question per aspect. Avoid overlap between sub-questions.
3. Assign each a priority between 0.0 and 1.0: how much the final answer depends on it.
4. Give a one-sentence rationale for each.

## Output Format (JSON)

Return a JSON array, most important first:
```json
[
  {"question": "What is ...?", "priority": 0.9, "rationale": "Core mechanism the answer rests on."}
]
```

Return only the JSON. No commentary."#;

/// System prompt for the researcher agent.
pub const RESEARCHER_SYSTEM_PROMPT: &str = r#"You are a meticulous research assistant. You carry out one research task and report what you found as discrete, verifiable findings.

## Instructions

1. Focus strictly on the task. Use the surrounding question only for context.
2. State each finding as one concrete, checkable claim.
3. Rate your confidence in each finding from 0.0 (guess) to 1.0 (well established).
4. Cite sources you relied on with a title and an http(s) URL. Omit sources you cannot name precisely.
5. If you find nothing reliable, return empty lists rather than speculating.

## Output Format (JSON)

```json
{
  "findings": [{"content": "Specific claim with evidence", "confidence": 0.8}],
  "sources": [{"title": "Source title", "url": "https://...", "relevance": 0.7}]
}
```"#;

/// System prompt for the sub-synthesizer agent.
pub const SUB_SYNTHESIZER_SYSTEM_PROMPT: &str = r"You are a research analyst. You turn the findings gathered for one sub-question into a focused, well-hedged answer.

## Instructions

1. Answer the sub-question directly in the first sentence.
2. Support the answer with the findings. Prefer high-confidence findings; flag anything resting on low-confidence evidence.
3. Note contradictions between findings and what remains unresolved.
4. Reference sources by title where they support a claim.
5. Keep it to a few short paragraphs. Do not invent facts beyond the findings.

End with a line of the form `Confidence: high|medium|low` reflecting the overall strength of the evidence.";

/// System prompt for the meta-synthesizer agent.
pub const META_SYNTHESIZER_SYSTEM_PROMPT: &str = r"You are a senior research editor. You integrate partial answers into one coherent response to the original question.

## Instructions

1. Answer the original question first, in plain language.
2. Integrate the partial answers. Do not list them one after another; connect them, resolve overlaps, and surface tensions between them.
3. Weight partial answers by their priority and stated confidence.
4. Carry caveats forward: if a partial answer is uncertain or failed, say what is unknown.
5. Use markdown headings and bullets where they help. Be thorough but not repetitive.";

/// Default subdirectory under the home directory for prompt templates.
const DEFAULT_PROMPT_DIR: &str = ".config/hresearch/prompts";

/// Filename for the decomposer prompt template.
const DECOMPOSER_FILENAME: &str = "decomposer.md";
/// Filename for the researcher prompt template.
const RESEARCHER_FILENAME: &str = "researcher.md";
/// Filename for the sub-synthesizer prompt template.
const SUB_SYNTHESIZER_FILENAME: &str = "sub_synthesizer.md";
/// Filename for the meta-synthesizer prompt template.
const META_SYNTHESIZER_FILENAME: &str = "meta_synthesizer.md";

/// A set of system prompts for all agents.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for the decomposer agent.
    pub decomposer: String,
    /// System prompt for the researcher agent.
    pub researcher: String,
    /// System prompt for the sub-synthesizer agent.
    pub sub_synthesizer: String,
    /// System prompt for the meta-synthesizer agent.
    pub meta_synthesizer: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` CLI flag)
    /// 2. `HRESEARCH_PROMPT_DIR` environment variable
    /// 3. `~/.config/hresearch/prompts/`
    ///
    /// Each file is loaded independently. A missing or empty file uses its
    /// default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("HRESEARCH_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|content| !content.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            decomposer: load_file(DECOMPOSER_FILENAME, DECOMPOSER_SYSTEM_PROMPT),
            researcher: load_file(RESEARCHER_FILENAME, RESEARCHER_SYSTEM_PROMPT),
            sub_synthesizer: load_file(SUB_SYNTHESIZER_FILENAME, SUB_SYNTHESIZER_SYSTEM_PROMPT),
            meta_synthesizer: load_file(META_SYNTHESIZER_FILENAME, META_SYNTHESIZER_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            decomposer: DECOMPOSER_SYSTEM_PROMPT.to_string(),
            researcher: RESEARCHER_SYSTEM_PROMPT.to_string(),
            sub_synthesizer: SUB_SYNTHESIZER_SYSTEM_PROMPT.to_string(),
            meta_synthesizer: META_SYNTHESIZER_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (DECOMPOSER_FILENAME, DECOMPOSER_SYSTEM_PROMPT),
            (RESEARCHER_FILENAME, RESEARCHER_SYSTEM_PROMPT),
            (SUB_SYNTHESIZER_FILENAME, SUB_SYNTHESIZER_SYSTEM_PROMPT),
            (META_SYNTHESIZER_FILENAME, META_SYNTHESIZER_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Summary counters quoted in the meta-synthesis prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCounters {
    /// Research iterations executed.
    pub iterations: usize,
    /// Validated findings.
    pub findings: usize,
    /// Validated sources.
    pub sources: usize,
}

/// Builds the user message for the decomposer.
#[must_use]
pub fn build_decomposer_prompt(query: &str, min: usize, max: usize) -> String {
    format!(
        "<query>{query}</query>\n\n\
         Decompose this question into between {min} and {max} sub-questions."
    )
}

/// Builds the user message for one research task.
///
/// `scope` is the sub-question being researched, or `None` in flat mode.
#[must_use]
pub fn build_research_prompt(query: &str, scope: Option<&str>, task: &str) -> String {
    let mut prompt = format!("<question>{query}</question>\n");
    if let Some(scope) = scope {
        let _ = writeln!(prompt, "<sub_question>{scope}</sub_question>");
    }
    let _ = write!(prompt, "\n<task>{task}</task>");
    prompt
}

fn write_evidence(prompt: &mut String, findings: &[&Finding], sources: &[&Source]) {
    prompt.push_str("<findings>\n");
    if findings.is_empty() {
        prompt.push_str("(no findings were gathered)\n");
    }
    for (i, f) in findings.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "{n}. [confidence {c:.2}, {band}] {content}",
            n = i + 1,
            c = f.confidence,
            band = f.band(),
            content = f.content,
        );
    }
    prompt.push_str("</findings>\n\n<sources>\n");
    for s in sources {
        let _ = writeln!(prompt, "- {} <{}> (relevance {:.2})", s.title, s.url, s.relevance);
    }
    prompt.push_str("</sources>\n");
}

/// Builds the user message for a sub-question synthesis.
#[must_use]
pub fn build_sub_synthesis_prompt(
    sub_question: &SubQuestion,
    findings: &[&Finding],
    sources: &[&Source],
) -> String {
    let mut prompt = format!(
        "<sub_question priority=\"{:.2}\">{}</sub_question>\n\n",
        sub_question.priority, sub_question.question_text
    );
    write_evidence(&mut prompt, findings, sources);
    prompt.push_str("\nWrite a focused answer to the sub-question.");
    prompt
}

/// Builds the user message for the hierarchical meta-synthesis.
///
/// `sub_questions` must already be in the order they should appear
/// (descending priority).
#[must_use]
pub fn build_meta_synthesis_prompt(
    query: &str,
    counters: SessionCounters,
    sub_questions: &[&SubQuestion],
) -> String {
    let mut prompt = format!(
        "<query>{query}</query>\n\n\
         <research_summary>\n\
         - Iterations: {}\n\
         - Findings: {}\n\
         - Sources: {}\n\
         - Sub-questions answered: {}\n\
         </research_summary>\n\n<partial_answers>\n",
        counters.iterations,
        counters.findings,
        counters.sources,
        sub_questions.len(),
    );
    for sq in sub_questions {
        let _ = write!(
            prompt,
            "<answer priority=\"{priority:.2}\">\n<question>{question}</question>\n{synthesis}\n</answer>\n\n",
            priority = sq.priority,
            question = sq.question_text,
            synthesis = sq.synthesis.as_deref().unwrap_or_default(),
        );
    }
    prompt.push_str("</partial_answers>\n\nIntegrate these into one answer to the query.");
    prompt
}

/// Builds the user message for a flat-mode final synthesis.
#[must_use]
pub fn build_flat_synthesis_prompt(
    query: &str,
    counters: SessionCounters,
    findings: &[&Finding],
    sources: &[&Source],
) -> String {
    let mut prompt = format!(
        "<query>{query}</query>\n\n\
         <research_summary>\n\
         - Iterations: {}\n\
         - Findings: {}\n\
         - Sources: {}\n\
         </research_summary>\n\n",
        counters.iterations, counters.findings, counters.sources,
    );
    write_evidence(&mut prompt, findings, sources);
    prompt.push_str("\nAnswer the query from these findings.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::sub_question::SubQuestionId;

    #[test]
    fn test_build_decomposer_prompt() {
        let prompt = build_decomposer_prompt("why is the sky blue", 2, 5);
        assert!(prompt.contains("<query>why is the sky blue</query>"));
        assert!(prompt.contains("between 2 and 5"));
    }

    #[test]
    fn test_build_research_prompt() {
        let flat = build_research_prompt("q", None, "look it up");
        assert!(!flat.contains("<sub_question>"));
        assert!(flat.contains("<task>look it up</task>"));

        let scoped = build_research_prompt("q", Some("sub"), "t");
        assert!(scoped.contains("<sub_question>sub</sub_question>"));
    }

    #[test]
    fn test_build_sub_synthesis_prompt() {
        let sq = SubQuestion::new(SubQuestionId(1), "What scatters light?", 0.9, "");
        let finding = Finding::new("Rayleigh scattering", 0.85);
        let source = Source::new("Optics", "https://example.com/optics", 0.8);
        let prompt = build_sub_synthesis_prompt(&sq, &[&finding], &[&source]);
        assert!(prompt.contains("What scatters light?"));
        assert!(prompt.contains("[confidence 0.85, high] Rayleigh scattering"));
        assert!(prompt.contains("Optics <https://example.com/optics>"));
    }

    #[test]
    fn test_build_sub_synthesis_prompt_without_findings() {
        let sq = SubQuestion::new(SubQuestionId(1), "q", 0.5, "");
        let prompt = build_sub_synthesis_prompt(&sq, &[], &[]);
        assert!(prompt.contains("no findings were gathered"));
    }

    #[test]
    fn test_build_meta_synthesis_prompt() {
        let mut a = SubQuestion::new(SubQuestionId(1), "First?", 0.9, "");
        a.synthesis = Some("Answer one".to_string());
        let counters = SessionCounters {
            iterations: 7,
            findings: 12,
            sources: 4,
        };
        let prompt = build_meta_synthesis_prompt("main", counters, &[&a]);
        assert!(prompt.contains("- Iterations: 7"));
        assert!(prompt.contains("- Findings: 12"));
        assert!(prompt.contains("<question>First?</question>\nAnswer one"));
    }

    #[test]
    fn test_prompt_set_falls_back_per_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(RESEARCHER_FILENAME), "custom researcher")
            .unwrap_or_else(|_| unreachable!());
        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.researcher, "custom researcher");
        assert_eq!(prompts.decomposer, DECOMPOSER_SYSTEM_PROMPT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(DECOMPOSER_FILENAME), "mine")
            .unwrap_or_else(|_| unreachable!());
        let written = PromptSet::write_defaults(dir.path()).unwrap_or_default();
        assert_eq!(written.len(), 3);
        let kept = std::fs::read_to_string(dir.path().join(DECOMPOSER_FILENAME)).unwrap_or_default();
        assert_eq!(kept, "mine");
    }

    #[test]
    fn test_prompts_not_empty() {
        let prompts = PromptSet::defaults();
        assert!(!prompts.decomposer.is_empty());
        assert!(!prompts.researcher.is_empty());
        assert!(!prompts.sub_synthesizer.is_empty());
        assert!(!prompts.meta_synthesizer.is_empty());
    }
}
