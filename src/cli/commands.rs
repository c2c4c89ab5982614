//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::format_push_string)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::agent::config::AgentConfig;
use crate::agent::prompt::PromptSet;
use crate::cli::output::{OutputFormat, format_history, format_session};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};
use crate::research::config::ResearchConfig;
use crate::research::orchestrator::Orchestrator;
use crate::store::SqliteSessionStore;

/// Overrides collected from the `run` command line.
#[derive(Debug, Clone, Default)]
pub struct RunParams<'a> {
    /// The question to research.
    pub query: &'a str,
    /// Disable decomposition.
    pub flat: bool,
    /// Global iteration cap.
    pub max_iterations: Option<usize>,
    /// Total spend cap.
    pub max_cost: Option<f64>,
    /// Minimum sub-questions.
    pub min_sub_questions: Option<usize>,
    /// Maximum sub-questions.
    pub max_sub_questions: Option<usize>,
    /// Minimum iterations per sub-question.
    pub sub_min_iterations: Option<usize>,
    /// Maximum iterations per sub-question.
    pub sub_max_iterations: Option<usize>,
    /// Wall-clock deadline in seconds.
    pub deadline_secs: Option<u64>,
    /// Prompt override directory.
    pub prompt_dir: Option<&'a Path>,
    /// Persist the finished session.
    pub save: bool,
    /// Include diagnostics in text output.
    pub verbose: bool,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute. A research session
/// that degrades to `failed` is not an error; its answer is still returned.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Run {
            query,
            flat,
            max_iterations,
            max_cost,
            min_sub_questions,
            max_sub_questions,
            sub_min_iterations,
            sub_max_iterations,
            deadline_secs,
            prompt_dir,
            save,
        } => {
            let params = RunParams {
                query,
                flat: *flat,
                max_iterations: *max_iterations,
                max_cost: *max_cost,
                min_sub_questions: *min_sub_questions,
                max_sub_questions: *max_sub_questions,
                sub_min_iterations: *sub_min_iterations,
                sub_max_iterations: *sub_max_iterations,
                deadline_secs: *deadline_secs,
                prompt_dir: prompt_dir.as_deref(),
                save: *save,
                verbose: cli.verbose,
            };
            cmd_run(&db_path, &params, format)
        }
        Commands::History { limit } => cmd_history(&db_path, *limit, format),
        Commands::Show { id } => cmd_show(&db_path, id, cli.verbose, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds the session configuration from env and command-line overrides.
///
/// # Errors
///
/// Returns [`CommandError::ExecutionFailed`] if the combined values are
/// invalid.
pub fn research_config(params: &RunParams<'_>) -> Result<ResearchConfig> {
    let mut builder = ResearchConfig::builder().from_env();
    if params.flat {
        builder = builder.enable_hierarchical(false);
    }
    if let Some(n) = params.max_iterations {
        builder = builder.max_iterations(n);
    }
    if let Some(cost) = params.max_cost {
        builder = builder.max_total_cost(cost);
    }
    if let Some(n) = params.min_sub_questions {
        builder = builder.min_sub_questions(n);
    }
    if let Some(n) = params.max_sub_questions {
        builder = builder.max_sub_questions(n);
    }
    if let Some(n) = params.sub_min_iterations {
        builder = builder.sub_question_min_iterations(n);
    }
    if let Some(n) = params.sub_max_iterations {
        builder = builder.sub_question_max_iterations(n);
    }
    if let Some(secs) = params.deadline_secs {
        builder = builder.deadline(Duration::from_secs(secs));
    }

    builder
        .build()
        .map_err(|e| CommandError::ExecutionFailed(format!("Research configuration error: {e}")).into())
}

fn cmd_run(db_path: &Path, params: &RunParams<'_>, format: OutputFormat) -> Result<String> {
    let research_config = research_config(params)?;

    let mut builder = AgentConfig::builder().from_env();
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    let agent_config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?;

    let orchestrator = Orchestrator::from_agent_config(&agent_config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let session = rt
        .block_on(orchestrator.run(params.query, research_config))
        .map_err(|e| CommandError::ExecutionFailed(format!("Research failed: {e}")))?;

    let mut saved_note = None;
    if params.save {
        // A store failure never discards the answer.
        match SqliteSessionStore::open(db_path).and_then(|store| store.save(&session)) {
            Ok(()) => saved_note = Some(format!("Saved session {}", session.id())),
            Err(e) => {
                warn!(error = %e, path = %db_path.display(), "failed to save session");
                saved_note = Some(format!("Session not saved: {e}"));
            }
        }
    }

    match format {
        OutputFormat::Text => {
            let mut output = format_session(&session, params.verbose);
            if let Some(note) = saved_note {
                output.push_str(&note);
                output.push('\n');
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(format.to_json(&session)),
    }
}

fn cmd_history(db_path: &Path, limit: usize, format: OutputFormat) -> Result<String> {
    let store = SqliteSessionStore::open(db_path)?;
    let sessions = store.list(limit)?;

    match format {
        OutputFormat::Text => Ok(format_history(&sessions)),
        OutputFormat::Json => Ok(format.to_json(&sessions)),
    }
}

fn cmd_show(db_path: &Path, id: &str, verbose: bool, format: OutputFormat) -> Result<String> {
    let store = SqliteSessionStore::open(db_path)?;
    let session = store.get(id)?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Query: {}\nSession: {}\n\n{}",
            session.query(),
            session.id(),
            format_session(&session, verbose)
        )),
        OutputFormat::Json => Ok(format.to_json(&session)),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    output.push_str(&format!(
                        "  {}\n",
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown")
                    ));
                }
                output.push_str("\nEdit these files to customize the research prompts.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
