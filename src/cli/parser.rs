//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hresearch: hierarchical research orchestration.
///
/// Decomposes a question into prioritized sub-questions, researches each
/// under its own budget, and synthesizes one answer.
#[derive(Parser, Debug)]
#[command(name = "hresearch")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the session history database.
    ///
    /// Defaults to `.hresearch/sessions.db` in the current directory.
    #[arg(short, long, env = "HRESEARCH_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the synthesized answer.
    ///
    /// Requires `OPENAI_API_KEY` or `HRESEARCH_API_KEY`. Unset flags fall
    /// back to `HRESEARCH_*` environment variables, then to defaults.
    #[command(after_help = r#"Examples:
  hresearch run "How do CRDTs handle concurrent deletes?"
  hresearch run "Compare LSM and B-tree storage" --max-cost 0.50
  hresearch run "What is QUIC?" --flat --max-iterations 4
  hresearch run "Why did the 2008 crisis start?" --save
  hresearch --format json run "..." | jq '.sub_questions[].text'
"#)]
    Run {
        /// The question to research.
        query: String,

        /// Skip decomposition and research the query as a single scope.
        #[arg(long)]
        flat: bool,

        /// Global research iteration cap.
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Total spend cap for the session.
        #[arg(long)]
        max_cost: Option<f64>,

        /// Minimum number of sub-questions requested from the decomposer.
        #[arg(long)]
        min_sub_questions: Option<usize>,

        /// Maximum number of sub-questions kept from the decomposer.
        #[arg(long)]
        max_sub_questions: Option<usize>,

        /// Minimum iterations per sub-question.
        #[arg(long)]
        sub_min_iterations: Option<usize>,

        /// Maximum iterations per sub-question.
        #[arg(long)]
        sub_max_iterations: Option<usize>,

        /// Wall-clock deadline in seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Directory containing prompt template overrides.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,

        /// Save the finished session to the history database.
        #[arg(long)]
        save: bool,
    },

    /// List saved sessions, newest first.
    #[command(after_help = r#"Examples:
  hresearch history
  hresearch history --limit 5
  hresearch --format json history | jq '.[].id'
"#)]
    History {
        /// Maximum number of sessions to list.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a saved session.
    Show {
        /// Session id (UUID).
        id: String,
    },

    /// Write default prompt templates to disk for customization.
    ///
    /// Creates markdown template files in the prompt directory so the
    /// role prompts can be changed without recompiling.
    #[command(name = "init-prompts")]
    #[command(after_help = r#"Examples:
  hresearch init-prompts                      # Write to ~/.config/hresearch/prompts/
  hresearch init-prompts --dir ./my-prompts   # Write to custom directory
"#)]
    InitPrompts {
        /// Target directory for prompt templates.
        ///
        /// Defaults to `~/.config/hresearch/prompts/`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::store::DEFAULT_DB_PATH))
    }
}
