//! Error types for hresearch.
//!
//! Each concern gets its own `thiserror` enum. The research engine recovers
//! from most of these internally (see [`ResearchError`]); only configuration,
//! input validation, storage, and CLI failures reach the caller.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Research engine error.
    #[error(transparent)]
    Research(#[from] ResearchError),

    /// Model access error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// CLI command error.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors raised inside the research engine.
///
/// None of these terminate a session on their own. Decomposition errors
/// disable hierarchical mode, synthesis errors fall back to placeholder or
/// concatenated text, tool errors contribute no findings, and budget
/// exhaustion is a forced-completion signal.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The query could not be decomposed into sub-questions.
    #[error("decomposition failed: {0}")]
    Decomposition(#[from] DecompositionError),

    /// A sub- or meta-synthesis call failed.
    #[error("synthesis failed: {message}")]
    Synthesis {
        /// Reason reported by the consultant or parser.
        message: String,
    },

    /// A global safety cap was reached.
    #[error("budget exhausted: {reason}")]
    BudgetExhausted {
        /// Which cap fired.
        reason: String,
    },

    /// A single research task failed.
    #[error("task {task_id} failed: {message}")]
    ToolExecution {
        /// Identifier of the failed task.
        task_id: String,
        /// Failure description.
        message: String,
    },

    /// The strategy planner could not produce tasks.
    #[error("planning failed: {message}")]
    Planning {
        /// Failure description.
        message: String,
    },

    /// A sub-question was asked to move backwards or skip a state.
    #[error("invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// Sub-question identifier.
        id: String,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// An external call did not resolve within the configured timeout.
    #[error("{operation} timed out after {secs}s")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// Timeout in whole seconds.
        secs: u64,
    },

    /// The query was rejected before a session started.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Why the query was rejected.
        message: String,
    },

    /// The session configuration was rejected before a session started.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from the decomposition step.
#[derive(Debug, Error)]
pub enum DecompositionError {
    /// The model consultant reported failure.
    #[error("consultation failed: {message}")]
    Consultation {
        /// Failure reported by the consultant.
        message: String,
    },

    /// The response did not have the expected JSON shape.
    #[error("unparseable decomposition: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// The response parsed but contained no usable sub-questions.
    #[error("decomposition produced no sub-questions")]
    Empty,
}

/// Errors from model providers and agents.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or HRESEARCH_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name.
        name: String,
    },

    /// The provider API call failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// A model response could not be parsed.
    #[error("{message}")]
    ResponseParse {
        /// Parser diagnostic.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// The consultant reported an unsuccessful consultation.
    #[error("consultation failed: {message}")]
    Consultation {
        /// Failure reported by the consultant.
        message: String,
    },

    /// The provider call exceeded its timeout.
    #[error("request timed out after {secs}s")]
    Timeout {
        /// Timeout in whole seconds.
        secs: u64,
    },
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Session store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying `SQLite` error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Session (de)serialization failed.
    #[error("session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No session with the given id.
    #[error("session not found: {id}")]
    NotFound {
        /// Requested session id.
        id: String,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command execution failed.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output formatting failed.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decomposition_error_wraps_into_research_error() {
        let err: ResearchError = DecompositionError::Empty.into();
        assert!(err.to_string().contains("no sub-questions"));
    }

    #[test]
    fn test_top_level_conversion() {
        let err: Error = ConfigError::Invalid {
            field: "max_iterations",
            message: "must be at least 1".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = ResearchError::InvalidTransition {
            id: "sq-1".to_string(),
            from: "completed".to_string(),
            to: "researching".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition for sq-1: completed -> researching"
        );
    }
}
