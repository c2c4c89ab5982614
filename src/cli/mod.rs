//! CLI layer for hresearch.
//!
//! Provides the command-line interface using clap, with commands for
//! running research sessions and browsing saved ones.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
