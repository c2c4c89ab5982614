//! Shared value types used by both the research engine and the agents.

pub mod confidence;
pub mod text;

pub use confidence::ConfidenceBand;
pub use text::{normalize, truncate_graphemes};
