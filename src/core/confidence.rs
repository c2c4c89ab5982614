//! Confidence bands for findings.
//!
//! Findings carry a raw `0.0..=1.0` confidence. Prompts and reports speak in
//! bands instead so the synthesizers can phrase caveats consistently.

use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of the `High` band.
const HIGH_FLOOR: f64 = 0.8;
/// Lower bound (inclusive) of the `Medium` band.
const MEDIUM_FLOOR: f64 = 0.6;
/// Lower bound (inclusive) of the `Low` band.
const LOW_FLOOR: f64 = 0.4;

/// Confidence band of a finding, ordered from strongest to weakest.
///
/// Discriminants are inverted (`High = 0`, `Speculative = 3`) so the derived
/// [`Ord`] sorts strong evidence first, and
/// [`meets_threshold`](ConfidenceBand::meets_threshold) can compare
/// discriminants directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// Well supported.
    High = 0,
    /// Reasonably supported.
    Medium = 1,
    /// Weakly supported.
    Low = 2,
    /// Unverified or guessed.
    Speculative = 3,
}

impl ConfidenceBand {
    /// Classifies a raw confidence score. Non-finite scores are speculative.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if !score.is_finite() {
            return Self::Speculative;
        }
        if score >= HIGH_FLOOR {
            Self::High
        } else if score >= MEDIUM_FLOOR {
            Self::Medium
        } else if score >= LOW_FLOOR {
            Self::Low
        } else {
            Self::Speculative
        }
    }

    /// Returns `true` if this band is at least as strong as `threshold`.
    #[must_use]
    pub const fn meets_threshold(self, threshold: Self) -> bool {
        (self as u8) <= (threshold as u8)
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Speculative => "speculative",
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1.0, ConfidenceBand::High ; "certain")]
    #[test_case(0.8, ConfidenceBand::High ; "high floor")]
    #[test_case(0.79, ConfidenceBand::Medium ; "just below high")]
    #[test_case(0.6, ConfidenceBand::Medium ; "medium floor")]
    #[test_case(0.4, ConfidenceBand::Low ; "low floor")]
    #[test_case(0.1, ConfidenceBand::Speculative ; "weak")]
    #[test_case(f64::NAN, ConfidenceBand::Speculative ; "nan")]
    fn test_from_score(score: f64, expected: ConfidenceBand) {
        assert_eq!(ConfidenceBand::from_score(score), expected);
    }

    #[test]
    fn test_band_ordering() {
        assert!(ConfidenceBand::High < ConfidenceBand::Medium);
        assert!(ConfidenceBand::Medium < ConfidenceBand::Low);
        assert!(ConfidenceBand::Low < ConfidenceBand::Speculative);
    }

    #[test]
    fn test_band_threshold() {
        assert!(ConfidenceBand::High.meets_threshold(ConfidenceBand::Medium));
        assert!(ConfidenceBand::Medium.meets_threshold(ConfidenceBand::Medium));
        assert!(!ConfidenceBand::Low.meets_threshold(ConfidenceBand::Medium));
    }

    #[test]
    fn test_band_display() {
        assert_eq!(ConfidenceBand::High.to_string(), "high");
        assert_eq!(ConfidenceBand::Speculative.to_string(), "speculative");
    }
}
