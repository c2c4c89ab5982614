//! Validation and quality scoring of gathered evidence.
//!
//! [`validate`] runs between task execution and the evidence logs: nothing
//! it rejects ever counts toward stopping. [`score_quality`] summarizes the
//! validated findings of one scope into [`QualitySignals`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::evidence::{Finding, Source};
use crate::core::{ConfidenceBand, normalize, truncate_graphemes};

/// Longest finding kept, in grapheme clusters.
pub const MAX_FINDING_GRAPHEMES: usize = 2_000;
/// Longest source title kept, in grapheme clusters.
const MAX_TITLE_GRAPHEMES: usize = 300;
/// Finding count treated as full coverage when scoring.
const COVERAGE_TARGET: f64 = 3.0;
/// Source count treated as full support when scoring.
const SOURCE_TARGET: f64 = 3.0;

/// Output of [`validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    /// Findings that passed, possibly truncated.
    pub findings: Vec<Finding>,
    /// Sources that passed.
    pub sources: Vec<Source>,
    /// Findings dropped.
    pub rejected_findings: usize,
    /// Sources dropped.
    pub rejected_sources: usize,
}

/// Filters a batch of task output before it reaches the evidence logs.
///
/// Findings are dropped when empty, when confidence is non-finite or
/// outside `0.0..=1.0`, or when they duplicate (case and whitespace
/// insensitive) a finding already in scope or earlier in the batch.
/// Oversized content is truncated. Sources are dropped without a title,
/// without an `http(s)` URL, or when the URL is already in scope; their
/// relevance is clamped into range.
#[must_use]
pub fn validate(
    findings: Vec<Finding>,
    sources: Vec<Source>,
    existing_findings: &[&Finding],
    existing_sources: &[&Source],
) -> Validation {
    let mut out = Validation::default();

    let mut seen: HashSet<String> = existing_findings
        .iter()
        .map(|f| normalize(&f.content))
        .collect();
    for mut finding in findings {
        let content = finding.content.trim();
        if content.is_empty()
            || !finding.confidence.is_finite()
            || !(0.0..=1.0).contains(&finding.confidence)
            || !seen.insert(normalize(content))
        {
            out.rejected_findings += 1;
            continue;
        }
        finding.content = truncate_graphemes(content, MAX_FINDING_GRAPHEMES).to_string();
        out.findings.push(finding);
    }

    let mut urls: HashSet<String> = existing_sources.iter().map(|s| s.url.clone()).collect();
    for mut source in sources {
        let title = source.title.trim();
        let url = source.url.trim();
        if title.is_empty() || !is_web_url(url) || !urls.insert(url.to_string()) {
            out.rejected_sources += 1;
            continue;
        }
        source.title = truncate_graphemes(title, MAX_TITLE_GRAPHEMES).to_string();
        source.url = url.to_string();
        source.relevance = if source.relevance.is_finite() {
            source.relevance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        out.sources.push(source);
    }

    out
}

fn is_web_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.contains(char::is_whitespace))
}

/// Confidence, novelty, and gap signals for one research scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySignals {
    /// Validated findings in scope.
    pub finding_count: usize,
    /// Sources in scope.
    pub source_count: usize,
    /// Mean finding confidence.
    pub average_confidence: f64,
    /// Share of findings in scope that arrived in the latest iteration.
    pub novelty: f64,
    /// Findings in the low or speculative bands.
    pub gaps: usize,
    /// Combined score in `0.0..=1.0`.
    pub score: f64,
}

/// Scores the findings and sources of one scope.
///
/// `new_findings` is how many of `findings` the latest iteration added.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_quality(findings: &[&Finding], source_count: usize, new_findings: usize) -> QualitySignals {
    let finding_count = findings.len();
    if finding_count == 0 {
        return QualitySignals {
            source_count,
            ..QualitySignals::default()
        };
    }

    let average_confidence =
        findings.iter().map(|f| f.confidence).sum::<f64>() / finding_count as f64;
    let gaps = findings
        .iter()
        .filter(|f| !f.band().meets_threshold(ConfidenceBand::Medium))
        .count();
    let novelty = (new_findings.min(finding_count)) as f64 / finding_count as f64;

    let coverage = (finding_count as f64 / COVERAGE_TARGET).min(1.0);
    let support = (source_count as f64 / SOURCE_TARGET).min(1.0);
    let score = 0.2f64.mul_add(support, 0.5f64.mul_add(average_confidence, 0.3 * coverage));

    QualitySignals {
        finding_count,
        source_count,
        average_confidence,
        novelty,
        gaps,
        score: score.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_rejects_invalid_findings() {
        let batch = vec![
            Finding::new("  ", 0.9),
            Finding::new("nan", f64::NAN),
            Finding::new("too sure", 1.5),
            Finding::new("Blue light scatters more", 0.8),
            Finding::new("blue  LIGHT scatters more", 0.7),
        ];
        let result = validate(batch, Vec::new(), &[], &[]);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.rejected_findings, 4);
        assert_eq!(result.findings[0].content, "Blue light scatters more");
    }

    #[test]
    fn test_rejects_duplicates_of_existing_scope() {
        let existing = Finding::new("Known fact", 0.9);
        let result = validate(vec![Finding::new("known FACT", 0.9)], Vec::new(), &[&existing], &[]);
        assert!(result.findings.is_empty());
        assert_eq!(result.rejected_findings, 1);
    }

    #[test]
    fn test_truncates_long_content() {
        let long = "a".repeat(MAX_FINDING_GRAPHEMES + 50);
        let result = validate(vec![Finding::new(long, 0.5)], Vec::new(), &[], &[]);
        assert_eq!(result.findings[0].content.len(), MAX_FINDING_GRAPHEMES);
    }

    #[test_case("https://example.com/a", true ; "https")]
    #[test_case("http://example.com", true ; "http")]
    #[test_case("ftp://example.com", false ; "other scheme")]
    #[test_case("https://", false ; "empty host")]
    #[test_case("https://exa mple.com", false ; "whitespace")]
    #[test_case("example.com", false ; "no scheme")]
    fn test_web_url(url: &str, expected: bool) {
        assert_eq!(is_web_url(url), expected);
    }

    #[test]
    fn test_source_validation() {
        let existing = Source::new("Old", "https://old.example", 0.5);
        let sources = vec![
            Source::new("", "https://a.example", 0.5),
            Source::new("Dup", "https://old.example", 0.5),
            Source::new("Good", " https://b.example ", 7.0),
        ];
        let result = validate(Vec::new(), sources, &[], &[&existing]);
        assert_eq!(result.rejected_sources, 2);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].url, "https://b.example");
        assert!((result.sources[0].relevance - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_source_without_url_does_not_cost_findings() {
        let result = validate(
            vec![Finding::new("good fact", 0.9)],
            vec![Source::new("no url here", "", 0.5)],
            &[],
            &[],
        );
        assert_eq!(result.findings.len(), 1);
        assert!(result.sources.is_empty());
        assert_eq!(result.rejected_sources, 1);
        assert_eq!(result.rejected_findings, 0);
    }

    #[test]
    fn test_score_empty_scope() {
        let signals = score_quality(&[], 2, 0);
        assert_eq!(signals.finding_count, 0);
        assert_eq!(signals.source_count, 2);
        assert!(signals.score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_signals() {
        let a = Finding::new("a", 0.9);
        let b = Finding::new("b", 0.3);
        let signals = score_quality(&[&a, &b], 3, 1);
        assert_eq!(signals.finding_count, 2);
        assert!((signals.average_confidence - 0.6).abs() < 1e-9);
        assert!((signals.novelty - 0.5).abs() < 1e-9);
        assert_eq!(signals.gaps, 1);
        // 0.5 * 0.6 + 0.3 * (2 / 3) + 0.2 * 1.0
        assert!((signals.score - 0.7).abs() < 1e-9);
    }
}
