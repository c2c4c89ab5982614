//! Grapheme-aware text helpers.

use unicode_segmentation::UnicodeSegmentation;

/// Truncates `text` to at most `max` grapheme clusters.
///
/// Never splits a multi-byte character or combining sequence. Returns the
/// input unchanged when it already fits.
#[must_use]
pub fn truncate_graphemes(text: &str, max: usize) -> &str {
    match text.grapheme_indices(true).nth(max) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

/// Lowercases and collapses whitespace, for duplicate detection.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Short single-line preview for log messages.
#[must_use]
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let cut = truncate_graphemes(line, max);
    if cut.len() < text.len() {
        format!("{cut}…")
    } else {
        cut.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_graphemes("hello world", 5), "hello");
        assert_eq!(truncate_graphemes("hi", 5), "hi");
        assert_eq!(truncate_graphemes("", 3), "");
    }

    #[test]
    fn test_truncate_keeps_clusters_whole() {
        let text = "e\u{301}e\u{301}e\u{301}";
        assert_eq!(truncate_graphemes(text, 2), "e\u{301}e\u{301}");
        assert_eq!(truncate_graphemes("日本語テキスト", 3), "日本語");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Rayleigh\n SCATTERING  "), "rayleigh scattering");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("first line\nsecond", 20), "first line…");
        assert_eq!(preview("abcdef", 3), "abc…");
    }
}
