//! Line-sync codec.
//!
//! Tags every line with a `[L<n>] ` marker so a model can be told to keep one
//! output line per input line, and strips those markers from the reply.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    // unwrap is safe: pattern is a compile-time constant
    Regex::new(r"^\[L\d+\]\s?").unwrap()
});

/// Prefixes line *i* (1-based) with `[Li] `. Empty lines are kept.
pub fn encode(text: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| format!("[L{}] {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes a leading line marker from every line that has one.
///
/// The space after the marker is optional because models sometimes drop it.
pub fn decode(text: &str) -> String {
    text.split('\n')
        .map(|line| MARKER.replace(line, ""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of lines as the codec sees them (`split('\n')`).
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// Result of comparing source and translated line counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCountCheck {
    pub source_lines: usize,
    pub translated_lines: usize,
}

impl LineCountCheck {
    pub const fn is_match(&self) -> bool {
        self.source_lines == self.translated_lines
    }
}

/// Compares line counts. Trailing newlines on the model output are ignored.
pub fn check_line_counts(source: &str, translated: &str) -> LineCountCheck {
    LineCountCheck {
        source_lines: line_count(source.trim_end_matches('\n')),
        translated_lines: line_count(translated.trim_end_matches('\n')),
    }
}
