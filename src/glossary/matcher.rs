//! Case-insensitive glossary term detection.
//!
//! Each search term is compiled into an escaped, case-insensitive regex and
//! scanned left to right without overlap. Matches from different entries are
//! all kept, even when they overlap; use [`unique_entries`] when one hit per
//! entry is enough.

use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::ops::Range;
use uuid::Uuid;

use super::GlossaryEntry;

/// One occurrence of a glossary entry in a scanned text.
#[derive(Debug, Clone, PartialEq)]
pub struct GlossaryMatch<'a> {
    pub entry: &'a GlossaryEntry,
    /// Byte range of the occurrence in the scanned text.
    pub range: Range<usize>,
    /// The alias that matched, or `None` when the primary term did.
    pub matched_alias: Option<String>,
}

impl GlossaryMatch<'_> {
    pub const fn entry_id(&self) -> Uuid {
        self.entry.id
    }

    pub const fn start(&self) -> usize {
        self.range.start
    }
}

/// Finds every occurrence of active entries' source terms and aliases.
///
/// Entries with a blank translation are skipped: there is nothing to enforce.
pub fn detect_terms<'a>(text: &str, glossary: &'a [GlossaryEntry]) -> Vec<GlossaryMatch<'a>> {
    let mut matches = Vec::new();

    for entry in glossary.iter().filter(|e| is_usable(e)) {
        scan_term(text, entry, &entry.original_term, None, &mut matches);
        for alias in &entry.aliases {
            scan_term(text, entry, alias, Some(alias), &mut matches);
        }
    }

    matches.sort_by_key(GlossaryMatch::start);
    matches
}

/// Finds every occurrence of active entries' translations, e.g. to audit a
/// finished translation for glossary compliance.
pub fn detect_translations<'a>(
    text: &str,
    glossary: &'a [GlossaryEntry],
) -> Vec<GlossaryMatch<'a>> {
    let mut matches = Vec::new();

    for entry in glossary.iter().filter(|e| is_usable(e)) {
        scan_term(text, entry, &entry.translation, None, &mut matches);
    }

    matches.sort_by_key(GlossaryMatch::start);
    matches
}

fn is_usable(entry: &GlossaryEntry) -> bool {
    entry.is_active && !entry.translation.trim().is_empty()
}

/// Collapses matches to distinct entries, in order of first appearance.
pub fn unique_entries<'a>(matches: &[GlossaryMatch<'a>]) -> Vec<&'a GlossaryEntry> {
    let mut seen = HashSet::new();
    matches
        .iter()
        .filter(|m| seen.insert(m.entry_id()))
        .map(|m| m.entry)
        .collect()
}

fn scan_term<'a>(
    text: &str,
    entry: &'a GlossaryEntry,
    term: &str,
    alias: Option<&String>,
    out: &mut Vec<GlossaryMatch<'a>>,
) {
    if term.trim().is_empty() {
        return;
    }

    let Some(pattern) = term_pattern(term) else {
        return;
    };

    out.extend(pattern.find_iter(text).map(|m| GlossaryMatch {
        entry,
        range: m.range(),
        matched_alias: alias.cloned(),
    }));
}

fn term_pattern(term: &str) -> Option<Regex> {
    match RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Skipping glossary term {term:?}: {e}");
            None
        }
    }
}
