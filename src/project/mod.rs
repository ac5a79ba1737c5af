//! The project aggregate: chapters with their version history, the glossary,
//! and aggregate statistics.
//!
//! `Project` is the single writer for all of that state. Every transition
//! validates its inputs before touching anything, so a failed call leaves the
//! project exactly as it was.

mod stats;
mod version;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::ProjectError;
use crate::glossary::{GlossaryEntry, detect_terms};
use crate::translation::count_words;
use crate::translation::line_sync::LineCountCheck;

pub use stats::TranslationStats;
pub use version::TranslationVersion;

use stats::CommitMetrics;
use version::next_version_number;

pub const DEFAULT_COST_PER_1K_TOKENS: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    #[default]
    Untranslated,
    Translated,
    /// Translated, but the output needs a human look (e.g. line-count mismatch).
    NeedsReview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub title: String,
    pub source_text: String,
    /// Always equals the current version's content.
    pub translated_text: String,
    pub status: ChapterStatus,
    pub versions: Vec<TranslationVersion>,
    /// Set by the first commit; completion counters never count a chapter twice.
    #[serde(default)]
    pub counted_complete: bool,
}

impl Chapter {
    pub fn new(title: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            source_text: source_text.into(),
            translated_text: String::new(),
            status: ChapterStatus::Untranslated,
            versions: Vec::new(),
            counted_complete: false,
        }
    }

    pub fn current_version(&self) -> Option<&TranslationVersion> {
        self.versions.iter().find(|v| v.is_current_version)
    }

    pub fn word_count(&self) -> usize {
        count_words(&self.source_text)
    }

    fn deactivate_current(&mut self) {
        for version in &mut self.versions {
            version.is_current_version = false;
        }
    }
}

/// A finished translation ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    pub content: String,
    /// Model (or other source) the version is attributed to.
    pub label: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Seconds.
    pub translation_time: f64,
    /// Set when the translation ran in line-sync mode.
    pub line_check: Option<LineCountCheck>,
}

impl TranslationOutcome {
    pub const fn tokens_used(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// What a commit changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    pub chapter_id: Uuid,
    pub version_id: Uuid,
    pub version_number: u32,
    pub tokens_used: u32,
    /// Seconds this translation took.
    pub translation_time: f64,
    /// Distinct glossary entries found in the chapter source.
    pub glossary_terms_used: usize,
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub chapters: Vec<Chapter>,
    pub glossary: Vec<GlossaryEntry>,
    pub stats: TranslationStats,
    pub cost_per_1k_tokens: f64,
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chapters: Vec::new(),
            glossary: Vec::new(),
            stats: TranslationStats::default(),
            cost_per_1k_tokens: DEFAULT_COST_PER_1K_TOKENS,
        }
    }

    /// Appends a chapter and returns its id.
    pub fn add_chapter(&mut self, title: impl Into<String>, source_text: impl Into<String>) -> Uuid {
        let chapter = Chapter::new(title, source_text);
        let id = chapter.id;
        self.chapters.push(chapter);
        id
    }

    pub fn chapter(&self, chapter_id: Uuid) -> Result<&Chapter, ProjectError> {
        self.chapters
            .iter()
            .find(|c| c.id == chapter_id)
            .ok_or(ProjectError::ChapterNotFound(chapter_id))
    }

    fn chapter_index(&self, chapter_id: Uuid) -> Result<usize, ProjectError> {
        self.chapters
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or(ProjectError::ChapterNotFound(chapter_id))
    }

    /// Translated text of up to `count` translated chapters preceding
    /// `chapter_id`, oldest first.
    pub fn previous_translations(&self, chapter_id: Uuid, count: usize) -> Vec<&str> {
        let Ok(index) = self.chapter_index(chapter_id) else {
            return Vec::new();
        };

        let mut previous: Vec<&str> = self.chapters[..index]
            .iter()
            .rev()
            .filter(|c| !c.translated_text.trim().is_empty())
            .take(count)
            .map(|c| c.translated_text.as_str())
            .collect();
        previous.reverse();
        previous
    }

    /// Turns a finished translation into the chapter's new current version,
    /// then updates statistics and glossary usage.
    pub fn commit_translation(
        &mut self,
        chapter_id: Uuid,
        outcome: TranslationOutcome,
    ) -> Result<CommitSummary, ProjectError> {
        let index = self.chapter_index(chapter_id)?;
        if outcome.content.trim().is_empty() {
            return Err(ProjectError::EmptyTranslation);
        }

        let now = Utc::now();
        let live_words = self.chapters.iter().map(Chapter::word_count).sum();
        let live_chapters = self.chapters.len();
        let tokens_used = outcome.tokens_used();
        let needs_review = outcome.line_check.is_some_and(|check| !check.is_match());

        let used_entries: HashSet<Uuid> =
            detect_terms(&self.chapters[index].source_text, &self.glossary)
                .iter()
                .map(|m| m.entry_id())
                .collect();

        let chapter = &mut self.chapters[index];
        let first_completion = !chapter.counted_complete;
        let chapter_words = chapter.word_count();

        let mut version = TranslationVersion::new(
            next_version_number(&chapter.versions),
            outcome.content,
            outcome.label,
            tokens_used,
            outcome.translation_time,
        );
        version.created_at = now;
        version.is_current_version = true;

        let summary = CommitSummary {
            chapter_id,
            version_id: version.id,
            version_number: version.version_number,
            tokens_used,
            translation_time: outcome.translation_time,
            glossary_terms_used: used_entries.len(),
            needs_review,
        };

        chapter.deactivate_current();
        chapter.translated_text.clone_from(&version.content);
        chapter.status = if needs_review {
            ChapterStatus::NeedsReview
        } else {
            ChapterStatus::Translated
        };
        chapter.versions.push(version);
        chapter.counted_complete = true;

        self.stats.record_commit(
            CommitMetrics {
                live_chapters,
                live_words,
                chapter_words,
                tokens: tokens_used,
                translation_time: outcome.translation_time,
                first_completion,
                cost_per_1k_tokens: self.cost_per_1k_tokens,
            },
            now,
        );

        for entry in self
            .glossary
            .iter_mut()
            .filter(|e| e.is_active && used_entries.contains(&e.id))
        {
            entry.record_usage(now);
        }

        tracing::info!(
            chapter = %chapter_id,
            version = summary.version_number,
            tokens = tokens_used,
            needs_review,
            "Committed translation"
        );

        Ok(summary)
    }

    /// Saves the chapter's present translated text as a non-current version.
    pub fn create_snapshot(
        &mut self,
        chapter_id: Uuid,
        label: impl Into<String>,
    ) -> Result<Uuid, ProjectError> {
        let content = self.chapter(chapter_id)?.translated_text.clone();
        self.snapshot_text(chapter_id, content, label)
    }

    /// Saves text that is not the chapter's visible translation (for example
    /// the partial output of a cancelled stream) as a non-current version.
    ///
    /// The chapter must already have a current version; a chapter never holds
    /// versions without one.
    pub fn snapshot_text(
        &mut self,
        chapter_id: Uuid,
        content: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<Uuid, ProjectError> {
        let content = content.into();
        let index = self.chapter_index(chapter_id)?;
        if content.trim().is_empty() {
            return Err(ProjectError::EmptyTranslation);
        }

        let chapter = &mut self.chapters[index];
        if chapter.current_version().is_none() {
            return Err(ProjectError::NoCurrentVersion(chapter_id));
        }
        let version = TranslationVersion::new(
            next_version_number(&chapter.versions),
            content,
            label.into(),
            0,
            0.0,
        );
        let id = version.id;
        chapter.versions.push(version);
        Ok(id)
    }

    /// Makes `version_id` the current version and shows its content.
    pub fn revert_to_version(
        &mut self,
        chapter_id: Uuid,
        version_id: Uuid,
    ) -> Result<(), ProjectError> {
        let index = self.chapter_index(chapter_id)?;
        let chapter = &mut self.chapters[index];
        let target = chapter
            .versions
            .iter()
            .position(|v| v.id == version_id)
            .ok_or(ProjectError::VersionNotFound(version_id))?;

        chapter.deactivate_current();
        let version = &mut chapter.versions[target];
        version.is_current_version = true;
        chapter.translated_text = version.content.clone();
        if chapter.status == ChapterStatus::Untranslated {
            chapter.status = ChapterStatus::Translated;
        }
        Ok(())
    }

    /// Removes a version.
    ///
    /// Deleting the current version promotes the remaining version with the
    /// highest number; deleting the last version clears the translation.
    /// Statistics are not rolled back, and a later commit does not count the
    /// chapter as completed again.
    pub fn delete_version(&mut self, chapter_id: Uuid, version_id: Uuid) -> Result<(), ProjectError> {
        let index = self.chapter_index(chapter_id)?;
        let chapter = &mut self.chapters[index];
        let position = chapter
            .versions
            .iter()
            .position(|v| v.id == version_id)
            .ok_or(ProjectError::VersionNotFound(version_id))?;

        let removed = chapter.versions.remove(position);
        if !removed.is_current_version {
            return Ok(());
        }

        match chapter
            .versions
            .iter_mut()
            .max_by_key(|v| v.version_number)
        {
            Some(promoted) => {
                promoted.is_current_version = true;
                chapter.translated_text = promoted.content.clone();
                tracing::debug!(
                    version = promoted.version_number,
                    "Promoted version after deleting the current one"
                );
            }
            None => {
                chapter.translated_text.clear();
                chapter.status = ChapterStatus::Untranslated;
            }
        }
        Ok(())
    }
}
