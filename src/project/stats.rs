use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate project statistics, maintained incrementally on every commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationStats {
    pub total_chapters: usize,
    pub completed_chapters: usize,
    pub total_words: usize,
    pub translated_words: usize,
    pub total_tokens_used: u64,
    /// Number of committed translations the average is taken over.
    pub translation_count: u32,
    /// Running mean of translation time in seconds.
    pub average_translation_time: f64,
    pub estimated_cost: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Inputs of a single stats update.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CommitMetrics {
    pub live_chapters: usize,
    pub live_words: usize,
    pub chapter_words: usize,
    pub tokens: u32,
    pub translation_time: f64,
    /// The chapter is being counted as completed for the first time.
    pub first_completion: bool,
    pub cost_per_1k_tokens: f64,
}

impl TranslationStats {
    pub(crate) fn record_commit(&mut self, metrics: CommitMetrics, now: DateTime<Utc>) {
        self.total_tokens_used += u64::from(metrics.tokens);

        if self.total_chapters != metrics.live_chapters || self.total_words != metrics.live_words {
            tracing::debug!(
                stored_chapters = self.total_chapters,
                live_chapters = metrics.live_chapters,
                "Resynchronizing chapter totals"
            );
            self.total_chapters = metrics.live_chapters;
            self.total_words = metrics.live_words;
        }

        if metrics.first_completion {
            self.completed_chapters = (self.completed_chapters + 1).min(self.total_chapters);
            self.translated_words += metrics.chapter_words;
        }

        let previous = f64::from(self.translation_count);
        self.translation_count += 1;
        self.average_translation_time = self
            .average_translation_time
            .mul_add(previous, metrics.translation_time)
            / f64::from(self.translation_count);

        self.estimated_cost += f64::from(metrics.tokens) / 1000.0 * metrics.cost_per_1k_tokens;
        self.last_updated = Some(now);
    }
}
