use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry in a chapter's translation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationVersion {
    pub id: Uuid,
    /// Monotonic per chapter, starting at 1.
    pub version_number: u32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Model that produced the version, or the user's snapshot name.
    pub label: String,
    pub tokens_used: u32,
    /// Wall-clock translation time in seconds (0 for manual snapshots).
    pub translation_time: f64,
    pub is_current_version: bool,
}

impl TranslationVersion {
    pub(crate) fn new(
        version_number: u32,
        content: String,
        label: String,
        tokens_used: u32,
        translation_time: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            version_number,
            content,
            created_at: Utc::now(),
            label,
            tokens_used,
            translation_time,
            is_current_version: false,
        }
    }
}

/// Next version number for a history: one past the highest, or 1.
pub(crate) fn next_version_number(versions: &[TranslationVersion]) -> u32 {
    versions
        .iter()
        .map(|v| v.version_number)
        .max()
        .map_or(1, |max| max + 1)
}
