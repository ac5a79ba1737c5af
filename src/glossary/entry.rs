use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of term a glossary entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlossaryCategory {
    Character,
    Place,
    Event,
    Object,
    Concept,
    Organization,
    Technique,
    #[default]
    Other,
}

impl GlossaryCategory {
    pub const ALL: [Self; 8] = [
        Self::Character,
        Self::Place,
        Self::Event,
        Self::Object,
        Self::Concept,
        Self::Organization,
        Self::Technique,
        Self::Other,
    ];

    /// Human-readable name, also used as the section title in prompts.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Character => "Character",
            Self::Place => "Place",
            Self::Event => "Event",
            Self::Object => "Object",
            Self::Concept => "Concept",
            Self::Organization => "Organization",
            Self::Technique => "Technique",
            Self::Other => "Other",
        }
    }

    /// Parses a loosely formatted category name, falling back to `Other`.
    pub fn parse_lenient(value: &str) -> Self {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.display_name().eq_ignore_ascii_case(value))
            .unwrap_or(Self::Other)
    }
}

impl<'de> Deserialize<'de> for GlossaryCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&value))
    }
}

impl fmt::Display for GlossaryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A term whose translation must stay consistent across the whole book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub original_term: String,
    pub translation: String,
    #[serde(default)]
    pub category: GlossaryCategory,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Free-text context rendered next to the term in prompts.
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl GlossaryEntry {
    pub fn new(
        original_term: impl Into<String>,
        translation: impl Into<String>,
        category: GlossaryCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_term: original_term.into(),
            translation: translation.into(),
            category,
            aliases: Vec::new(),
            description: String::new(),
            is_active: true,
            usage_count: 0,
            last_used: None,
        }
    }

    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Records one use of this entry by a committed translation.
    pub fn record_usage(&mut self, at: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used = Some(at);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_lenient() {
        assert_eq!(
            GlossaryCategory::parse_lenient("character"),
            GlossaryCategory::Character
        );
        assert_eq!(
            GlossaryCategory::parse_lenient(" Place "),
            GlossaryCategory::Place
        );
        assert_eq!(
            GlossaryCategory::parse_lenient("weapon"),
            GlossaryCategory::Other
        );
    }

    #[test]
    fn test_entry_deserialize_with_defaults() {
        let json = r#"{"original_term":"Aria","translation":"アリア"}"#;
        let entry: GlossaryEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.category, GlossaryCategory::Other);
        assert!(entry.is_active);
        assert!(entry.aliases.is_empty());
        assert_eq!(entry.usage_count, 0);
    }

    #[test]
    fn test_entry_deserialize_unknown_category() {
        let json = r#"{"original_term":"X","translation":"Y","category":"spell"}"#;
        let entry: GlossaryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.category, GlossaryCategory::Other);
    }

    #[test]
    fn test_record_usage() {
        let mut entry = GlossaryEntry::new("Aria", "アリア", GlossaryCategory::Character);
        let now = Utc::now();
        entry.record_usage(now);
        entry.record_usage(now);

        assert_eq!(entry.usage_count, 2);
        assert_eq!(entry.last_used, Some(now));
    }
}
