//! Prompt construction: template substitution, glossary injection, one-shot
//! examples and the line-sync directive.
//!
//! Everything in here is pure so the same inputs always produce the same prompt.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::line_sync;
use crate::glossary::{GlossaryEntry, GlossaryMatch, unique_entries};

pub const SOURCE_LANGUAGE_PLACEHOLDER: &str = "{{SOURCE_LANGUAGE}}";
pub const TARGET_LANGUAGE_PLACEHOLDER: &str = "{{TARGET_LANGUAGE}}";
pub const TEXT_PLACEHOLDER: &str = "{{TEXT}}";
pub const GLOSSARY_PLACEHOLDER: &str = "{{GLOSSARY}}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a professional literary translator. \
     Translate the following {{SOURCE_LANGUAGE}} text into {{TARGET_LANGUAGE}}. \
     Preserve the paragraph structure, tone and formatting of the original. \
     Output only the translated text without any explanations.\n\n\
     {{GLOSSARY}}\n\n\
     {{TEXT}}";

pub const LINE_SYNC_INSTRUCTION: &str = "IMPORTANT: Every line of the source text starts with a \
     line marker such as [L1], [L2], [L3]. Copy each marker verbatim to the start of the \
     corresponding translated line. Produce exactly one output line per input line, including \
     empty lines, and never merge or split lines.";

pub const GLOSSARY_DIRECTIVE: &str = "CRITICAL: You MUST use the following translations for the \
     listed terms. Do not translate them any other way.";
pub const GLOSSARY_START: &str = "--- GLOSSARY START ---";
pub const GLOSSARY_END: &str = "--- GLOSSARY END ---";

const CONTEXT_START: &str =
    "--- PREVIOUS CONTEXT (already translated, for reference only; do not translate) ---";
const CONTEXT_END: &str = "--- END PREVIOUS CONTEXT ---";

#[allow(clippy::unwrap_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    // unwrap is safe: pattern is a compile-time constant
    Regex::new(r"\{\{(SOURCE_LANGUAGE|TARGET_LANGUAGE|TEXT|GLOSSARY)\}\}").unwrap()
});

/// A named prompt template with an optional one-shot example.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPreset {
    pub name: String,
    /// Template text; an empty template falls back to [`DEFAULT_PROMPT_TEMPLATE`].
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub example_source: Option<String>,
    #[serde(default)]
    pub example_translation: Option<String>,
    #[serde(default)]
    pub provide_example: bool,
}

impl PromptPreset {
    pub fn template(&self) -> &str {
        if self.prompt.trim().is_empty() {
            DEFAULT_PROMPT_TEMPLATE
        } else {
            &self.prompt
        }
    }

    fn example_pair(&self) -> Option<(&str, &str)> {
        if !self.provide_example {
            return None;
        }
        match (&self.example_source, &self.example_translation) {
            (Some(source), Some(translation))
                if !source.trim().is_empty() && !translation.trim().is_empty() =>
            {
                Some((source, translation))
            }
            _ => None,
        }
    }
}

/// Per-request translation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub force_line_count_sync: bool,
    pub include_previous_context: bool,
    pub previous_context_chapter_count: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            force_line_count_sync: false,
            include_previous_context: false,
            previous_context_chapter_count: 1,
        }
    }
}

/// Builds the final prompt for one translation request.
pub fn build_prompt(
    text: &str,
    matches: &[GlossaryMatch<'_>],
    source_language: &str,
    target_language: &str,
    preset: &PromptPreset,
    config: &TranslationConfig,
) -> String {
    build_prompt_with_context(
        text,
        matches,
        source_language,
        target_language,
        preset,
        config,
        &[],
    )
}

/// Like [`build_prompt`], with already translated preceding chapters rendered
/// as a reference block ahead of the body.
pub fn build_prompt_with_context(
    text: &str,
    matches: &[GlossaryMatch<'_>],
    source_language: &str,
    target_language: &str,
    preset: &PromptPreset,
    config: &TranslationConfig,
    previous_chapters: &[&str],
) -> String {
    let template = preset.template();
    let line_sync = config.force_line_count_sync;

    let body_text = if line_sync {
        line_sync::encode(text)
    } else {
        text.to_string()
    };

    let glossary_block = build_glossary_block(matches);
    let template_has_glossary = template.contains(GLOSSARY_PLACEHOLDER);

    let body = substitute(
        template,
        source_language,
        target_language,
        &body_text,
        if template_has_glossary {
            &glossary_block
        } else {
            ""
        },
    );

    let mut components: Vec<String> = Vec::new();

    if line_sync {
        components.push(LINE_SYNC_INSTRUCTION.to_string());
    }
    if !template_has_glossary && !glossary_block.is_empty() {
        components.push(glossary_block);
    }
    if let Some(context) = build_context_block(previous_chapters) {
        components.push(context);
    }
    if let Some((source, translation)) = preset.example_pair() {
        components.push(build_example_block(source, translation, line_sync));
    }
    components.push(body);

    components.retain(|c| !c.is_empty());
    components.join("\n\n").trim().to_string()
}

/// Renders the glossary section for the distinct entries in `matches`.
///
/// Returns an empty string when nothing matched.
pub fn build_glossary_block(matches: &[GlossaryMatch<'_>]) -> String {
    let entries = unique_entries(matches);
    if entries.is_empty() {
        return String::new();
    }

    let mut by_category: BTreeMap<&'static str, Vec<&GlossaryEntry>> = BTreeMap::new();
    for entry in entries {
        by_category
            .entry(entry.category.display_name())
            .or_default()
            .push(entry);
    }

    let mut lines = vec![GLOSSARY_DIRECTIVE.to_string(), GLOSSARY_START.to_string()];
    for (category, mut entries) in by_category {
        entries.sort_by(|a, b| {
            a.original_term
                .to_lowercase()
                .cmp(&b.original_term.to_lowercase())
                .then_with(|| a.original_term.cmp(&b.original_term))
        });

        lines.push(format!("[{category}]"));
        for entry in entries {
            lines.push(render_entry(entry));
        }
    }
    lines.push(GLOSSARY_END.to_string());

    lines.join("\n")
}

fn render_entry(entry: &GlossaryEntry) -> String {
    let description = entry.description.trim();
    if description.is_empty() {
        format!("{} -> {}", entry.original_term, entry.translation)
    } else {
        format!(
            "{} -> {} | Context: {description}",
            entry.original_term, entry.translation
        )
    }
}

fn build_example_block(source: &str, translation: &str, line_sync: bool) -> String {
    let (source, translation) = if line_sync {
        (line_sync::encode(source), line_sync::encode(translation))
    } else {
        (source.to_string(), translation.to_string())
    };

    format!(
        "Here is an example of the expected translation style.\n\
         [Example source]\n{source}\n[Example translation]\n{translation}"
    )
}

fn build_context_block(previous_chapters: &[&str]) -> Option<String> {
    let chapters: Vec<&str> = previous_chapters
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    if chapters.is_empty() {
        return None;
    }

    Some(format!(
        "{CONTEXT_START}\n{}\n{CONTEXT_END}",
        chapters.join("\n\n")
    ))
}

/// Replaces all placeholders in a single pass; substituted values are never
/// scanned again.
fn substitute(
    template: &str,
    source_language: &str,
    target_language: &str,
    text: &str,
    glossary: &str,
) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "SOURCE_LANGUAGE" => source_language.to_string(),
            "TARGET_LANGUAGE" => target_language.to_string(),
            "TEXT" => text.to_string(),
            _ => glossary.to_string(),
        })
        .into_owned()
}
