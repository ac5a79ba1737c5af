//! Prompt-driven glossary extraction.
//!
//! The model is asked for a JSON array of term objects; the reply is parsed
//! leniently because models like to wrap JSON in code fences or prose.

use serde::Deserialize;

use super::{GlossaryCategory, GlossaryEntry};
use crate::error::{ProviderError, ProviderResult};

/// Input for a glossary extraction run.
#[derive(Debug, Clone)]
pub struct GlossaryExtractionRequest {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    pub model: String,
    /// Terms already in the glossary; they are left out of the result.
    pub known_terms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractedTerm {
    #[serde(alias = "original", alias = "term")]
    original_term: String,
    translation: String,
    #[serde(default)]
    category: Option<GlossaryCategory>,
    #[serde(default, alias = "context")]
    description: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

pub fn build_extraction_prompt(request: &GlossaryExtractionRequest) -> String {
    let categories = GlossaryCategory::ALL
        .iter()
        .map(|c| c.display_name().to_lowercase())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "Extract proper nouns and recurring terminology from the following {source} text \
         and propose consistent {target} translations.\n\
         Respond with a JSON array only. Each element must be an object with the keys \
         \"original_term\", \"translation\", \"category\" (one of: {categories}), \
         \"description\" (a short note on who or what the term is) and \"aliases\" \
         (other spellings used in the text).",
        source = request.source_language,
        target = request.target_language,
    );

    if !request.known_terms.is_empty() {
        prompt.push_str("\nSkip these terms, they are already known: ");
        prompt.push_str(&request.known_terms.join(", "));
    }

    prompt.push_str("\n\nText:\n");
    prompt.push_str(&request.text);
    prompt
}

/// Parses the model reply into new glossary entries.
pub fn parse_extracted_entries(
    response: &str,
    known_terms: &[String],
) -> ProviderResult<Vec<GlossaryEntry>> {
    let json = match (response.find('['), response.rfind(']')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => {
            return Err(ProviderError::decoding(
                "glossary extraction reply contains no JSON array",
            ));
        }
    };

    let terms: Vec<ExtractedTerm> = serde_json::from_str(json).map_err(ProviderError::decoding)?;

    let is_known = |term: &str| {
        known_terms
            .iter()
            .any(|known| known.trim().eq_ignore_ascii_case(term.trim()))
    };

    let mut entries: Vec<GlossaryEntry> = Vec::new();
    for term in terms {
        if term.original_term.trim().is_empty() || term.translation.trim().is_empty() {
            continue;
        }
        if is_known(&term.original_term)
            || entries
                .iter()
                .any(|e| e.original_term.eq_ignore_ascii_case(term.original_term.trim()))
        {
            continue;
        }

        entries.push(
            GlossaryEntry::new(
                term.original_term.trim(),
                term.translation.trim(),
                term.category.unwrap_or_default(),
            )
            .with_aliases(term.aliases.into_iter().filter(|a| !a.trim().is_empty()))
            .with_description(term.description.unwrap_or_default()),
        );
    }

    Ok(entries)
}
