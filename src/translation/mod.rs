//! Text-side building blocks of a translation: prompts, the line-sync codec,
//! language names and local text measurements.

mod language;
pub mod line_sync;
pub mod prompt;
mod tokens;

pub use language::{SUPPORTED_LANGUAGES, print_languages, resolve_language};
pub use prompt::{
    DEFAULT_PROMPT_TEMPLATE, PromptPreset, TranslationConfig, build_glossary_block, build_prompt,
    build_prompt_with_context,
};
pub use tokens::{count_words, estimate_tokens};
