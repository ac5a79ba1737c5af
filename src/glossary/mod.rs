//! Project glossary: terminology entries, the matcher that finds them in text,
//! and prompt-driven extraction of new entries.

mod entry;
pub mod extraction;
mod matcher;

pub use entry::{GlossaryCategory, GlossaryEntry};
pub use extraction::GlossaryExtractionRequest;
pub use matcher::{GlossaryMatch, detect_terms, detect_translations, unique_entries};
