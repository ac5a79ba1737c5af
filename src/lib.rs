//! # tome - glossary-aware book translation
//!
//! `tome` drives LLM providers to translate book-length text while keeping
//! terminology consistent and every translation on record.
//!
//! The library is the translation pipeline:
//!
//! - [`glossary`] finds glossary terms (and aliases) in chapter text
//! - [`translation`] builds prompts with the matched glossary injected, and
//!   the line-sync codec that keeps a 1:1 line correspondence
//! - [`provider`] talks to OpenAI-compatible servers, Anthropic, Gemini and
//!   Ollama behind one streaming interface
//! - [`project`] owns chapters, their version history and statistics
//! - [`pipeline`] ties it together for one chapter
//!
//! ## Quick Start
//!
//! ```bash
//! # Translate a chapter with a glossary
//! tome --to ja --glossary terms.json ./chapter-01.txt
//!
//! # Keep the line structure of a subtitle-like file
//! tome --to ja --line-sync ./lines.txt
//!
//! # Suggest glossary terms for a chapter
//! tome extract-glossary --to ja ./chapter-01.txt > terms.json
//! ```
//!
//! ## Configuration
//!
//! Settings are stored in `~/.config/tome/config.toml`:
//!
//! ```toml
//! [tome]
//! provider = "ollama"
//! model = "gemma3:12b"
//! to = "ja"
//!
//! [providers.ollama]
//! kind = "ollama"
//! endpoint = "http://localhost:11434"
//! models = ["gemma3:12b"]
//! ```

/// Command-line interface definitions and handlers.
pub mod cli;

/// Configuration file management and provider settings.
pub mod config;

/// Error types of the library layers.
pub mod error;

/// Glossary entries, term detection and extraction.
pub mod glossary;

/// Input reading from files and stdin.
pub mod input;

/// Global output configuration (quiet mode, logging, stderr/stdout routing).
pub mod output;

/// XDG-style path utilities for configuration.
pub mod paths;

/// Prompt-to-commit orchestration for a single chapter.
pub mod pipeline;

/// Chapters, versions and statistics.
pub mod project;

/// Provider clients and stream normalization.
pub mod provider;

/// Prompt building, line-sync and text measurements.
pub mod translation;

/// Terminal UI components (spinner, colors).
pub mod ui;
