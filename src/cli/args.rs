use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tome")]
#[command(about = "Glossary-aware book translation with LLM providers")]
#[command(version)]
pub struct Args {
    /// File to translate (reads from stdin if not provided)
    pub file: Option<String>,

    /// Target language (ISO 639-1 code or name, e.g. ja, Japanese)
    #[arg(short = 't', long = "to", global = true)]
    pub to: Option<String>,

    /// Source language (defaults to English)
    #[arg(short = 'f', long = "from", global = true)]
    pub from: Option<String>,

    /// Provider name from the config file
    #[arg(short = 'p', long, global = true)]
    pub provider: Option<String>,

    /// Model name
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Glossary file (JSON array of entries)
    #[arg(short = 'g', long, global = true)]
    pub glossary: Option<PathBuf>,

    /// Prompt preset file (TOML)
    #[arg(long)]
    pub preset: Option<PathBuf>,

    /// Tag every line with a marker to keep a 1:1 line correspondence
    #[arg(short = 'l', long)]
    pub line_sync: bool,

    /// Wait for the whole translation instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// Suppress status output and lower logging to errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Log request details to stderr
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured providers
    Providers {
        /// Show details for one provider
        provider: Option<String>,
    },
    /// List the models the provider offers
    Models,
    /// List supported languages
    Languages,
    /// Count the tokens of a file (or stdin) for the selected model
    CountTokens {
        /// File to measure (reads from stdin if not provided)
        file: Option<String>,
    },
    /// Ask the model for new glossary terms in a file (or stdin), printed as JSON
    ExtractGlossary {
        /// File to scan (reads from stdin if not provided)
        file: Option<String>,
    },
}
