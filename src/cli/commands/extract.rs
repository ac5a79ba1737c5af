use anyhow::{Context, Result, bail};

use crate::config::ResolveOptions;
use crate::glossary::{GlossaryEntry, GlossaryExtractionRequest};
use crate::input::InputReader;
use crate::provider::build_provider;
use crate::ui::Spinner;

/// Asks the model for glossary terms in a file and prints them as a JSON
/// array that `--glossary` accepts. Terms already in `known` are skipped.
pub async fn run_extract(
    file: Option<&str>,
    known: &[GlossaryEntry],
    options: &ResolveOptions,
) -> Result<()> {
    let config = super::load_resolved(options)?;
    let text = InputReader::read(file)?;
    if text.trim().is_empty() {
        bail!("Input is empty");
    }

    let request = GlossaryExtractionRequest {
        text,
        source_language: config.source_language.clone(),
        target_language: config.target_language.clone(),
        model: config.model.clone(),
        known_terms: known.iter().map(|e| e.original_term.clone()).collect(),
    };

    let provider = build_provider(&config.provider)?;
    let spinner = Spinner::new("Extracting glossary terms...");
    let entries = provider.extract_glossary(&request).await;
    spinner.stop();

    let entries = entries.context("Glossary extraction failed")?;
    crate::status!("Found {} new terms", entries.len());
    println!(
        "{}",
        serde_json::to_string_pretty(&entries).context("Failed to serialize glossary")?
    );
    Ok(())
}
