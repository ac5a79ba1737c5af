//! Model listing and token counting.

use anyhow::{Context, Result};

use crate::config::ResolveOptions;
use crate::error::ProviderError;
use crate::input::InputReader;
use crate::provider::build_provider;
use crate::translation::estimate_tokens;
use crate::ui::{Spinner, Style};

/// Prints the models the resolved provider reports.
pub async fn print_models(options: &ResolveOptions) -> Result<()> {
    let config = super::load_resolved(options)?;
    let provider = build_provider(&config.provider)?;

    let spinner = Spinner::new("Fetching models...");
    let models = provider.fetch_available_models().await;
    spinner.stop();

    let models = models.with_context(|| {
        format!("Failed to list models for provider '{}'", config.provider.name)
    })?;

    println!(
        "{} {}\n",
        Style::header("Models for"),
        Style::value(&config.provider.name)
    );
    for model in models {
        if model == config.model {
            println!("  {} {}", Style::value(&model), Style::default_marker());
        } else {
            println!("  {model}");
        }
    }
    Ok(())
}

/// Prints the token count of a file for the resolved model.
///
/// Providers without a counting endpoint fall back to the local estimate.
pub async fn print_token_count(file: Option<&str>, options: &ResolveOptions) -> Result<()> {
    let config = super::load_resolved(options)?;
    let text = InputReader::read(file)?;
    let provider = build_provider(&config.provider)?;

    let (count, source) = match provider.count_tokens(&text, &config.model).await {
        Ok(count) => (count, config.provider.kind.as_str()),
        Err(ProviderError::ServiceNotImplemented(_)) => (estimate_tokens(&text), "estimate"),
        Err(e) => return Err(e).context("Failed to count tokens"),
    };

    println!("{count}");
    crate::status!(
        "{} {} ({})",
        Style::label("model"),
        Style::value(&config.model),
        Style::secondary(source)
    );
    Ok(())
}
