//! Provider listing command handler.

use anyhow::{Result, bail};

use crate::config::{ConfigManager, EnvCredentials, ProviderConfig};
use crate::ui::Style;

/// Prints configured providers to stdout.
///
/// With `specific_provider`, shows the details of that provider only.
pub fn print_providers(specific_provider: Option<&str>) -> Result<()> {
    let manager = ConfigManager::new()?;
    let config = manager.load_or_default()?;

    if config.providers.is_empty() {
        println!("No providers configured.");
        println!(
            "Add providers to {}",
            Style::secondary(manager.config_path().display())
        );
        return Ok(());
    }

    let default_provider = config.tome.provider.as_deref();

    if let Some(name) = specific_provider {
        let Some(provider) = config.providers.get(name) else {
            bail!("Provider '{name}' not found");
        };
        print_details(name, provider, default_provider == Some(name));
        return Ok(());
    }

    println!("{}\n", Style::header("Configured providers"));
    for (name, provider) in &config.providers {
        let marker = if default_provider == Some(name.as_str()) {
            format!(" {}", Style::default_marker())
        } else {
            String::new()
        };
        println!(
            "  {}{marker} {}",
            Style::value(name),
            Style::secondary(provider.kind)
        );
        println!("    {} {}", Style::label("endpoint:"), provider.endpoint());
        if !provider.models.is_empty() {
            println!(
                "    {} {}",
                Style::label("models:"),
                provider.models.join(", ")
            );
        }
    }

    Ok(())
}

fn print_details(name: &str, provider: &ProviderConfig, is_default: bool) {
    println!(
        "Provider: {}{}",
        Style::value(name),
        if is_default {
            format!(" {}", Style::default_marker())
        } else {
            String::new()
        }
    );
    println!("  kind     = {}", provider.kind);
    println!("  endpoint = {}", provider.endpoint());
    if provider.requires_api_key() {
        let has_key = provider.api_key(&EnvCredentials).is_some();
        println!(
            "  api_key  = {}",
            if has_key { "(set)" } else { "(not set)" }
        );
    }
    if let Some(temperature) = provider.temperature {
        println!("  temperature = {temperature}");
    }
    if let Some(max_tokens) = provider.max_tokens {
        println!("  max_tokens  = {max_tokens}");
    }
    if provider.models.is_empty() {
        println!("  models   = (none configured)");
    } else {
        println!("  models:");
        for model in &provider.models {
            println!("    - {model}");
        }
    }
}
