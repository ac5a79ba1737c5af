use anyhow::Result;
use clap::Parser;

use tome_cli::cli::commands::{extract, models, providers, translate};
use tome_cli::cli::{Args, Command};
use tome_cli::config::ResolveOptions;
use tome_cli::input::InputReader;
use tome_cli::output::{self, OutputConfig};
use tome_cli::translation::print_languages;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    output::init(OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
    });

    let resolve = ResolveOptions {
        from: args.from,
        to: args.to,
        provider: args.provider,
        model: args.model,
    };

    match args.command {
        Some(Command::Providers { provider }) => {
            providers::print_providers(provider.as_deref())?;
        }
        Some(Command::Models) => {
            models::print_models(&resolve).await?;
        }
        Some(Command::Languages) => {
            print_languages();
        }
        Some(Command::CountTokens { file }) => {
            models::print_token_count(file.as_deref(), &resolve).await?;
        }
        Some(Command::ExtractGlossary { file }) => {
            let known = match &args.glossary {
                Some(path) => InputReader::read_glossary(path)?,
                None => Vec::new(),
            };
            extract::run_extract(file.as_deref(), &known, &resolve).await?;
        }
        None => {
            let options = translate::TranslateOptions {
                file: args.file,
                resolve,
                glossary: args.glossary,
                preset: args.preset,
                line_sync: args.line_sync,
                no_stream: args.no_stream,
            };
            translate::run_translate(options).await?;
        }
    }

    Ok(())
}
