use anyhow::{Result, bail};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::ResolveOptions;
use crate::error::PipelineError;
use crate::input::InputReader;
use crate::pipeline::{CancelToken, TranslationJob, stream_chapter, translate_chapter};
use crate::project::{CommitSummary, Project};
use crate::provider::build_provider;
use crate::translation::PromptPreset;
use crate::ui::{Spinner, Style};

pub struct TranslateOptions {
    pub file: Option<String>,
    pub resolve: ResolveOptions,
    pub glossary: Option<PathBuf>,
    pub preset: Option<PathBuf>,
    pub line_sync: bool,
    pub no_stream: bool,
}

/// Translates one file (or stdin) as a single chapter of an in-memory project.
pub async fn run_translate(options: TranslateOptions) -> Result<()> {
    let config = super::load_resolved(&options.resolve)?;

    let source_text = InputReader::read(options.file.as_deref())?;
    if source_text.trim().is_empty() {
        bail!("Input is empty");
    }

    let mut project = Project::new(options.file.as_deref().unwrap_or("stdin"));
    project.cost_per_1k_tokens = config.cost_per_1k_tokens;
    if let Some(path) = &options.glossary {
        project.glossary = InputReader::read_glossary(path)?;
    }
    let chapter_id = project.add_chapter(project.name.clone(), source_text);

    let mut job = TranslationJob::new(
        config.model.clone(),
        config.source_language.clone(),
        config.target_language.clone(),
    );
    job.preset = match &options.preset {
        Some(path) => InputReader::read_preset(path)?,
        None => PromptPreset::default(),
    };
    job.config.force_line_count_sync = options.line_sync;
    job.temperature = config.temperature;
    job.max_tokens = config.max_tokens;

    let provider = build_provider(&config.provider)?;
    let spinner = Spinner::new(&format!(
        "Translating with {} ({})...",
        config.provider.name, config.model
    ));

    let summary = if options.no_stream || options.line_sync {
        // line-sync output is only readable after the markers are stripped
        let summary = translate_chapter(provider.as_ref(), &mut project, chapter_id, &job).await;
        spinner.stop();
        let summary = summary?;
        print!("{}", project.chapter(chapter_id)?.translated_text);
        summary
    } else {
        let cancel = CancelToken::new();
        spawn_ctrl_c_handler(cancel.clone());

        let mut stdout = io::stdout();
        let result = stream_chapter(
            provider.as_ref(),
            &mut project,
            chapter_id,
            &job,
            &cancel,
            |text| {
                spinner.stop();
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            },
        )
        .await;
        spinner.stop();

        match result {
            Err(PipelineError::Cancelled) => {
                println!();
                crate::status!("{}", Style::warning("Cancelled, translation discarded"));
                return Ok(());
            }
            other => other?,
        }
    };
    println!();

    print_summary(&summary, &project);
    Ok(())
}

fn spawn_ctrl_c_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

fn print_summary(summary: &CommitSummary, project: &Project) {
    let stats = &project.stats;
    crate::status!(
        "\n{} {} {}  {} {}  {} {:.1}s  {} {}",
        Style::success("✓"),
        Style::label("version"),
        Style::value(summary.version_number),
        Style::label("tokens"),
        Style::value(summary.tokens_used),
        Style::label("time"),
        summary.translation_time,
        Style::label("glossary terms"),
        Style::value(summary.glossary_terms_used),
    );
    crate::status!(
        "  {} {}",
        Style::label("estimated cost"),
        Style::value(format!("${:.4}", stats.estimated_cost))
    );

    if summary.needs_review {
        crate::status!(
            "  {}",
            Style::warning("Line count differs from the source, review the output")
        );
    }
}
