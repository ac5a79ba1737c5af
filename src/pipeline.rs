//! Runs one chapter through prompt building, a provider call and the commit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use uuid::Uuid;

use crate::error::{PipelineError, ProjectError, ProviderError};
use crate::glossary::detect_terms;
use crate::project::{CommitSummary, Project, TranslationOutcome};
use crate::provider::{TranslationProvider, TranslationRequest};
use crate::translation::line_sync::{self, LineCountCheck};
use crate::translation::{PromptPreset, TranslationConfig, build_prompt_with_context, estimate_tokens};

/// Shared flag that asks a running stream to stop.
///
/// Checked between chunk reads, so cancellation takes effect at the next
/// chunk boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything about a translation that is not the chapter itself.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationJob {
    pub model: String,
    pub source_language: String,
    pub target_language: String,
    pub preset: PromptPreset,
    pub config: TranslationConfig,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl TranslationJob {
    pub fn new(
        model: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            preset: PromptPreset::default(),
            config: TranslationConfig::default(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Builds the provider request for a chapter: glossary detection over the
/// source, optional previous-chapter context, then the prompt itself.
pub fn prepare_request(
    project: &Project,
    chapter_id: Uuid,
    job: &TranslationJob,
) -> Result<TranslationRequest, ProjectError> {
    let chapter = project.chapter(chapter_id)?;
    let matches = detect_terms(&chapter.source_text, &project.glossary);

    let previous = if job.config.include_previous_context {
        project.previous_translations(chapter_id, job.config.previous_context_chapter_count)
    } else {
        Vec::new()
    };

    tracing::debug!(
        chapter = %chapter_id,
        glossary_matches = matches.len(),
        context_chapters = previous.len(),
        "Building prompt"
    );

    let prompt = build_prompt_with_context(
        &chapter.source_text,
        &matches,
        &job.source_language,
        &job.target_language,
        &job.preset,
        &job.config,
        &previous,
    );

    let mut request = TranslationRequest::new(prompt, job.model.clone());
    request.temperature = job.temperature;
    request.max_tokens = job.max_tokens;
    Ok(request)
}

/// Translates a chapter with a single non-streamed request and commits it.
pub async fn translate_chapter(
    provider: &dyn TranslationProvider,
    project: &mut Project,
    chapter_id: Uuid,
    job: &TranslationJob,
) -> Result<CommitSummary, PipelineError> {
    let request = prepare_request(project, chapter_id, job)?;
    let started = Instant::now();

    let response = provider.translate(&request).await?;

    let raw = RawTranslation {
        text: response.text,
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
        label: response.model,
        elapsed: started.elapsed().as_secs_f64(),
    };
    commit(project, chapter_id, job, &request, raw)
}

/// Streams a chapter translation, handing every text fragment to `on_chunk`
/// as it arrives, and commits the accumulated text once the stream ends.
///
/// On cancellation the partial text is discarded and
/// [`PipelineError::Cancelled`] is returned; the project is left untouched.
pub async fn stream_chapter<F>(
    provider: &dyn TranslationProvider,
    project: &mut Project,
    chapter_id: Uuid,
    job: &TranslationJob,
    cancel: &CancelToken,
    mut on_chunk: F,
) -> Result<CommitSummary, PipelineError>
where
    F: FnMut(&str),
{
    let request = prepare_request(project, chapter_id, job)?;
    let started = Instant::now();

    let mut stream = provider.stream_translate(&request).await?;
    let mut text = String::new();
    let mut input_tokens = None;
    let mut output_tokens = None;

    loop {
        if cancel.is_cancelled() {
            stream.cancel();
            tracing::info!(chapter = %chapter_id, received = text.len(), "Translation cancelled");
            return Err(PipelineError::Cancelled);
        }

        let Some(chunk) = stream.next_chunk().await else {
            break;
        };
        let chunk = chunk?;

        if !chunk.text.is_empty() {
            on_chunk(&chunk.text);
            text.push_str(&chunk.text);
        }
        input_tokens = chunk.input_tokens.or(input_tokens);
        output_tokens = chunk.output_tokens.or(output_tokens);

        if chunk.is_final {
            tracing::debug!(finish_reason = ?chunk.finish_reason, "Stream finished");
            break;
        }
    }

    // a cancel that raced the final chunk still wins
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let raw = RawTranslation {
        text,
        input_tokens,
        output_tokens,
        label: job.model.clone(),
        elapsed: started.elapsed().as_secs_f64(),
    };
    commit(project, chapter_id, job, &request, raw)
}

struct RawTranslation {
    text: String,
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    label: String,
    elapsed: f64,
}

fn commit(
    project: &mut Project,
    chapter_id: Uuid,
    job: &TranslationJob,
    request: &TranslationRequest,
    raw: RawTranslation,
) -> Result<CommitSummary, PipelineError> {
    if raw.text.trim().is_empty() {
        return Err(ProviderError::NoResponseText.into());
    }

    let (content, line_check) = if job.config.force_line_count_sync {
        let decoded = line_sync::decode(raw.text.trim_end());
        let source = &project.chapter(chapter_id)?.source_text;
        let check = line_sync::check_line_counts(source, &decoded);
        warn_on_mismatch(chapter_id, check);
        (decoded, Some(check))
    } else {
        (raw.text.trim_end().to_string(), None)
    };

    let outcome = TranslationOutcome {
        input_tokens: raw
            .input_tokens
            .unwrap_or_else(|| estimate_tokens(&request.prompt)),
        output_tokens: raw.output_tokens.unwrap_or_else(|| estimate_tokens(&content)),
        content,
        label: raw.label,
        translation_time: raw.elapsed,
        line_check,
    };

    Ok(project.commit_translation(chapter_id, outcome)?)
}

fn warn_on_mismatch(chapter_id: Uuid, check: LineCountCheck) {
    if !check.is_match() {
        tracing::warn!(
            chapter = %chapter_id,
            source_lines = check.source_lines,
            translated_lines = check.translated_lines,
            "Line count mismatch, marking chapter for review"
        );
    }
}
