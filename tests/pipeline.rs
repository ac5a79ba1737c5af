#![allow(clippy::unwrap_used)]
//! End-to-end pipeline tests against a scripted in-process provider.

use async_trait::async_trait;
use std::sync::Mutex;

use tome_cli::error::{PipelineError, ProviderError, ProviderResult};
use tome_cli::glossary::{GlossaryCategory, GlossaryEntry};
use tome_cli::pipeline::{CancelToken, TranslationJob, stream_chapter, translate_chapter};
use tome_cli::project::{ChapterStatus, Project};
use tome_cli::provider::{
    ChunkStream, ProviderKind, StreamingChunk, TranslationProvider, TranslationRequest,
    TranslationResponse,
};

/// Replays canned chunks and records the prompts it was sent.
struct ScriptedProvider {
    chunks: Mutex<Vec<ProviderResult<StreamingChunk>>>,
    reply: Option<TranslationResponse>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn streaming(chunks: Vec<ProviderResult<StreamingChunk>>) -> Self {
        Self {
            chunks: Mutex::new(chunks),
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn replying(reply: TranslationResponse) -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
            reply: Some(reply),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<TranslationResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.reply.clone().ok_or(ProviderError::NoResponseText)
    }

    async fn stream_translate(&self, request: &TranslationRequest) -> ProviderResult<ChunkStream> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let chunks = std::mem::take(&mut *self.chunks.lock().unwrap());
        Ok(ChunkStream::from_results(chunks))
    }
}

fn delta(text: &str) -> ProviderResult<StreamingChunk> {
    Ok(StreamingChunk::delta(text.to_string()))
}

fn finish(input: u32, output: u32) -> ProviderResult<StreamingChunk> {
    Ok(StreamingChunk::final_chunk(
        String::new(),
        Some(input),
        Some(output),
        Some("stop".to_string()),
    ))
}

fn book() -> (Project, uuid::Uuid) {
    let mut project = Project::new("Book");
    project.glossary = vec![
        GlossaryEntry::new("Aria", "アリア", GlossaryCategory::Character)
            .with_aliases(["Lady Aria"]),
        GlossaryEntry::new("Dragon", "竜", GlossaryCategory::Other),
    ];
    let id = project.add_chapter("One", "Aria drew her sword.\n\nShe smiled.");
    (project, id)
}

fn job() -> TranslationJob {
    TranslationJob::new("gemma3:12b", "English", "Japanese")
}

#[tokio::test]
async fn test_stream_commits_accumulated_text() {
    let (mut project, id) = book();
    let provider = ScriptedProvider::streaming(vec![
        delta("アリアは剣を抜いた。"),
        delta("\n\n彼女は微笑んだ。"),
        finish(100, 50),
    ]);

    let mut shown = String::new();
    let summary = stream_chapter(
        &provider,
        &mut project,
        id,
        &job(),
        &CancelToken::new(),
        |text| shown.push_str(text),
    )
    .await
    .unwrap();

    let chapter = project.chapter(id).unwrap();
    assert_eq!(chapter.translated_text, "アリアは剣を抜いた。\n\n彼女は微笑んだ。");
    assert_eq!(shown, chapter.translated_text);
    assert_eq!(chapter.status, ChapterStatus::Translated);

    assert_eq!(summary.version_number, 1);
    assert_eq!(summary.tokens_used, 150);
    assert_eq!(summary.glossary_terms_used, 1);
    assert!(!summary.needs_review);

    assert_eq!(project.stats.completed_chapters, 1);
    assert_eq!(project.stats.total_tokens_used, 150);
    assert_eq!(project.glossary[0].usage_count, 1);
    assert_eq!(project.glossary[1].usage_count, 0);

    let prompt = provider.last_prompt();
    assert!(prompt.contains("--- GLOSSARY START ---"));
    assert!(prompt.contains("Aria -> アリア"));
    assert!(!prompt.contains("Dragon"));
}

#[tokio::test]
async fn test_line_sync_decodes_markers() {
    let (mut project, id) = book();
    let provider = ScriptedProvider::streaming(vec![
        delta("[L1] アリアは剣を抜いた。\n[L2] \n"),
        delta("[L3] 彼女は微笑んだ。\n"),
        finish(10, 10),
    ]);
    let mut job = job();
    job.config.force_line_count_sync = true;

    let summary = stream_chapter(&provider, &mut project, id, &job, &CancelToken::new(), |_| {})
        .await
        .unwrap();

    assert!(!summary.needs_review);
    assert_eq!(
        project.chapter(id).unwrap().translated_text,
        "アリアは剣を抜いた。\n\n彼女は微笑んだ。"
    );
    assert!(provider.last_prompt().contains("[L1] Aria drew her sword."));
}

#[tokio::test]
async fn test_line_sync_mismatch_flags_review() {
    let (mut project, id) = book();
    let provider = ScriptedProvider::streaming(vec![
        delta("[L1] アリアは剣を抜いて微笑んだ。"),
        finish(10, 10),
    ]);
    let mut job = job();
    job.config.force_line_count_sync = true;

    let summary = stream_chapter(&provider, &mut project, id, &job, &CancelToken::new(), |_| {})
        .await
        .unwrap();

    assert!(summary.needs_review);
    let chapter = project.chapter(id).unwrap();
    assert_eq!(chapter.status, ChapterStatus::NeedsReview);
    assert_eq!(chapter.versions.len(), 1);
}

#[tokio::test]
async fn test_cancel_discards_partial_text() {
    let (mut project, id) = book();
    let before = project.clone();
    let provider = ScriptedProvider::streaming(vec![
        delta("アリアは"),
        delta("剣を"),
        finish(10, 10),
    ]);

    let cancel = CancelToken::new();
    let mut received = 0;
    let result = stream_chapter(&provider, &mut project, id, &job(), &cancel, |_| {
        received += 1;
        cancel.cancel();
    })
    .await;

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(received, 1);
    assert_eq!(project, before);
}

#[tokio::test]
async fn test_stream_error_leaves_project_untouched() {
    let (mut project, id) = book();
    let before = project.clone();
    let provider = ScriptedProvider::streaming(vec![
        delta("アリア"),
        Err(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".to_string(),
        }),
    ]);

    let result =
        stream_chapter(&provider, &mut project, id, &job(), &CancelToken::new(), |_| {}).await;

    assert!(matches!(
        result,
        Err(PipelineError::Provider(ProviderError::ApiError { status_code: 529, .. }))
    ));
    assert_eq!(project, before);
}

#[tokio::test]
async fn test_empty_stream_is_no_response_text() {
    let (mut project, id) = book();
    let provider = ScriptedProvider::streaming(vec![finish(5, 0)]);

    let result =
        stream_chapter(&provider, &mut project, id, &job(), &CancelToken::new(), |_| {}).await;

    assert!(matches!(
        result,
        Err(PipelineError::Provider(ProviderError::NoResponseText))
    ));
    assert!(project.chapter(id).unwrap().versions.is_empty());
}

#[tokio::test]
async fn test_non_streamed_translation_estimates_missing_usage() {
    let (mut project, id) = book();
    let provider = ScriptedProvider::replying(TranslationResponse {
        text: "アリアは剣を抜いた。\n\n彼女は微笑んだ。\n".to_string(),
        input_tokens: None,
        output_tokens: None,
        model: "gemma3:12b-it".to_string(),
        finish_reason: Some("stop".to_string()),
    });

    let summary = translate_chapter(&provider, &mut project, id, &job())
        .await
        .unwrap();

    assert!(summary.tokens_used > 0);
    let chapter = project.chapter(id).unwrap();
    assert_eq!(chapter.translated_text, "アリアは剣を抜いた。\n\n彼女は微笑んだ。");
    assert_eq!(chapter.current_version().unwrap().label, "gemma3:12b-it");
}

#[tokio::test]
async fn test_retranslation_adds_version_and_keeps_completion() {
    let (mut project, id) = book();
    for text in ["一回目", "二回目"] {
        let provider = ScriptedProvider::streaming(vec![delta(text), finish(100, 50)]);
        stream_chapter(&provider, &mut project, id, &job(), &CancelToken::new(), |_| {})
            .await
            .unwrap();
    }

    let chapter = project.chapter(id).unwrap();
    assert_eq!(chapter.versions.len(), 2);
    assert_eq!(chapter.current_version().unwrap().version_number, 2);
    assert_eq!(chapter.translated_text, "二回目");
    assert_eq!(project.stats.completed_chapters, 1);
    assert_eq!(project.stats.total_tokens_used, 300);
    assert_eq!(project.glossary[0].usage_count, 2);
}

#[tokio::test]
async fn test_previous_context_reaches_prompt() {
    let (mut project, first) = book();
    let second = project.add_chapter("Two", "The Dragon slept.");

    let provider = ScriptedProvider::streaming(vec![delta("第一章の訳"), finish(1, 1)]);
    stream_chapter(&provider, &mut project, first, &job(), &CancelToken::new(), |_| {})
        .await
        .unwrap();

    let mut job = job();
    job.config.include_previous_context = true;
    let provider = ScriptedProvider::streaming(vec![delta("竜は眠った。"), finish(1, 1)]);
    stream_chapter(&provider, &mut project, second, &job, &CancelToken::new(), |_| {})
        .await
        .unwrap();

    let prompt = provider.last_prompt();
    assert!(prompt.contains("第一章の訳"));
    assert!(prompt.contains("Dragon -> 竜"));
}
