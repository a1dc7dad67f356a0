//! End-to-end pipeline: seed keyword → expansion → article batch → document.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use articleforge_client::{GenerationBackend, RetryPolicy};
use articleforge_shared::{
    ArticleForgeError, BatchConfig, BatchId, BatchOutcome, ExportDocument, Keyword, Result,
    RetryConfig,
};

use crate::assembler;
use crate::expander::SubKeywordExpander;
use crate::orchestrator::{BatchOrchestrator, CancelHandle};
use crate::progress::ProgressReporter;

/// Configuration for one pipeline invocation.
///
/// Passed explicitly per run rather than held as ambient state, so the
/// pipeline is testable without any environment around it.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The user-provided seed keyword.
    pub seed: String,
    /// Batch settings (count, concurrency, article options).
    pub batch: BatchConfig,
    /// Retry/backoff settings shared by expansion and article calls.
    pub retry: RetryConfig,
}

/// Result of a full pipeline run.
#[derive(Debug)]
pub struct PipelineResult {
    /// Identifier for this batch.
    pub batch_id: BatchId,
    /// The derived sub-keywords, ascending id order.
    pub keywords: Vec<Keyword>,
    /// Per-job outcome after the batch reached terminal state.
    pub outcome: BatchOutcome,
    /// The assembled document (succeeded jobs only).
    pub document: ExportDocument,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Run the full pipeline.
///
/// 1. Expand the seed into sub-keywords (one retried remote call). A
///    failure here is fatal: the batch never starts and zero article
///    calls are made.
/// 2. Fan out one generation job per keyword (bounded concurrency,
///    best-effort partial-success semantics).
/// 3. Assemble the document from succeeded jobs.
#[instrument(skip_all, fields(seed = %config.seed, count = config.batch.keyword_count))]
pub async fn run(
    config: &PipelineConfig,
    backend: Arc<dyn GenerationBackend>,
    cancel: &CancelHandle,
    progress: &dyn ProgressReporter,
) -> Result<PipelineResult> {
    let start = Instant::now();
    let batch_id = BatchId::new();
    let retry = RetryPolicy::from_config(&config.retry);

    info!(%batch_id, "starting generation pipeline");

    progress.phase("Expanding sub-keywords");
    let expander = SubKeywordExpander::new(backend.clone(), retry.clone());
    let keywords = expander
        .expand(
            &config.seed,
            config.batch.keyword_count,
            &config.batch.options,
        )
        .await?;

    run_with_keywords(config, backend, cancel, progress, batch_id, keywords, start).await
}

/// Run the batch stage against an already-expanded (possibly user-edited)
/// keyword list, then assemble.
#[instrument(skip_all, fields(seed = %config.seed, jobs = keywords.len()))]
pub async fn run_batch(
    config: &PipelineConfig,
    backend: Arc<dyn GenerationBackend>,
    cancel: &CancelHandle,
    progress: &dyn ProgressReporter,
    keywords: Vec<Keyword>,
) -> Result<PipelineResult> {
    if keywords.is_empty() {
        return Err(ArticleForgeError::validation("keyword list must be non-empty"));
    }
    let start = Instant::now();
    let batch_id = BatchId::new();
    run_with_keywords(config, backend, cancel, progress, batch_id, keywords, start).await
}

async fn run_with_keywords(
    config: &PipelineConfig,
    backend: Arc<dyn GenerationBackend>,
    cancel: &CancelHandle,
    progress: &dyn ProgressReporter,
    batch_id: BatchId,
    keywords: Vec<Keyword>,
    start: Instant,
) -> Result<PipelineResult> {
    let retry = RetryPolicy::from_config(&config.retry);

    progress.phase("Generating articles");
    let orchestrator = BatchOrchestrator::new(backend, retry, config.batch.concurrency);
    let jobs = orchestrator
        .run(&keywords, &config.batch.options, cancel, progress)
        .await?;

    progress.phase("Assembling document");
    let outcome = crate::orchestrator::outcome(&jobs);
    let document = assembler::assemble(&config.seed, &jobs);

    let result = PipelineResult {
        batch_id,
        keywords,
        outcome,
        document,
        elapsed: start.elapsed(),
    };

    info!(
        batch_id = %result.batch_id,
        articles = result.outcome.articles.len(),
        failures = result.outcome.failures.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "pipeline complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::progress::SilentProgress;
    use crate::testing::ScriptedBackend;
    use articleforge_shared::{BatchStatus, ErrorKind, GenerationOptions};

    fn test_config(seed: &str, count: u32, concurrency: u32) -> PipelineConfig {
        PipelineConfig {
            seed: seed.into(),
            batch: BatchConfig {
                keyword_count: count,
                concurrency,
                options: GenerationOptions::default(),
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
        }
    }

    /// Distinguishes the expansion prompt from article prompts so one
    /// scripted backend can serve the whole pipeline.
    fn scripted_pipeline_backend() -> ScriptedBackend {
        ScriptedBackend::per_keyword(|prompt| {
            if prompt.starts_with("List ") {
                Ok("1. topic one\n2. topic two\n3. topic three".to_string())
            } else {
                Ok("# Article\n\nBody.".to_string())
            }
        })
    }

    #[tokio::test]
    async fn full_pipeline_produces_document_in_keyword_order() {
        let backend = scripted_pipeline_backend();
        let config = test_config("travel", 3, 2);

        let result = run(
            &config,
            Arc::new(backend),
            &CancelHandle::new(),
            &SilentProgress,
        )
        .await
        .expect("pipeline");

        assert_eq!(result.keywords.len(), 3);
        assert_eq!(result.outcome.status, BatchStatus::Succeeded);
        assert_eq!(result.document.sections.len(), 3);
        assert_eq!(result.document.title, "travel");
    }

    #[tokio::test]
    async fn failed_expansion_blocks_batch_with_zero_article_calls() {
        let backend = ScriptedBackend::always_error(|| ArticleForgeError::AuthInvalid);
        let calls = backend.calls();
        let config = test_config("travel", 10, 3);

        let err = run(
            &config,
            Arc::new(backend),
            &CancelHandle::new(),
            &SilentProgress,
        )
        .await
        .expect_err("should fail");

        assert_eq!(err.kind(), ErrorKind::AuthInvalid);
        // Exactly the one (non-retried) expansion call, no article calls.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_batch_accepts_edited_keywords() {
        let backend = ScriptedBackend::always_text("# A\n\nB.");
        let config = test_config("travel", 2, 2);

        let edited = vec![
            articleforge_shared::Keyword::new(1, "user edited one"),
            articleforge_shared::Keyword::new(2, "user edited two"),
        ];

        let result = run_batch(
            &config,
            Arc::new(backend),
            &CancelHandle::new(),
            &SilentProgress,
            edited,
        )
        .await
        .expect("pipeline");

        assert_eq!(result.outcome.articles.len(), 2);
        assert_eq!(result.keywords[0].text, "user edited one");
    }

    #[tokio::test]
    async fn run_batch_rejects_empty_keywords() {
        let backend = ScriptedBackend::always_text("x");
        let config = test_config("travel", 2, 2);

        let err = run_batch(
            &config,
            Arc::new(backend),
            &CancelHandle::new(),
            &SilentProgress,
            vec![],
        )
        .await
        .expect_err("should fail");
        assert!(err.to_string().contains("non-empty"));
    }
}
