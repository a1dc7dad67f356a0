//! Concurrent article-generation batch orchestrator.
//!
//! Fans out one job per keyword, runs at most `K` jobs in flight at once
//! behind a semaphore, and funnels every state change through a single
//! event loop so job state has exactly one writer. Jobs are independent:
//! one job's failure never aborts its siblings, and the batch always runs
//! every job to a terminal state.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use articleforge_client::{GenerationBackend, GenerationRequest, RetryPolicy};
use articleforge_shared::{
    Article, ArticleForgeError, BatchOutcome, BatchProgress, BatchStatus, ContentLength, ErrorKind,
    GenerationOptions, JobFailure, JobStatus, Keyword, KeywordId, Result,
};

use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Batch-level cancellation signal.
///
/// Raising it stops dispatching new attempts: jobs still pending fail with
/// `Cancelled`, while already in-flight calls finish or time out naturally
/// (forcibly aborting them could leak partial remote-side effects).
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// GenerationJob
// ---------------------------------------------------------------------------

/// One generation job, 1:1 with a keyword, exclusively owned by the
/// orchestrator while the batch runs.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    /// The keyword this job generates an article for.
    pub keyword: Keyword,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Attempts dispatched so far.
    pub attempt: u32,
    /// The article, once the job succeeds.
    pub result: Option<Article>,
    /// Final error kind, once the job fails.
    pub error: Option<ErrorKind>,
}

impl GenerationJob {
    fn new(keyword: Keyword) -> Self {
        Self {
            keyword,
            status: JobStatus::Pending,
            attempt: 0,
            result: None,
            error: None,
        }
    }
}

/// Derive the aggregate outcome from a terminal job set.
pub fn outcome(jobs: &[GenerationJob]) -> BatchOutcome {
    let mut articles = Vec::new();
    let mut failures = Vec::new();

    for job in jobs {
        match job.status {
            JobStatus::Succeeded => {
                if let Some(article) = &job.result {
                    articles.push((job.keyword.clone(), article.clone()));
                }
            }
            JobStatus::Failed => {
                failures.push(JobFailure {
                    id: job.keyword.id,
                    kind: job.error.unwrap_or(ErrorKind::Unknown),
                    attempts: job.attempt,
                });
            }
            _ => {}
        }
    }

    let status = if failures.is_empty() {
        BatchStatus::Succeeded
    } else {
        BatchStatus::PartiallyFailed
    };

    BatchOutcome {
        status,
        articles,
        failures,
    }
}

// ---------------------------------------------------------------------------
// Transition events
// ---------------------------------------------------------------------------

/// State changes a job task reports to the event loop.
enum Transition {
    /// Pending → InFlight: first attempt dispatched.
    Started,
    /// InFlight → Retrying: retryable error, attempts remain.
    Retrying,
    /// Retrying → InFlight: next attempt dispatched.
    Redispatched,
    /// → Succeeded (terminal).
    Succeeded(Box<Article>),
    /// → Failed (terminal).
    Failed { kind: ErrorKind, attempts: u32 },
}

// ---------------------------------------------------------------------------
// BatchOrchestrator
// ---------------------------------------------------------------------------

/// Drives N article-generation jobs to terminal state.
pub struct BatchOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl BatchOrchestrator {
    /// Create an orchestrator. `concurrency` is clamped to at least 1.
    pub fn new(backend: Arc<dyn GenerationBackend>, retry: RetryPolicy, concurrency: u32) -> Self {
        Self {
            backend,
            retry,
            concurrency: concurrency.max(1) as usize,
        }
    }

    /// Run one job per keyword until every job is terminal, reporting
    /// each transition and a fresh progress snapshot along the way.
    ///
    /// Returns the final job set in ascending keyword-id order.
    #[instrument(skip_all, fields(jobs = keywords.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        keywords: &[Keyword],
        options: &GenerationOptions,
        cancel: &CancelHandle,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<GenerationJob>> {
        if keywords.is_empty() {
            return Err(ArticleForgeError::validation("batch requires at least one keyword"));
        }

        let mut jobs: BTreeMap<KeywordId, GenerationJob> = BTreeMap::new();
        for keyword in keywords {
            if jobs.insert(keyword.id, GenerationJob::new(keyword.clone())).is_some() {
                return Err(ArticleForgeError::validation(format!(
                    "duplicate keyword id {}",
                    keyword.id
                )));
            }
        }

        info!(total = jobs.len(), "starting article batch");

        let (tx, mut rx) = mpsc::unbounded_channel::<(KeywordId, Transition)>();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        for keyword in keywords {
            let task = JobTask {
                id: keyword.id,
                prompt: article_prompt(&keyword.text, options),
                fallback_title: keyword.text.clone(),
                max_tokens: max_tokens_for(options.content_length),
                backend: self.backend.clone(),
                retry: self.retry.clone(),
                tx: tx.clone(),
            };
            let semaphore = semaphore.clone();
            let cancelled = cancel.subscribe();
            tokio::spawn(task.run(semaphore, cancelled));
        }
        drop(tx);

        // Event loop: the only writer of job state. Each received event is
        // one serialized transition; the snapshot handed to the reporter is
        // recomputed, never mutated in place.
        let total = jobs.len();
        let mut terminal = 0usize;

        while let Some((id, transition)) = rx.recv().await {
            let Some(job) = jobs.get_mut(&id) else {
                warn!(%id, "transition for unknown job, ignoring");
                continue;
            };
            let previous = job.status;
            if previous.is_terminal() {
                warn!(%id, ?previous, "transition after terminal state, ignoring");
                continue;
            }

            let next = match transition {
                Transition::Started => {
                    job.attempt = 1;
                    JobStatus::InFlight
                }
                Transition::Retrying => JobStatus::Retrying,
                Transition::Redispatched => {
                    job.attempt += 1;
                    JobStatus::InFlight
                }
                Transition::Succeeded(article) => {
                    job.result = Some(*article);
                    JobStatus::Succeeded
                }
                Transition::Failed { kind, attempts } => {
                    job.error = Some(kind);
                    job.attempt = attempts;
                    JobStatus::Failed
                }
            };
            job.status = next;
            debug!(%id, %previous, %next, "job transition");

            if next.is_terminal() {
                terminal += 1;
            }

            progress.on_transition(id, previous, next);
            let snapshot = snapshot_of(&jobs, total);
            progress.on_batch_snapshot(&snapshot);

            if terminal == total {
                break;
            }
        }

        let jobs: Vec<GenerationJob> = jobs.into_values().collect();
        let failed = jobs.iter().filter(|j| j.status == JobStatus::Failed).count();
        info!(total, failed, "article batch complete");

        Ok(jobs)
    }
}

fn snapshot_of(jobs: &BTreeMap<KeywordId, GenerationJob>, total: usize) -> BatchProgress {
    BatchProgress {
        total,
        per_job: jobs.iter().map(|(id, job)| (*id, job.status)).collect(),
    }
}

// ---------------------------------------------------------------------------
// Per-job task
// ---------------------------------------------------------------------------

/// State a single spawned job carries.
struct JobTask {
    id: KeywordId,
    prompt: String,
    fallback_title: String,
    max_tokens: u32,
    backend: Arc<dyn GenerationBackend>,
    retry: RetryPolicy,
    tx: mpsc::UnboundedSender<(KeywordId, Transition)>,
}

impl JobTask {
    fn send(&self, transition: Transition) {
        let _ = self.tx.send((self.id, transition));
    }

    /// Drive one job to a terminal transition. The semaphore permit is
    /// held for the job's entire active life, including the waits between
    /// retry attempts, so at most `K` jobs are InFlight or Retrying.
    async fn run(self, semaphore: Arc<Semaphore>, cancelled: watch::Receiver<bool>) {
        let mut cancelled = cancelled;

        let permit = tokio::select! {
            permit = semaphore.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
            _ = cancelled.wait_for(|c| *c) => {
                // Still pending when the batch was cancelled.
                self.send(Transition::Failed {
                    kind: ErrorKind::Cancelled,
                    attempts: 0,
                });
                return;
            }
        };
        let _permit = permit;

        if *cancelled.borrow() {
            self.send(Transition::Failed {
                kind: ErrorKind::Cancelled,
                attempts: 0,
            });
            return;
        }

        self.send(Transition::Started);

        let mut attempt = 1u32;
        loop {
            let mut request = GenerationRequest::new(self.prompt.clone());
            request.max_tokens = self.max_tokens;

            match self.backend.generate(&request).await {
                Ok(payload) => {
                    let article = article_from_text(&self.fallback_title, &payload.text);
                    self.send(Transition::Succeeded(Box::new(article)));
                    return;
                }
                Err(error) if error.is_retryable() && self.retry.attempts_remain(attempt) => {
                    self.send(Transition::Retrying);
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;

                    if *cancelled.borrow() {
                        // The attempt that would follow is never dispatched.
                        self.send(Transition::Failed {
                            kind: ErrorKind::Cancelled,
                            attempts: attempt,
                        });
                        return;
                    }

                    attempt += 1;
                    self.send(Transition::Redispatched);
                }
                Err(error) => {
                    self.send(Transition::Failed {
                        kind: error.kind(),
                        attempts: attempt,
                    });
                    return;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt & article shaping
// ---------------------------------------------------------------------------

/// Build the per-article prompt from a keyword and batch options.
fn article_prompt(keyword: &str, options: &GenerationOptions) -> String {
    format!(
        "Write a {style}, roughly {words}-word article about \"{keyword}\" \
         for a {audience} audience. Start with a single markdown H1 title \
         line, then the article body in markdown.",
        style = options.content_style,
        words = options.content_length.target_words(),
        audience = options.target_audience,
    )
}

/// Token budget scaled to the requested length.
fn max_tokens_for(length: ContentLength) -> u32 {
    // Rough words→tokens factor of 2, floored for headroom.
    (length.target_words() * 2).max(1024)
}

/// Shape raw generated text into an article: the leading markdown H1 (if
/// any) becomes the title, the remainder the body. Falls back to the
/// keyword as title.
fn article_from_text(fallback_title: &str, text: &str) -> Article {
    let trimmed = text.trim();
    let mut lines = trimmed.lines();

    if let Some(first) = lines.next() {
        let first = first.trim();
        if let Some(heading) = first.strip_prefix('#') {
            let title = heading.trim_start_matches('#').trim();
            if !title.is_empty() {
                let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
                if !body.is_empty() {
                    return Article::new(title, body);
                }
            }
        }
    }

    Article::new(fallback_title, trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::progress::SilentProgress;
    use crate::testing::{ScriptedBackend, fast_retry};

    fn keywords(n: u32) -> Vec<Keyword> {
        (1..=n).map(|i| Keyword::new(i, format!("topic {i}"))).collect()
    }

    fn orchestrator(backend: ScriptedBackend, concurrency: u32) -> BatchOrchestrator {
        BatchOrchestrator::new(Arc::new(backend), fast_retry(3), concurrency)
    }

    /// Records every transition for later assertions.
    struct RecordingProgress {
        transitions: Mutex<Vec<(KeywordId, JobStatus, JobStatus)>>,
        snapshots: Mutex<Vec<BatchProgress>>,
    }

    impl RecordingProgress {
        fn new() -> Self {
            Self {
                transitions: Mutex::new(Vec::new()),
                snapshots: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}

        fn on_transition(&self, job: KeywordId, previous: JobStatus, next: JobStatus) {
            self.transitions.lock().unwrap().push((job, previous, next));
        }

        fn on_batch_snapshot(&self, progress: &BatchProgress) {
            self.snapshots.lock().unwrap().push(progress.clone());
        }
    }

    #[tokio::test]
    async fn all_jobs_succeed_yields_succeeded_batch() {
        let backend = ScriptedBackend::always_text("# Title\n\nBody text here.");
        let orch = orchestrator(backend, 3);

        let jobs = orch
            .run(
                &keywords(10),
                &GenerationOptions::default(),
                &CancelHandle::new(),
                &SilentProgress,
            )
            .await
            .expect("run batch");

        assert_eq!(jobs.len(), 10);
        assert!(jobs.iter().all(|j| j.status == JobStatus::Succeeded));

        let outcome = outcome(&jobs);
        assert_eq!(outcome.status, BatchStatus::Succeeded);
        assert_eq!(outcome.articles.len(), 10);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn one_exhausted_job_yields_partial_failure() {
        // Job 4 is rate limited on every attempt; the rest succeed.
        let backend = ScriptedBackend::per_keyword(|prompt| {
            if prompt.contains("\"topic 4\"") {
                Err(ArticleForgeError::RateLimited)
            } else {
                Ok("# Fine\n\nContent.".to_string())
            }
        });
        let orch = orchestrator(backend, 3);

        let jobs = orch
            .run(
                &keywords(10),
                &GenerationOptions::default(),
                &CancelHandle::new(),
                &SilentProgress,
            )
            .await
            .expect("run batch");

        let outcome = outcome(&jobs);
        assert_eq!(outcome.status, BatchStatus::PartiallyFailed);
        assert_eq!(outcome.articles.len(), 9);
        assert_eq!(outcome.failures.len(), 1);

        let failure = outcome.failures[0];
        assert_eq!(failure.id, KeywordId(4));
        assert_eq!(failure.kind, ErrorKind::RateLimited);
        assert_eq!(failure.attempts, 3);
    }

    #[tokio::test]
    async fn completed_plus_failed_equals_total_for_any_concurrency() {
        for k in [1u32, 2, 5, 10] {
            let backend = ScriptedBackend::per_keyword(|prompt| {
                if prompt.contains("\"topic 2\"") || prompt.contains("\"topic 7\"") {
                    Err(ArticleForgeError::Malformed("bad".into()))
                } else {
                    Ok("article body".to_string())
                }
            });
            let orch = orchestrator(backend, k);

            let jobs = orch
                .run(
                    &keywords(10),
                    &GenerationOptions::default(),
                    &CancelHandle::new(),
                    &SilentProgress,
                )
                .await
                .expect("run batch");

            let outcome = outcome(&jobs);
            assert_eq!(
                outcome.articles.len() + outcome.failures.len(),
                10,
                "K={k}"
            );
            assert_eq!(outcome.failures.len(), 2, "K={k}");
        }
    }

    #[tokio::test]
    async fn concurrency_limit_is_respected() {
        let backend = ScriptedBackend::always_text("body").with_delay(Duration::from_millis(20));
        let peak = backend.peak_concurrency();
        let orch = orchestrator(backend, 3);

        orch.run(
            &keywords(10),
            &GenerationOptions::default(),
            &CancelHandle::new(),
            &SilentProgress,
        )
        .await
        .expect("run batch");

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn job_output_order_is_by_id_despite_reverse_completion() {
        // Lower ids sleep longer, so completion order is roughly reversed.
        let backend = ScriptedBackend::per_keyword_async(|prompt| {
            let delay = if prompt.contains("\"topic 1\"") {
                50
            } else if prompt.contains("\"topic 2\"") {
                30
            } else {
                5
            };
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok("body".to_string())
            }
        });
        let orch = orchestrator(backend, 5);

        let jobs = orch
            .run(
                &keywords(5),
                &GenerationOptions::default(),
                &CancelHandle::new(),
                &SilentProgress,
            )
            .await
            .expect("run batch");

        let ids: Vec<u32> = jobs.iter().map(|j| j.keyword.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn transitions_within_a_job_follow_the_state_machine() {
        let backend = ScriptedBackend::fail_n_times(2, || ArticleForgeError::Timeout, "body");
        let orch = BatchOrchestrator::new(Arc::new(backend), fast_retry(3), 1);
        let recorder = RecordingProgress::new();

        let jobs = orch
            .run(
                &keywords(1),
                &GenerationOptions::default(),
                &CancelHandle::new(),
                &recorder,
            )
            .await
            .expect("run batch");

        assert_eq!(jobs[0].status, JobStatus::Succeeded);
        assert_eq!(jobs[0].attempt, 3);

        let transitions = recorder.transitions.lock().unwrap();
        let expected = [
            (JobStatus::Pending, JobStatus::InFlight),
            (JobStatus::InFlight, JobStatus::Retrying),
            (JobStatus::Retrying, JobStatus::InFlight),
            (JobStatus::InFlight, JobStatus::Retrying),
            (JobStatus::Retrying, JobStatus::InFlight),
            (JobStatus::InFlight, JobStatus::Succeeded),
        ];
        let actual: Vec<(JobStatus, JobStatus)> =
            transitions.iter().map(|(_, p, n)| (*p, *n)).collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn every_snapshot_satisfies_the_count_invariant() {
        let backend = ScriptedBackend::per_keyword(|prompt| {
            if prompt.contains("\"topic 3\"") {
                Err(ArticleForgeError::Malformed("bad".into()))
            } else {
                Ok("body".to_string())
            }
        });
        let orch = orchestrator(backend, 2);
        let recorder = RecordingProgress::new();

        orch.run(
            &keywords(6),
            &GenerationOptions::default(),
            &CancelHandle::new(),
            &recorder,
        )
        .await
        .expect("run batch");

        let snapshots = recorder.snapshots.lock().unwrap();
        assert!(!snapshots.is_empty());
        for snapshot in snapshots.iter() {
            assert_eq!(
                snapshot.completed()
                    + snapshot.failed()
                    + snapshot.pending()
                    + snapshot.in_flight(),
                snapshot.total
            );
        }
        assert!(snapshots.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn cancellation_fails_pending_jobs_but_finishes_running_ones() {
        let backend = ScriptedBackend::always_text("body").with_delay(Duration::from_millis(40));
        let orch = orchestrator(backend, 1);
        let cancel = CancelHandle::new();

        let cancel_trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel_trigger.cancel();
        });

        let jobs = orch
            .run(
                &keywords(4),
                &GenerationOptions::default(),
                &cancel,
                &SilentProgress,
            )
            .await
            .expect("run batch");

        // Exactly one job held the permit at cancellation time and runs to
        // completion; the rest were pending and fail with Cancelled.
        let succeeded = jobs.iter().filter(|j| j.status == JobStatus::Succeeded).count();
        assert_eq!(succeeded, 1);
        for job in jobs.iter().filter(|j| j.status == JobStatus::Failed) {
            assert_eq!(job.error, Some(ErrorKind::Cancelled));
        }

        let outcome = outcome(&jobs);
        assert_eq!(outcome.status, BatchStatus::PartiallyFailed);
        assert_eq!(outcome.articles.len() + outcome.failures.len(), 4);
    }

    #[tokio::test]
    async fn duplicate_keyword_ids_rejected() {
        let backend = ScriptedBackend::always_text("body");
        let orch = orchestrator(backend, 2);

        let dupes = vec![Keyword::new(1, "a"), Keyword::new(1, "b")];
        let err = orch
            .run(
                &dupes,
                &GenerationOptions::default(),
                &CancelHandle::new(),
                &SilentProgress,
            )
            .await
            .expect_err("should reject");
        assert!(err.to_string().contains("duplicate keyword id"));
    }

    #[test]
    fn article_title_extracted_from_h1() {
        let article = article_from_text("fallback", "# Real Title\n\nBody line.");
        assert_eq!(article.title, "Real Title");
        assert_eq!(article.content, "Body line.");

        let article = article_from_text("fallback", "no heading here");
        assert_eq!(article.title, "fallback");
        assert_eq!(article.content, "no heading here");
    }
}
