//! Scripted generation backend shared by the core crate's unit tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use articleforge_client::{
    GenerationBackend, GenerationPayload, GenerationRequest, RetryPolicy,
};
use articleforge_shared::{ArticleForgeError, Result};

type Script =
    Box<dyn Fn(&str) -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync>;

/// A backend whose responses are scripted against the incoming prompt.
/// Counts calls and tracks peak concurrency for limit assertions.
pub(crate) struct ScriptedBackend {
    script: Script,
    delay: Option<Duration>,
    calls: Arc<AtomicU32>,
    current: Arc<AtomicU32>,
    peak: Arc<AtomicU32>,
}

impl ScriptedBackend {
    pub fn per_keyword_async<F, Fut>(f: F) -> Self
    where
        F: Fn(&str) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            script: Box::new(move |prompt| Box::pin(f(prompt))),
            delay: None,
            calls: Arc::new(AtomicU32::new(0)),
            current: Arc::new(AtomicU32::new(0)),
            peak: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn per_keyword<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self::per_keyword_async(move |prompt| {
            let result = f(prompt);
            async move { result }
        })
    }

    pub fn always_text(text: &str) -> Self {
        let text = text.to_string();
        Self::per_keyword(move |_| Ok(text.clone()))
    }

    pub fn always_error<E>(err: E) -> Self
    where
        E: Fn() -> ArticleForgeError + Send + Sync + 'static,
    {
        Self::per_keyword(move |_| Err(err()))
    }

    /// Fail the first `n` calls, then return `then` on every later call.
    pub fn fail_n_times<E>(n: u32, err: E, then: &str) -> Self
    where
        E: Fn() -> ArticleForgeError + Send + Sync + 'static,
    {
        let counter = AtomicU32::new(0);
        let then = then.to_string();
        Self::per_keyword(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < n {
                Err(err())
            } else {
                Ok(then.clone())
            }
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared call counter, valid after `self` moves into the orchestrator.
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    /// Highest number of generate calls observed in flight at once.
    pub fn peak_concurrency(&self) -> Arc<AtomicU32> {
        self.peak.clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = (self.script)(&request.prompt).await;

        self.current.fetch_sub(1, Ordering::SeqCst);

        result.map(|text| GenerationPayload {
            text,
            model: "scripted".into(),
            latency_ms: 0,
        })
    }
}

/// Retry policy with millisecond backoff so tests stay fast.
pub(crate) fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(1),
        Duration::from_millis(2),
    )
}
