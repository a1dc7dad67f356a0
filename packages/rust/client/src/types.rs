//! Request/response types and the backend seam for the generation API.

use async_trait::async_trait;

use articleforge_shared::Result;

/// A single generation request: one prompt, one remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Prompt text sent to the model. Must be non-empty.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl GenerationRequest {
    /// Create a request with default sampling parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// A successful generation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPayload {
    /// The generated text.
    pub text: String,
    /// Model that produced the text (as reported by the API).
    pub model: String,
    /// Wall-clock latency of the remote call.
    pub latency_ms: u64,
}

/// A single deterministic attempt against the generation API.
///
/// Implementations perform exactly one network call and never retry;
/// retry is the caller's responsibility via [`crate::RetryPolicy`].
/// Core code and tests depend on this trait, not on a concrete transport.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Issue one request and return the typed payload or a typed failure.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationPayload>;
}
