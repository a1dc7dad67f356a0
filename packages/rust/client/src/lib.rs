//! Generation API client for ArticleForge.
//!
//! Provides the [`GenerationBackend`] seam (one deterministic remote
//! attempt per call), the reqwest-based [`HttpGenerationClient`], and the
//! [`RetryPolicy`] that callers wrap around backend calls.

pub mod http_backend;
pub mod retry;
pub mod types;

pub use http_backend::HttpGenerationClient;
pub use retry::{Exhausted, RetryPolicy};
pub use types::{GenerationBackend, GenerationPayload, GenerationRequest};
