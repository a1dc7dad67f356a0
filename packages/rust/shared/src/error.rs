//! Error types for ArticleForge.
//!
//! Library crates use [`ArticleForgeError`] via `thiserror`.
//! App crates (cli) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ArticleForge operations.
///
/// The remote-call variants (`AuthInvalid` through `Unknown`) form the
/// stable error taxonomy surfaced per job at the API boundary; the rest
/// are local plumbing (config, I/O, validation).
#[derive(Debug, thiserror::Error)]
pub enum ArticleForgeError {
    /// The generation API rejected the supplied credential.
    #[error("authentication failed: the API key was rejected")]
    AuthInvalid,

    /// The generation API throttled the request (retryable).
    #[error("rate limited by the generation API")]
    RateLimited,

    /// The remote call did not complete within the per-call timeout (retryable).
    #[error("generation request timed out")]
    Timeout,

    /// The response arrived but failed schema validation. The raw payload
    /// is discarded; no partial data is ever surfaced as success.
    #[error("malformed response from the generation API: {0}")]
    Malformed(String),

    /// A well-formed response could not be decomposed into keyword candidates.
    #[error("could not parse keywords from response: {0}")]
    ParseFailed(String),

    /// The batch was cancelled before this work was dispatched.
    #[error("cancelled before dispatch")]
    Cancelled,

    /// Transport failure or an unrecognized remote error.
    #[error("generation API error: {0}")]
    Unknown(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (empty seed, zero count, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArticleForgeError>;

impl ArticleForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable kind string, used at the API boundary and
    /// in per-job failure reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthInvalid => ErrorKind::AuthInvalid,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::Timeout => ErrorKind::Timeout,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::ParseFailed(_) => ErrorKind::ParseFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Unknown(_) => ErrorKind::Unknown,
            Self::Config { .. } | Self::Io { .. } | Self::Validation { .. } => ErrorKind::Unknown,
        }
    }

    /// Whether a retry of the same call could plausibly succeed.
    ///
    /// Throttling and timeouts are transient; a rejected credential or a
    /// schema mismatch cannot be fixed by trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }
}

/// Value-only mirror of the remote error taxonomy, serialized into
/// progress snapshots and batch outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthInvalid,
    RateLimited,
    Timeout,
    Malformed,
    ParseFailed,
    Cancelled,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AuthInvalid => "auth_invalid",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Malformed => "malformed",
            Self::ParseFailed => "parse_failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
