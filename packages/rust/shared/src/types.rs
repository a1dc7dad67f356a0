//! Core domain types for ArticleForge generation batches.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArticleForgeError, ErrorKind};

// ---------------------------------------------------------------------------
// BatchId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for batch identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Generate a new time-sortable batch identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Keyword
// ---------------------------------------------------------------------------

/// Identifier for a keyword and its one-to-one generation job.
///
/// Ids are assigned `1..=count` by the expander and are stable for the
/// lifetime of a session; presentation order is always ascending id order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct KeywordId(pub u32);

impl std::fmt::Display for KeywordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One derived sub-keyword, editable by the user before the batch starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    /// Unique, stable identifier within the session.
    pub id: KeywordId,
    /// The keyword text; mutated only by explicit user edit.
    pub text: String,
    /// Whether the UI may edit this entry.
    pub editable: bool,
}

impl Keyword {
    /// Create an editable keyword.
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id: KeywordId(id),
            text: text.into(),
            editable: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Generation options
// ---------------------------------------------------------------------------

/// Writing tone for generated articles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStyle {
    #[default]
    Informative,
    Friendly,
    Professional,
}

/// Target article length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ContentLength {
    /// Approximate word-count target used when prompting.
    pub fn target_words(&self) -> u32 {
        match self {
            Self::Short => 300,
            Self::Medium => 600,
            Self::Long => 1200,
        }
    }
}

/// Intended readership for generated articles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetAudience {
    #[default]
    General,
    Beginner,
    Expert,
}

/// Options applied to every article in a batch.
///
/// Field names at the API boundary are a stable contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    pub content_style: ContentStyle,
    pub content_length: ContentLength,
    pub target_audience: TargetAudience,
}

impl std::fmt::Display for ContentStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Informative => "informative",
            Self::Friendly => "friendly",
            Self::Professional => "professional",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ContentStyle {
    type Err = ArticleForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "informative" => Ok(Self::Informative),
            "friendly" => Ok(Self::Friendly),
            "professional" => Ok(Self::Professional),
            other => Err(ArticleForgeError::validation(format!(
                "unknown content style: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ContentLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ContentLength {
    type Err = ArticleForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(ArticleForgeError::validation(format!(
                "unknown content length: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TargetAudience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::General => "general",
            Self::Beginner => "beginner",
            Self::Expert => "expert",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TargetAudience {
    type Err = ArticleForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "beginner" => Ok(Self::Beginner),
            "expert" => Ok(Self::Expert),
            other => Err(ArticleForgeError::validation(format!(
                "unknown target audience: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// A generated article. Immutable once produced by a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Article title.
    pub title: String,
    /// Article body (structured markup, typically Markdown).
    pub content: String,
    /// Whitespace-delimited word count of the body.
    pub word_count: usize,
    /// When the article was produced.
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Build an article from a title and body, counting words now.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count();
        Self {
            title: title.into(),
            content,
            word_count,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Job status & batch progress
// ---------------------------------------------------------------------------

/// Lifecycle state of a single generation job.
///
/// `Pending → InFlight → {Succeeded | Retrying → InFlight | Failed}`.
/// Terminal states (`Succeeded`, `Failed`) are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InFlight,
    Retrying,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Whether this state can never be left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Value snapshot of batch-wide progress, recomputed (never mutated in
/// place) after every job transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Total number of jobs in the batch.
    pub total: usize,
    /// Per-job status keyed by keyword id (ascending).
    pub per_job: BTreeMap<KeywordId, JobStatus>,
}

impl BatchProgress {
    fn count(&self, status: JobStatus) -> usize {
        self.per_job.values().filter(|s| **s == status).count()
    }

    /// Jobs that reached `Succeeded`.
    pub fn completed(&self) -> usize {
        self.count(JobStatus::Succeeded)
    }

    /// Jobs that reached `Failed`.
    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    /// Jobs not yet dispatched.
    pub fn pending(&self) -> usize {
        self.count(JobStatus::Pending)
    }

    /// Jobs currently running or waiting between attempts.
    pub fn in_flight(&self) -> usize {
        self.count(JobStatus::InFlight) + self.count(JobStatus::Retrying)
    }

    /// Whether every job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.completed() + self.failed() == self.total
    }
}

// ---------------------------------------------------------------------------
// Batch outcome
// ---------------------------------------------------------------------------

/// How a finished job failed, surfaced per keyword in the batch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// The keyword whose job failed.
    pub id: KeywordId,
    /// Final error kind after retries were resolved.
    pub kind: ErrorKind,
    /// Number of attempts made before giving up.
    pub attempts: u32,
}

/// Terminal status of a whole batch.
///
/// A batch is `Succeeded` only if every job succeeded; any failed job
/// makes it `PartiallyFailed` (siblings still run to completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Succeeded,
    PartiallyFailed,
}

/// Final result of running a batch to termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Aggregate status.
    pub status: BatchStatus,
    /// Successful articles paired with their keyword, ascending id order.
    pub articles: Vec<(Keyword, Article)>,
    /// Failed jobs with final error kind and attempt count, ascending id order.
    pub failures: Vec<JobFailure>,
}

// ---------------------------------------------------------------------------
// Export document
// ---------------------------------------------------------------------------

/// One section of an assembled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    /// Section heading (the article title).
    pub heading: String,
    /// Section body (the article content).
    pub body: String,
}

/// Export-ready document built from the succeeded jobs of one batch.
///
/// The export collaborator (PDF/Word encoder) consumes this; the core has
/// no knowledge of those binary formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Document title (derived from the seed keyword).
    pub title: String,
    /// When assembly ran.
    pub generated_at: DateTime<Utc>,
    /// Sections in ascending keyword-id order.
    pub sections: Vec<DocumentSection>,
}
