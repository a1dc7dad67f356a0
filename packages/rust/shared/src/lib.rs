//! Shared types, error model, and configuration for ArticleForge.
//!
//! This crate is the foundation depended on by all other ArticleForge crates.
//! It provides:
//! - [`ArticleForgeError`] — the unified error type
//! - Domain types ([`Keyword`], [`Article`], [`BatchProgress`], [`ExportDocument`])
//! - Configuration ([`AppConfig`], [`BatchConfig`], config loading)
//! - Front-end boundary envelopes ([`api`])

pub mod api;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiKey, AppConfig, BatchConfig, DefaultsConfig, GeneratorConfig, RetryConfig, config_dir,
    config_file_path, init_config, load_api_key, load_config, load_config_from,
};
pub use error::{ArticleForgeError, ErrorKind, Result};
pub use types::{
    Article, BatchId, BatchOutcome, BatchProgress, BatchStatus, ContentLength, ContentStyle,
    DocumentSection, ExportDocument, GenerationOptions, JobFailure, JobStatus, Keyword, KeywordId,
    TargetAudience,
};
