//! Core generation-orchestration pipeline for ArticleForge.
//!
//! This crate ties together sub-keyword expansion, the concurrent article
//! batch state machine, and document assembly into end-to-end workflows.

pub mod assembler;
pub mod expander;
pub mod export;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;

#[cfg(test)]
mod testing;

pub use expander::SubKeywordExpander;
pub use export::{DocumentExporter, JsonExporter, MarkdownExporter};
pub use orchestrator::{BatchOrchestrator, CancelHandle, GenerationJob, outcome};
pub use pipeline::{PipelineConfig, PipelineResult};
pub use progress::{ProgressReporter, SilentProgress};
