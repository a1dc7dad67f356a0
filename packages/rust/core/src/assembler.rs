//! Document assembly from a terminal job set.
//!
//! A pure, synchronous transform: succeeded jobs in, export-ready document
//! out. Safe to call repeatedly on the same completed set.

use chrono::Utc;
use tracing::debug;

use articleforge_shared::{DocumentSection, ExportDocument, JobStatus};

use crate::orchestrator::GenerationJob;

/// Build an [`ExportDocument`] from the succeeded jobs.
///
/// Sections appear in ascending keyword-id order regardless of the order
/// jobs completed in; failed or non-terminal jobs contribute nothing.
pub fn assemble(title: &str, jobs: &[GenerationJob]) -> ExportDocument {
    let mut succeeded: Vec<&GenerationJob> = jobs
        .iter()
        .filter(|job| job.status == JobStatus::Succeeded && job.result.is_some())
        .collect();
    succeeded.sort_by_key(|job| job.keyword.id);

    let sections: Vec<DocumentSection> = succeeded
        .iter()
        .filter_map(|job| job.result.as_ref())
        .map(|article| DocumentSection {
            heading: article.title.clone(),
            body: article.content.clone(),
        })
        .collect();

    debug!(sections = sections.len(), "document assembled");

    ExportDocument {
        title: title.to_string(),
        generated_at: Utc::now(),
        sections,
    }
}
