//! Progress observation for pipeline and batch execution.

use articleforge_shared::{BatchProgress, JobStatus, KeywordId};

/// Observer the orchestrator pushes state transitions through; UI/CLI
/// subscribe by implementing this.
///
/// Both callbacks are invoked synchronously in the task that applied the
/// transition. Transitions for one job always arrive in lifecycle order;
/// transitions across different jobs carry no ordering guarantee.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new pipeline phase.
    fn phase(&self, name: &str);
    /// Called for every job state transition.
    fn on_transition(&self, job: KeywordId, previous: JobStatus, next: JobStatus);
    /// Called with a fresh snapshot after every transition.
    fn on_batch_snapshot(&self, progress: &BatchProgress);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn on_transition(&self, _job: KeywordId, _previous: JobStatus, _next: JobStatus) {}
    fn on_batch_snapshot(&self, _progress: &BatchProgress) {}
}
