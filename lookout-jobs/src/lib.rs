//! Background crawl jobs.
//!
//! [`JobStore`] is the concurrency-safe record of every job and its small state
//! machine (`pending → running → completed | failed`). [`JobRunner`] accepts
//! submissions, dispatches each job onto its own task with its own browser
//! session, and owns the cancellation tree used by `cancel` and shutdown.
use lookout_common::LookoutError;
use uuid::Uuid;

pub mod runner;
pub mod store;

pub use runner::{JobRunner, RunnerSettings};
pub use store::{CrawlJob, JobKind, JobOutput, JobProgress, JobStatus, JobStore};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("at least one username is required")]
    EmptyUsernames,

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job runner is shutting down")]
    ShuttingDown,
}

impl From<JobError> for LookoutError {
    fn from(err: JobError) -> Self {
        LookoutError::Job(err.to_string())
    }
}
