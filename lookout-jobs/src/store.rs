//! Concurrency-safe job records.
//!
//! Records are created `pending` by a submission and then only ever written by
//! their own run through the guarded transitions below. Readers get cloned
//! snapshots, so a poll never observes a half-applied transition.
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lookout_social::twitter::{Profile, Progress, SyncSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::JobError;

pub(crate) const CREATED_PROGRESS: &str = "Job created, starting soon...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Discovery,
    PostSync,
}

/// What a completed job produced. Serialized without a tag: a discovery result
/// is the ranked profile list itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    Discovery(Vec<Profile>),
    PostSync(SyncSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub usernames: Vec<String>,
    pub progress: String,
    /// Present only when `status` is `completed`.
    pub result: Option<JobOutput>,
    /// Present only when `status` is `failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<Uuid, CrawlJob>>,
    settled: Arc<Notify>,
}

impl fmt::Debug for JobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobStore").field("jobs", &self.jobs.len()).finish()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `pending` record.
    pub fn create(&self, kind: JobKind, usernames: Vec<String>) -> CrawlJob {
        let job = CrawlJob {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Pending,
            usernames,
            progress: CREATED_PROGRESS.to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        self.jobs.insert(job.id, job.clone());
        job
    }

    pub fn get(&self, id: &Uuid) -> Option<CrawlJob> {
        self.jobs.get(id).map(|j| j.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshots of every record, newest first.
    pub fn list(&self) -> Vec<CrawlJob> {
        let mut all: Vec<CrawlJob> = self.jobs.iter().map(|j| j.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    fn transition(
        &self,
        id: &Uuid,
        allowed: &[JobStatus],
        to: JobStatus,
        apply: impl FnOnce(&mut CrawlJob),
    ) -> Result<CrawlJob, JobError> {
        let mut entry = self.jobs.get_mut(id).ok_or(JobError::NotFound(*id))?;
        let from = entry.status;
        if !allowed.contains(&from) {
            return Err(JobError::InvalidTransition { id: *id, from, to });
        }
        entry.status = to;
        apply(&mut *entry);
        debug!(job_id = %id, %from, %to, "jobs.transition");
        let snapshot = entry.value().clone();
        drop(entry);
        if to.is_terminal() {
            self.settled.notify_waiters();
        }
        Ok(snapshot)
    }

    pub fn mark_running(&self, id: &Uuid) -> Result<CrawlJob, JobError> {
        self.transition(id, &[JobStatus::Pending], JobStatus::Running, |job| {
            job.started_at = Some(Utc::now());
        })
    }

    pub fn complete(&self, id: &Uuid, output: JobOutput) -> Result<CrawlJob, JobError> {
        self.transition(id, &[JobStatus::Running], JobStatus::Completed, |job| {
            if let JobOutput::Discovery(profiles) = &output {
                job.progress = format!("Completed! Discovered {} profiles", profiles.len());
            }
            job.result = Some(output);
            job.completed_at = Some(Utc::now());
        })
    }

    /// A job cancelled before it started fails straight from `pending`.
    pub fn fail(&self, id: &Uuid, error: impl Into<String>) -> Result<CrawlJob, JobError> {
        let error = error.into();
        self.transition(
            id,
            &[JobStatus::Pending, JobStatus::Running],
            JobStatus::Failed,
            |job| {
                job.error = Some(error);
                job.completed_at = Some(Utc::now());
            },
        )
    }

    /// Replace the progress line. Ignored once the job is terminal.
    pub fn set_progress(&self, id: &Uuid, line: impl Into<String>) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if !job.status.is_terminal() {
                job.progress = line.into();
            }
        }
    }

    /// Resolve once the job reaches a terminal state. `None` for unknown ids.
    pub async fn wait_settled(&self, id: &Uuid) -> Option<CrawlJob> {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let job = self.get(id)?;
            if job.status.is_terminal() {
                return Some(job);
            }
            notified.await;
        }
    }
}

/// [`Progress`] sink writing into one job's record.
pub struct JobProgress {
    store: JobStore,
    id: Uuid,
}

impl JobProgress {
    pub fn new(store: JobStore, id: Uuid) -> Self {
        Self { store, id }
    }
}

impl Progress for JobProgress {
    fn update(&self, line: String) {
        self.store.set_progress(&self.id, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_job() -> (JobStore, Uuid) {
        let store = JobStore::new();
        let job = store.create(JobKind::Discovery, vec!["alice".into()]);
        (store, job.id)
    }

    #[test]
    fn new_jobs_start_pending() {
        let (store, id) = store_with_job();
        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, CREATED_PROGRESS);
        assert!(job.started_at.is_none() && job.result.is_none() && job.error.is_none());
    }

    #[test]
    fn happy_path_stamps_times_and_result() {
        let (store, id) = store_with_job();
        store.mark_running(&id).unwrap();
        let done = store
            .complete(&id, JobOutput::Discovery(vec![Profile::default()]))
            .unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.started_at.is_some());
        assert!(done.completed_at >= done.started_at);
        assert_eq!(done.progress, "Completed! Discovered 1 profiles");
        assert!(done.error.is_none());
    }

    #[test]
    fn completing_a_pending_job_is_rejected() {
        let (store, id) = store_with_job();
        let err = store.complete(&id, JobOutput::Discovery(vec![])).unwrap_err();
        assert_eq!(
            err,
            JobError::InvalidTransition {
                id,
                from: JobStatus::Pending,
                to: JobStatus::Completed
            }
        );
    }

    #[test]
    fn terminal_records_never_transition_again() {
        let (store, id) = store_with_job();
        store.mark_running(&id).unwrap();
        store.fail(&id, "boom").unwrap();

        assert!(store.mark_running(&id).is_err());
        assert!(store.complete(&id, JobOutput::Discovery(vec![])).is_err());
        assert!(store.fail(&id, "again").is_err());

        store.set_progress(&id, "late update");
        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.result.is_none());
        assert_ne!(job.progress, "late update");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let store = JobStore::new();
        let id = Uuid::new_v4();
        assert!(store.get(&id).is_none());
        assert_eq!(store.mark_running(&id).unwrap_err(), JobError::NotFound(id));
    }

    #[test]
    fn progress_sink_updates_record() {
        let (store, id) = store_with_job();
        let progress = JobProgress::new(store.clone(), id);
        progress.update("Scraping seed profile 1/1: @alice".into());
        assert_eq!(store.get(&id).unwrap().progress, "Scraping seed profile 1/1: @alice");
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(JobStatus::Completed).unwrap(),
            serde_json::json!("completed")
        );
        assert_eq!(
            serde_json::to_value(JobKind::PostSync).unwrap(),
            serde_json::json!("post_sync")
        );
    }

    #[tokio::test]
    async fn wait_settled_resolves_on_terminal_transition() {
        let (store, id) = store_with_job();
        store.mark_running(&id).unwrap();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_settled(&id).await })
        };
        tokio::task::yield_now().await;
        store.complete(&id, JobOutput::Discovery(vec![])).unwrap();

        let job = waiter.await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }
}
