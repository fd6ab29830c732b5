//! Job dispatch, admission and cancellation.
//!
//! Every submitted job runs on its own task tracked by a [`TaskTracker`], opens
//! its own browser session and observes a child of the runner's root
//! [`CancellationToken`]. Cancelling one job fires its child token; shutdown
//! fires the root and waits for every task to close its session.
//!
//! Admission is opt-in: with `max_concurrent` set, jobs wait in `pending` for a
//! semaphore permit before a session is opened.
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use lookout_common::LookoutError;
use lookout_drivers::{BrowserSession, SessionFactory};
use lookout_http::HttpClient;
use lookout_social::sink::{HttpSink, PostSink, SinkTarget};
use lookout_social::twitter::{
    DiscoveryLimits, DiscoveryOrchestrator, Extractor, Pacing, Post, PostSyncer, Profile,
    TwitterScraper,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{CrawlJob, JobKind, JobOutput, JobProgress, JobStore};
use crate::JobError;

const QUEUED_PROGRESS: &str = "Waiting for a free browser slot...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub pacing: Pacing,
    pub limits: DiscoveryLimits,
    /// Posts collected per account by a post sync job.
    pub sync_posts: usize,
    pub max_no_growth_attempts: u32,
    /// Jobs allowed to hold a browser session at once. `None` is unbounded.
    pub max_concurrent: Option<usize>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            limits: DiscoveryLimits::default(),
            sync_posts: 20,
            max_no_growth_attempts: 10,
            max_concurrent: None,
        }
    }
}

enum Work {
    Discovery {
        usernames: Vec<String>,
        sink: Option<Arc<dyn PostSink>>,
    },
    PostSync {
        usernames: Vec<String>,
        sink: Arc<dyn PostSink>,
    },
}

struct Inner {
    store: JobStore,
    sessions: Arc<dyn SessionFactory>,
    extractor: Arc<Extractor>,
    settings: RunnerSettings,
    http: HttpClient,
    tracker: TaskTracker,
    root: CancellationToken,
    tokens: DashMap<Uuid, CancellationToken>,
    admission: Option<Arc<Semaphore>>,
}

#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<Inner>,
}

impl JobRunner {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        extractor: Arc<Extractor>,
        settings: RunnerSettings,
    ) -> Result<Self, LookoutError> {
        let http = HttpClient::new().map_err(|e| LookoutError::Config(e.to_string()))?;
        Ok(Self::with_http(sessions, extractor, settings, http))
    }

    pub fn with_http(
        sessions: Arc<dyn SessionFactory>,
        extractor: Arc<Extractor>,
        settings: RunnerSettings,
        http: HttpClient,
    ) -> Self {
        let admission = settings
            .max_concurrent
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        Self {
            inner: Arc::new(Inner {
                store: JobStore::new(),
                sessions,
                extractor,
                settings,
                http,
                tracker: TaskTracker::new(),
                root: CancellationToken::new(),
                tokens: DashMap::new(),
                admission,
            }),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.inner.store
    }

    pub fn get(&self, id: &Uuid) -> Option<CrawlJob> {
        self.inner.store.get(id)
    }

    /// Start a discovery job. Posts of resolved seeds go to `sink` when given.
    pub fn submit_discovery(
        &self,
        usernames: Vec<String>,
        sink: Option<SinkTarget>,
    ) -> Result<CrawlJob, JobError> {
        let usernames = clean_usernames(usernames)?;
        let sink = sink.map(|t| self.sink(t));
        self.submit(
            JobKind::Discovery,
            usernames.clone(),
            Work::Discovery { usernames, sink },
        )
    }

    /// Start a post sync job delivering to `sink`.
    pub fn submit_post_sync(
        &self,
        usernames: Vec<String>,
        sink: SinkTarget,
    ) -> Result<CrawlJob, JobError> {
        let usernames = clean_usernames(usernames)?;
        let sink = self.sink(sink);
        self.submit(
            JobKind::PostSync,
            usernames.clone(),
            Work::PostSync { usernames, sink },
        )
    }

    fn sink(&self, target: SinkTarget) -> Arc<dyn PostSink> {
        Arc::new(HttpSink::with_client(self.inner.http.clone(), target))
    }

    fn submit(&self, kind: JobKind, usernames: Vec<String>, work: Work) -> Result<CrawlJob, JobError> {
        if self.inner.root.is_cancelled() {
            return Err(JobError::ShuttingDown);
        }
        let seeds = usernames.len();
        let job = self.inner.store.create(kind, usernames);
        let token = self.inner.root.child_token();
        self.inner.tokens.insert(job.id, token.clone());

        let inner = Arc::clone(&self.inner);
        let id = job.id;
        self.inner
            .tracker
            .spawn(async move { inner.execute(id, work, token).await });

        info!(job_id = %job.id, ?kind, seeds, "jobs.submitted");
        Ok(job)
    }

    /// Request cancellation. Terminal jobs are returned unchanged.
    pub fn cancel(&self, id: &Uuid) -> Result<CrawlJob, JobError> {
        let job = self.inner.store.get(id).ok_or(JobError::NotFound(*id))?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        if let Some(token) = self.inner.tokens.get(id) {
            token.cancel();
            info!(job_id = %id, "jobs.cancel_requested");
        }
        Ok(job)
    }

    /// Resolve once the job is terminal.
    pub async fn wait(&self, id: &Uuid) -> Option<CrawlJob> {
        self.inner.store.wait_settled(id).await
    }

    /// Cancel every job and wait up to `grace` for their sessions to close.
    /// Returns `false` if tasks were still running when the grace period ended.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.inner.root.cancel();
        self.inner.tracker.close();
        info!(running = self.inner.tracker.len(), "jobs.shutdown");
        match tokio::time::timeout(grace, self.inner.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(remaining = self.inner.tracker.len(), "jobs.shutdown.timed_out");
                false
            }
        }
    }

    /// Fetch one profile on a short-lived session.
    pub async fn fetch_profile(&self, username: &str) -> Result<Profile, LookoutError> {
        let cancel = self.inner.root.child_token();
        let _permit = self.inner.admit(&cancel).await?;
        let mut scraper = self.inner.open_scraper(&cancel).await?;
        let out = scraper.fetch_profile(username).await;
        if let Err(e) = scraper.close().await {
            warn!(error = %e, "jobs.session.close_failed");
        }
        out
    }

    /// Collect up to `max` posts on a short-lived session.
    pub async fn collect_posts(&self, username: &str, max: usize) -> Result<Vec<Post>, LookoutError> {
        let cancel = self.inner.root.child_token();
        let _permit = self.inner.admit(&cancel).await?;
        let mut scraper = self.inner.open_scraper(&cancel).await?;
        let out = scraper.collect_posts(username, max).await;
        if let Err(e) = scraper.close().await {
            warn!(error = %e, "jobs.session.close_failed");
        }
        out
    }
}

impl Inner {
    async fn admit(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<OwnedSemaphorePermit>, LookoutError> {
        let Some(slots) = &self.admission else {
            return Ok(None);
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(LookoutError::Cancelled),
            permit = Arc::clone(slots).acquire_owned() => permit
                .map(Some)
                .map_err(|_| LookoutError::Job("admission closed".to_string())),
        }
    }

    async fn open_scraper(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TwitterScraper<Box<dyn BrowserSession>>, LookoutError> {
        let session = self.sessions.open().await?;
        Ok(
            TwitterScraper::new(session, Arc::clone(&self.extractor), self.settings.pacing)
                .with_cancel(cancel.clone())
                .with_max_no_growth_attempts(self.settings.max_no_growth_attempts),
        )
    }

    async fn execute(self: Arc<Self>, id: Uuid, work: Work, cancel: CancellationToken) {
        if self
            .admission
            .as_ref()
            .is_some_and(|slots| slots.available_permits() == 0)
        {
            self.store.set_progress(&id, QUEUED_PROGRESS);
        }

        let permit = match self.admit(&cancel).await {
            Ok(permit) => permit,
            Err(e) => {
                self.settle(&id, Err(e));
                return;
            }
        };
        if let Err(e) = self.store.mark_running(&id) {
            warn!(job_id = %id, error = %e, "jobs.start_rejected");
            self.tokens.remove(&id);
            return;
        }
        info!(job_id = %id, "jobs.started");

        let outcome = match AssertUnwindSafe(self.run(id, work, &cancel))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Err(LookoutError::Job(format!(
                "job aborted: {}",
                panic_reason(panic.as_ref())
            ))),
        };
        self.settle(&id, outcome);
        drop(permit);
    }

    fn settle(&self, id: &Uuid, outcome: Result<JobOutput, LookoutError>) {
        let settled = match outcome {
            Ok(output) => {
                info!(job_id = %id, "jobs.completed");
                self.store.complete(id, output)
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "jobs.failed");
                self.store.fail(id, e.to_string())
            }
        };
        if let Err(e) = settled {
            warn!(job_id = %id, error = %e, "jobs.settle_rejected");
        }
        self.tokens.remove(id);
    }

    async fn run(&self, id: Uuid, work: Work, cancel: &CancellationToken) -> Result<JobOutput, LookoutError> {
        let progress = JobProgress::new(self.store.clone(), id);
        let scraper = self.open_scraper(cancel).await?;

        match work {
            Work::Discovery { usernames, sink } => {
                let mut orchestrator = DiscoveryOrchestrator::new(scraper, self.settings.limits);
                if let Some(sink) = sink {
                    orchestrator = orchestrator.with_sink(sink);
                }
                orchestrator
                    .run(&usernames, &progress)
                    .await
                    .map(JobOutput::Discovery)
            }
            Work::PostSync { usernames, sink } => {
                PostSyncer::new(scraper, sink, self.settings.sync_posts)
                    .run(&usernames, &progress)
                    .await
                    .map(JobOutput::PostSync)
            }
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// Trim entries, drop a leading `@` and blanks. Rejects an empty result.
fn clean_usernames(usernames: Vec<String>) -> Result<Vec<String>, JobError> {
    let cleaned: Vec<String> = usernames
        .into_iter()
        .map(|u| u.trim().trim_start_matches('@').to_string())
        .filter(|u| !u.is_empty())
        .collect();
    if cleaned.is_empty() {
        return Err(JobError::EmptyUsernames);
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_cleaned() {
        let cleaned = clean_usernames(vec![" @alice ".into(), "".into(), "bob".into()]).unwrap();
        assert_eq!(cleaned, vec!["alice", "bob"]);
    }

    #[test]
    fn panic_reason_reads_string_payloads() {
        assert_eq!(panic_reason(&"boom"), "boom");
        assert_eq!(panic_reason(&String::from("bang")), "bang");
        assert_eq!(panic_reason(&42u8), "panic");
    }

    #[test]
    fn blank_lists_are_rejected() {
        assert_eq!(clean_usernames(vec![]), Err(JobError::EmptyUsernames));
        assert_eq!(
            clean_usernames(vec!["  ".into(), "@".into()]),
            Err(JobError::EmptyUsernames)
        );
    }
}
