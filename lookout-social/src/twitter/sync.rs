//! Post sync: collect recent posts per account and deliver them to a sink.
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use lookout_common::LookoutError;
use lookout_drivers::BrowserSession;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::client::TwitterScraper;
use super::discovery::{Progress, panic_message};
use crate::sink::PostSink;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub accounts_synced: usize,
    pub posts_delivered: usize,
    pub failed_accounts: Vec<String>,
}

pub struct PostSyncer<S> {
    scraper: TwitterScraper<S>,
    sink: Arc<dyn PostSink>,
    posts_per_account: usize,
}

impl<S: BrowserSession> PostSyncer<S> {
    pub fn new(scraper: TwitterScraper<S>, sink: Arc<dyn PostSink>, posts_per_account: usize) -> Self {
        Self {
            scraper,
            sink,
            posts_per_account,
        }
    }

    /// Sync every account in order, then release the session.
    pub async fn run(mut self, usernames: &[String], progress: &dyn Progress) -> Result<SyncSummary, LookoutError> {
        let outcome = AssertUnwindSafe(self.sync_all(usernames, progress))
            .catch_unwind()
            .await;

        if let Err(e) = self.scraper.close().await {
            warn!(error = %e, "sync.session.close_failed");
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(reason = %reason, "sync.panicked");
                Err(LookoutError::Job(format!("post sync aborted: {reason}")))
            }
        }
    }

    async fn sync_all(&mut self, usernames: &[String], progress: &dyn Progress) -> Result<SyncSummary, LookoutError> {
        let mut summary = SyncSummary::default();
        let total = usernames.len();

        for (idx, username) in usernames.iter().enumerate() {
            if self.scraper.cancel_token().is_cancelled() {
                return Err(LookoutError::Cancelled);
            }
            progress.update(format!("Syncing posts {}/{total}: @{username}", idx + 1));

            let posts = match self.scraper.collect_posts(username, self.posts_per_account).await {
                Ok(posts) => posts,
                Err(LookoutError::Cancelled) => return Err(LookoutError::Cancelled),
                Err(e) => {
                    warn!(username = %username, error = %e, "sync.collect_failed");
                    summary.failed_accounts.push(username.clone());
                    continue;
                }
            };

            if posts.is_empty() {
                info!(username = %username, "sync.no_posts");
                continue;
            }

            let delivered = tokio::select! {
                _ = self.scraper.cancel_token().cancelled() => return Err(LookoutError::Cancelled),
                delivered = self.sink.deliver(username, &posts) => delivered,
            };
            match delivered {
                Ok(()) => {
                    summary.accounts_synced += 1;
                    summary.posts_delivered += posts.len();
                }
                Err(e) => {
                    warn!(username = %username, error = %e, "sync.delivery_failed");
                    summary.failed_accounts.push(username.clone());
                }
            }
        }

        info!(
            synced = summary.accounts_synced,
            posts = summary.posts_delivered,
            failed = summary.failed_accounts.len(),
            "sync.finished"
        );
        progress.update(format!(
            "Completed! Delivered {} posts for {} accounts",
            summary.posts_delivered, summary.accounts_synced
        ));
        Ok(summary)
    }
}
