//! Two-phase, quota-bounded breadth-first discovery from seed accounts.
//!
//! Phase one resolves every seed's own profile (optionally pushing a handful
//! of its posts to a sink). Phase two walks each seed's following listing and
//! promotes unseen accounts to full profiles, at most `per_seed_quota` per seed
//! and `global_cap` overall. The result is ranked by follower count.
//!
//! One browser session serves the whole run and is closed exactly once on every
//! exit path, including a panic inside the run.
use std::collections::HashSet;
use std::sync::Arc;

use futures::FutureExt;
use lookout_common::LookoutError;
use lookout_drivers::BrowserSession;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

use super::client::TwitterScraper;
use super::types::Profile;
use crate::sink::PostSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryLimits {
    pub global_cap: usize,
    pub per_seed_quota: usize,
    /// Listing entries read per seed in phase two.
    pub connections_per_seed: usize,
    /// Posts collected per resolved seed when a sink is attached.
    pub seed_posts: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            global_cap: 25,
            per_seed_quota: 4,
            connections_per_seed: 10,
            seed_posts: 10,
        }
    }
}

/// Receives human-readable status lines while a run progresses.
pub trait Progress: Send + Sync {
    fn update(&self, line: String);
}

impl Progress for () {
    fn update(&self, _line: String) {}
}

/// Orchestrator-local traversal state.
#[derive(Debug, Default)]
struct DiscoveryState {
    seen: HashSet<String>,
    discovered: Vec<Profile>,
}

impl DiscoveryState {
    fn admit(&mut self, profile: Profile) {
        self.seen.insert(profile.username.clone());
        self.discovered.push(profile);
    }
}

pub struct DiscoveryOrchestrator<S> {
    scraper: TwitterScraper<S>,
    limits: DiscoveryLimits,
    sink: Option<Arc<dyn PostSink>>,
}

impl<S: BrowserSession> DiscoveryOrchestrator<S> {
    pub fn new(scraper: TwitterScraper<S>, limits: DiscoveryLimits) -> Self {
        Self {
            scraper,
            limits,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PostSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run discovery for `seeds` and release the session.
    ///
    /// Per-account failures are logged and skipped. The only errors returned
    /// are cancellation and a panic inside the run.
    pub async fn run(mut self, seeds: &[String], progress: &dyn Progress) -> Result<Vec<Profile>, LookoutError> {
        let outcome = AssertUnwindSafe(self.explore(seeds, progress))
            .catch_unwind()
            .await;

        if let Err(e) = self.scraper.close().await {
            warn!(error = %e, "discovery.session.close_failed");
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(reason = %reason, "discovery.panicked");
                Err(LookoutError::Job(format!("discovery aborted: {reason}")))
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), LookoutError> {
        if self.scraper.cancel_token().is_cancelled() {
            Err(LookoutError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn explore(&mut self, seeds: &[String], progress: &dyn Progress) -> Result<Vec<Profile>, LookoutError> {
        let cap = self.limits.global_cap;
        let mut state = DiscoveryState::default();
        let total = seeds.len();

        info!(seeds = total, cap, quota = self.limits.per_seed_quota, "discovery.started");

        for (idx, seed) in seeds.iter().enumerate() {
            self.check_cancelled()?;
            if state.seen.contains(seed) {
                warn!(seed = %seed, "discovery.seed.duplicate");
                continue;
            }
            if state.discovered.len() >= cap {
                info!(seed = %seed, cap, "discovery.seed.cap_reached");
                break;
            }
            progress.update(format!("Scraping seed profile {}/{total}: @{seed}", idx + 1));

            match self.scraper.fetch_profile(seed).await {
                Ok(profile) => {
                    info!(seed = %seed, followers = profile.followers_count, "discovery.seed.resolved");
                    state.admit(profile);
                    self.push_seed_posts(seed).await?;
                }
                Err(LookoutError::Cancelled) => return Err(LookoutError::Cancelled),
                Err(e) => warn!(seed = %seed, error = %e, "discovery.seed.failed"),
            }
        }

        let after_seeds = state.discovered.len();
        info!(resolved = after_seeds, "discovery.phase_one.done");

        for (idx, seed) in seeds.iter().enumerate() {
            self.check_cancelled()?;
            if state.discovered.len() >= cap {
                info!(cap, "discovery.cap_reached");
                break;
            }
            progress.update(format!("Discovering network {}/{total}: @{seed}", idx + 1));

            let stubs = match self
                .scraper
                .collect_following(seed, self.limits.connections_per_seed)
                .await
            {
                Ok(stubs) => stubs,
                Err(LookoutError::Cancelled) => return Err(LookoutError::Cancelled),
                Err(e) => {
                    warn!(seed = %seed, error = %e, "discovery.listing.failed");
                    continue;
                }
            };

            let mut added = 0usize;
            for stub in stubs {
                if added >= self.limits.per_seed_quota || state.discovered.len() >= cap {
                    break;
                }
                self.check_cancelled()?;
                if state.seen.contains(&stub.username) {
                    continue;
                }
                progress.update(format!(
                    "Network {}/{total}: Scraping @{} ({}/{cap})",
                    idx + 1,
                    stub.username,
                    state.discovered.len()
                ));

                match self.scraper.fetch_profile(&stub.username).await {
                    Ok(profile) => {
                        info!(
                            seed = %seed,
                            username = %profile.username,
                            total = state.discovered.len() + 1,
                            "discovery.connection.promoted"
                        );
                        state.admit(profile);
                        added += 1;
                    }
                    Err(LookoutError::Cancelled) => return Err(LookoutError::Cancelled),
                    Err(e) => warn!(seed = %seed, username = %stub.username, error = %e, "discovery.connection.failed"),
                }
            }
        }

        let mut ranked = state.discovered;
        ranked.sort_by(|a, b| b.followers_count.cmp(&a.followers_count));
        ranked.truncate(cap);

        info!(
            seeds_resolved = after_seeds,
            expanded = ranked.len().saturating_sub(after_seeds),
            returned = ranked.len(),
            "discovery.finished"
        );
        progress.update(format!("Completed! Discovered {} profiles", ranked.len()));
        Ok(ranked)
    }

    /// Collect a few posts for a resolved seed and hand them to the sink.
    async fn push_seed_posts(&mut self, seed: &str) -> Result<(), LookoutError> {
        let Some(sink) = self.sink.clone() else {
            return Ok(());
        };
        match self.scraper.collect_posts(seed, self.limits.seed_posts).await {
            Ok(posts) if posts.is_empty() => {
                info!(seed = %seed, "discovery.seed.no_posts");
            }
            Ok(posts) => {
                let delivered = tokio::select! {
                    _ = self.scraper.cancel_token().cancelled() => return Err(LookoutError::Cancelled),
                    delivered = sink.deliver(seed, &posts) => delivered,
                };
                if let Err(e) = delivered {
                    warn!(seed = %seed, error = %e, "sink.rejected");
                }
            }
            Err(LookoutError::Cancelled) => return Err(LookoutError::Cancelled),
            Err(e) => warn!(seed = %seed, error = %e, "discovery.seed.posts_failed"),
        }
        Ok(())
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
