//! Scraper facade over one browser session.
//!
//! [`TwitterScraper`] owns the session for the length of a run and exposes the
//! three page-level reads everything else is built from: a profile, a post
//! timeline and a following listing. Pacing delays are drawn from [`Pacing`].
use std::sync::Arc;

use lookout_common::{DelayWindow, LookoutError};
use lookout_drivers::BrowserSession;
use lookout_drivers::lookout_browser::pacing::Pacer;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::extract::{ExtractError, Extractor, normalize_handle};
use super::types::{ConnectionStub, Post, Profile};
use crate::collector::{Collection, Harvest, PaginatingCollector};

/// Politeness delay windows, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// After loading a timeline or listing, before the first read.
    pub navigation: DelayWindow,
    /// After loading a profile page.
    pub profile: DelayWindow,
    /// Between scrolls inside the collector.
    pub scroll: DelayWindow,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            navigation: DelayWindow::new(3_000, 5_000),
            profile: DelayWindow::new(5_000, 7_000),
            scroll: DelayWindow::new(2_000, 4_000),
        }
    }
}

impl Pacing {
    /// No delays at all, for fixture-backed runs.
    pub fn none() -> Self {
        Self {
            navigation: DelayWindow::none(),
            profile: DelayWindow::none(),
            scroll: DelayWindow::none(),
        }
    }
}

/// Posts keyed by exact text.
pub struct PostHarvest<'a> {
    pub extractor: &'a Extractor,
    pub username: &'a str,
}

impl Harvest for PostHarvest<'_> {
    type Item = Post;
    type Error = ExtractError;

    fn kind(&self) -> &'static str {
        "posts"
    }

    fn candidates(&self, markup: &str) -> Vec<Result<Post, ExtractError>> {
        self.extractor.post_candidates(markup, self.username)
    }

    fn fingerprint(&self, item: &Post) -> String {
        item.text.clone()
    }
}

/// Listing cells keyed by handle.
pub struct ConnectionHarvest<'a> {
    pub extractor: &'a Extractor,
}

impl Harvest for ConnectionHarvest<'_> {
    type Item = ConnectionStub;
    type Error = ExtractError;

    fn kind(&self) -> &'static str {
        "connections"
    }

    fn candidates(&self, markup: &str) -> Vec<Result<ConnectionStub, ExtractError>> {
        self.extractor.connection_candidates(markup)
    }

    fn fingerprint(&self, item: &ConnectionStub) -> String {
        item.username.clone()
    }
}

pub struct TwitterScraper<S> {
    session: S,
    extractor: Arc<Extractor>,
    pacing: Pacing,
    pacer: Pacer,
    collector: PaginatingCollector,
    cancel: CancellationToken,
}

impl<S: BrowserSession> TwitterScraper<S> {
    pub fn new(session: S, extractor: Arc<Extractor>, pacing: Pacing) -> Self {
        Self {
            session,
            extractor,
            pacing,
            pacer: Pacer::new(),
            collector: PaginatingCollector::new(pacing.scroll),
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `cancel` inside collection loops.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_no_growth_attempts(mut self, attempts: u32) -> Self {
        self.collector = self.collector.with_max_no_growth_attempts(attempts);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn account_url(&self, username: &str, suffix: Option<&str>) -> Result<(String, Url), LookoutError> {
        let base = self.extractor.base_url();
        let raw = username.trim().trim_start_matches('@');
        // The whole input must be the handle: "alice/extra" is not "alice".
        let handle = normalize_handle(base, raw)
            .filter(|h| h == raw)
            .ok_or_else(|| LookoutError::Navigation(format!("not a valid username: {username:?}")))?;
        let path = match suffix {
            Some(s) => format!("/{handle}/{s}"),
            None => format!("/{handle}"),
        };
        let url = base
            .join(&path)
            .map_err(|e| LookoutError::Navigation(format!("{path}: {e}")))?;
        Ok((handle, url))
    }

    async fn pause(&self, window: DelayWindow) -> Result<(), LookoutError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(LookoutError::Cancelled),
            _ = self.pacer.pause(window) => Ok(()),
        }
    }

    /// Load and read one profile page. The returned username is the requested one.
    pub async fn fetch_profile(&mut self, username: &str) -> Result<Profile, LookoutError> {
        let (handle, url) = self.account_url(username, None)?;
        debug!(%url, "scraper.profile.fetch");
        self.session.navigate(&url).await?;
        self.pause(self.pacing.profile).await?;

        let markup = self.session.page_markup().await?;
        let mut profile = self.extractor.extract_profile(&markup);
        profile.username = handle;
        info!(
            username = %profile.username,
            followers = profile.followers_count,
            "scraper.profile.fetched"
        );
        Ok(profile)
    }

    /// Up to `max` posts from the account's timeline, deduplicated by text.
    pub async fn collect_posts(&mut self, username: &str, max: usize) -> Result<Vec<Post>, LookoutError> {
        let (handle, url) = self.account_url(username, None)?;
        self.session.navigate(&url).await?;
        self.pause(self.pacing.navigation).await?;

        let harvest = PostHarvest {
            extractor: &self.extractor,
            username: &handle,
        };
        let Collection { items, stop, .. } = self
            .collector
            .collect(&mut self.session, &harvest, max, &self.cancel)
            .await?;
        info!(username = %handle, collected = items.len(), ?stop, "scraper.posts.collected");
        Ok(items)
    }

    /// Up to `max` accounts from the account's following listing.
    pub async fn collect_following(
        &mut self,
        username: &str,
        max: usize,
    ) -> Result<Vec<ConnectionStub>, LookoutError> {
        let (handle, url) = self.account_url(username, Some("following"))?;
        self.session.navigate(&url).await?;
        self.pause(self.pacing.navigation).await?;

        let harvest = ConnectionHarvest {
            extractor: &self.extractor,
        };
        let Collection { items, stop, .. } = self
            .collector
            .collect(&mut self.session, &harvest, max, &self.cancel)
            .await?;
        info!(username = %handle, collected = items.len(), ?stop, "scraper.following.collected");
        Ok(items)
    }

    /// Release the browser session.
    pub async fn close(&mut self) -> Result<(), LookoutError> {
        self.session.close().await.map_err(LookoutError::from)
    }
}
