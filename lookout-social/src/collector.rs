//! Scroll-extract-converge loop for infinite-scroll listings.
//!
//! [`PaginatingCollector::collect`] reads the current markup, merges any items
//! with an unseen fingerprint, and stops once it holds `target` items. Otherwise
//! it scrolls, waits a politeness interval and compares scroll heights; after
//! `max_no_growth_attempts` consecutive scrolls without growth the listing is
//! treated as exhausted and the partial collection is returned.
use std::collections::HashSet;
use std::fmt::Display;

use lookout_common::{DelayWindow, LookoutError};
use lookout_drivers::lookout_browser::pacing::Pacer;
use lookout_drivers::{BrowserSession, DriverError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_NO_GROWTH_ATTEMPTS: u32 = 10;

/// How one kind of item is read off a page and keyed for dedup.
pub trait Harvest {
    type Item: Send;
    type Error: Display;

    /// Short label for logs, e.g. `"posts"`.
    fn kind(&self) -> &'static str;

    /// Every candidate element on the page, parsed or not.
    fn candidates(&self, markup: &str) -> Vec<Result<Self::Item, Self::Error>>;

    fn fingerprint(&self, item: &Self::Item) -> String;
}

/// Why a collection stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// Scroll height stopped growing.
    Exhausted,
    /// The session failed mid-loop; items gathered so far are kept.
    Interrupted(DriverError),
}

#[derive(Debug, Clone)]
pub struct Collection<T> {
    pub items: Vec<T>,
    pub stop: StopReason,
    /// Candidates that failed to parse.
    pub skipped: usize,
    pub scrolls: u32,
}

#[derive(Debug, Clone)]
pub struct PaginatingCollector {
    pub max_no_growth_attempts: u32,
    pub scroll_pause: DelayWindow,
    pacer: Pacer,
}

impl Default for PaginatingCollector {
    fn default() -> Self {
        Self::new(DelayWindow::new(2_000, 4_000))
    }
}

impl PaginatingCollector {
    pub fn new(scroll_pause: DelayWindow) -> Self {
        Self {
            max_no_growth_attempts: DEFAULT_MAX_NO_GROWTH_ATTEMPTS,
            scroll_pause,
            pacer: Pacer::new(),
        }
    }

    pub fn with_max_no_growth_attempts(mut self, attempts: u32) -> Self {
        self.max_no_growth_attempts = attempts.max(1);
        self
    }

    /// Collect up to `target` deduplicated items from the page `session` shows.
    ///
    /// Returns `Err(LookoutError::Cancelled)` only when `cancel` fires; driver
    /// failures end the loop with [`StopReason::Interrupted`] instead.
    pub async fn collect<S, H>(
        &self,
        session: &mut S,
        harvest: &H,
        target: usize,
        cancel: &CancellationToken,
    ) -> Result<Collection<H::Item>, LookoutError>
    where
        S: BrowserSession + ?Sized,
        H: Harvest + Sync,
    {
        let mut items: Vec<H::Item> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut skipped = 0usize;
        let mut scrolls = 0u32;
        let mut no_growth = 0u32;
        let kind = harvest.kind();

        let done = |items: Vec<H::Item>, stop: StopReason, skipped: usize, scrolls: u32| {
            Ok(Collection {
                items,
                stop,
                skipped,
                scrolls,
            })
        };

        if target == 0 {
            return done(items, StopReason::TargetReached, 0, 0);
        }

        let mut last_height = match session.scroll_height().await {
            Ok(h) => h,
            Err(e) => {
                warn!(kind, error = %e, "collector.interrupted");
                return done(items, StopReason::Interrupted(e), 0, 0);
            }
        };

        loop {
            if cancel.is_cancelled() {
                return Err(LookoutError::Cancelled);
            }

            let markup = match session.page_markup().await {
                Ok(m) => m,
                Err(e) => {
                    warn!(kind, collected = items.len(), error = %e, "collector.interrupted");
                    return done(items, StopReason::Interrupted(e), skipped, scrolls);
                }
            };

            for candidate in harvest.candidates(&markup) {
                if items.len() >= target {
                    break;
                }
                match candidate {
                    Ok(item) => {
                        if seen.insert(harvest.fingerprint(&item)) {
                            items.push(item);
                        }
                    }
                    Err(e) => {
                        skipped += 1;
                        warn!(kind, error = %e, "collector.candidate_skipped");
                    }
                }
            }

            if items.len() >= target {
                info!(kind, collected = items.len(), scrolls, "collector.target_reached");
                return done(items, StopReason::TargetReached, skipped, scrolls);
            }

            if let Err(e) = session.scroll_to_bottom().await {
                warn!(kind, collected = items.len(), error = %e, "collector.interrupted");
                return done(items, StopReason::Interrupted(e), skipped, scrolls);
            }
            scrolls += 1;

            tokio::select! {
                _ = cancel.cancelled() => return Err(LookoutError::Cancelled),
                _ = self.pacer.pause(self.scroll_pause) => {}
            }

            let height = match session.scroll_height().await {
                Ok(h) => h,
                Err(e) => {
                    warn!(kind, collected = items.len(), error = %e, "collector.interrupted");
                    return done(items, StopReason::Interrupted(e), skipped, scrolls);
                }
            };

            if height == last_height {
                no_growth += 1;
                debug!(kind, height, no_growth, "collector.no_growth");
            } else {
                no_growth = 0;
            }
            last_height = height;

            if no_growth >= self.max_no_growth_attempts {
                info!(kind, collected = items.len(), target, scrolls, "collector.exhausted");
                return done(items, StopReason::Exhausted, skipped, scrolls);
            }
        }
    }
}
