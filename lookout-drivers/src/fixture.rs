//! Fixture-backed browser sessions.
//!
//! A [`FixtureFactory`] maps URL paths to canned pages. Each page is a sequence
//! of [`Frame`]s: navigation shows the first frame and every
//! `scroll_to_bottom` advances one frame, sticking on the last. A frame's
//! `height` is what `scroll_height` reports, so repeating a height models a
//! listing that stopped growing.
//!
//! ```
//! use lookout_drivers::fixture::{FixtureFactory, Frame};
//! use lookout_drivers::SessionFactory;
//!
//! # tokio_test_block(async {
//! let factory = FixtureFactory::new()
//!     .page("/alice", vec![Frame::new("<html>alice</html>", 900)])
//!     .failing("/bob", "net::ERR_TIMED_OUT");
//! let mut session = factory.open().await.unwrap();
//! let url = url::Url::parse("https://x.com/alice").unwrap();
//! assert!(session.navigate(&url).await.unwrap().contains("alice"));
//! session.close().await.unwrap();
//! assert_eq!(factory.probes().closed(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::session::{BrowserSession, DriverError, SessionFactory};

/// One rendered state of a page.
#[derive(Debug, Clone)]
pub struct Frame {
    pub markup: String,
    pub height: u64,
}

impl Frame {
    pub fn new(markup: impl Into<String>, height: u64) -> Self {
        Self {
            markup: markup.into(),
            height,
        }
    }
}

#[derive(Debug, Clone)]
enum Route {
    Frames(Vec<Frame>),
    Fail(String),
}

/// Shared counters observed by tests.
#[derive(Debug, Default)]
pub struct FixtureProbes {
    opened: AtomicUsize,
    closed: AtomicUsize,
    scrolls: AtomicUsize,
    visits: Mutex<Vec<String>>,
}

impl FixtureProbes {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of `close` calls, including repeated ones.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }

    /// Paths navigated to, in order, across every session.
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

/// Fake [`BrowserSession`] that replays canned frames.
pub struct FixtureSession {
    routes: Arc<HashMap<String, Route>>,
    probes: Arc<FixtureProbes>,
    latency: Duration,
    current: Option<(Vec<Frame>, usize)>,
    closed: bool,
}

impl FixtureSession {
    fn frame(&self) -> Result<&Frame, DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        match &self.current {
            Some((frames, idx)) => frames
                .get(*idx)
                .ok_or_else(|| DriverError::Command("page has no frames".to_string())),
            None => Err(DriverError::Command("no page loaded".to_string())),
        }
    }
}

#[async_trait]
impl BrowserSession for FixtureSession {
    async fn navigate(&mut self, url: &Url) -> Result<String, DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let path = url.path().trim_end_matches('/').to_string();
        if let Ok(mut visits) = self.probes.visits.lock() {
            visits.push(path.clone());
        }

        match self.routes.get(&path) {
            Some(Route::Frames(frames)) => {
                self.current = Some((frames.clone(), 0));
                Ok(self.frame()?.markup.clone())
            }
            Some(Route::Fail(reason)) => {
                self.current = None;
                Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: reason.clone(),
                })
            }
            None => {
                self.current = None;
                Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: "no fixture for path".to_string(),
                })
            }
        }
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.frame()?;
        self.probes.scrolls.fetch_add(1, Ordering::SeqCst);
        if let Some((frames, idx)) = self.current.as_mut() {
            if *idx + 1 < frames.len() {
                *idx += 1;
            }
        }
        Ok(())
    }

    async fn scroll_height(&mut self) -> Result<u64, DriverError> {
        Ok(self.frame()?.height)
    }

    async fn page_markup(&mut self) -> Result<String, DriverError> {
        Ok(self.frame()?.markup.clone())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.probes.closed.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        self.current = None;
        Ok(())
    }
}

/// Builds [`FixtureSession`]s sharing one route table and one set of probes.
#[derive(Debug, Clone, Default)]
pub struct FixtureFactory {
    routes: HashMap<String, Route>,
    probes: Arc<FixtureProbes>,
    latency: Duration,
    refuse_open: Option<String>,
}

impl FixtureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `frames` at `path` (for example `/alice/following`).
    pub fn page(mut self, path: &str, frames: Vec<Frame>) -> Self {
        self.routes
            .insert(path.trim_end_matches('/').to_string(), Route::Frames(frames));
        self
    }

    /// Fail navigation to `path` with `reason`.
    pub fn failing(mut self, path: &str, reason: &str) -> Self {
        self.routes
            .insert(path.trim_end_matches('/').to_string(), Route::Fail(reason.to_string()));
        self
    }

    /// Delay every navigation by `latency`.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `open` fail, as if no browser could be started.
    pub fn refuse_open(mut self, reason: &str) -> Self {
        self.refuse_open = Some(reason.to_string());
        self
    }

    pub fn probes(&self) -> Arc<FixtureProbes> {
        Arc::clone(&self.probes)
    }

    /// Open a concrete session without going through the trait object.
    pub fn session(&self) -> FixtureSession {
        self.probes.opened.fetch_add(1, Ordering::SeqCst);
        FixtureSession {
            routes: Arc::new(self.routes.clone()),
            probes: Arc::clone(&self.probes),
            latency: self.latency,
            current: None,
            closed: false,
        }
    }
}

#[async_trait]
impl SessionFactory for FixtureFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        if let Some(reason) = &self.refuse_open {
            return Err(DriverError::Connect(reason.clone()));
        }
        Ok(Box::new(self.session()))
    }
}
