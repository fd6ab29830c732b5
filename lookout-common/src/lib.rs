//! Common types and utilities shared across Lookout crates.
//!
//! This crate defines browser settings, pacing windows, the cross-cutting error
//! taxonomy, and observability helpers used throughout the Lookout workspace. It is
//! intentionally lightweight so every crate can depend on it without dragging in the
//! browser or HTTP stacks.
//!
//! # Overview
//!
//! - [`BrowserSettings`]: how a browser session is launched and where it points
//! - [`DelayWindow`]: randomized politeness delay bounds
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`LookoutError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use lookout_common::{BrowserSettings, StealthLevel};
//!
//! let mut settings = BrowserSettings::default();
//! settings.stealth = StealthLevel::Maximum;
//! assert!(settings.headless);
//! assert_eq!(settings.base_url, "https://x.com");
//! ```
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod observability;

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

/// Launch settings for one browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// WebDriver endpoint the session connects to (chromedriver by default).
    pub webdriver_url: String,
    /// Whether to run the browser without a visible window.
    pub headless: bool,
    /// Evasion scripts and launch flags applied to the session.
    pub stealth: StealthLevel,
    /// Origin of the target site; profile and listing URLs are joined onto it.
    pub base_url: String,
    /// Upper bound on a single page load.
    pub page_load_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            stealth: StealthLevel::Balanced,
            base_url: "https://x.com".to_string(),
            page_load_timeout_secs: 30,
        }
    }
}

impl BrowserSettings {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }
}

/// Inclusive bounds, in milliseconds, for a uniformly drawn politeness delay.
///
/// ```
/// use lookout_common::DelayWindow;
///
/// let w = DelayWindow::new(5_000, 2_000);
/// assert_eq!((w.min_ms, w.max_ms), (2_000, 5_000));
/// assert!(DelayWindow::none().is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayWindow {
    /// Build a window, swapping the bounds if they arrive reversed.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        if min_ms <= max_ms {
            Self { min_ms, max_ms }
        } else {
            Self {
                min_ms: max_ms,
                max_ms: min_ms,
            }
        }
    }

    /// A window that never sleeps. Used by tests and fixture runs.
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    pub fn is_zero(&self) -> bool {
        self.min_ms == 0 && self.max_ms == 0
    }
}

/// Error taxonomy shared by every Lookout layer.
///
/// Extraction failures never appear here: they are recovered with defaults at the
/// point of parsing and only ever logged.
#[derive(thiserror::Error, Debug)]
pub enum LookoutError {
    /// Page load timed out or the transport failed.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The browser session itself misbehaved (scroll, markup read, close).
    #[error("driver error: {0}")]
    Driver(String),

    /// The downstream sink rejected a delivery or was unreachable.
    #[error("sink error: {0}")]
    Sink(String),

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A cancellation signal was observed between loop iterations.
    #[error("job cancelled")]
    Cancelled,

    /// Anything else escaping a job's outer boundary.
    #[error("job error: {0}")]
    Job(String),
}

impl From<anyhow::Error> for LookoutError {
    fn from(err: anyhow::Error) -> Self {
        LookoutError::Job(format!("{err:#}"))
    }
}

/// Convenient alias for results that use [`LookoutError`].
pub type Result<T> = std::result::Result<T, LookoutError>;
