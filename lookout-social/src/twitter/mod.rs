//! Twitter/X scraping surface.
//!
//! Selectors are data ([`selectors::SelectorTable`]); everything that reads
//! markup goes through [`extract::Extractor`], which is pure. The scraper
//! facade in [`client`] owns the browser session for a run, and
//! [`discovery`] / [`sync`] are the two long-running jobs built on it.
pub mod client;
pub mod discovery;
pub mod extract;
pub mod selectors;
pub mod sync;
pub mod types;

pub use client::{Pacing, TwitterScraper};
pub use discovery::{DiscoveryLimits, DiscoveryOrchestrator, Progress};
pub use extract::{Extractor, parse_count};
pub use selectors::SelectorTable;
pub use sync::{PostSyncer, SyncSummary};
pub use types::{ConnectionStub, Post, Profile};
