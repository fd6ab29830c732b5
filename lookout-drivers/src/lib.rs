//! Driver layer for browser automation.
//!
//! Everything above this crate talks to a browser through the narrow
//! [`session::BrowserSession`] capability, so extraction and orchestration can
//! run against canned markup in tests.
//!
//! - [`session::BrowserSession`]: navigate / scroll / height / markup / close
//! - [`session::SessionFactory`]: opens one session per job
//! - [`lookout_browser::driver::FantocciniSession`]: WebDriver-backed session
//! - [`lookout_browser::pacing::Pacer`]: randomized politeness delays
//! - [`lookout_browser::stealth`]: launch flags and JS evasions
//! - [`fixture`]: fixture-backed fake session and factory
pub mod fixture;
pub mod lookout_browser;
pub mod session;

pub use session::{BrowserSession, DriverError, SessionFactory};
