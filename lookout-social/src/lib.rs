//! Social-profile scraping built on the Lookout browser layer.
//!
//! The Twitter/X pipeline lives in [`twitter`]: the selector table and
//! [`twitter::extract::Extractor`] turn rendered markup into typed records, the
//! scraper facade drives one browser session, and the discovery and sync runs
//! compose those into jobs. [`collector`] holds the site-agnostic
//! scroll-until-converged loop; [`sink`] delivers posts downstream and
//! [`analytics`] summarises collected posts.
pub mod analytics;
pub mod collector;
pub mod sink;
pub mod twitter;
