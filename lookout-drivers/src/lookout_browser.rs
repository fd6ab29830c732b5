pub mod driver;
pub mod fingerprint;
pub mod pacing;
pub mod stealth;
