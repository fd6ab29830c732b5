//! Loader for Lookout configuration with YAML + environment overlays.
//!
//! Sources are merged in order: compiled-in defaults, then any YAML files or
//! inline snippets in the order they were added, then `LOOKOUT__SECTION__KEY`
//! environment variables. String values may carry `${VAR}` placeholders, which
//! are expanded after merging.
//!
//! ```yaml
//! browser:
//!   webdriver_url: "http://chromedriver:9515"
//!   stealth: maximum
//! pacing:
//!   scroll: { min_ms: 1000, max_ms: 2000 }
//! discovery:
//!   global_cap: 40
//! jobs:
//!   max_concurrent: 2
//! selectors:
//!   post:
//!     text: 'div[data-testid="tweetText"]'
//! ```
use config::{Config, ConfigError, Environment, File};
use lookout_common::BrowserSettings;
use lookout_common::observability::{LogConfig, LogFormat};
use lookout_social::twitter::{DiscoveryLimits, Pacing, SelectorTable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "LOOKOUT";
const ENV_SEPARATOR: &str = "__";

/// File name looked up in the user config directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "lookout.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookoutConfig {
    pub browser: BrowserSettings,
    pub pacing: Pacing,
    pub discovery: DiscoverySettings,
    pub jobs: JobSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub selectors: SelectorTable,
}

impl LookoutConfig {
    /// Render the effective configuration, e.g. for `lookout config`.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub global_cap: usize,
    pub per_seed_quota: usize,
    pub connections_per_seed: usize,
    pub seed_posts: usize,
    /// Posts collected per account by a post sync job.
    pub sync_posts: usize,
    pub max_no_growth_attempts: u32,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        let limits = DiscoveryLimits::default();
        Self {
            global_cap: limits.global_cap,
            per_seed_quota: limits.per_seed_quota,
            connections_per_seed: limits.connections_per_seed,
            seed_posts: limits.seed_posts,
            sync_posts: 20,
            max_no_growth_attempts: 10,
        }
    }
}

impl DiscoverySettings {
    pub fn limits(&self) -> DiscoveryLimits {
        DiscoveryLimits {
            global_cap: self.global_cap,
            per_seed_quota: self.per_seed_quota,
            connections_per_seed: self.connections_per_seed,
            seed_posts: self.seed_posts,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Jobs allowed to hold a browser session at once. Unset means unbounded.
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub emit_stderr: bool,
    /// Also write a daily rolling file.
    pub file: bool,
    pub dir: Option<PathBuf>,
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            emit_stderr: true,
            file: false,
            dir: None,
            filter: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn log_config(&self, app_name: &'static str) -> LogConfig {
        LogConfig {
            app_name,
            file: self.file,
            log_dir: self.dir.clone(),
            emit_stderr: self.emit_stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct LookoutConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for LookoutConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LookoutConfigLoader {
    /// An empty loader: defaults plus `LOOKOUT__` environment overrides.
    ///
    /// ```
    /// use lookout_config::LookoutConfigLoader;
    ///
    /// let config = LookoutConfigLoader::new().load().expect("defaults load");
    /// assert_eq!(config.server.bind, "0.0.0.0:8000");
    /// assert_eq!(config.discovery.global_cap, 25);
    /// assert!(config.jobs.max_concurrent.is_none());
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// `lookout.yaml` under the user config directory, when one can be resolved.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lookout").join(DEFAULT_CONFIG_FILE))
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when it does not exist.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use lookout_common::StealthLevel;
    /// use lookout_config::LookoutConfigLoader;
    ///
    /// let cfg = LookoutConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// browser:
    ///   stealth: maximum
    ///   headless: false
    /// jobs:
    ///   max_concurrent: 2
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.browser.stealth, StealthLevel::Maximum);
    /// assert!(!cfg.browser.headless);
    /// assert_eq!(cfg.browser.base_url, "https://x.com");
    /// assert_eq!(cfg.jobs.max_concurrent, Some(2));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge every source, expand `${VAR}` placeholders and deserialize.
    pub fn load(self) -> Result<LookoutConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
