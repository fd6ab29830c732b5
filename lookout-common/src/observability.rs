//! Tracing setup shared by the server, the CLI and integration tests.
//!
//! [`init_logging`] installs one global subscriber. Events can go to a daily
//! rolling file, to `stderr`, or both; the CLI subcommands usually want only
//! `stderr` while the long-running server wants the file as well. Repeated calls
//! are no-ops that hand back whatever was resolved first.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_TARGET: OnceLock<LogTarget> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output encoding for structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Where events ended up after initialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Today's rolling file (events may also be mirrored to `stderr`).
    File(PathBuf),
    /// No file sink was requested.
    Stderr,
}

/// Configuration passed to [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Logical component name, used for the file name and default directory.
    pub app_name: &'static str,
    /// Write to a rolling file. When `false` only `stderr` is used.
    pub file: bool,
    /// Explicit directory for the file sink. Falls back to `LOOKOUT_LOG_DIR`,
    /// then `~/.local/share/<app_name>`.
    pub log_dir: Option<PathBuf>,
    /// Mirror events to `stderr` alongside the file.
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Filter applied when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "lookout",
            file: true,
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Initialise the global `tracing` subscriber.
pub fn init_logging(config: LogConfig) -> anyhow::Result<LogTarget> {
    if let Some(target) = LOG_TARGET.get() {
        return Ok(target.clone());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut target = LogTarget::Stderr;

    if config.file {
        let dir = resolve_log_dir(config.app_name, config.log_dir.as_deref());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

        let file_name = format!("{}.log", config.app_name);
        let today = Local::now().format("%Y-%m-%d").to_string();
        target = LogTarget::File(dir.join(format!("{file_name}.{today}")));

        let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, file_name));
        let _ = LOG_GUARD.set(guard);
        layers.push(match config.format {
            LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
            LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        });
    }

    if config.emit_stderr || !config.file {
        layers.push(match config.format {
            LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
            LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let _ = LOG_TARGET.set(target.clone());
    Ok(target)
}

fn resolve_log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return expand_home(dir);
    }

    if let Ok(env_dir) = std::env::var("LOOKOUT_LOG_DIR") {
        return expand_home(Path::new(&env_dir));
    }

    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/share").join(app_name),
        Err(_) => PathBuf::from(".").join(app_name),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}
