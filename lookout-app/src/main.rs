use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use lookout_common::observability::init_logging;
use lookout_config::{LookoutConfig, LookoutConfigLoader};
use lookout_drivers::lookout_browser::driver::FantocciniFactory;
use lookout_jobs::{JobRunner, JobStatus, RunnerSettings};
use lookout_social::twitter::Extractor;
use serde::Serialize;
use url::Url;

mod api;

/// Time running jobs get to close their sessions after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "lookout", version, about = "Profile scraping and account discovery")]
struct Cli {
    /// YAML config file. Defaults to the user config directory.
    #[arg(long, global = true, env = "LOOKOUT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Overrides `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Fetch one profile and print it as JSON.
    Profile { username: String },
    /// Collect recent posts of one account.
    Posts {
        username: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        max: usize,
    },
    /// Discover accounts around the given seeds and print the ranked list.
    Discover {
        #[arg(required = true)]
        usernames: Vec<String>,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    if let Command::Config = cli.command {
        print!("{}", cfg.to_yaml()?);
        return Ok(());
    }

    init_logging(cfg.logging.log_config("lookout"))?;
    let runner = build_runner(&cfg)?;

    match cli.command {
        Command::Serve { bind } => serve(runner, bind.unwrap_or(cfg.server.bind)).await,
        Command::Profile { username } => print_json(&runner.fetch_profile(&username).await?),
        Command::Posts { username, max } => print_json(&runner.collect_posts(&username, max).await?),
        Command::Discover { usernames } => discover(runner, usernames).await,
        Command::Config => Ok(()),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<LookoutConfig> {
    let loader = match path {
        Some(path) => LookoutConfigLoader::new().with_file(path),
        None => match LookoutConfigLoader::default_path() {
            Some(path) => LookoutConfigLoader::new().with_optional_file(path),
            None => LookoutConfigLoader::new(),
        },
    };
    loader.load().context("loading configuration")
}

fn build_runner(cfg: &LookoutConfig) -> Result<JobRunner> {
    let base = Url::parse(&cfg.browser.base_url)
        .with_context(|| format!("invalid browser.base_url {:?}", cfg.browser.base_url))?;
    let extractor = Arc::new(Extractor::new(&cfg.selectors, &base)?);
    let sessions = Arc::new(FantocciniFactory::new(cfg.browser.clone()));
    let settings = RunnerSettings {
        pacing: cfg.pacing,
        limits: cfg.discovery.limits(),
        sync_posts: cfg.discovery.sync_posts,
        max_no_growth_attempts: cfg.discovery.max_no_growth_attempts,
        max_concurrent: cfg.jobs.max_concurrent,
    };
    Ok(JobRunner::new(sessions, extractor, settings)?)
}

async fn serve(runner: JobRunner, bind: String) -> Result<()> {
    let app = api::build_app(api::AppState {
        runner: runner.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "server.listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !runner.shutdown(SHUTDOWN_GRACE).await {
        tracing::warn!("server.shutdown.jobs_abandoned");
    }
    tracing::info!("server.stopped");
    Ok(())
}

async fn discover(runner: JobRunner, usernames: Vec<String>) -> Result<()> {
    let job = runner.submit_discovery(usernames, None)?;
    tracing::info!(job_id = %job.id, "cli.discover.submitted");

    let done = tokio::select! {
        done = runner.wait(&job.id) => done,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(job_id = %job.id, "cli.discover.interrupted");
            runner.cancel(&job.id)?;
            runner.wait(&job.id).await
        }
    };
    let Some(done) = done else {
        bail!("job {} disappeared", job.id);
    };
    if done.status == JobStatus::Failed {
        bail!(
            "discovery failed: {}",
            done.error.as_deref().unwrap_or("unknown error")
        );
    }
    print_json(&done.result)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "server.signal.ctrl_c_unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "server.signal.sigterm_unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
