use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lookout_drivers::fixture::{FixtureFactory, Frame};
use lookout_drivers::{BrowserSession, DriverError, SessionFactory};
use lookout_jobs::{JobError, JobOutput, JobRunner, JobStatus, RunnerSettings};
use lookout_social::sink::SinkTarget;
use lookout_social::twitter::{Extractor, Pacing, SelectorTable};
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn account(handle: &str, followers: u64, posts: &[&str]) -> Vec<Frame> {
    let articles: String = posts
        .iter()
        .map(|t| format!(r#"<article data-testid="tweet"><div data-testid="tweetText">{t}</div></article>"#))
        .collect();
    vec![Frame::new(
        format!(
            r#"<div data-testid="primaryColumn">
                 <div data-testid="UserName"><div><span>{handle}</span></div><div><span>@{handle}</span></div></div>
                 <a href="/{handle}/followers">{followers} Followers</a>
                 {articles}
               </div>"#
        ),
        800,
    )]
}

fn following(handles: &[&str]) -> Vec<Frame> {
    let cells: String = handles
        .iter()
        .map(|h| format!(r#"<div data-testid="UserCell"><a href="/{h}">{h}</a></div>"#))
        .collect();
    vec![Frame::new(cells, 800)]
}

fn runner(factory: &FixtureFactory, max_concurrent: Option<usize>) -> JobRunner {
    let base = Url::parse("https://x.com").unwrap();
    let extractor = Arc::new(Extractor::new(&SelectorTable::default(), &base).unwrap());
    let settings = RunnerSettings {
        pacing: Pacing::none(),
        max_no_growth_attempts: 2,
        max_concurrent,
        ..Default::default()
    };
    JobRunner::new(Arc::new(factory.clone()), extractor, settings).unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn empty_submission_is_rejected_before_any_session() {
    let factory = FixtureFactory::new();
    let runner = runner(&factory, None);

    assert_eq!(
        runner.submit_discovery(vec![], None).unwrap_err(),
        JobError::EmptyUsernames
    );
    assert_eq!(
        runner.submit_discovery(names(&["  "]), None).unwrap_err(),
        JobError::EmptyUsernames
    );
    assert!(runner.store().is_empty());
    assert_eq!(factory.probes().opened(), 0);
}

#[tokio::test]
async fn discovery_job_completes_with_ranked_result() {
    let factory = FixtureFactory::new()
        .page("/alice", account("alice", 100, &[]))
        .page("/alice/following", following(&["c1", "c2"]))
        .page("/c1", account("c1", 5, &[]))
        .page("/c2", account("c2", 500, &[]))
        .failing("/bob", "net::ERR_CONNECTION_RESET")
        .failing("/bob/following", "net::ERR_CONNECTION_RESET");
    let runner = runner(&factory, None);

    let job = runner
        .submit_discovery(names(&["alice", "@bob"]), None)
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.usernames, names(&["alice", "bob"]));

    let done = runner.wait(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.error.is_none());
    assert!(done.started_at.is_some() && done.completed_at.is_some());
    assert_eq!(done.progress, "Completed! Discovered 3 profiles");

    let Some(JobOutput::Discovery(profiles)) = done.result else {
        panic!("expected a discovery result");
    };
    let order: Vec<_> = profiles.iter().map(|p| p.username.as_str()).collect();
    assert_eq!(order, vec!["c2", "alice", "c1"]);
    assert_eq!(factory.probes().opened(), 1);
    assert_eq!(factory.probes().closed(), 1);
}

#[tokio::test]
async fn session_that_cannot_open_fails_the_job() {
    let factory = FixtureFactory::new().refuse_open("chromedriver not reachable");
    let runner = runner(&factory, None);

    let job = runner.submit_discovery(names(&["alice"]), None).unwrap();
    let done = runner.wait(&job.id).await.unwrap();

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.result.is_none());
    assert!(done
        .error
        .as_deref()
        .is_some_and(|e| e.contains("chromedriver not reachable")));
}

#[tokio::test]
async fn cancelled_job_fails_and_releases_session() {
    let factory = FixtureFactory::new()
        .latency(Duration::from_millis(50))
        .page("/a", account("a", 1, &[]))
        .page("/b", account("b", 1, &[]))
        .page("/c", account("c", 1, &[]));
    let runner = runner(&factory, None);

    let job = runner.submit_discovery(names(&["a", "b", "c"]), None).unwrap();
    runner.cancel(&job.id).unwrap();
    let done = runner.wait(&job.id).await.unwrap();

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("job cancelled"));
    assert_eq!(factory.probes().opened(), factory.probes().closed());

    // Cancelling a settled job is a no-op.
    let again = runner.cancel(&job.id).unwrap();
    assert_eq!(again.status, JobStatus::Failed);
}

#[tokio::test]
async fn cancel_unknown_job_is_not_found() {
    let runner = runner(&FixtureFactory::new(), None);
    let id = uuid::Uuid::new_v4();
    assert_eq!(runner.cancel(&id).unwrap_err(), JobError::NotFound(id));
}

#[tokio::test]
async fn admission_runs_jobs_one_at_a_time() {
    let factory = FixtureFactory::new()
        .latency(Duration::from_millis(20))
        .page("/a", account("a", 1, &[]))
        .page("/b", account("b", 2, &[]));
    let runner = runner(&factory, Some(1));

    let first = runner.submit_discovery(names(&["a"]), None).unwrap();
    let second = runner.submit_discovery(names(&["b"]), None).unwrap();

    let first = runner.wait(&first.id).await.unwrap();
    let second = runner.wait(&second.id).await.unwrap();
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(second.status, JobStatus::Completed);

    let (earlier, later) = if first.started_at <= second.started_at {
        (first, second)
    } else {
        (second, first)
    };
    assert!(later.started_at >= earlier.completed_at);
}

#[tokio::test]
async fn post_sync_job_delivers_to_callback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .and(body_partial_json(serde_json::json!({
            "username": "alice",
            "owner_id": "owner-1"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let factory = FixtureFactory::new()
        .page("/alice", account("alice", 1, &["one", "two"]))
        .failing("/bob", "timeout");
    let runner = runner(&factory, None);
    let target = SinkTarget::parse(&format!("{}/ingest", server.uri()), "owner-1").unwrap();

    let job = runner
        .submit_post_sync(names(&["alice", "bob"]), target)
        .unwrap();
    let done = runner.wait(&job.id).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    let Some(JobOutput::PostSync(summary)) = done.result else {
        panic!("expected a sync summary");
    };
    assert_eq!(summary.accounts_synced, 1);
    assert_eq!(summary.posts_delivered, 2);
    assert_eq!(summary.failed_accounts, names(&["bob"]));
}

#[tokio::test]
async fn shutdown_cancels_running_jobs_and_refuses_new_ones() {
    let factory = FixtureFactory::new()
        .latency(Duration::from_millis(50))
        .page("/a", account("a", 1, &[]))
        .page("/b", account("b", 1, &[]));
    let runner = runner(&factory, None);

    let job = runner.submit_discovery(names(&["a", "b"]), None).unwrap();
    assert!(runner.shutdown(Duration::from_secs(5)).await);

    let done = runner.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("job cancelled"));
    assert_eq!(factory.probes().opened(), factory.probes().closed());

    assert_eq!(
        runner.submit_discovery(names(&["a"]), None).unwrap_err(),
        JobError::ShuttingDown
    );
}

#[tokio::test]
async fn one_shot_profile_fetch_closes_its_session() {
    let factory = FixtureFactory::new().page("/alice", account("alice", 1_200, &[]));
    let runner = runner(&factory, Some(1));

    let profile = runner.fetch_profile("alice").await.unwrap();
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.followers_count, 1_200);
    assert_eq!(factory.probes().closed(), 1);

    assert!(runner.fetch_profile("nobody").await.is_err());
    assert_eq!(factory.probes().closed(), 2);
}

struct CrashingFactory;

#[async_trait]
impl SessionFactory for CrashingFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        panic!("browser process crashed");
    }
}

#[tokio::test]
async fn panic_while_opening_session_fails_the_job() {
    let base = Url::parse("https://x.com").unwrap();
    let extractor = Arc::new(Extractor::new(&SelectorTable::default(), &base).unwrap());
    let runner = JobRunner::new(Arc::new(CrashingFactory), extractor, RunnerSettings::default()).unwrap();

    let job = runner.submit_discovery(names(&["alice"]), None).unwrap();
    let done = tokio::time::timeout(Duration::from_secs(2), runner.wait(&job.id))
        .await
        .expect("job should settle")
        .unwrap();

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done
        .error
        .as_deref()
        .is_some_and(|e| e.contains("browser process crashed")));
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn cancel_interrupts_a_retrying_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "3600"))
        .mount(&server)
        .await;

    let factory = FixtureFactory::new().page("/alice", account("alice", 1, &["one"]));
    let runner = runner(&factory, None);
    let target = SinkTarget::parse(&format!("{}/ingest", server.uri()), "owner-1").unwrap();

    let job = runner.submit_post_sync(names(&["alice"]), target).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    runner.cancel(&job.id).unwrap();

    let done = tokio::time::timeout(Duration::from_secs(3), runner.wait(&job.id))
        .await
        .expect("cancel should not wait for the sink")
        .unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("job cancelled"));
    assert_eq!(factory.probes().opened(), factory.probes().closed());
    assert_eq!(factory.probes().closed(), 1);
}
