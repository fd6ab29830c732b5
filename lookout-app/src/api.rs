//! HTTP surface over the job runner.
//!
//! Profile and post reads run inline on a short-lived session. Discovery and
//! post sync are submitted as background jobs and polled via `/jobs/{id}`.
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{Method, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use lookout_common::LookoutError;
use lookout_jobs::{CrawlJob, JobError, JobRunner, JobStatus};
use lookout_social::analytics::{self, AnalysisReport};
use lookout_social::sink::SinkTarget;
use lookout_social::twitter::{Post, Profile};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const DEFAULT_MAX_POSTS: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub runner: JobRunner,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Upstream(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, detail) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::EmptyUsernames => ApiError::BadRequest(err.to_string()),
            JobError::NotFound(_) => ApiError::NotFound("Job not found".to_string()),
            JobError::ShuttingDown => ApiError::Unavailable(err.to_string()),
            JobError::InvalidTransition { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<LookoutError> for ApiError {
    fn from(err: LookoutError) -> Self {
        tracing::warn!(error = %err, "api.scrape_failed");
        match err {
            LookoutError::Navigation(_) => {
                ApiError::NotFound(format!("Profile not found or scraping failed: {err}"))
            }
            LookoutError::Driver(_) | LookoutError::Sink(_) => ApiError::Upstream(err.to_string()),
            LookoutError::Cancelled => ApiError::Unavailable(err.to_string()),
            LookoutError::Config(_) | LookoutError::Job(_) => ApiError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct PostsRequest {
    pub username: String,
    #[serde(default = "default_max_posts")]
    pub max_posts: usize,
}

fn default_max_posts() -> usize {
    DEFAULT_MAX_POSTS
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub username: String,
    pub posts: Vec<Post>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    pub usernames: Vec<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub usernames: Vec<String>,
    pub callback_url: String,
    pub owner_id: String,
}

#[derive(Debug, Serialize)]
struct JobAccepted {
    job_id: Uuid,
    status: JobStatus,
    message: &'static str,
}

fn sink_target(callback_url: &str, owner_id: &str) -> Result<SinkTarget, ApiError> {
    SinkTarget::parse(callback_url, owner_id).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("Job not found".to_string()))
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "online",
        service: "Lookout",
    })
}

async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    tracing::info!(%username, "api.profile");
    Ok(Json(state.runner.fetch_profile(&username).await?))
}

async fn get_posts(
    State(state): State<AppState>,
    Json(req): Json<PostsRequest>,
) -> Result<Json<Vec<Post>>, ApiError> {
    tracing::info!(username = %req.username, max = req.max_posts, "api.posts");
    Ok(Json(
        state
            .runner
            .collect_posts(&req.username, req.max_posts)
            .await?,
    ))
}

async fn analyze(Json(req): Json<AnalyzeRequest>) -> Json<AnalysisReport> {
    tracing::info!(username = %req.username, posts = req.posts.len(), "api.analyze");
    Json(analytics::analyze(&req.posts, req.profile.as_ref()))
}

async fn start_discovery(
    State(state): State<AppState>,
    Json(req): Json<DiscoverRequest>,
) -> Result<Json<JobAccepted>, ApiError> {
    let sink = match (req.callback_url.as_deref(), req.owner_id.as_deref()) {
        (Some(url), Some(owner)) => Some(sink_target(url, owner)?),
        _ => None,
    };
    let job = state.runner.submit_discovery(req.usernames, sink)?;
    Ok(Json(JobAccepted {
        job_id: job.id,
        status: job.status,
        message: "Discovery job started. Poll /jobs/{job_id} for status.",
    }))
}

async fn start_post_sync(
    State(state): State<AppState>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<JobAccepted>, ApiError> {
    if req.usernames.is_empty() {
        return Err(JobError::EmptyUsernames.into());
    }
    let sink = sink_target(&req.callback_url, &req.owner_id)?;
    let job = state.runner.submit_post_sync(req.usernames, sink)?;
    Ok(Json(JobAccepted {
        job_id: job.id,
        status: job.status,
        message: "Post sync job started.",
    }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CrawlJob>, ApiError> {
    let id = job_id(&id)?;
    state
        .runner
        .get(&id)
        .map(Json)
        .ok_or_else(|| JobError::NotFound(id).into())
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CrawlJob>), ApiError> {
    let id = job_id(&id)?;
    let job = state.runner.cancel(&id)?;
    let status = if job.status.is_terminal() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(job)))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/profile/{username}", get(get_profile))
        .route("/posts", post(get_posts))
        .route("/analyze", post(analyze))
        .route("/discover", post(start_discovery))
        .route("/sync-posts", post(start_post_sync))
        .route("/jobs/{id}", get(get_job).delete(cancel_job))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use lookout_drivers::fixture::{FixtureFactory, Frame};
    use lookout_jobs::RunnerSettings;
    use lookout_social::twitter::{Extractor, Pacing, SelectorTable};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn account(handle: &str, followers: u64) -> Vec<Frame> {
        vec![Frame::new(
            format!(
                r#"<div data-testid="UserName"><span>{handle}</span><span>@{handle}</span></div>
                   <a href="/{handle}/followers">{followers} Followers</a>"#
            ),
            600,
        )]
    }

    fn app(factory: FixtureFactory) -> (Router, JobRunner) {
        let base = url::Url::parse("https://x.com").unwrap();
        let extractor = Arc::new(Extractor::new(&SelectorTable::default(), &base).unwrap());
        let settings = RunnerSettings {
            pacing: Pacing::none(),
            max_no_growth_attempts: 1,
            ..Default::default()
        };
        let runner = JobRunner::new(Arc::new(factory), extractor, settings).unwrap();
        let router = build_app(AppState {
            runner: runner.clone(),
        });
        (router, runner)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("json body")
        };
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_online() {
        let (app, _) = app(FixtureFactory::new());
        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "online");
    }

    #[tokio::test]
    async fn profile_is_scraped_inline() {
        let (app, _) = app(FixtureFactory::new().page("/alice", account("alice", 42)));
        let (status, body) = send(&app, get("/profile/alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
        assert_eq!(body["followers_count"], 42);
    }

    #[tokio::test]
    async fn unreachable_profile_is_not_found() {
        let (app, _) = app(FixtureFactory::new().failing("/ghost", "net::ERR_TIMED_OUT"));
        let (status, body) = send(&app, get("/profile/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("ERR_TIMED_OUT"));
    }

    #[tokio::test]
    async fn empty_discovery_is_rejected() {
        let (app, runner) = app(FixtureFactory::new());
        let (status, body) = send(&app, post_json("/discover", json!({ "usernames": [] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "at least one username is required");
        assert!(runner.store().is_empty());
    }

    #[tokio::test]
    async fn discovery_job_can_be_polled_to_completion() {
        let (app, runner) = app(FixtureFactory::new()
            .page("/alice", account("alice", 10))
            .page("/alice/following", vec![Frame::new("", 600)]));

        let (status, body) =
            send(&app, post_json("/discover", json!({ "usernames": ["alice"] }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        let id: Uuid = body["job_id"].as_str().unwrap().parse().unwrap();

        runner.wait(&id).await.unwrap();
        let (status, job) = send(&app, get(&format!("/jobs/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["status"], "completed");
        assert_eq!(job["result"][0]["username"], "alice");
        assert_eq!(job["error"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_or_malformed_job_ids_are_not_found() {
        let (app, _) = app(FixtureFactory::new());
        let (status, body) = send(&app, get(&format!("/jobs/{}", Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Job not found");

        let (status, _) = send(&app, get("/jobs/not-a-uuid")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/jobs/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_requires_a_valid_callback() {
        let (app, runner) = app(FixtureFactory::new());
        let (status, _) = send(
            &app,
            post_json(
                "/sync-posts",
                json!({ "usernames": ["alice"], "callback_url": "ftp://nope", "owner_id": "u1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            post_json(
                "/sync-posts",
                json!({ "usernames": [], "callback_url": "https://example.com/hook", "owner_id": "u1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(runner.store().is_empty());
    }

    #[tokio::test]
    async fn analyze_summarises_posted_content() {
        let (app, _) = app(FixtureFactory::new());
        let (status, body) = send(
            &app,
            post_json(
                "/analyze",
                json!({
                    "username": "alice",
                    "posts": [
                        { "text": "love this #rust", "hashtags": ["rust"], "likes": 3 },
                        { "text": "meh", "is_reply": true, "reply_to": "bob" }
                    ]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["top_hashtags"][0], json!(["rust", 1]));
        assert_eq!(body["post_types"]["replies"], 1);
        assert_eq!(body["engagement"], Value::Null);
    }
}
