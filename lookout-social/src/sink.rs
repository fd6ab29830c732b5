//! Delivery of collected posts to a downstream system.
//!
//! The sink is an HTTP callback that receives one JSON document per account:
//! `{ "username": ..., "posts": [...], "owner_id": ... }`. Any non-2xx answer or
//! transport failure is a per-account [`SinkError`]; callers log it and carry on.
use async_trait::async_trait;
use lookout_common::LookoutError;
use lookout_http::{HttpClient, HttpError, RequestOpts, parse_url};
use serde::Serialize;
use url::Url;

use crate::twitter::types::Post;

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink rejected delivery with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("sink unreachable: {0}")]
    Transport(String),

    #[error("invalid sink target: {0}")]
    Target(String),
}

impl From<HttpError> for SinkError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Api { status, message } => SinkError::Rejected {
                status: status.as_u16(),
                message,
            },
            HttpError::Url(m) => SinkError::Target(m),
            other => SinkError::Transport(other.to_string()),
        }
    }
}

impl From<SinkError> for LookoutError {
    fn from(err: SinkError) -> Self {
        LookoutError::Sink(err.to_string())
    }
}

#[async_trait]
pub trait PostSink: Send + Sync {
    async fn deliver(&self, username: &str, posts: &[Post]) -> Result<(), SinkError>;
}

/// Where and on whose behalf posts are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkTarget {
    pub callback_url: Url,
    pub owner_id: String,
}

impl SinkTarget {
    pub fn parse(callback_url: &str, owner_id: &str) -> Result<Self, SinkError> {
        let callback_url = parse_url(callback_url)?;
        if !matches!(callback_url.scheme(), "http" | "https") {
            return Err(SinkError::Target(format!(
                "unsupported scheme {}",
                callback_url.scheme()
            )));
        }
        if owner_id.trim().is_empty() {
            return Err(SinkError::Target("owner id is empty".to_string()));
        }
        Ok(Self {
            callback_url,
            owner_id: owner_id.to_string(),
        })
    }
}

#[derive(Serialize)]
struct Delivery<'a> {
    username: &'a str,
    posts: &'a [Post],
    owner_id: &'a str,
}

/// [`PostSink`] that POSTs JSON to a callback URL.
#[derive(Clone, Debug)]
pub struct HttpSink {
    http: HttpClient,
    target: SinkTarget,
}

impl HttpSink {
    pub fn new(target: SinkTarget) -> Result<Self, SinkError> {
        let http = HttpClient::new().map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self { http, target })
    }

    pub fn with_client(http: HttpClient, target: SinkTarget) -> Self {
        Self { http, target }
    }

    pub fn target(&self) -> &SinkTarget {
        &self.target
    }
}

#[async_trait]
impl PostSink for HttpSink {
    async fn deliver(&self, username: &str, posts: &[Post]) -> Result<(), SinkError> {
        let body = Delivery {
            username,
            posts,
            owner_id: &self.target.owner_id,
        };
        match self
            .http
            .post_json(&self.target.callback_url, &body, RequestOpts::default())
            .await
        {
            Ok(_) => {
                tracing::info!(username, posts = posts.len(), "sink.delivered");
                Ok(())
            }
            Err(e) => {
                let err = SinkError::from(e);
                tracing::warn!(username, error = %err, "sink.rejected");
                Err(err)
            }
        }
    }
}
