#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lookout_drivers::fixture::{FixtureFactory, FixtureSession, Frame};
use lookout_social::sink::{PostSink, SinkError};
use lookout_social::twitter::{Extractor, Pacing, Post, SelectorTable, TwitterScraper};
use url::Url;

pub const PAGE_HEIGHT: u64 = 1_200;

/// Profile page with an optional timeline below the header.
pub fn account_page(handle: &str, followers: u64, posts: &[&str]) -> String {
    let articles: String = posts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            format!(
                r#"<article data-testid="tweet">
                     <a href="/{handle}/status/{id}"><time datetime="2024-05-01T00:00:00.000Z">May 1</time></a>
                     <div data-testid="tweetText">{text}</div>
                   </article>"#,
                id = 1000 + i
            )
        })
        .collect();
    format!(
        r#"<html><body>
             <div data-testid="primaryColumn">
               <div><h2>{handle} name</h2><div>{count} posts</div></div>
               <div data-testid="UserName">
                 <div><span>{handle} name</span></div>
                 <div><span>@{handle}</span></div>
               </div>
               <a href="/{handle}/following">12 Following</a>
               <a href="/{handle}/verified_followers">{followers} Followers</a>
               {articles}
             </div>
           </body></html>"#,
        count = posts.len()
    )
}

pub fn following_page(handles: &[&str]) -> String {
    let cells: String = handles
        .iter()
        .map(|h| {
            format!(
                r#"<div data-testid="UserCell"><a href="/{h}"><img src="https://pbs.twimg.com/profile_images/{h}.jpg"></a>
                     <div dir="auto">{h} name</div></div>"#
            )
        })
        .collect();
    format!("<html><body>{cells}</body></html>")
}

/// Factory extended with account and listing pages.
pub trait FixtureExt {
    fn account(self, handle: &str, followers: u64) -> Self;
    fn account_with_posts(self, handle: &str, followers: u64, posts: &[&str]) -> Self;
    fn following(self, handle: &str, handles: &[&str]) -> Self;
}

impl FixtureExt for FixtureFactory {
    fn account(self, handle: &str, followers: u64) -> Self {
        self.account_with_posts(handle, followers, &[])
    }

    fn account_with_posts(self, handle: &str, followers: u64, posts: &[&str]) -> Self {
        self.page(
            &format!("/{handle}"),
            vec![Frame::new(account_page(handle, followers, posts), PAGE_HEIGHT)],
        )
    }

    fn following(self, handle: &str, handles: &[&str]) -> Self {
        self.page(
            &format!("/{handle}/following"),
            vec![Frame::new(following_page(handles), PAGE_HEIGHT)],
        )
    }
}

pub fn extractor() -> Arc<Extractor> {
    let base = Url::parse("https://x.com").unwrap();
    Arc::new(Extractor::new(&SelectorTable::default(), &base).unwrap())
}

/// Scraper over a fresh fixture session with no pacing delays. A short
/// no-growth budget keeps static listings quick.
pub fn scraper(factory: &FixtureFactory) -> TwitterScraper<FixtureSession> {
    TwitterScraper::new(factory.session(), extractor(), Pacing::none()).with_max_no_growth_attempts(2)
}

pub fn seeds(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[derive(Default)]
pub struct RecordingSink {
    pub deliveries: Mutex<Vec<(String, Vec<Post>)>>,
    pub reject: Vec<String>,
}

impl RecordingSink {
    pub fn rejecting(usernames: &[&str]) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            reject: seeds(usernames),
        }
    }

    pub fn delivered(&self) -> Vec<(String, Vec<Post>)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostSink for RecordingSink {
    async fn deliver(&self, username: &str, posts: &[Post]) -> Result<(), SinkError> {
        if self.reject.iter().any(|r| r == username) {
            return Err(SinkError::Rejected {
                status: 503,
                message: "unavailable".into(),
            });
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((username.to_string(), posts.to_vec()));
        Ok(())
    }
}
