use serde::{Deserialize, Serialize};

/// A fully resolved account page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub join_date: Option<String>,
    pub followers_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    pub is_verified: bool,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
}

/// One post as rendered on a timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: Option<String>,
    pub url: Option<String>,
    pub text: String,
    pub username: String,
    /// ISO-8601 string taken verbatim from the `datetime` attribute.
    pub timestamp: Option<String>,
    pub likes: u64,
    pub reposts: u64,
    pub replies: u64,
    /// Not every post renders a view counter.
    pub views: Option<u64>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub is_reply: bool,
    pub reply_to: Option<String>,
}

/// Partial profile read from a following/followers listing. Has no counters;
/// promote it with a profile fetch before treating it as a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStub {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}
