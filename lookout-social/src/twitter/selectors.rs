//! Versioned CSS selector table for the rendered Twitter/X UI.
//!
//! The table is plain data so it can be revised from configuration whenever the
//! site's markup shifts. Every field has a compiled-in default; a YAML override
//! only needs to name the fields that changed.
use serde::{Deserialize, Serialize};

/// Revision of the compiled-in defaults. Bump alongside any selector change.
pub const DEFAULT_SELECTOR_VERSION: &str = "2024.11";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    pub version: String,
    pub profile: ProfileSelectors,
    pub post: PostSelectors,
    pub listing: ListingSelectors,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            version: DEFAULT_SELECTOR_VERSION.to_string(),
            profile: ProfileSelectors::default(),
            post: PostSelectors::default(),
            listing: ListingSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSelectors {
    /// Main content region; its first child is the sticky header with the post count.
    pub primary_column: String,
    /// Block holding display name and `@handle`.
    pub user_name: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub join_date: String,
    pub verified: String,
    pub following_link: String,
    /// Tried in order; the first that matches wins.
    pub followers_links: Vec<String>,
    pub avatar_image: String,
    /// Substrings marking a full-size avatar rather than a thumbnail.
    pub avatar_hires_markers: Vec<String>,
    pub banner_image: String,
}

impl Default for ProfileSelectors {
    fn default() -> Self {
        Self {
            primary_column: r#"div[data-testid="primaryColumn"]"#.to_string(),
            user_name: r#"div[data-testid="UserName"]"#.to_string(),
            bio: r#"div[data-testid="UserDescription"]"#.to_string(),
            location: r#"span[data-testid="UserLocation"]"#.to_string(),
            website: r#"a[data-testid="UserUrl"]"#.to_string(),
            join_date: r#"span[data-testid="UserJoinDate"]"#.to_string(),
            verified: r#"svg[data-testid="icon-verified"]"#.to_string(),
            following_link: r#"a[href$="/following"]"#.to_string(),
            followers_links: vec![
                r#"a[href$="/verified_followers"]"#.to_string(),
                r#"a[href$="/followers"]"#.to_string(),
            ],
            avatar_image: r#"img[src*="profile_images"]"#.to_string(),
            avatar_hires_markers: vec!["200x200".to_string(), "400x400".to_string()],
            banner_image: r#"img[src*="profile_banners"]"#.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSelectors {
    pub container: String,
    pub text: String,
    pub timestamp: String,
    pub like: String,
    pub repost: String,
    pub reply: String,
    pub views: String,
    /// Literal text of the element that precedes the reply target link.
    pub reply_marker: String,
}

impl Default for PostSelectors {
    fn default() -> Self {
        Self {
            container: r#"article[data-testid="tweet"]"#.to_string(),
            text: r#"div[data-testid="tweetText"]"#.to_string(),
            timestamp: "time".to_string(),
            like: r#"[data-testid="like"], [data-testid="unlike"]"#.to_string(),
            repost: r#"[data-testid="retweet"], [data-testid="unretweet"]"#.to_string(),
            reply: r#"[data-testid="reply"]"#.to_string(),
            views: r#"a[href*="/analytics"]"#.to_string(),
            reply_marker: "Replying to".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub cell: String,
    pub link: String,
    pub display_name: String,
    pub avatar: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            cell: r#"div[data-testid="UserCell"], button[data-testid="UserCell"]"#.to_string(),
            link: "a[href]".to_string(),
            display_name: r#"div[dir="auto"]"#.to_string(),
            avatar: "img[src]".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_other_defaults() {
        let table: SelectorTable = serde_json::from_value(serde_json::json!({
            "version": "2025.01",
            "post": { "text": "div[data-testid=\"postText\"]" }
        }))
        .unwrap();

        assert_eq!(table.version, "2025.01");
        assert_eq!(table.post.text, r#"div[data-testid="postText"]"#);
        assert_eq!(table.post.container, PostSelectors::default().container);
        assert_eq!(table.profile, ProfileSelectors::default());
    }
}
