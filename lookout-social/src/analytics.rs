//! Summary statistics over collected posts.
//!
//! Sentiment uses a small general-purpose word lexicon: each matching word adds
//! its weight, the per-post score is clamped to `[-1.0, 1.0]`, and posts above
//! `0.1` count as positive, below `-0.1` as negative.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::twitter::types::{Post, Profile};

const POSITIVE_THRESHOLD: f64 = 0.1;
const NEGATIVE_THRESHOLD: f64 = -0.1;
pub const DEFAULT_TOP_N: usize = 10;

pub(crate) const LEXICON: &[(&str, f64)] = &[
    // Positive
    ("good", 0.3),
    ("great", 0.4),
    ("excellent", 0.5),
    ("amazing", 0.5),
    ("awesome", 0.5),
    ("love", 0.5),
    ("loved", 0.5),
    ("best", 0.5),
    ("happy", 0.4),
    ("excited", 0.4),
    ("thanks", 0.3),
    ("thank", 0.3),
    ("nice", 0.3),
    ("win", 0.4),
    ("wonderful", 0.5),
    ("beautiful", 0.4),
    ("proud", 0.4),
    ("fun", 0.3),
    ("congrats", 0.4),
    ("recommend", 0.3),
    // Negative
    ("bad", -0.4),
    ("terrible", -0.6),
    ("awful", -0.6),
    ("worst", -0.6),
    ("hate", -0.6),
    ("sad", -0.4),
    ("angry", -0.5),
    ("broken", -0.4),
    ("fail", -0.4),
    ("failed", -0.4),
    ("wrong", -0.3),
    ("problem", -0.3),
    ("disappointed", -0.5),
    ("annoying", -0.4),
    ("sorry", -0.2),
    ("scam", -0.7),
    ("lost", -0.3),
    ("poor", -0.4),
];

/// Lexicon polarity of `text`, clamped to `[-1.0, 1.0]`.
#[must_use]
pub fn polarity(text: &str) -> f64 {
    let mut score = 0.0_f64;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|(lex, _)| *lex == w) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(part as f64 / total as f64 * 100.0, 2)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub positive_count: usize,
    pub neutral_count: usize,
    pub negative_count: usize,
    pub positive_pct: f64,
    pub neutral_pct: f64,
    pub negative_pct: f64,
    pub average_polarity: f64,
}

pub fn sentiment(posts: &[Post]) -> SentimentSummary {
    if posts.is_empty() {
        return SentimentSummary::default();
    }
    let mut out = SentimentSummary::default();
    let mut sum = 0.0;
    for post in posts {
        let p = polarity(&post.text);
        sum += p;
        if p > POSITIVE_THRESHOLD {
            out.positive_count += 1;
        } else if p < NEGATIVE_THRESHOLD {
            out.negative_count += 1;
        } else {
            out.neutral_count += 1;
        }
    }
    let total = posts.len();
    out.positive_pct = pct(out.positive_count, total);
    out.neutral_pct = pct(out.neutral_count, total);
    out.negative_pct = pct(out.negative_count, total);
    out.average_polarity = round_to(sum / total as f64, 4);
    out
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Interactions per impression, in percent, capped at 100.
    pub engagement_rate: f64,
    pub conversion_rate: f64,
    pub avg_likes: f64,
    pub avg_reposts: f64,
    pub avg_replies: f64,
    pub avg_views: f64,
    pub total_interactions: u64,
    pub total_impressions: u64,
}

/// Impressions are summed views when any post reports them, otherwise
/// `followers * posts` stands in.
pub fn engagement(profile: &Profile, posts: &[Post]) -> EngagementMetrics {
    if posts.is_empty() {
        return EngagementMetrics::default();
    }
    let n = posts.len() as f64;
    let likes: u64 = posts.iter().map(|p| p.likes).sum();
    let reposts: u64 = posts.iter().map(|p| p.reposts).sum();
    let replies: u64 = posts.iter().map(|p| p.replies).sum();
    let views: u64 = posts.iter().filter_map(|p| p.views).sum();
    let interactions = likes + reposts + replies;

    let (engagement_rate, conversion_rate) = if views > 0 {
        let rate = interactions as f64 / views as f64 * 100.0;
        (rate, rate)
    } else {
        let followers = profile.followers_count.max(1) as f64;
        (interactions as f64 / (followers * n) * 100.0, 0.0)
    };

    EngagementMetrics {
        engagement_rate: round_to(engagement_rate.min(100.0), 2),
        conversion_rate: round_to(conversion_rate.min(100.0), 2),
        avg_likes: round_to(likes as f64 / n, 2),
        avg_reposts: round_to(reposts as f64 / n, 2),
        avg_replies: round_to(replies as f64 / n, 2),
        avg_views: round_to(views as f64 / n, 2),
        total_interactions: interactions,
        total_impressions: views,
    }
}

/// Most frequent entries, count descending, ties in order of first appearance.
fn top_n<'a>(items: impl Iterator<Item = &'a String>, n: usize) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for item in items {
        match index.get(item.as_str()) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(item.as_str(), order.len());
                order.push((item.clone(), 1));
            }
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.truncate(n);
    order
}

pub fn top_hashtags(posts: &[Post], n: usize) -> Vec<(String, usize)> {
    top_n(posts.iter().flat_map(|p| p.hashtags.iter()), n)
}

pub fn top_mentions(posts: &[Post], n: usize) -> Vec<(String, usize)> {
    top_n(posts.iter().flat_map(|p| p.mentions.iter()), n)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDistribution {
    pub original_posts: usize,
    pub replies: usize,
    pub original_pct: f64,
    pub replies_pct: f64,
}

pub fn type_distribution(posts: &[Post]) -> TypeDistribution {
    let replies = posts.iter().filter(|p| p.is_reply).count();
    let original = posts.len() - replies;
    TypeDistribution {
        original_posts: original,
        replies,
        original_pct: pct(original, posts.len()),
        replies_pct: pct(replies, posts.len()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub sentiment: SentimentSummary,
    /// Present only when a profile was supplied.
    pub engagement: Option<EngagementMetrics>,
    pub top_hashtags: Vec<(String, usize)>,
    pub top_mentions: Vec<(String, usize)>,
    pub post_types: TypeDistribution,
}

pub fn analyze(posts: &[Post], profile: Option<&Profile>) -> AnalysisReport {
    AnalysisReport {
        sentiment: sentiment(posts),
        engagement: profile.map(|p| engagement(p, posts)),
        top_hashtags: top_hashtags(posts, DEFAULT_TOP_N),
        top_mentions: top_mentions(posts, DEFAULT_TOP_N),
        post_types: type_distribution(posts),
    }
}
