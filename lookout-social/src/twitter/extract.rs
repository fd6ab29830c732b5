//! Rendered markup to typed records.
//!
//! [`Extractor`] is built once from a [`SelectorTable`] and is then pure: the
//! same markup always yields the same output and nothing here does I/O.
//! Missing or malformed fields fall back to defaults (zero counts, `None`
//! text). Only a whole element that cannot be read at all is reported, as an
//! [`ExtractError`] next to the successfully parsed siblings.
use lookout_common::LookoutError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::selectors::SelectorTable;
use super::types::{ConnectionStub, Post, Profile};

/// Characters header text is scanned over when looking for a post count.
const HEADER_WINDOW_CHARS: usize = 500;
/// Text nodes at least this long are not considered compact count labels.
const COUNT_LABEL_MAX_CHARS: usize = 20;

/// Why one rendered element was skipped.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{entity} element has no {field}")]
    Missing {
        entity: &'static str,
        field: &'static str,
    },
    #[error("link {0:?} does not point at an account")]
    Handle(String),
}

/// Normalise a counter such as `"1.2K"` or `"2,500"` into an integer.
///
/// Thousands separators are ignored and a trailing `K`, `M` or `B` (any case)
/// scales the value. The arithmetic is exact decimal, truncating any fraction
/// that remains after scaling. Anything unparsable yields `0`.
///
/// ```
/// use lookout_social::twitter::parse_count;
///
/// assert_eq!(parse_count("1.2K"), 1_200);
/// assert_eq!(parse_count("2,500"), 2_500);
/// assert_eq!(parse_count("3M"), 3_000_000);
/// assert_eq!(parse_count("abc"), 0);
/// ```
pub fn parse_count(raw: &str) -> u64 {
    let upper = raw.trim().to_ascii_uppercase();
    let (number, multiplier) = match upper.as_bytes().last() {
        Some(b'K') => (&upper[..upper.len() - 1], 1_000u128),
        Some(b'M') => (&upper[..upper.len() - 1], 1_000_000u128),
        Some(b'B') => (&upper[..upper.len() - 1], 1_000_000_000u128),
        _ => (upper.as_str(), 1u128),
    };

    let cleaned: String = number.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    let (whole, fraction) = cleaned.split_once('.').unwrap_or((cleaned, ""));
    if whole.is_empty() && fraction.is_empty() {
        return 0;
    }
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !digits(fraction) {
        return 0;
    }

    let whole_value = if whole.is_empty() {
        0
    } else {
        match whole.parse::<u128>() {
            Ok(v) => v,
            Err(_) => return u64::MAX,
        }
    };

    // Digits past the ninth cannot move the truncated result for multipliers <= 1e9.
    let fraction = &fraction[..fraction.len().min(9)];
    let fraction_value = if fraction.is_empty() {
        0
    } else {
        fraction.parse::<u128>().unwrap_or(0) * multiplier / 10u128.pow(fraction.len() as u32)
    };

    let total = whole_value
        .saturating_mul(multiplier)
        .saturating_add(fraction_value);
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// Words introduced by `sigil` (`#tag`, `@handle`), in order of appearance.
pub fn tagged_words(text: &str, sigil: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != sigil {
            continue;
        }
        let mut word = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                word.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if !word.is_empty() {
            out.push(word);
        }
    }
    out
}

fn is_count_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, ',' | '.' | 'K' | 'M' | 'B')
}

/// Leading run of count characters, e.g. `"1.2K"` from `"1.2K Following"`.
fn leading_count(text: &str) -> Option<&str> {
    let end = text
        .char_indices()
        .find(|(_, c)| !is_count_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let token = &text[..end];
    token.chars().any(|c| c.is_ascii_digit()).then_some(token)
}

/// First run of count characters that contains a digit.
fn first_count(text: &str) -> Option<&str> {
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (start, is_count_char(c)) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                if text[s..i].chars().any(|c| c.is_ascii_digit()) {
                    return Some(&text[s..i]);
                }
                start = None;
            }
            _ => {}
        }
    }
    start
        .map(|s| &text[s..])
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
}

/// Descendant text joined by spaces with runs of whitespace collapsed.
fn clean_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the element's direct text children only.
fn own_text(el: ElementRef<'_>) -> String {
    el.children()
        .filter_map(|n| n.value().as_text().map(|t| &**t))
        .collect::<String>()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn compile(field: &str, css: &str) -> Result<Selector, LookoutError> {
    Selector::parse(css)
        .map_err(|e| LookoutError::Config(format!("selector `{field}` ({css}) is invalid: {e:?}")))
}

fn pattern(re: &str) -> Result<Regex, LookoutError> {
    Regex::new(re).map_err(|e| LookoutError::Config(format!("pattern {re}: {e}")))
}

struct ProfileRules {
    primary_column: Selector,
    user_name: Selector,
    bio: Selector,
    location: Selector,
    website: Selector,
    join_date: Selector,
    verified: Selector,
    following_link: Selector,
    followers_links: Vec<Selector>,
    avatar_image: Selector,
    avatar_hires_markers: Vec<String>,
    banner_image: Selector,
    span: Selector,
    header_count: Regex,
    count_label: Regex,
}

struct PostRules {
    container: Selector,
    text: Selector,
    timestamp: Selector,
    like: Selector,
    repost: Selector,
    reply: Selector,
    views: Selector,
    reply_marker: String,
    like_label: Regex,
    repost_label: Regex,
    reply_label: Regex,
}

struct ListingRules {
    cell: Selector,
    link: Selector,
    display_name: Selector,
    avatar: Selector,
}

/// Compiled selector table plus the site origin used to resolve links.
pub struct Extractor {
    base: Url,
    version: String,
    profile: ProfileRules,
    post: PostRules,
    listing: ListingRules,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("base", &self.base.as_str())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Extractor {
    /// Compile `table`. Invalid selectors are a configuration error.
    pub fn new(table: &SelectorTable, base: &Url) -> Result<Self, LookoutError> {
        let p = &table.profile;
        let profile = ProfileRules {
            primary_column: compile("profile.primary_column", &p.primary_column)?,
            user_name: compile("profile.user_name", &p.user_name)?,
            bio: compile("profile.bio", &p.bio)?,
            location: compile("profile.location", &p.location)?,
            website: compile("profile.website", &p.website)?,
            join_date: compile("profile.join_date", &p.join_date)?,
            verified: compile("profile.verified", &p.verified)?,
            following_link: compile("profile.following_link", &p.following_link)?,
            followers_links: p
                .followers_links
                .iter()
                .map(|css| compile("profile.followers_links", css))
                .collect::<Result<_, _>>()?,
            avatar_image: compile("profile.avatar_image", &p.avatar_image)?,
            avatar_hires_markers: p.avatar_hires_markers.clone(),
            banner_image: compile("profile.banner_image", &p.banner_image)?,
            span: compile("span", "span")?,
            header_count: pattern(r"(?i)(?:^|\s)([\d,.KMB]+)\s*(?:posts|tweets)")?,
            count_label: pattern(r"(?i)\d+.*\s(?:posts|tweets)")?,
        };

        let t = &table.post;
        let post = PostRules {
            container: compile("post.container", &t.container)?,
            text: compile("post.text", &t.text)?,
            timestamp: compile("post.timestamp", &t.timestamp)?,
            like: compile("post.like", &t.like)?,
            repost: compile("post.repost", &t.repost)?,
            reply: compile("post.reply", &t.reply)?,
            views: compile("post.views", &t.views)?,
            reply_marker: t.reply_marker.clone(),
            like_label: pattern(r"(?i)([\d,]+)\s+likes?")?,
            repost_label: pattern(r"(?i)([\d,]+)\s+reposts?")?,
            reply_label: pattern(r"(?i)([\d,]+)\s+repl(?:y|ies)")?,
        };

        let l = &table.listing;
        let listing = ListingRules {
            cell: compile("listing.cell", &l.cell)?,
            link: compile("listing.link", &l.link)?,
            display_name: compile("listing.display_name", &l.display_name)?,
            avatar: compile("listing.avatar", &l.avatar)?,
        };

        Ok(Self {
            base: base.clone(),
            version: table.version.clone(),
            profile,
            post,
            listing,
        })
    }

    pub fn selector_version(&self) -> &str {
        &self.version
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Read a profile page. `username` is the `@handle` shown in the name
    /// block, or empty when the block is missing.
    pub fn extract_profile(&self, markup: &str) -> Profile {
        let doc = Html::parse_document(markup);
        let rules = &self.profile;
        let first = |sel: &Selector| doc.select(sel).next();
        let text_of = |sel: &Selector| first(sel).map(clean_text).and_then(non_empty);

        let mut profile = Profile::default();

        if let Some(block) = first(&rules.user_name) {
            profile.display_name = block
                .select(&rules.span)
                .map(clean_text)
                .find(|t| !t.is_empty() && !t.starts_with('@'));
            profile.username = tagged_words(&clean_text(block), '@')
                .into_iter()
                .next()
                .unwrap_or_default();
        }

        profile.bio = text_of(&rules.bio);
        profile.location = text_of(&rules.location);
        profile.join_date = text_of(&rules.join_date);
        profile.website = first(&rules.website).and_then(|a| {
            non_empty(clean_text(a)).or_else(|| a.value().attr("href").map(str::to_string))
        });
        profile.is_verified = first(&rules.verified).is_some();

        let avatars: Vec<&str> = doc
            .select(&rules.avatar_image)
            .filter_map(|img| img.value().attr("src"))
            .collect();
        profile.avatar_url = avatars
            .iter()
            .find(|src| rules.avatar_hires_markers.iter().any(|m| src.contains(m.as_str())))
            .or_else(|| avatars.first())
            .map(|s| s.to_string());
        profile.banner_url = first(&rules.banner_image)
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        profile.post_count = self.post_count(&doc);
        profile.following_count = first(&rules.following_link)
            .map(|a| link_count(a))
            .unwrap_or(0);
        profile.followers_count = rules
            .followers_links
            .iter()
            .find_map(|sel| doc.select(sel).next())
            .map(|a| link_count(a))
            .unwrap_or(0);

        profile
    }

    /// Header regex over a bounded window first; compact text labels second.
    fn post_count(&self, doc: &Html) -> u64 {
        let rules = &self.profile;

        let header = doc
            .select(&rules.primary_column)
            .next()
            .and_then(|col| {
                col.children()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "div")
            })
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                clean_text(doc.root_element())
                    .chars()
                    .take(HEADER_WINDOW_CHARS)
                    .collect()
            });

        let from_header = rules
            .header_count
            .captures(&header)
            .and_then(|c| c.get(1))
            .map(|m| parse_count(m.as_str()))
            .unwrap_or(0);
        if from_header > 0 {
            return from_header;
        }

        doc.root_element()
            .text()
            .filter(|t| t.chars().count() < COUNT_LABEL_MAX_CHARS)
            .find(|t| rules.count_label.is_match(t))
            .and_then(first_count)
            .map(parse_count)
            .unwrap_or(0)
    }

    /// Parse every post container on the page. Not deduplicated.
    pub fn post_candidates(&self, markup: &str, username: &str) -> Vec<Result<Post, ExtractError>> {
        let doc = Html::parse_document(markup);
        doc.select(&self.post.container)
            .map(|el| self.parse_post(el, username))
            .collect()
    }

    /// Posts on the page, skipping unreadable containers.
    pub fn extract_posts(&self, markup: &str, username: &str) -> Vec<Post> {
        self.post_candidates(markup, username)
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }

    fn parse_post(&self, el: ElementRef<'_>, username: &str) -> Result<Post, ExtractError> {
        let rules = &self.post;
        let text_el = el.select(&rules.text).next();
        let time_el = el.select(&rules.timestamp).next();
        if text_el.is_none() && time_el.is_none() {
            return Err(ExtractError::Missing {
                entity: "post",
                field: "text or timestamp",
            });
        }

        let text = text_el.map(clean_text).unwrap_or_default();
        let (id, url) = time_el
            .and_then(|t| self.permalink(t))
            .map(|(id, url)| (Some(id), Some(url)))
            .unwrap_or((None, None));

        let metric = |sel: &Selector, label: &Regex| {
            el.select(sel)
                .next()
                .map(|m| metric_count(m, label))
                .unwrap_or(0)
        };

        let (is_reply, reply_to) = self.reply_target(el);

        Ok(Post {
            id,
            url,
            hashtags: tagged_words(&text, '#'),
            mentions: tagged_words(&text, '@'),
            text,
            username: username.to_string(),
            timestamp: time_el
                .and_then(|t| t.value().attr("datetime"))
                .map(str::to_string),
            likes: metric(&rules.like, &rules.like_label),
            reposts: metric(&rules.repost, &rules.repost_label),
            replies: metric(&rules.reply, &rules.reply_label),
            views: el
                .select(&rules.views)
                .next()
                .map(|a| first_count(&clean_text(a)).map(parse_count).unwrap_or(0)),
            is_reply,
            reply_to,
        })
    }

    /// Status id and absolute URL from the link wrapping the timestamp.
    fn permalink(&self, time_el: ElementRef<'_>) -> Option<(String, String)> {
        let href = time_el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "a")?
            .value()
            .attr("href")?;
        let url = self.base.join(href).ok()?;
        let mut segments = url.path_segments()?;
        segments.find(|s| *s == "status")?;
        let id = segments.next().filter(|s| !s.is_empty())?.to_string();
        Some((id, url.to_string()))
    }

    /// A post is a reply when a div carries the marker text; the target is the
    /// first link after that div in document order.
    fn reply_target(&self, el: ElementRef<'_>) -> (bool, Option<String>) {
        let marker = self.post.reply_marker.as_str();
        let mut seen_marker = false;
        for node in el.descendants() {
            let Some(child) = ElementRef::wrap(node) else {
                continue;
            };
            if !seen_marker {
                seen_marker = child.value().name() == "div" && own_text(child).contains(marker);
                continue;
            }
            if child.value().name() == "a" {
                let target = clean_text(child);
                let target = target.trim_start_matches('@');
                return (true, non_empty(target.to_string()));
            }
        }
        (seen_marker, None)
    }

    /// Parse every listing cell on the page. Not deduplicated.
    pub fn connection_candidates(&self, markup: &str) -> Vec<Result<ConnectionStub, ExtractError>> {
        let doc = Html::parse_document(markup);
        doc.select(&self.listing.cell)
            .map(|cell| self.parse_cell(cell))
            .collect()
    }

    pub fn extract_connection_stubs(&self, markup: &str) -> Vec<ConnectionStub> {
        self.connection_candidates(markup)
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }

    fn parse_cell(&self, cell: ElementRef<'_>) -> Result<ConnectionStub, ExtractError> {
        let rules = &self.listing;
        let href = cell
            .select(&rules.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or(ExtractError::Missing {
                entity: "listing cell",
                field: "profile link",
            })?;
        let username =
            normalize_handle(&self.base, href).ok_or_else(|| ExtractError::Handle(href.to_string()))?;

        let display_name = cell
            .select(&rules.display_name)
            .next()
            .map(clean_text)
            .and_then(non_empty)
            .or_else(|| Some(username.clone()));
        let avatar_url = cell
            .select(&rules.avatar)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        Ok(ConnectionStub {
            username,
            display_name,
            avatar_url,
        })
    }
}

/// Count at the start of a link's text, e.g. `"1,234 Following"`.
fn link_count(a: ElementRef<'_>) -> u64 {
    leading_count(&clean_text(a)).map(parse_count).unwrap_or(0)
}

/// Accessible label first (`"12 Likes. Like"`), visible text second.
fn metric_count(el: ElementRef<'_>, label: &Regex) -> u64 {
    if let Some(n) = el
        .value()
        .attr("aria-label")
        .and_then(|l| label.captures(l))
        .and_then(|c| c.get(1))
    {
        return parse_count(n.as_str());
    }
    first_count(&clean_text(el)).map(parse_count).unwrap_or(0)
}

/// First path segments that address site pages rather than accounts.
const RESERVED_PATHS: &[&str] = &[
    "i", "home", "explore", "search", "notifications", "messages", "settings", "compose",
    "hashtag", "intent", "share", "login", "logout", "signup", "tos", "privacy",
];

/// Account handle addressed by `href`, resolved against `base`.
///
/// Only same-site links whose first path segment is a plausible handle and not
/// a reserved site page count. Case is preserved.
pub fn normalize_handle(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href.trim()).ok()?;
    if url.host_str() != base.host_str() {
        return None;
    }
    let first = url.path_segments()?.find(|s| !s.is_empty())?;
    let handle = first.trim_start_matches('@');
    let valid = !handle.is_empty()
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_PATHS.iter().any(|r| r.eq_ignore_ascii_case(handle));
    valid.then(|| handle.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        let base = Url::parse("https://x.com").unwrap();
        Extractor::new(&SelectorTable::default(), &base).unwrap()
    }

    #[test]
    fn parse_count_handles_suffixes_and_separators() {
        assert_eq!(parse_count("1.2K"), 1_200);
        assert_eq!(parse_count("2,500"), 2_500);
        assert_eq!(parse_count("3M"), 3_000_000);
        assert_eq!(parse_count("4B"), 4_000_000_000);
        assert_eq!(parse_count("1.15k"), 1_150);
        assert_eq!(parse_count(" 229.5K "), 229_500);
        assert_eq!(parse_count(".5K"), 500);
        assert_eq!(parse_count("1,242"), 1_242);
    }

    #[test]
    fn parse_count_is_total() {
        for junk in ["", "abc", "K", ".", "1.2.3", "-5", "12x", "1e3"] {
            assert_eq!(parse_count(junk), 0, "{junk:?}");
        }
        assert_eq!(parse_count("99999999999999999999999B"), u64::MAX);
    }

    #[test]
    fn tagged_words_follow_word_characters() {
        assert_eq!(tagged_words("ship it #rust #async_io!", '#'), vec!["rust", "async_io"]);
        assert_eq!(tagged_words("cc @bob, @carol_1 and @", '@'), vec!["bob", "carol_1"]);
        assert_eq!(tagged_words("##double", '#'), vec!["double"]);
    }

    #[test]
    fn first_count_skips_runs_without_digits() {
        assert_eq!(first_count("Views: 23M"), Some("23M"));
        assert_eq!(first_count("Bob has 1.2K"), Some("1.2K"));
        assert_eq!(first_count("Like"), None);
        assert_eq!(leading_count("1,234 Following"), Some("1,234"));
        assert_eq!(leading_count("Following"), None);
    }

    const PROFILE: &str = r#"
      <html><body>
        <div data-testid="primaryColumn">
          <div><h2>Alice Smith</h2><div>12.3K posts</div></div>
          <div>
            <img src="https://pbs.twimg.com/profile_banners/1/1500x500">
            <img src="https://pbs.twimg.com/profile_images/1/alice_normal.jpg">
            <img src="https://pbs.twimg.com/profile_images/1/alice_400x400.jpg">
            <div data-testid="UserName">
              <div><span><span>Alice Smith</span></span>
                <svg data-testid="icon-verified"></svg></div>
              <div><span>@alice</span></div>
            </div>
            <div data-testid="UserDescription"><span>Building   things</span> <span>#rust</span></div>
            <span data-testid="UserLocation">Berlin</span>
            <a data-testid="UserUrl" href="https://t.co/xyz">alice.dev</a>
            <span data-testid="UserJoinDate">Joined March 2009</span>
            <a href="/alice/following"><span>1,024</span> <span>Following</span></a>
            <a href="/alice/verified_followers"><span>2.5M</span> <span>Followers</span></a>
          </div>
        </div>
      </body></html>"#;

    #[test]
    fn profile_fields_are_extracted() {
        let p = extractor().extract_profile(PROFILE);
        assert_eq!(p.username, "alice");
        assert_eq!(p.display_name.as_deref(), Some("Alice Smith"));
        assert_eq!(p.bio.as_deref(), Some("Building things #rust"));
        assert_eq!(p.location.as_deref(), Some("Berlin"));
        assert_eq!(p.website.as_deref(), Some("alice.dev"));
        assert_eq!(p.join_date.as_deref(), Some("Joined March 2009"));
        assert!(p.is_verified);
        assert_eq!(p.post_count, 12_300);
        assert_eq!(p.following_count, 1_024);
        assert_eq!(p.followers_count, 2_500_000);
        assert_eq!(
            p.avatar_url.as_deref(),
            Some("https://pbs.twimg.com/profile_images/1/alice_400x400.jpg")
        );
        assert_eq!(
            p.banner_url.as_deref(),
            Some("https://pbs.twimg.com/profile_banners/1/1500x500")
        );
    }

    #[test]
    fn empty_markup_yields_defaults() {
        let p = extractor().extract_profile("<html></html>");
        assert_eq!(p, Profile::default());
    }

    #[test]
    fn avatar_falls_back_to_first_match_and_followers_to_plain_link() {
        let markup = r#"
            <img src="https://pbs.twimg.com/profile_images/9/bob_normal.jpg">
            <img src="https://pbs.twimg.com/profile_images/9/bob_bigger.jpg">
            <a href="/bob/followers">870 Followers</a>"#;
        let p = extractor().extract_profile(markup);
        assert_eq!(
            p.avatar_url.as_deref(),
            Some("https://pbs.twimg.com/profile_images/9/bob_normal.jpg")
        );
        assert_eq!(p.followers_count, 870);
        assert!(!p.is_verified);
    }

    #[test]
    fn post_count_falls_back_to_short_labels() {
        let markup = r#"
            <div data-testid="primaryColumn"><div>Profile</div></div>
            <div><span>Some long sentence that mentions 4 posts in passing</span></div>
            <div><span>3,401 posts</span></div>"#;
        assert_eq!(extractor().extract_profile(markup).post_count, 3_401);
    }

    #[test]
    fn header_window_used_without_primary_column() {
        let markup = "<body><p>Carol</p><p>87 Tweets</p></body>";
        assert_eq!(extractor().extract_profile(markup).post_count, 87);
    }

    const TIMELINE: &str = r#"
      <article data-testid="tweet">
        <a href="/alice/status/1790000000000000001"><time datetime="2024-05-13T10:00:00.000Z">May 13</time></a>
        <div data-testid="tweetText"><span>Shipping #rust today with @bob</span></div>
        <button data-testid="reply" aria-label="3 Replies. Reply"><span>3</span></button>
        <button data-testid="retweet" aria-label="12 reposts. Repost"><span>12</span></button>
        <button data-testid="like"><span>1.2K</span></button>
        <a href="/alice/status/1790000000000000001/analytics"><span>45K</span></a>
      </article>
      <article data-testid="tweet">
        <div dir="ltr">Replying to <a href="/carol"><span>@carol</span></a></div>
        <a href="/alice/status/1790000000000000002"><time datetime="2024-05-12T09:00:00.000Z">May 12</time></a>
        <div data-testid="tweetText">agreed</div>
        <button data-testid="like" aria-label="1 Like. Like"></button>
      </article>
      <article data-testid="tweet"><div>Promoted placeholder</div></article>"#;

    #[test]
    fn posts_are_parsed_with_metrics_and_links() {
        let candidates = extractor().post_candidates(TIMELINE, "alice");
        assert_eq!(candidates.len(), 3);

        let first = candidates[0].as_ref().unwrap();
        assert_eq!(first.text, "Shipping #rust today with @bob");
        assert_eq!(first.username, "alice");
        assert_eq!(first.id.as_deref(), Some("1790000000000000001"));
        assert_eq!(
            first.url.as_deref(),
            Some("https://x.com/alice/status/1790000000000000001")
        );
        assert_eq!(first.timestamp.as_deref(), Some("2024-05-13T10:00:00.000Z"));
        assert_eq!((first.replies, first.reposts, first.likes), (3, 12, 1_200));
        assert_eq!(first.views, Some(45_000));
        assert_eq!(first.hashtags, vec!["rust"]);
        assert_eq!(first.mentions, vec!["bob"]);
        assert!(!first.is_reply);

        let second = candidates[1].as_ref().unwrap();
        assert!(second.is_reply);
        assert_eq!(second.reply_to.as_deref(), Some("carol"));
        assert_eq!(second.likes, 1);
        assert_eq!(second.views, None);

        assert_eq!(
            candidates[2],
            Err(ExtractError::Missing {
                entity: "post",
                field: "text or timestamp"
            })
        );
        assert_eq!(extractor().extract_posts(TIMELINE, "alice").len(), 2);
    }

    #[test]
    fn extraction_is_idempotent() {
        let ex = extractor();
        assert_eq!(ex.extract_posts(TIMELINE, "alice"), ex.extract_posts(TIMELINE, "alice"));
        assert_eq!(ex.extract_profile(PROFILE), ex.extract_profile(PROFILE));
    }

    #[test]
    fn listing_cells_become_stubs() {
        let markup = r#"
          <div data-testid="UserCell">
            <a href="/Dave_01"><img src="https://pbs.twimg.com/profile_images/4/d.jpg"></a>
            <div dir="auto"><span>Dave</span></div>
          </div>
          <div data-testid="UserCell"><a href="/erin"></a></div>
          <div data-testid="UserCell"><span>no link</span></div>
          <div data-testid="UserCell"><a href="https://elsewhere.example/frank">x</a></div>"#;
        let c = extractor().connection_candidates(markup);
        assert_eq!(c.len(), 4);
        assert_eq!(
            c[0],
            Ok(ConnectionStub {
                username: "Dave_01".into(),
                display_name: Some("Dave".into()),
                avatar_url: Some("https://pbs.twimg.com/profile_images/4/d.jpg".into()),
            })
        );
        assert_eq!(c[1].as_ref().unwrap().display_name.as_deref(), Some("erin"));
        assert!(matches!(c[2], Err(ExtractError::Missing { .. })));
        assert!(matches!(c[3], Err(ExtractError::Handle(_))));
    }

    #[test]
    fn handle_normalisation() {
        let base = Url::parse("https://x.com").unwrap();
        assert_eq!(normalize_handle(&base, "/alice/"), Some("alice".into()));
        assert_eq!(normalize_handle(&base, "https://x.com/Bob"), Some("Bob".into()));
        assert_eq!(normalize_handle(&base, "/i/lists/1"), None);
        assert_eq!(normalize_handle(&base, "/home"), None);
        assert_eq!(normalize_handle(&base, "/Explore"), None);
        assert_eq!(normalize_handle(&base, "/search?q=rust"), None);
        assert_eq!(normalize_handle(&base, "/imogen"), Some("imogen".into()));
        assert_eq!(normalize_handle(&base, "/"), None);
        assert_eq!(normalize_handle(&base, "/a.b"), None);
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let mut table = SelectorTable::default();
        table.post.container = "article[[".into();
        let base = Url::parse("https://x.com").unwrap();
        let err = Extractor::new(&table, &base).unwrap_err();
        assert!(matches!(err, LookoutError::Config(ref m) if m.contains("post.container")));
    }
}
