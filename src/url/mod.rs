//! URL handling module for newz
//!
//! This module provides link resolution, domain helpers and the heuristic that
//! decides whether a url looks like a single news story.

mod domain;
mod heuristics;
mod normalize;

pub use domain::{brand, extract_domain, is_same_site, medium_user_feed, strip_www};
pub use heuristics::is_valid_article_url;
pub use normalize::prepare_url;

pub(crate) use heuristics::BAD_CHUNKS;

/// Conventional feed locations probed on every source
pub const COMMON_FEED_PATHS: &[&str] = &["/feed", "/feeds", "/rss"];

/// Lists the feed urls worth probing for a source url
///
/// This is the conventional paths joined onto the source, plus the per-user
/// feed for medium.com author pages.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use newz::url::feed_probe_urls;
///
/// let source = Url::parse("https://example.com/").unwrap();
/// assert_eq!(
///     feed_probe_urls(&source),
///     vec![
///         "https://example.com/feed".to_string(),
///         "https://example.com/feeds".to_string(),
///         "https://example.com/rss".to_string(),
///     ]
/// );
/// ```
pub fn feed_probe_urls(source_url: &::url::Url) -> Vec<String> {
    let mut urls: Vec<String> = COMMON_FEED_PATHS
        .iter()
        .filter_map(|path| source_url.join(path).ok())
        .map(|url| url.to_string())
        .collect();

    if let Some(user_feed) = medium_user_feed(source_url) {
        urls.push(user_feed);
    }

    urls
}
