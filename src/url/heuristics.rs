use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// File extensions that can still be an article page
const GOOD_EXTENSIONS: &[&str] = &[
    "html", "htm", "md", "rst", "aspx", "jsp", "rhtml", "cgi", "xhtml", "jhtml", "asp", "shtml",
    "php",
];

/// Path chunks that mark a page as something other than a story
pub(crate) const BAD_CHUNKS: &[&str] = &[
    "careers",
    "contact",
    "about",
    "faq",
    "terms",
    "privacy",
    "advert",
    "preferences",
    "feedback",
    "info",
    "browse",
    "howto",
    "account",
    "subscribe",
    "donate",
    "shop",
    "admin",
    "login",
    "signup",
];

/// Hosts that never serve articles
const BAD_DOMAINS: &[&str] = &["amazon", "doubleclick", "twitter", "facebook"];

/// Path chunks that usually prefix a story id
const GOOD_PATHS: &[&str] = &[
    "story",
    "article",
    "feature",
    "featured",
    "slides",
    "slideshow",
    "gallery",
    "news",
    "video",
    "media",
    "v",
    "radio",
    "press",
];

/// Minimum number of words in a hyphenated slug for it to read as a headline
const MIN_SLUG_WORDS: usize = 3;

fn date_regex() -> &'static Regex {
    static DATE: OnceLock<Regex> = OnceLock::new();
    DATE.get_or_init(|| {
        Regex::new(
            r"([\./\-_]?(19|20)\d{2})[\./\-_]?(([0-3]?[0-9][\./\-_])|(\w{3,5}[\./\-_]))([0-3]?[0-9][\./\-]?)?",
        )
        .expect("date pattern is valid")
    })
}

/// Decides whether a url is likely to point at a single news story
///
/// Checks, in order:
/// 1. http(s) url of reasonable length with a host
/// 2. host is not an ad/social network
/// 3. last path chunk has no non-page file extension
/// 4. no path chunk is a known non-story chunk (about, contact, ...)
/// 5. a date in the path, a headline-like slug, or a story-id prefix
///    (`/news/12345`) marks it as an article
///
/// # Examples
///
/// ```
/// use newz::url::is_valid_article_url;
///
/// assert!(is_valid_article_url("https://example.com/2024/05/06/storm-hits-coast.html"));
/// assert!(is_valid_article_url("https://example.com/world/leaders-meet-in-geneva"));
/// assert!(!is_valid_article_url("https://example.com/about"));
/// assert!(!is_valid_article_url("https://example.com/"));
/// ```
pub fn is_valid_article_url(url: &str) -> bool {
    if url.len() < 11 {
        return false;
    }

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    let host = match parsed.host_str() {
        Some(host) => host.to_lowercase(),
        None => return false,
    };
    if host
        .split('.')
        .any(|label| BAD_DOMAINS.contains(&label))
    {
        return false;
    }

    let mut chunks: Vec<String> = parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default();

    let last = match chunks.pop() {
        Some(last) => last,
        None => return false,
    };

    let last = match last.rsplit_once('.') {
        Some((stem, ext)) => {
            if !GOOD_EXTENSIONS.contains(&ext) {
                return false;
            }
            stem.to_string()
        }
        None => last,
    };
    if last == "index" && chunks.is_empty() {
        return false;
    }
    chunks.push(last);

    if chunks.iter().any(|chunk| BAD_CHUNKS.contains(&chunk.as_str())) {
        return false;
    }

    if date_regex().is_match(parsed.path()) {
        return true;
    }

    let slug_words = chunks
        .last()
        .map(|slug| slug.split(['-', '_']).filter(|w| !w.is_empty()).count())
        .unwrap_or(0);
    if slug_words >= MIN_SLUG_WORDS {
        return true;
    }

    chunks.len() >= 2 && chunks.iter().any(|chunk| GOOD_PATHS.contains(&chunk.as_str()))
}
