//! Default HTML extractor built on `scraper`
//!
//! Link extraction rules:
//!
//! **Include:**
//! - `<a href="...">` tags anywhere in the document
//! - `<link rel="canonical" href="...">`
//! - `<link type="application/rss+xml">` / atom links, kept apart as feed links
//!
//! **Exclude:**
//! - `<a href="..." download>`
//! - `javascript:`, `mailto:`, `tel:` links and data URIs
//! - fragment-only links

use super::{ArticleContent, Extractor, Link, ParseFailure, ParsedDocument};
use crate::url::{is_same_site, prepare_url, strip_www, BAD_CHUNKS};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Upper bound on feeds kept per source
const MAX_FEEDS: usize = 50;

/// Category slugs longer than this are treated as articles, not sections
const MAX_CATEGORY_SLUG_LEN: usize = 30;

fn feed_url_regex() -> &'static Regex {
    static FEED_URL: OnceLock<Regex> = OnceLock::new();
    FEED_URL.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"'\[\]]+"#).expect("feed url pattern is valid")
    })
}

/// `scraper`-backed implementation of [`Extractor`]
#[derive(Debug, Clone, Default)]
pub struct DefaultExtractor;

impl DefaultExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for DefaultExtractor {
    fn parse_document(&self, html: &str, base_url: &Url) -> Result<ParsedDocument, ParseFailure> {
        if html.trim().is_empty() {
            return Err(ParseFailure::EmptyDocument);
        }

        let document = Html::parse_document(html);

        Ok(ParsedDocument {
            url: base_url.to_string(),
            title: extract_title(&document),
            links: extract_links(&document, base_url),
            feed_links: extract_feed_links(&document, base_url),
            meta_type: meta_content(&document, r#"meta[property="og:type"]"#),
        })
    }

    fn category_urls(&self, source_url: &Url, root: &ParsedDocument) -> Vec<String> {
        let source_host = match source_url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return Vec::new(),
        };

        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for link in &root.links {
            let candidate = match Url::parse(&link.url) {
                Ok(candidate) => candidate,
                Err(_) => continue,
            };
            if is_category_candidate(&source_host, &candidate) && seen.insert(link.url.clone()) {
                categories.push(link.url.clone());
            }
        }

        tracing::debug!(
            source = %source_url,
            count = categories.len(),
            "Selected category urls"
        );
        categories
    }

    fn feed_urls(&self, _source_url: &Url, documents: &[&ParsedDocument]) -> Vec<String> {
        let mut seen = HashSet::new();
        documents
            .iter()
            .flat_map(|doc| doc.feed_links.iter())
            .filter(|url| seen.insert(url.as_str()))
            .take(MAX_FEEDS)
            .cloned()
            .collect()
    }

    fn feed_article_urls(&self, payload: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        feed_url_regex()
            .find_iter(payload)
            .map(|m| {
                m.as_str()
                    .replace("&amp;", "&")
                    .trim_end_matches(['.', ',', ';', ')'])
                    .to_string()
            })
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    fn article_links(&self, document: &ParsedDocument) -> Vec<Link> {
        document.links.clone()
    }

    fn parse_article(
        &self,
        html: &str,
        url: &Url,
        language: &str,
    ) -> Result<ArticleContent, ParseFailure> {
        if html.trim().is_empty() {
            return Err(ParseFailure::EmptyDocument);
        }

        let document = Html::parse_document(html);

        let title = meta_content(&document, r#"meta[property="og:title"]"#)
            .or_else(|| extract_title(&document))
            .or_else(|| first_text(&document, "h1"));
        let text = extract_body_text(&document);

        if title.is_none() && text.is_empty() {
            return Err(ParseFailure::NoContent {
                url: url.to_string(),
            });
        }

        let language = if language == "auto" {
            detect_language(&document)
        } else {
            Some(language.to_string())
        };

        Ok(ArticleContent {
            title,
            text,
            authors: extract_authors(&document),
            publish_date: extract_publish_date(&document),
            top_image: meta_content(&document, r#"meta[property="og:image"]"#)
                .and_then(|src| prepare_url(&src, url)),
            meta_type: meta_content(&document, r#"meta[property="og:type"]"#),
            meta_keywords: meta_content(&document, r#"meta[name="keywords"]"#)
                .map(|raw| {
                    raw.split(',')
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            language,
        })
    }
}

/// Decides whether a same-site link is a section page
///
/// Accepted: the root of a distinct subdomain (`money.cnn.com/`) or a single
/// short path segment (`/world`) without a file extension, query, or a
/// non-section word.
fn is_category_candidate(source_host: &str, candidate: &Url) -> bool {
    let host = match candidate.host_str() {
        Some(host) => host.to_lowercase(),
        None => return false,
    };
    if !is_same_site(source_host, &host) || candidate.query().is_some() {
        return false;
    }

    let segments: Vec<&str> = candidate
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [] => strip_www(&host) != strip_www(source_host),
        [segment] => {
            let segment = segment.to_lowercase();
            !segment.contains('.')
                && segment.len() <= MAX_CATEGORY_SLUG_LEN
                && !segment.chars().all(|c| c.is_ascii_digit())
                && !BAD_CHUNKS.contains(&segment.as_str())
        }
        _ => false,
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    first_text(document, "title")
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<Link> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(url) = prepare_url(href, base_url) {
                    let text = Some(element_text(element)).filter(|t| !t.is_empty());
                    links.push(Link { url, text });
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(url) = prepare_url(href, base_url) {
                    links.push(Link { url, text: None });
                }
            }
        }
    }

    links
}

fn extract_feed_links(document: &Html, base_url: &Url) -> Vec<String> {
    let selector = match Selector::parse(
        r#"link[type="application/rss+xml"][href], link[type="application/atom+xml"][href]"#,
    ) {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| prepare_url(href, base_url))
        .collect()
}

/// Joins the paragraphs of the article body, preferring an `<article>` element
fn extract_body_text(document: &Html) -> String {
    let scoped = Selector::parse("article p").ok();
    let all = Selector::parse("p").ok();

    let paragraphs = |selector: &Selector| -> Vec<String> {
        document
            .select(selector)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect()
    };

    let mut body = scoped.as_ref().map(paragraphs).unwrap_or_default();
    if body.is_empty() {
        body = all.as_ref().map(paragraphs).unwrap_or_default();
    }

    body.join("\n\n")
}

fn extract_authors(document: &Html) -> Vec<String> {
    let mut raw = Vec::new();

    for selector in [r#"meta[name="author"]"#, r#"meta[property="article:author"]"#] {
        if let Some(content) = meta_content(document, selector) {
            raw.push(content);
        }
    }

    if let Ok(selector) = Selector::parse(r#"[rel="author"]"#) {
        raw.extend(document.select(&selector).map(element_text));
    }

    let mut seen = HashSet::new();
    raw.iter()
        .filter(|value| !value.starts_with("http"))
        .flat_map(|value| value.split(',').flat_map(|part| part.split(" and ")))
        .map(|name| name.trim().trim_start_matches("By ").trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
        .collect()
}

fn extract_publish_date(document: &Html) -> Option<DateTime<Utc>> {
    let from_meta = [
        r#"meta[property="article:published_time"]"#,
        r#"meta[name="pubdate"]"#,
        r#"meta[name="date"]"#,
    ]
    .iter()
    .filter_map(|selector| meta_content(document, selector))
    .find_map(|value| parse_date(&value));

    from_meta.or_else(|| {
        let selector = Selector::parse("time[datetime]").ok()?;
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("datetime"))
            .find_map(parse_date)
    })
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

fn detect_language(document: &Html) -> Option<String> {
    let selector = Selector::parse("html[lang]").ok()?;
    let lang = document.select(&selector).next()?.value().attr("lang")?;
    let code: String = lang.chars().take(2).collect::<String>().to_lowercase();
    (code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase())).then_some(code)
}
