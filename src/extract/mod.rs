//! Content extraction interface
//!
//! The crawl pipeline never looks inside HTML itself. Everything it needs from a
//! page goes through the [`Extractor`] trait:
//! - turning html into a [`ParsedDocument`] handle (title, links, feed links)
//! - choosing category and feed urls for a source
//! - pulling candidate article urls out of feeds and category pages
//! - turning an article page into [`ArticleContent`]
//! - keyword and summary extraction
//!
//! [`DefaultExtractor`] implements it with `scraper` and `regex`. Extraction is
//! CPU-bound and synchronous; the pipeline runs it through the
//! [`crate::executor::Executor`].

mod html;
mod nlp;

pub use html::DefaultExtractor;
pub use nlp::{keywords, split_sentences, summarize};

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// An extraction failure for a single document
///
/// The pipeline treats this as a reason to prune the item, never as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("document is empty")]
    EmptyDocument,

    #[error("no article content found in {url}")]
    NoContent { url: String },

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// A link found in a document, with its anchor text when there is one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub text: Option<String>,
}

/// Parsed form of a source root or category page
///
/// Owns plain strings only, so it can move across lanes and threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    /// The url the document was fetched from, used to resolve relative links
    pub url: String,

    /// The page title (from `<title>`)
    pub title: Option<String>,

    /// All followable links on the page (absolute urls)
    pub links: Vec<Link>,

    /// `<link type="application/rss+xml">` and atom equivalents (absolute urls)
    pub feed_links: Vec<String>,

    /// Value of `og:type`, if present
    pub meta_type: Option<String>,
}

/// Structured fields extracted from one article page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleContent {
    pub title: Option<String>,
    pub text: String,
    pub authors: Vec<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub top_image: Option<String>,
    pub meta_type: Option<String>,
    pub meta_keywords: Vec<String>,
    /// Two-letter language code, from the config or detected on the page
    pub language: Option<String>,
}

/// The extraction collaborator used by the crawl pipeline
pub trait Extractor: Send + Sync {
    /// Parses a root/category page into a document handle
    fn parse_document(&self, html: &str, base_url: &Url) -> Result<ParsedDocument, ParseFailure>;

    /// Picks the probable category pages of a source from its root document
    fn category_urls(&self, source_url: &Url, root: &ParsedDocument) -> Vec<String>;

    /// Collects the feeds advertised by any of the given documents
    fn feed_urls(&self, source_url: &Url, documents: &[&ParsedDocument]) -> Vec<String>;

    /// Pulls article url candidates out of a raw rss/atom payload
    fn feed_article_urls(&self, payload: &str) -> Vec<String>;

    /// Lists article candidates, with titles, found on a category page
    fn article_links(&self, document: &ParsedDocument) -> Vec<Link>;

    /// Extracts the article fields from a downloaded page
    fn parse_article(
        &self,
        html: &str,
        url: &Url,
        language: &str,
    ) -> Result<ArticleContent, ParseFailure>;

    /// Decides whether a url is likely a single story
    fn is_valid_article_url(&self, url: &str) -> bool {
        crate::url::is_valid_article_url(url)
    }

    /// Extracts up to `max` keywords from text
    fn keywords(&self, text: &str, max: usize, language: &str) -> Vec<String> {
        keywords(text, max, language)
    }

    /// Picks up to `max_sentences` summary sentences, in text order
    fn summarize(&self, title: &str, text: &str, max_sentences: usize) -> Vec<String> {
        summarize(title, text, max_sentences)
    }
}

/// Heuristic check that a payload is an rss or atom document rather than html
pub fn looks_like_feed(payload: &str) -> bool {
    let head: String = payload
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_ascii_lowercase();

    head.contains("<rss") || head.contains("<feed") || head.contains("<rdf:rdf")
}
