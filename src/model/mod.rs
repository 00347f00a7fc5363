//! Crawl data model
//!
//! A [`Source`] owns its categories, feeds and articles outright. Nothing in
//! here is shared between lanes; a source or a lone article moves into the lane
//! that works on it and comes back when the lane finishes.

mod article;
mod source;

pub use article::Article;
pub use source::{Category, Feed, Source};

/// One unit of work handed to the pool coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlTarget {
    /// Runs the article download phase of an already built source
    Source(Source),

    /// Downloads a single article
    Article(Article),
}

impl CrawlTarget {
    pub fn url(&self) -> &str {
        match self {
            CrawlTarget::Source(source) => &source.url,
            CrawlTarget::Article(article) => &article.url,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, CrawlTarget::Source(_))
    }

    pub fn into_source(self) -> Option<Source> {
        match self {
            CrawlTarget::Source(source) => Some(source),
            CrawlTarget::Article(_) => None,
        }
    }

    pub fn into_article(self) -> Option<Article> {
        match self {
            CrawlTarget::Article(article) => Some(article),
            CrawlTarget::Source(_) => None,
        }
    }
}

impl From<Source> for CrawlTarget {
    fn from(source: Source) -> Self {
        CrawlTarget::Source(source)
    }
}

impl From<Article> for CrawlTarget {
    fn from(article: Article) -> Self {
        CrawlTarget::Article(article)
    }
}
