use super::Article;
use crate::extract::ParsedDocument;
use crate::output::CrawlReport;
use crate::state::{DownloadState, ParseState};
use crate::url::{brand, extract_domain};
use crate::{NewzError, Result};
use url::Url;

/// A section page of a source, e.g. `/world`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    pub url: String,
    pub html: Option<String>,
    pub doc: Option<ParsedDocument>,
}

impl Category {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// A syndication endpoint of a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub url: String,
    /// Raw rss/atom document
    pub payload: Option<String>,
}

impl Feed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            payload: None,
        }
    }
}

/// A news site being crawled
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub url: String,
    pub domain: String,
    /// e.g. `cnn` for `edition.cnn.com`
    pub brand: String,

    pub html: Option<String>,
    pub doc: Option<ParsedDocument>,

    pub categories: Vec<Category>,
    pub feeds: Vec<Feed>,
    pub articles: Vec<Article>,

    pub download_state: DownloadState,
    pub parse_state: ParseState,

    pub report: CrawlReport,
}

impl Source {
    /// Creates a source for a root url
    ///
    /// Fails when the url does not parse or has no host.
    pub fn new(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let domain = extract_domain(&parsed)
            .ok_or(NewzError::UrlParse(::url::ParseError::EmptyHost))?;

        Ok(Self {
            url: parsed.to_string(),
            brand: brand(&domain),
            domain,
            html: None,
            doc: None,
            categories: Vec::new(),
            feeds: Vec::new(),
            articles: Vec::new(),
            download_state: DownloadState::NotStarted,
            parse_state: ParseState::NotParsed,
            report: CrawlReport::default(),
        })
    }

    pub fn parsed_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.url)?)
    }

    pub fn article_urls(&self) -> Vec<&str> {
        self.articles.iter().map(|a| a.url.as_str()).collect()
    }

    pub fn category_urls(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.url.as_str()).collect()
    }

    pub fn feed_urls(&self) -> Vec<&str> {
        self.feeds.iter().map(|f| f.url.as_str()).collect()
    }

    pub fn size(&self) -> usize {
        self.articles.len()
    }
}
