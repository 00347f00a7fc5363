//! Crawler module for news sources and articles
//!
//! This module contains the core crawling logic, including:
//! - Batch HTTP fetching with a concurrency ceiling
//! - The phased source pipeline (discovery, downloads, parsing)
//! - Single-article download, parse and keyword/summary extraction
//! - Per-source memoization of already seen article urls

mod fetcher;
mod memo;
mod pipeline;

pub use fetcher::{build_http_client, meta_refresh_target, FetchOutcome, FetchResult, Fetcher};
pub use memo::MemoStore;
pub use pipeline::{dedup_articles, Crawler, DownloadSummary};

use crate::config::Config;
use crate::model::{Article, Source};
use crate::Result;

/// Builds a source in one call
///
/// Creates a [`Crawler`] from `config`, then runs [`Crawler::build`] on a new
/// [`Source`] for `url`. Articles are discovered but not downloaded.
///
/// # Returns
///
/// * `Ok(Source)` - Source with its categories, feeds and article candidates
/// * `Err(NewzError)` - Invalid config or url, or the root page was unavailable
pub async fn build(url: &str, config: Config) -> Result<Source> {
    let crawler = Crawler::new(config)?;
    let mut source = Source::new(url)?;
    crawler.build(&mut source).await?;
    Ok(source)
}

/// Downloads, parses and summarizes a single article
pub async fn build_article(url: &str, config: Config) -> Result<Article> {
    let crawler = Crawler::new(config)?;
    let mut article = Article::new(url);
    crawler.build_article(&mut article).await?;
    Ok(article)
}
