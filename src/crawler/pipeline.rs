//! Phased crawl of one source
//!
//! Every phase finishes before the next one starts; inside a phase all
//! fetches run concurrently. Items that fail (a category that does not fetch,
//! an article that does not parse) are dropped from the source and counted in
//! its [`CrawlReport`](crate::output::CrawlReport). Only structural problems
//! are returned as errors.

use super::fetcher::{FetchOutcome, FetchResult, Fetcher};
use super::memo::MemoStore;
use crate::config::Config;
use crate::executor::Executor;
use crate::extract::{looks_like_feed, DefaultExtractor, Extractor, ParseFailure, ParsedDocument};
use crate::model::{Article, Category, Feed, Source};
use crate::state::{DownloadState, ParseState};
use crate::url::feed_probe_urls;
use crate::{NewzError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// What an article download phase did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Articles that needed fetching
    pub attempted: usize,

    /// Articles now holding a body
    pub downloaded: usize,

    /// Urls pruned because their fetch failed
    pub failed_urls: Vec<String>,

    /// Set when the phase ran with more threads than the rate-limit threshold
    pub rate_limit_warning: bool,
}

/// Runs crawl phases for sources and single articles
#[derive(Clone)]
pub struct Crawler {
    fetcher: Fetcher,
    executor: Executor,
    extractor: Arc<dyn Extractor>,
    config: Arc<Config>,
    memo: Option<MemoStore>,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("executor", &self.executor)
            .field("config", &self.config)
            .field("memo", &self.memo)
            .finish_non_exhaustive()
    }
}

impl Crawler {
    /// Creates a crawler with its own executor and the default extractor
    pub fn new(config: Config) -> Result<Self> {
        let executor = Executor::from_config(&config.executor);
        Self::with_parts(config, executor, Arc::new(DefaultExtractor::new()))
    }

    /// Creates a crawler sharing `executor` and using `extractor`
    ///
    /// The configuration is validated here.
    pub fn with_parts(
        config: Config,
        executor: Executor,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self> {
        let config = config.validated()?;
        let fetcher = Fetcher::new(config.fetch.clone(), executor.clone())?;
        let memo = config
            .crawler
            .memoize_articles
            .then(|| MemoStore::new(&config.crawler.memo_dir));

        Ok(Self {
            fetcher,
            executor,
            extractor,
            config: Arc::new(config),
            memo,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Copy of this crawler with its own HTTP connection pool
    pub(crate) fn for_isolated_lane(&self) -> Result<Self> {
        Ok(Self {
            fetcher: self.fetcher.rebuild()?,
            ..self.clone()
        })
    }

    /// Discovers the categories, feeds and candidate articles of a source
    ///
    /// Runs, in order: root download, root parse, category and feed
    /// discovery, category and feed downloads, category parse, article
    /// generation. Articles are not downloaded.
    pub async fn build(&self, source: &mut Source) -> Result<()> {
        source.report.started_at = Some(Utc::now());

        self.download(source).await?;
        self.parse(source).await?;

        self.set_categories(source)?;
        self.set_feeds(source).await?;

        let categories = std::mem::take(&mut source.categories);
        let feeds = std::mem::take(&mut source.feeds);
        let (categories, feeds) =
            tokio::join!(self.fetch_categories(categories), self.fetch_feeds(feeds));
        source.categories = categories;
        source.feeds = feeds;
        source.report.feeds_kept = source.feeds.len();

        self.parse_categories(source).await?;
        self.generate_articles(source).await?;

        source.report.finished_at = Some(Utc::now());
        tracing::info!(
            source = %source.url,
            categories = source.categories.len(),
            feeds = source.feeds.len(),
            articles = source.articles.len(),
            "Built source"
        );
        Ok(())
    }

    /// Downloads the source root page
    pub async fn download(&self, source: &mut Source) -> Result<()> {
        source.download_state = source.download_state.transition(DownloadState::Downloading)?;

        let result = self.fetcher.fetch(&source.url).await;
        match result.outcome {
            FetchOutcome::Success { body, .. } => {
                source.html = Some(body);
                source.download_state = source
                    .download_state
                    .transition(DownloadState::Downloaded)?;
                Ok(())
            }
            _ => {
                let reason = result.failure_reason().unwrap_or_default();
                source.download_state = source.download_state.transition(DownloadState::Failed)?;
                tracing::warn!(
                    source = %source.url,
                    reason = %reason,
                    "Source root download failed"
                );
                Err(NewzError::SourceUnavailable {
                    url: source.url.clone(),
                    reason,
                })
            }
        }
    }

    /// Parses the downloaded root page into a document handle
    pub async fn parse(&self, source: &mut Source) -> Result<()> {
        let base = source.parsed_url()?;
        let html = source.html.take().ok_or_else(|| NewzError::SourceUnavailable {
            url: source.url.clone(),
            reason: "root page has not been downloaded".to_string(),
        })?;

        let extractor = self.extractor.clone();
        let (html, parsed) = self
            .executor
            .run_as_async(move || {
                let parsed = extractor.parse_document(&html, &base);
                (html, parsed)
            })
            .await?;
        source.html = Some(html);

        let doc = parsed.map_err(|failure| NewzError::SourceUnavailable {
            url: source.url.clone(),
            reason: failure.to_string(),
        })?;
        source.doc = Some(doc);
        source.parse_state = source.parse_state.transition(ParseState::Parsed)?;
        Ok(())
    }

    /// Picks the category pages of a parsed source
    ///
    /// The root page itself is always the first category; its document is
    /// reused rather than fetched again.
    pub fn set_categories(&self, source: &mut Source) -> Result<()> {
        let doc = source.doc.as_ref().ok_or_else(|| not_parsed(source))?;
        let base = source.parsed_url()?;

        let mut categories = vec![Category {
            url: source.url.clone(),
            html: source.html.clone(),
            doc: Some(doc.clone()),
        }];
        categories.extend(
            self.extractor
                .category_urls(&base, doc)
                .into_iter()
                .filter(|url| *url != source.url)
                .map(Category::new),
        );

        source.report.categories_found = categories.len();
        source.categories = categories;
        tracing::debug!(source = %source.url, count = source.categories.len(), "Set categories");
        Ok(())
    }

    /// Probes the conventional feed locations and collects advertised feeds
    ///
    /// Probes that fail are dropped silently. A probe answering with rss/atom
    /// becomes a feed as is; an html answer only contributes the feed links it
    /// advertises, as does the root page.
    pub async fn set_feeds(&self, source: &mut Source) -> Result<()> {
        let base = source.parsed_url()?;
        let probes = feed_probe_urls(&base);
        let results = self.fetcher.fetch_many(&probes).await;

        let mut feeds: Vec<Feed> = Vec::new();
        let mut html_pages: Vec<(String, String)> = Vec::new();
        for result in results {
            match result.outcome {
                FetchOutcome::Success {
                    final_url, body, ..
                } => {
                    if looks_like_feed(&body) {
                        feeds.push(Feed {
                            url: result.url,
                            payload: Some(body),
                        });
                    } else {
                        html_pages.push((final_url, body));
                    }
                }
                _ => {
                    tracing::debug!(probe = %result.url, "Feed probe dropped");
                }
            }
        }

        let extractor = self.extractor.clone();
        let root_doc = source.doc.clone();
        let advertised = self
            .executor
            .run_as_async(move || {
                let probe_docs: Vec<ParsedDocument> = html_pages
                    .iter()
                    .filter_map(|(url, body)| {
                        let url = Url::parse(url).ok()?;
                        extractor.parse_document(body, &url).ok()
                    })
                    .collect();
                let documents: Vec<&ParsedDocument> =
                    root_doc.iter().chain(probe_docs.iter()).collect();
                extractor.feed_urls(&base, &documents)
            })
            .await?;

        for url in advertised {
            if !feeds.iter().any(|feed| feed.url == url) {
                feeds.push(Feed::new(url));
            }
        }

        source.report.feeds_found = feeds.len();
        source.feeds = feeds;
        tracing::debug!(source = %source.url, count = source.feeds.len(), "Set feeds");
        Ok(())
    }

    /// Downloads every category page, dropping the ones that fail
    pub async fn download_categories(&self, source: &mut Source) -> Result<()> {
        let categories = std::mem::take(&mut source.categories);
        source.categories = self.fetch_categories(categories).await;
        Ok(())
    }

    /// Downloads every feed payload, dropping the ones that fail
    pub async fn download_feeds(&self, source: &mut Source) -> Result<()> {
        let feeds = std::mem::take(&mut source.feeds);
        source.feeds = self.fetch_feeds(feeds).await;
        source.report.feeds_kept = source.feeds.len();
        Ok(())
    }

    async fn fetch_categories(&self, categories: Vec<Category>) -> Vec<Category> {
        let pending: Vec<&str> = categories
            .iter()
            .filter(|category| category.html.is_none())
            .map(|category| category.url.as_str())
            .collect();
        let mut results = self.fetcher.fetch_many(&pending).await.into_iter();

        let mut kept = Vec::with_capacity(categories.len());
        for mut category in categories {
            if category.html.is_some() {
                kept.push(category);
                continue;
            }
            let Some(result) = results.next() else { break };
            match result.outcome {
                FetchOutcome::Success { body, .. } => {
                    category.html = Some(body);
                    kept.push(category);
                }
                _ => tracing::warn!(
                    category = %category.url,
                    reason = %result.failure_reason().unwrap_or_default(),
                    "Dropping category"
                ),
            }
        }
        kept
    }

    async fn fetch_feeds(&self, feeds: Vec<Feed>) -> Vec<Feed> {
        let pending: Vec<&str> = feeds
            .iter()
            .filter(|feed| feed.payload.is_none())
            .map(|feed| feed.url.as_str())
            .collect();
        let mut results = self.fetcher.fetch_many(&pending).await.into_iter();

        let mut kept = Vec::with_capacity(feeds.len());
        for mut feed in feeds {
            if feed.payload.is_some() {
                kept.push(feed);
                continue;
            }
            let Some(result) = results.next() else { break };
            match result.outcome {
                FetchOutcome::Success { body, .. } => {
                    feed.payload = Some(body);
                    kept.push(feed);
                }
                _ => tracing::warn!(
                    feed = %feed.url,
                    reason = %result.failure_reason().unwrap_or_default(),
                    "Dropping feed"
                ),
            }
        }
        kept
    }

    /// Parses downloaded category pages, dropping the ones that fail
    pub async fn parse_categories(&self, source: &mut Source) -> Result<()> {
        let categories = std::mem::take(&mut source.categories);
        let extractor = self.extractor.clone();

        let (kept, dropped) = self
            .executor
            .run_as_async(move || {
                let mut kept = Vec::with_capacity(categories.len());
                let mut dropped: Vec<(String, ParseFailure)> = Vec::new();
                for mut category in categories {
                    if category.doc.is_some() {
                        kept.push(category);
                        continue;
                    }
                    let parsed = match (category.html.as_deref(), Url::parse(&category.url)) {
                        (Some(html), Ok(base)) => extractor.parse_document(html, &base),
                        (None, _) => Err(ParseFailure::EmptyDocument),
                        (_, Err(e)) => Err(ParseFailure::Malformed(e.to_string())),
                    };
                    match parsed {
                        Ok(doc) => {
                            category.doc = Some(doc);
                            kept.push(category);
                        }
                        Err(failure) => dropped.push((category.url, failure)),
                    }
                }
                (kept, dropped)
            })
            .await?;

        for (url, failure) in &dropped {
            tracing::warn!(category = %url, reason = %failure, "Dropping unparsable category");
        }
        source.categories = kept;
        source.report.categories_kept = source.categories.len();
        Ok(())
    }

    /// Builds the deduplicated, limited article candidate list
    ///
    /// Feed candidates come first, then category candidates. Urls failing the
    /// article heuristic are purged, memoized urls are skipped when enabled,
    /// and for a repeated url the later candidate replaces the earlier one in
    /// the earlier position.
    pub async fn generate_articles(&self, source: &mut Source) -> Result<()> {
        let feeds = std::mem::take(&mut source.feeds);
        let categories = std::mem::take(&mut source.categories);
        let extractor = self.extractor.clone();

        let (feeds, categories, feed_candidates, category_candidates) = self
            .executor
            .run_as_async(move || {
                let feed_candidates: Vec<Article> = feeds
                    .iter()
                    .flat_map(|feed| {
                        let urls = feed
                            .payload
                            .as_deref()
                            .map(|payload| extractor.feed_article_urls(payload))
                            .unwrap_or_default();
                        urls.into_iter()
                            .map(move |url| Article::discovered(url, feed.url.clone(), None))
                    })
                    .collect();

                let category_candidates: Vec<Article> = categories
                    .iter()
                    .filter_map(|category| category.doc.as_ref().map(|doc| (category, doc)))
                    .flat_map(|(category, doc)| {
                        extractor.article_links(doc).into_iter().map(move |link| {
                            Article::discovered(link.url, category.url.clone(), link.text)
                        })
                    })
                    .collect();

                (feeds, categories, feed_candidates, category_candidates)
            })
            .await?;
        source.feeds = feeds;
        source.categories = categories;

        let discovered = feed_candidates.len() + category_candidates.len();
        let mut candidates: Vec<Article> = feed_candidates
            .into_iter()
            .chain(category_candidates)
            .filter(|article| self.extractor.is_valid_article_url(&article.url))
            .collect();

        if let Some(memo) = &self.memo {
            let memo = memo.clone();
            let domain = source.domain.clone();
            candidates = self
                .executor
                .run_as_async(move || memo.filter_new(&domain, candidates))
                .await??;
        }
        let valid = candidates.len();

        let mut articles = dedup_articles(candidates);
        let unique = articles.len();
        articles.truncate(self.config.crawler.article_limit);

        source.report.articles_discovered = discovered;
        source.report.articles_valid = valid;
        source.report.articles_unique = unique;
        source.report.articles_kept = articles.len();
        source.articles = articles;

        tracing::info!(
            source = %source.url,
            discovered,
            valid,
            unique,
            kept = source.articles.len(),
            "Generated articles"
        );
        Ok(())
    }

    /// Downloads the bodies of a source's articles, pruning failures
    ///
    /// `threads == 1` fetches one article at a time; anything higher fans
    /// out with `threads` as the concurrency ceiling. Articles already
    /// downloaded are kept without a new fetch.
    pub async fn download_articles(
        &self,
        source: &mut Source,
        threads: usize,
    ) -> Result<DownloadSummary> {
        let threads = threads.max(1);
        let mut articles = std::mem::take(&mut source.articles);
        let mut summary = DownloadSummary::default();

        let pending: Vec<usize> = articles
            .iter()
            .enumerate()
            .filter(|(_, article)| {
                matches!(
                    article.download_state,
                    DownloadState::NotStarted | DownloadState::Downloading
                )
            })
            .map(|(index, _)| index)
            .collect();
        summary.attempted = pending.len();

        for &index in &pending {
            if articles[index].download_state == DownloadState::NotStarted {
                articles[index].begin_download()?;
            }
        }

        let results: Vec<FetchResult> = {
            let urls: Vec<&str> = pending.iter().map(|&i| articles[i].url.as_str()).collect();
            if threads == 1 {
                let mut results = Vec::with_capacity(urls.len());
                for url in urls {
                    results.push(self.fetcher.fetch(url).await);
                }
                results
            } else {
                let threshold = self.config.crawler.rate_limit_warn_threads;
                if threads > threshold {
                    summary.rate_limit_warning = true;
                    tracing::warn!(
                        source = %source.url,
                        threads,
                        threshold,
                        "Many parallel requests against one source risk rate limiting"
                    );
                }
                self.fetcher.fetch_many_bounded(&urls, threads).await
            }
        };

        let mut outcomes: Vec<Option<FetchResult>> = articles.iter().map(|_| None).collect();
        for (index, result) in pending.into_iter().zip(results) {
            outcomes[index] = Some(result);
        }

        let mut kept = Vec::with_capacity(articles.len());
        for (mut article, outcome) in articles.into_iter().zip(outcomes) {
            match outcome {
                None if article.download_state == DownloadState::Failed => {
                    summary.failed_urls.push(article.url)
                }
                None => kept.push(article),
                Some(result) => {
                    if record_fetch(&mut article, result)? {
                        summary.downloaded += 1;
                        kept.push(article);
                    } else {
                        summary.failed_urls.push(article.url);
                    }
                }
            }
        }

        if !summary.failed_urls.is_empty() {
            tracing::warn!(
                source = %source.url,
                failed = summary.failed_urls.len(),
                attempted = summary.attempted,
                "Pruned articles that failed to download"
            );
        }

        source.articles = kept;
        source.report.articles_downloaded = source
            .articles
            .iter()
            .filter(|article| article.is_downloaded())
            .count();
        source.report.finished_at = Some(Utc::now());
        Ok(summary)
    }

    /// Parses every downloaded article and prunes bodies too small to be stories
    pub async fn parse_articles(&self, source: &mut Source) -> Result<()> {
        let articles = std::mem::take(&mut source.articles);
        let total = articles.len();

        let jobs = articles.into_iter().map(|mut article| async move {
            let result = if article.is_parsed() {
                Ok(())
            } else {
                self.parse_article(&mut article).await
            };
            (article, result)
        });
        let parsed = futures::future::join_all(jobs).await;

        let mut kept = Vec::with_capacity(total);
        let mut errors = 0;
        for (article, result) in parsed {
            match result {
                Ok(()) if article.is_valid_body(&self.config.extraction) => kept.push(article),
                Ok(()) => {
                    tracing::debug!(
                        article = %article.url,
                        words = article.word_count(),
                        "Body too small"
                    )
                }
                Err(e) => {
                    errors += 1;
                    tracing::debug!(article = %article.url, error = %e, "Article not parsed");
                }
            }
        }

        if kept.len() < total {
            tracing::warn!(
                source = %source.url,
                pruned = total - kept.len(),
                errors,
                total,
                "Pruned articles without a usable body"
            );
        }

        source.articles = kept;
        source.report.articles_parsed = source.articles.len();
        source.report.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Downloads one article
    ///
    /// A failed fetch is recorded on the article (state `Failed` plus the
    /// reason), not returned as an error.
    pub async fn download_article(&self, article: &mut Article) -> Result<()> {
        match article.download_state {
            DownloadState::Downloaded => return Ok(()),
            DownloadState::Failed => {
                return Err(NewzError::ArticleNotReady {
                    url: article.url.clone(),
                    reason: "a previous download failed".to_string(),
                })
            }
            DownloadState::NotStarted | DownloadState::Downloading => {}
        }

        if article.download_state == DownloadState::NotStarted {
            article.begin_download()?;
        }
        let result = self.fetcher.fetch(&article.url).await;
        if !record_fetch(article, result)? {
            tracing::debug!(
                article = %article.url,
                reason = ?article.download_error,
                "Article download failed"
            );
        }
        Ok(())
    }

    /// Extracts the fields of a downloaded article
    ///
    /// A page the extractor cannot read still counts as parsed, with an empty
    /// body.
    pub async fn parse_article(&self, article: &mut Article) -> Result<()> {
        if !article.is_downloaded() {
            return Err(NewzError::ArticleNotReady {
                url: article.url.clone(),
                reason: format!("download state is {}", article.download_state),
            });
        }
        let url = Url::parse(article.final_url.as_deref().unwrap_or(&article.url))?;
        let html = article.html.take().ok_or_else(|| NewzError::ArticleNotReady {
            url: article.url.clone(),
            reason: "no html".to_string(),
        })?;

        let extractor = self.extractor.clone();
        let language = self.config.extraction.language.clone();
        let (html, content) = self
            .executor
            .run_as_async(move || {
                let content = extractor.parse_article(&html, &url, &language);
                (html, content)
            })
            .await?;
        article.html = Some(html);

        let content = content.unwrap_or_else(|failure| {
            tracing::debug!(article = %article.url, reason = %failure, "Extraction found nothing");
            Default::default()
        });
        article.apply_content(content)
    }

    /// Computes keywords and a summary for a parsed article
    pub async fn nlp_article(&self, article: &mut Article) -> Result<()> {
        if !article.is_downloaded() || !article.is_parsed() {
            return Err(NewzError::ArticleNotReady {
                url: article.url.clone(),
                reason: "must be downloaded and parsed first".to_string(),
            });
        }

        let extractor = self.extractor.clone();
        let extraction = self.config.extraction.clone();
        let title = article.title.clone().unwrap_or_default();
        let text = article.text.clone();
        let language = article
            .language
            .clone()
            .unwrap_or_else(|| extraction.language.clone());

        let (keywords, summary) = self
            .executor
            .run_as_async(move || {
                let keywords = extractor.keywords(
                    &format!("{}\n{}", title, text),
                    extraction.max_keywords,
                    &language,
                );
                let summary = extractor.summarize(&title, &text, extraction.max_summary_sent);
                (keywords, summary)
            })
            .await?;

        article.keywords = keywords;
        article.summary = summary;
        Ok(())
    }

    /// Downloads, parses and runs keyword/summary extraction on one article
    pub async fn build_article(&self, article: &mut Article) -> Result<()> {
        self.download_article(article).await?;
        if let Some(reason) = &article.download_error {
            return Err(NewzError::ArticleNotReady {
                url: article.url.clone(),
                reason: reason.clone(),
            });
        }
        self.parse_article(article).await?;
        self.nlp_article(article).await
    }
}

fn not_parsed(source: &Source) -> NewzError {
    NewzError::SourceUnavailable {
        url: source.url.clone(),
        reason: "root page has not been parsed".to_string(),
    }
}

/// Moves a fetch result onto its article; returns whether it succeeded
fn record_fetch(article: &mut Article, result: FetchResult) -> Result<bool> {
    let reason = result.failure_reason();
    match result.outcome {
        FetchOutcome::Success {
            final_url, body, ..
        } => {
            article.set_html(final_url, body)?;
            Ok(true)
        }
        _ => {
            article.mark_failed(reason.unwrap_or_default())?;
            Ok(false)
        }
    }
}

/// Collapses candidates sharing a url
///
/// The first occurrence fixes the position; the last occurrence supplies the
/// value.
pub fn dedup_articles(candidates: Vec<Article>) -> Vec<Article> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(candidates.len());
    let mut unique: Vec<Article> = Vec::with_capacity(candidates.len());

    for article in candidates {
        match positions.get(&article.url) {
            Some(&index) => unique[index] = article,
            None => {
                positions.insert(article.url.clone(), unique.len());
                unique.push(article);
            }
        }
    }

    unique
}
