//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and limits
//! - Single fetches with an optional single meta-refresh follow
//! - Order-preserving batches behind a concurrency ceiling
//! - Error classification into [`FetchOutcome`] values
//!
//! Nothing in here returns an error for a failed url; every fetch produces a
//! [`FetchResult`].

use crate::config::FetchConfig;
use crate::executor::Executor;
use crate::url::prepare_url;
use regex::Regex;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::Semaphore;
use url::Url;

/// What happened when a url was fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Status in [200, 300)
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Any other status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Transport failure, timeout, or unreadable body
    NetworkError {
        /// Error description
        error: String,
        /// Whether the request timed out
        timed_out: bool,
    },
}

/// A fetched url and its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// The url that was requested
    pub url: String,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success { .. })
    }

    pub fn body(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Describes a failed fetch, or `None` on success
    pub fn failure_reason(&self) -> Option<String> {
        match &self.outcome {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::HttpError { status_code } => Some(format!("HTTP {}", status_code)),
            FetchOutcome::NetworkError { error, timed_out } => Some(if *timed_out {
                format!("timed out: {}", error)
            } else {
                error.clone()
            }),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```
/// use newz::config::FetchConfig;
/// use newz::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::limited(config.max_redirects))
        .https_only(config.https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

fn meta_refresh_url_regex() -> &'static Regex {
    static REFRESH_URL: OnceLock<Regex> = OnceLock::new();
    REFRESH_URL.get_or_init(|| {
        Regex::new(r#"(?i)url\s*=\s*['"]?([^'";\s]+)"#).expect("meta refresh pattern is valid")
    })
}

/// Finds the target of a `<meta http-equiv="refresh">` tag, resolved against `base`
pub fn meta_refresh_target(body: &str, base: &str) -> Option<String> {
    if !body.to_ascii_lowercase().contains("refresh") {
        return None;
    }

    let base = Url::parse(base).ok()?;
    let document = Html::parse_document(body);
    let selector = Selector::parse("meta[http-equiv][content]").ok()?;

    let content = document
        .select(&selector)
        .find(|element| {
            element
                .value()
                .attr("http-equiv")
                .is_some_and(|value| value.eq_ignore_ascii_case("refresh"))
        })?
        .value()
        .attr("content")?;

    let target = meta_refresh_url_regex().captures(content)?.get(1)?.as_str();
    prepare_url(target, &base)
}

/// Batch fetcher sharing one HTTP client
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: Arc<FetchConfig>,
    executor: Executor,
}

impl Fetcher {
    pub fn new(config: FetchConfig, executor: Executor) -> crate::Result<Self> {
        let client = build_http_client(&config)?;
        Ok(Self {
            client,
            config: Arc::new(config),
            executor,
        })
    }

    /// Returns a fetcher with the same settings and a fresh connection pool
    ///
    /// Pooled connections belong to the runtime that opened them, so a lane
    /// running its own runtime needs its own client.
    pub fn rebuild(&self) -> crate::Result<Self> {
        Self::new(self.config.as_ref().clone(), self.executor.clone())
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches one url, following a meta refresh once when configured
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let result = self.fetch_once(url).await;
        if !self.config.follow_meta_refresh {
            return result;
        }

        let target = match &result.outcome {
            FetchOutcome::Success {
                final_url, body, ..
            } => meta_refresh_target(body, final_url).filter(|target| target != final_url),
            _ => None,
        };

        match target {
            Some(target) => {
                tracing::debug!(url, target = %target, "Following meta refresh");
                let followed = self.fetch_once(&target).await;
                FetchResult {
                    url: url.to_string(),
                    outcome: followed.outcome,
                }
            }
            None => result,
        }
    }

    async fn fetch_once(&self, url: &str) -> FetchResult {
        if url.starts_with("file://") {
            return self.read_file(url).await;
        }

        let outcome = match self
            .client
            .get(url)
            .timeout(self.config.request_timeout())
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                let final_url = response.url().to_string();

                if !status.is_success() {
                    FetchOutcome::HttpError {
                        status_code: status.as_u16(),
                    }
                } else {
                    match response.text().await {
                        Ok(body) => FetchOutcome::Success {
                            final_url,
                            status_code: status.as_u16(),
                            body,
                        },
                        Err(e) => FetchOutcome::NetworkError {
                            error: e.to_string(),
                            timed_out: e.is_timeout(),
                        },
                    }
                }
            }
            Err(e) => {
                // Classify error
                if e.is_timeout() {
                    FetchOutcome::NetworkError {
                        error: "Request timeout".to_string(),
                        timed_out: true,
                    }
                } else if e.is_connect() {
                    FetchOutcome::NetworkError {
                        error: "Connection refused".to_string(),
                        timed_out: false,
                    }
                } else {
                    FetchOutcome::NetworkError {
                        error: e.to_string(),
                        timed_out: false,
                    }
                }
            }
        };

        FetchResult {
            url: url.to_string(),
            outcome,
        }
    }

    async fn read_file(&self, url: &str) -> FetchResult {
        let failure = |error: String| FetchResult {
            url: url.to_string(),
            outcome: FetchOutcome::NetworkError {
                error,
                timed_out: false,
            },
        };

        let path = match Url::parse(url).ok().and_then(|u| u.to_file_path().ok()) {
            Some(path) => path,
            None => return failure(format!("not a local file url: {}", url)),
        };

        match self
            .executor
            .run_as_async(move || std::fs::read_to_string(path))
            .await
        {
            Ok(Ok(body)) => FetchResult {
                url: url.to_string(),
                outcome: FetchOutcome::Success {
                    final_url: url.to_string(),
                    status_code: 200,
                    body,
                },
            },
            Ok(Err(e)) => failure(e.to_string()),
            Err(e) => failure(e.to_string()),
        }
    }

    /// Fetches every url with at most `max-parallel-fetches` in flight
    ///
    /// The result has the same length and order as `urls`.
    pub async fn fetch_many<S>(&self, urls: &[S]) -> Vec<FetchResult>
    where
        S: AsRef<str> + Sync,
    {
        self.fetch_many_bounded(urls, self.config.max_parallel_fetches)
            .await
    }

    /// Fetches every url with at most `ceiling` in flight
    pub async fn fetch_many_bounded<S>(&self, urls: &[S], ceiling: usize) -> Vec<FetchResult>
    where
        S: AsRef<str> + Sync,
    {
        if urls.is_empty() {
            return Vec::new();
        }

        let ceiling = ceiling.clamp(1, urls.len());
        let gate = Semaphore::new(ceiling);
        let started = Instant::now();

        let fetches = urls.iter().map(|url| {
            let gate = &gate;
            async move {
                let _permit = gate.acquire().await;
                self.fetch(url.as_ref()).await
            }
        });
        let results = futures::future::join_all(fetches).await;

        tracing::debug!(
            total = results.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            ceiling,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched batch"
        );

        results
    }
}
