use serde::Deserialize;

/// Main configuration structure for newz
///
/// Every section and key is optional; missing values fall back to the defaults
/// documented on each field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub crawler: CrawlerConfig,
    pub extraction: ExtractionConfig,
    pub executor: ExecutorConfig,
    pub pool: PoolConfig,
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout applied to every single fetch (seconds)
    #[serde(rename = "request-timeout-seconds")]
    pub request_timeout_seconds: f64,

    /// Timeout for establishing a connection (seconds)
    #[serde(rename = "connect-timeout-seconds")]
    pub connect_timeout_seconds: f64,

    /// Ceiling on concurrent fetches issued by one batch
    #[serde(rename = "max-parallel-fetches")]
    pub max_parallel_fetches: usize,

    /// Follow a `<meta http-equiv="refresh">` target once per url
    #[serde(rename = "follow-meta-refresh")]
    pub follow_meta_refresh: bool,

    /// Maximum number of HTTP redirects followed by the client
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Refuse plain-http urls
    #[serde(rename = "https-only")]
    pub https_only: bool,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 7.0,
            connect_timeout_seconds: 5.0,
            max_parallel_fetches: 10,
            follow_meta_refresh: false,
            max_redirects: 10,
            https_only: false,
            user_agent: format!("newz/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Per-source crawl behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of articles kept per source after deduplication
    #[serde(rename = "article-limit")]
    pub article_limit: usize,

    /// Fetch lanes used when downloading one source's articles (1 = sequential)
    #[serde(rename = "article-threads")]
    pub article_threads: usize,

    /// Above this many article threads on one source a rate-limit warning is logged
    #[serde(rename = "rate-limit-warn-threads")]
    pub rate_limit_warn_threads: usize,

    /// Only keep articles not seen by a previous crawl of the same source
    #[serde(rename = "memoize-articles")]
    pub memoize_articles: bool,

    /// Directory holding the per-source memo files
    #[serde(rename = "memo-dir")]
    pub memo_dir: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            article_limit: 5000,
            article_threads: 1,
            rate_limit_warn_threads: 5,
            memoize_articles: false,
            memo_dir: ".newz-memo".to_string(),
        }
    }
}

/// Extraction and NLP settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// "auto" or a two-letter language code
    pub language: String,

    /// Maximum number of sentences in a generated summary
    #[serde(rename = "max-summary-sent")]
    pub max_summary_sent: usize,

    /// Maximum number of keywords kept per article
    #[serde(rename = "max-keywords")]
    pub max_keywords: usize,

    /// Minimum word count for an article body to be kept
    #[serde(rename = "min-word-count")]
    pub min_word_count: usize,

    /// Minimum sentence count for an article body to be kept
    #[serde(rename = "min-sentence-count")]
    pub min_sentence_count: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
            max_summary_sent: 5,
            max_keywords: 10,
            min_word_count: 300,
            min_sentence_count: 7,
        }
    }
}

/// Blocking-work bridge settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of blocking operations allowed to run at once
    #[serde(rename = "bridge-threads")]
    pub bridge_threads: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { bridge_threads: 8 }
    }
}

/// Multi-source pool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Lanes allotted to each source when every target is a source
    #[serde(rename = "threads-per-source")]
    pub threads_per_source: usize,

    /// Idle time after which a worker exits (seconds)
    #[serde(rename = "thread-timeout-seconds")]
    pub thread_timeout_seconds: f64,

    #[serde(rename = "lane-policy")]
    pub lane_policy: LanePolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads_per_source: 1,
            thread_timeout_seconds: 1.0,
            lane_policy: LanePolicy::Shared,
        }
    }
}

/// How worker lanes are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LanePolicy {
    /// Workers are tasks on the caller's tokio runtime
    #[default]
    Shared,
    /// Each worker owns an OS thread driving its own single-threaded runtime
    Isolated,
}
