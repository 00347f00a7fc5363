//! newz: a bounded-concurrency news crawler
//!
//! This crate discovers the categories and feeds of a news source, fans out to
//! fetch article pages concurrently, and turns the raw fetches into a parsed,
//! deduplicated article set. Several sources can be crawled side by side through
//! the [`pool::NewsPool`] coordinator.

pub mod config;
pub mod crawler;
pub mod executor;
pub mod extract;
pub mod model;
pub mod output;
pub mod pool;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for newz operations
///
/// Item-level failures (a single url that does not fetch, a page that does not
/// parse) are never reported through this type; they are values in
/// [`crawler::FetchOutcome`] and [`extract::ParseFailure`] and are pruned by the
/// pipeline. Everything here is structural and reaches the caller.
#[derive(Debug, Error)]
pub enum NewzError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker pool queue is full (capacity {capacity})")]
    PoolExhausted { capacity: usize },

    #[error("Concurrency error: {0}")]
    Concurrency(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Source {url} could not be downloaded: {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("Article {url} is not ready: {reason}")]
    ArticleNotReady { url: String, reason: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported language '{0}', expected \"auto\" or a two-letter code")]
    InvalidLanguage(String),
}

/// Result type alias for newz operations
pub type Result<T> = std::result::Result<T, NewzError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Crawler, Fetcher};
pub use executor::Executor;
pub use model::{Article, Category, CrawlTarget, Feed, Source};
pub use pool::{LanePolicy, NewsPool, WorkerPool};
pub use state::{DownloadState, ParseState};
