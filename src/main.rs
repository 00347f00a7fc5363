//! newz main entry point
//!
//! This is the command-line interface for the newz news crawler.

use anyhow::Context;
use clap::Parser;
use newz::config::{load_config_with_hash, Config};
use newz::output::print_report;
use newz::{CrawlTarget, Crawler, NewsPool, Source};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// newz: a bounded-concurrency news crawler
///
/// newz discovers the categories and feeds of each news source, builds the
/// list of candidate articles, and can download and parse them across
/// several sources at once.
#[derive(Parser, Debug)]
#[command(name = "newz")]
#[command(version)]
#[command(about = "A bounded-concurrency news crawler", long_about = None)]
struct Cli {
    /// Source urls to crawl
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["download", "parse"])]
    dry_run: bool,

    /// Download the articles of every built source
    #[arg(long)]
    download: bool,

    /// Parse downloaded articles and drop the ones without a real body
    #[arg(long, requires = "download")]
    parse: bool,

    /// Lanes per source when downloading (defaults to the config value)
    #[arg(long, value_name = "N")]
    threads_per_source: Option<usize>,

    /// Fixed number of lanes, whatever the targets are
    #[arg(long, value_name = "N")]
    override_threads: Option<usize>,

    /// Concurrent article fetches within one source (defaults to the config value)
    #[arg(long, value_name = "N")]
    article_threads: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(threads) = cli.article_threads {
        config.crawler.article_threads = threads;
    }

    if cli.dry_run {
        handle_dry_run(&cli, &config)?;
        return Ok(());
    }

    handle_crawl(&cli, config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("newz=info,warn"),
            1 => EnvFilter::new("newz=debug,info"),
            2 => EnvFilter::new("newz=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;

    println!("=== newz Dry Run ===\n");

    println!("Fetching:");
    println!("  Max parallel fetches: {}", config.fetch.max_parallel_fetches);
    println!("  Request timeout: {}s", config.fetch.request_timeout_seconds);
    println!("  Follow meta refresh: {}", config.fetch.follow_meta_refresh);
    println!("  User agent: {}", config.fetch.user_agent);

    println!("\nCrawler:");
    println!("  Article limit: {}", config.crawler.article_limit);
    println!("  Article threads: {}", config.crawler.article_threads);
    println!("  Memoize articles: {}", config.crawler.memoize_articles);

    println!("\nPool:");
    println!(
        "  Threads per source: {}",
        cli.threads_per_source
            .unwrap_or(config.pool.threads_per_source)
    );
    if let Some(threads) = cli.override_threads {
        println!("  Override threads: {}", threads);
    }
    println!("  Lane policy: {:?}", config.pool.lane_policy);

    println!("\nSources ({}):", cli.urls.len());
    for url in &cli.urls {
        match Source::new(url) {
            Ok(source) => println!("  - {} ({})", source.url, source.brand),
            Err(e) => println!("  - {} (invalid: {})", url, e),
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Builds every source, then optionally downloads and parses their articles
async fn handle_crawl(cli: &Cli, config: Config) -> anyhow::Result<()> {
    let threads_per_source = cli
        .threads_per_source
        .unwrap_or(config.pool.threads_per_source);
    let crawler = Crawler::new(config).context("invalid configuration")?;

    let mut sources = Vec::with_capacity(cli.urls.len());
    for url in &cli.urls {
        let mut source = match Source::new(url) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Skipping {}: {}", url, e);
                continue;
            }
        };
        match crawler.build(&mut source).await {
            Ok(()) => sources.push(source),
            Err(e) => tracing::error!("Skipping {}: {}", url, e),
        }
    }

    if cli.download && !sources.is_empty() {
        let pool = NewsPool::new(crawler.clone());
        let targets = sources.drain(..).map(CrawlTarget::Source).collect();
        pool.set(targets, threads_per_source, cli.override_threads)?;
        sources = pool
            .join_async()
            .await?
            .into_iter()
            .filter_map(CrawlTarget::into_source)
            .collect();
    }

    if cli.parse {
        for source in &mut sources {
            crawler.parse_articles(source).await?;
        }
    }

    for source in &sources {
        print_report(&source.url, &source.report);
    }

    Ok(())
}
