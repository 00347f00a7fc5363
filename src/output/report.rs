//! Per-source crawl statistics
//!
//! The pipeline fills one [`CrawlReport`] per source as it moves through its
//! phases, so a caller can see where candidates were lost.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

/// Stage-by-stage counts for one source crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Category urls picked from the root document
    pub categories_found: usize,

    /// Categories that downloaded and parsed
    pub categories_kept: usize,

    /// Feeds found by probing and by feed links
    pub feeds_found: usize,

    /// Feeds whose payload downloaded
    pub feeds_kept: usize,

    /// Article candidates before any filtering
    pub articles_discovered: usize,

    /// Candidates that passed the article url heuristic (and memo filter)
    pub articles_valid: usize,

    /// Candidates left after deduplication
    pub articles_unique: usize,

    /// Candidates left after the article limit
    pub articles_kept: usize,

    /// Articles whose body downloaded
    pub articles_downloaded: usize,

    /// Articles that parsed into a valid body
    pub articles_parsed: usize,

    /// When `build` started
    pub started_at: Option<DateTime<Utc>>,

    /// When the last phase finished
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlReport {
    /// Candidates dropped between discovery and the kept set
    pub fn discovery_losses(&self) -> usize {
        self.articles_discovered.saturating_sub(self.articles_kept)
    }

    /// Kept articles that failed to download
    pub fn download_losses(&self) -> usize {
        self.articles_kept.saturating_sub(self.articles_downloaded)
    }

    /// Downloaded articles pruned by extraction
    pub fn parse_losses(&self) -> usize {
        self.articles_downloaded.saturating_sub(self.articles_parsed)
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some((finished - started).num_seconds()),
            _ => None,
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}

/// Renders a report as the text block printed by the CLI
pub fn format_report(source_url: &str, report: &CrawlReport) -> String {
    let mut out = String::new();

    // writing into a String cannot fail
    let _ = writeln!(out, "=== {} ===", source_url);
    let _ = writeln!(
        out,
        "  Categories: {} found, {} kept",
        report.categories_found, report.categories_kept
    );
    let _ = writeln!(
        out,
        "  Feeds: {} found, {} kept",
        report.feeds_found, report.feeds_kept
    );
    let _ = writeln!(out, "  Articles:");
    let _ = writeln!(out, "    discovered: {}", report.articles_discovered);
    let _ = writeln!(out, "    valid urls: {}", report.articles_valid);
    let _ = writeln!(out, "    unique:     {}", report.articles_unique);
    let _ = writeln!(out, "    kept:       {}", report.articles_kept);
    let _ = writeln!(
        out,
        "    downloaded: {} ({:.1}%)",
        report.articles_downloaded,
        percentage(report.articles_downloaded, report.articles_kept)
    );
    let _ = writeln!(
        out,
        "    parsed:     {} ({:.1}%)",
        report.articles_parsed,
        percentage(report.articles_parsed, report.articles_kept)
    );

    if let Some(seconds) = report.duration_seconds() {
        let _ = writeln!(out, "  Duration: {}s", seconds);
    }

    out
}

/// Prints a report to stdout
pub fn print_report(source_url: &str, report: &CrawlReport) {
    print!("{}", format_report(source_url, report));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CrawlReport {
        CrawlReport {
            categories_found: 4,
            categories_kept: 3,
            feeds_found: 2,
            feeds_kept: 2,
            articles_discovered: 120,
            articles_valid: 90,
            articles_unique: 60,
            articles_kept: 50,
            articles_downloaded: 40,
            articles_parsed: 25,
            ..Default::default()
        }
    }

    #[test]
    fn test_losses() {
        let report = sample();
        assert_eq!(report.discovery_losses(), 70);
        assert_eq!(report.download_losses(), 10);
        assert_eq!(report.parse_losses(), 15);
        assert_eq!(CrawlReport::default().parse_losses(), 0);
    }

    #[test]
    fn test_format_report() {
        let text = format_report("https://example.com/", &sample());
        assert!(text.starts_with("=== https://example.com/ ==="));
        assert!(text.contains("Categories: 4 found, 3 kept"));
        assert!(text.contains("downloaded: 40 (80.0%)"));
        assert!(text.contains("parsed:     25 (50.0%)"));
        assert!(!text.contains("Duration"));
    }

    #[test]
    fn test_duration() {
        let started = Utc::now();
        let report = CrawlReport {
            started_at: Some(started),
            finished_at: Some(started + chrono::Duration::seconds(3)),
            ..Default::default()
        };
        assert_eq!(report.duration_seconds(), Some(3));
    }
}
