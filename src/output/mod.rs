//! Output module for crawl reports
//!
//! Results stay in memory; this module only renders the per-source counts.

mod report;

pub use report::{format_report, print_report, CrawlReport};
