//! Integration tests for newz
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! fetcher, the source pipeline and the pool coordinator end-to-end.

mod fetch_tests;
mod pipeline_tests;
mod pool_tests;

use newz::config::Config;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Default config with short timeouts and a small minimum article size
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.fetch.request_timeout_seconds = 5.0;
    config.pool.thread_timeout_seconds = 0.2;
    config.extraction.min_word_count = 20;
    config.extraction.min_sentence_count = 2;
    config
}

/// An rss 2.0 document linking to `links`
pub fn rss(channel: &str, links: &[String]) -> String {
    let items: String = links
        .iter()
        .map(|link| format!("<item><title>Story</title><link>{}</link></item>", link))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test</title><link>{}</link>{}</channel></rss>"#,
        channel, items
    )
}

/// An article page long enough to survive body validation
pub fn article_page(title: &str) -> String {
    let body = "The storm moved along the coast overnight and flooded several roads. "
        .repeat(6);
    format!(
        "<html><head><title>{}</title></head><body><article><p>{}</p></article></body></html>",
        title, body
    )
}

/// Serves `body` as html at `route`
pub async fn serve_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Serves `body` as rss at `route`
pub async fn serve_rss(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}
