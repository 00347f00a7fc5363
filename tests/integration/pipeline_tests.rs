use crate::{article_page, rss, serve_html, serve_rss, test_config};
use newz::state::DownloadState;
use newz::{Crawler, NewzError, Source};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORM: &str = "/2024/05/01/storm-hits-the-coast";
const RAIN: &str = "/2024/05/02/rain-floods-the-town";
const WIND: &str = "/2024/05/03/wind-topples-old-trees";

#[tokio::test]
async fn test_feed_probes_collapse_overlapping_articles() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve_html(
        &server,
        "/",
        "<html><head><title>Front page</title></head><body></body></html>".to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    serve_rss(
        &server,
        "/feeds",
        rss(
            &base,
            &[format!("{}{}", base, STORM), format!("{}{}", base, RAIN)],
        ),
    )
    .await;
    serve_rss(&server, "/rss", rss(&base, &[format!("{}{}", base, RAIN)])).await;

    let crawler = Crawler::new(test_config()).unwrap();
    let mut source = Source::new(&base).unwrap();
    crawler.build(&mut source).await.unwrap();

    assert_eq!(source.feeds.len(), 2);
    assert_eq!(
        source.article_urls(),
        vec![format!("{}{}", base, STORM), format!("{}{}", base, RAIN)]
    );

    // the overlapping url keeps its first position but the later discovery
    assert_eq!(
        source.articles[1].source_url.as_deref(),
        Some(format!("{}/rss", base).as_str())
    );

    let report = &source.report;
    assert_eq!(report.feeds_found, 2);
    assert_eq!(report.articles_valid, 3);
    assert_eq!(report.articles_unique, 2);
    assert_eq!(report.articles_kept, 2);
    assert!(report.articles_discovered > report.articles_valid);
}

#[tokio::test]
async fn test_category_candidates_follow_feed_candidates() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve_html(
        &server,
        "/",
        format!(
            r#"<html><head><title>Front page</title>
            <link rel="alternate" type="application/rss+xml" href="/world/rss.xml">
            </head><body>
            <a href="/world">World</a>
            <a href="/about">About us</a>
            <a href="{}">Wind topples old trees</a>
            </body></html>"#,
            WIND
        ),
    )
    .await;
    serve_html(
        &server,
        "/world",
        format!(
            r#"<html><body>
            <a href="{}">Storm hits the coast</a>
            <a href="/contact">Contact</a>
            </body></html>"#,
            STORM
        ),
    )
    .await;
    serve_rss(
        &server,
        "/world/rss.xml",
        rss(&base, &[format!("{}{}", base, STORM)]),
    )
    .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let mut source = Source::new(&base).unwrap();
    crawler.build(&mut source).await.unwrap();

    assert_eq!(
        source.category_urls(),
        vec![format!("{}/", base), format!("{}/world", base)]
    );
    assert_eq!(source.feed_urls(), vec![format!("{}/world/rss.xml", base)]);

    // feed candidate first; the category link to the same story replaced it
    assert_eq!(
        source.article_urls(),
        vec![format!("{}{}", base, STORM), format!("{}{}", base, WIND)]
    );
    let storm = &source.articles[0];
    assert_eq!(
        storm.source_url.as_deref(),
        Some(format!("{}/world", base).as_str())
    );
    assert_eq!(storm.title.as_deref(), Some("Storm hits the coast"));
}

#[tokio::test]
async fn test_dropped_category_is_not_fatal() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve_html(
        &server,
        "/",
        format!(
            r#"<html><body><a href="/politics">Politics</a><a href="{}">Story</a></body></html>"#,
            RAIN
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/politics"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let mut source = Source::new(&base).unwrap();
    crawler.build(&mut source).await.unwrap();

    assert_eq!(source.report.categories_found, 2);
    assert_eq!(source.report.categories_kept, 1);
    assert_eq!(source.article_urls(), vec![format!("{}{}", base, RAIN)]);
}

#[tokio::test]
async fn test_unavailable_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let mut source = Source::new(&server.uri()).unwrap();
    let result = crawler.build(&mut source).await;

    assert!(matches!(result, Err(NewzError::SourceUnavailable { .. })));
    assert_eq!(source.download_state, DownloadState::Failed);
    assert!(source.articles.is_empty());
}

/// A source holding `count` article candidates served by `server`
async fn source_with_articles(server: &MockServer, count: usize) -> Source {
    let base = server.uri();
    let mut source = Source::new(&base).unwrap();

    for i in 0..count {
        let route = format!("/2024/06/{:02}/story-number-{}", i % 28 + 1, i);
        let url = format!("{}{}", base, route);

        if i % 4 == 3 {
            Mock::given(method("GET"))
                .and(path(route.as_str()))
                .respond_with(ResponseTemplate::new(404))
                .mount(server)
                .await;
        } else {
            // earlier articles answer later
            Mock::given(method("GET"))
                .and(path(route.as_str()))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(article_page(&format!("Story number {}", i)))
                        .set_delay(Duration::from_millis(((count - i) * 10) as u64)),
                )
                .mount(server)
                .await;
        }

        source
            .articles
            .push(newz::Article::discovered(url, base.clone(), None));
    }

    source
}

#[tokio::test]
async fn test_parallel_article_download_warns_and_keeps_order() {
    let server = MockServer::start().await;
    let mut source = source_with_articles(&server, 12).await;
    let expected: Vec<String> = source
        .articles
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 4 != 3)
        .map(|(_, article)| article.url.clone())
        .collect();

    let crawler = Crawler::new(test_config()).unwrap();
    let summary = crawler.download_articles(&mut source, 10).await.unwrap();

    assert!(summary.rate_limit_warning);
    assert_eq!(summary.attempted, 12);
    assert_eq!(summary.downloaded, 9);
    assert_eq!(summary.failed_urls.len(), 3);
    assert_eq!(source.article_urls(), expected);
    assert!(source.articles.iter().all(|a| a.is_downloaded()));
    assert_eq!(source.report.articles_downloaded, 9);
}

#[tokio::test]
async fn test_sequential_article_download() {
    let server = MockServer::start().await;
    let mut source = source_with_articles(&server, 4).await;

    let crawler = Crawler::new(test_config()).unwrap();
    let summary = crawler.download_articles(&mut source, 1).await.unwrap();

    assert!(!summary.rate_limit_warning);
    assert_eq!(summary.downloaded, 3);
    assert_eq!(source.size(), 3);

    // a second pass has nothing left to fetch
    let again = crawler.download_articles(&mut source, 5).await.unwrap();
    assert_eq!(again.attempted, 0);
    assert!(!again.rate_limit_warning);
    assert_eq!(source.size(), 3);
}

#[tokio::test]
async fn test_parse_articles_prunes_short_bodies() {
    let server = MockServer::start().await;
    let base = server.uri();
    serve_html(&server, STORM, article_page("Storm hits the coast")).await;
    serve_html(
        &server,
        RAIN,
        "<html><head><title>Rain</title></head><body><p>Too short.</p></body></html>".to_string(),
    )
    .await;

    let mut source = Source::new(&base).unwrap();
    for route in [STORM, RAIN] {
        source
            .articles
            .push(newz::Article::discovered(format!("{}{}", base, route), base.clone(), None));
    }

    let crawler = Crawler::new(test_config()).unwrap();
    crawler.download_articles(&mut source, 2).await.unwrap();
    crawler.parse_articles(&mut source).await.unwrap();

    assert_eq!(source.article_urls(), vec![format!("{}{}", base, STORM)]);
    let article = &mut source.articles[0];
    assert!(article.is_parsed());
    assert_eq!(article.title.as_deref(), Some("Storm hits the coast"));
    assert!(article.word_count() > 20);

    crawler.nlp_article(article).await.unwrap();
    assert!(article.keywords.contains(&"storm".to_string()));
    assert!(!article.summary.is_empty());
}

#[tokio::test]
async fn test_memoized_articles_are_skipped_on_rebuild() {
    let server = MockServer::start().await;
    let base = server.uri();
    serve_html(&server, "/", "<html><body></body></html>".to_string()).await;
    serve_rss(
        &server,
        "/rss",
        rss(
            &base,
            &[format!("{}{}", base, STORM), format!("{}{}", base, RAIN)],
        ),
    )
    .await;

    let memo_dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.crawler.memoize_articles = true;
    config.crawler.memo_dir = memo_dir.path().to_string_lossy().into_owned();
    let crawler = Crawler::new(config).unwrap();

    let mut first = Source::new(&base).unwrap();
    crawler.build(&mut first).await.unwrap();
    assert_eq!(first.size(), 2);

    let mut second = Source::new(&base).unwrap();
    crawler.build(&mut second).await.unwrap();
    assert_eq!(second.size(), 0);
    assert_eq!(second.report.articles_valid, 0);
}

#[tokio::test]
async fn test_article_limit_keeps_first_discovered() {
    let server = MockServer::start().await;
    let base = server.uri();
    let stories: Vec<String> = (1..=8)
        .map(|day| format!("{}/2024/08/0{}/limited-story-number-{}", base, day, day))
        .collect();
    serve_html(&server, "/", "<html><body></body></html>".to_string()).await;
    serve_rss(&server, "/rss", rss(&base, &stories)).await;

    let mut config = test_config();
    config.crawler.article_limit = 3;
    let crawler = Crawler::new(config).unwrap();
    let mut source = Source::new(&base).unwrap();
    crawler.build(&mut source).await.unwrap();

    assert_eq!(source.article_urls(), stories[..3].to_vec());
    assert_eq!(source.report.articles_unique, 8);
    assert_eq!(source.report.articles_kept, 3);
}
