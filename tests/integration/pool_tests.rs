use crate::{article_page, serve_html, test_config};
use newz::config::LanePolicy;
use newz::{Article, CrawlTarget, Crawler, NewsPool, NewzError, Source};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A source at `{server}/site{n}/` holding two article candidates
async fn source_for_site(server: &MockServer, n: usize) -> Source {
    let base = format!("{}/site{}/", server.uri(), n);
    let mut source = Source::new(&base).unwrap();

    for story in 0..2 {
        let route = format!("/site{}/2024/07/0{}/lane-test-story-{}", n, story + 1, story);
        serve_html(server, &route, article_page(&format!("Site {} story {}", n, story))).await;
        source.articles.push(Article::discovered(
            format!("{}{}", server.uri(), route),
            base.clone(),
            None,
        ));
    }

    source
}

#[tokio::test]
async fn test_sources_get_one_lane_each_and_keep_order() {
    let server = MockServer::start().await;
    let mut targets = Vec::new();
    for n in 0..5 {
        targets.push(CrawlTarget::Source(source_for_site(&server, n).await));
    }
    let urls: Vec<String> = targets.iter().map(|t| t.url().to_string()).collect();

    let pool = NewsPool::new(Crawler::new(test_config()).unwrap());
    let plan = pool.set(targets, 1, None).unwrap();
    assert_eq!(plan.lanes, 5);
    assert_eq!(plan.jobs, 5);

    let done = pool.join_async().await.unwrap();
    let done_urls: Vec<&str> = done.iter().map(CrawlTarget::url).collect();
    assert_eq!(done_urls, urls);

    for target in done {
        let source = target.into_source().unwrap();
        assert_eq!(source.size(), 2);
        assert!(source.articles.iter().all(|a| a.is_downloaded()));
        assert_eq!(source.report.articles_downloaded, 2);
    }
}

#[tokio::test]
async fn test_override_threads_caps_lanes() {
    let server = MockServer::start().await;
    let mut targets = Vec::new();
    for n in 0..5 {
        targets.push(CrawlTarget::Source(source_for_site(&server, n).await));
    }

    let pool = NewsPool::new(Crawler::new(test_config()).unwrap());
    let plan = pool.set(targets, 1, Some(2)).unwrap();
    assert_eq!(plan.lanes, 2);

    let done = pool.join_async().await.unwrap();
    assert_eq!(done.len(), 5);
    assert!(done
        .into_iter()
        .filter_map(CrawlTarget::into_source)
        .all(|source| source.size() == 2));
}

#[tokio::test]
async fn test_lane_fetches_articles_with_configured_threads() {
    let server = MockServer::start().await;
    let base = format!("{}/busy/", server.uri());
    let mut source = Source::new(&base).unwrap();
    for story in 0..6 {
        let route = format!("/busy/2024/07/2{}/busy-lane-story-{}", story, story);
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(article_page("Busy"))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;
        source.articles.push(Article::discovered(
            format!("{}{}", server.uri(), route),
            base.clone(),
            None,
        ));
    }

    let mut config = test_config();
    config.crawler.article_threads = 6;
    let pool = NewsPool::new(Crawler::new(config).unwrap());
    pool.set(vec![CrawlTarget::Source(source)], 1, None).unwrap();

    // six 400ms answers one after another would take 2.4s
    let started = std::time::Instant::now();
    let done = pool.join_async().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(1500));

    let source = done.into_iter().next().and_then(CrawlTarget::into_source).unwrap();
    assert_eq!(source.size(), 6);
    assert_eq!(source.report.articles_downloaded, 6);
}

#[tokio::test]
async fn test_mixed_batch_runs_on_one_lane() {
    let server = MockServer::start().await;
    let source = source_for_site(&server, 0).await;
    serve_html(&server, "/2024/07/09/single-story-here", article_page("Single")).await;
    let article = Article::new(format!("{}/2024/07/09/single-story-here", server.uri()));

    let pool = NewsPool::new(Crawler::new(test_config()).unwrap());
    let plan = pool
        .set(vec![CrawlTarget::Source(source), CrawlTarget::Article(article)], 3, None)
        .unwrap();
    assert_eq!(plan.lanes, 1);

    let mut done = pool.join_async().await.unwrap().into_iter();
    let source = done.next().and_then(CrawlTarget::into_source).unwrap();
    let article = done.next().and_then(CrawlTarget::into_article).unwrap();
    assert!(done.next().is_none());

    assert_eq!(source.size(), 2);
    assert!(article.is_downloaded());
    assert!(article.html.as_deref().unwrap().contains("Single"));
}

#[tokio::test]
async fn test_failed_article_target_is_still_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2024/07/10/missing-story-page"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let article = Article::new(format!("{}/2024/07/10/missing-story-page", server.uri()));

    let pool = NewsPool::new(Crawler::new(test_config()).unwrap());
    pool.set(vec![CrawlTarget::Article(article)], 1, None).unwrap();

    let done = pool.join_async().await.unwrap();
    let article = done.into_iter().next().and_then(CrawlTarget::into_article).unwrap();
    assert!(!article.is_downloaded());
    assert!(article.download_error.is_some());
}

async fn slow_article(server: &MockServer, route: &str, delay: Duration) -> CrawlTarget {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_page("Slow"))
                .set_delay(delay),
        )
        .mount(server)
        .await;
    CrawlTarget::Article(Article::new(format!("{}{}", server.uri(), route)))
}

#[tokio::test]
async fn test_concurrent_join_is_rejected() {
    let server = MockServer::start().await;
    let target = slow_article(
        &server,
        "/2024/07/11/slow-story-page",
        Duration::from_millis(300),
    )
    .await;

    let pool = Arc::new(NewsPool::new(Crawler::new(test_config()).unwrap()));
    pool.set(vec![target], 1, None).unwrap();

    let first = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.join_async().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = pool.join_async().await;
    assert!(matches!(second, Err(NewzError::Concurrency(_))));

    let done = first.await.unwrap().unwrap();
    assert_eq!(done.len(), 1);
}

#[tokio::test]
async fn test_cancelled_join_frees_the_pool() {
    let server = MockServer::start().await;
    let stuck = slow_article(&server, "/2024/07/12/stuck-story-page", Duration::from_secs(2)).await;

    let pool = NewsPool::new(Crawler::new(test_config()).unwrap());
    pool.set(vec![stuck], 1, None).unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(100), pool.join_async()).await;
    assert!(cancelled.is_err());

    // the abandoned batch no longer blocks a new one
    let source = source_for_site(&server, 7).await;
    pool.set(vec![CrawlTarget::Source(source)], 1, None).unwrap();
    let done = pool.join_async().await.unwrap();
    assert_eq!(done.len(), 1);
}

#[test]
fn test_isolated_lanes_blocking_join() {
    // the mock server lives on its own runtime; the pool is driven without one
    let server_runtime = tokio::runtime::Runtime::new().unwrap();
    let server = server_runtime.block_on(MockServer::start());
    let targets: Vec<CrawlTarget> = (0..3)
        .map(|n| CrawlTarget::Source(server_runtime.block_on(source_for_site(&server, n))))
        .collect();

    let pool = NewsPool::with_policy(Crawler::new(test_config()).unwrap(), LanePolicy::Isolated);
    assert_eq!(pool.policy(), LanePolicy::Isolated);

    let plan = pool.set(targets, 1, None).unwrap();
    assert_eq!(plan.lanes, 3);
    assert_eq!(plan.policy, LanePolicy::Isolated);

    let done = pool.join().unwrap();
    assert_eq!(done.len(), 3);
    for (n, target) in done.into_iter().enumerate() {
        let source = target.into_source().unwrap();
        assert!(source.url.ends_with(&format!("/site{}/", n)));
        assert_eq!(source.size(), 2);
        assert!(source.articles.iter().all(|a| a.is_downloaded()));
    }
}
