use crate::{serve_html, test_config};
use newz::crawler::{FetchOutcome, Fetcher};
use newz::Executor;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_many_keeps_input_order() {
    let server = MockServer::start().await;
    let base = server.uri();

    // the first url answers last
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let urls = vec![
        format!("{}/slow", base),
        format!("{}/missing", base),
        format!("{}/fast", base),
        "http://127.0.0.1:1/unreachable".to_string(),
        format!("{}/broken", base),
    ];

    let fetcher = Fetcher::new(test_config().fetch, Executor::new(2)).unwrap();
    let results = fetcher.fetch_many(&urls).await;

    assert_eq!(results.len(), urls.len());
    for (result, url) in results.iter().zip(&urls) {
        assert_eq!(&result.url, url);
    }
    assert_eq!(results[0].body(), Some("slow"));
    assert!(matches!(
        results[1].outcome,
        FetchOutcome::HttpError { status_code: 404 }
    ));
    assert_eq!(results[2].body(), Some("fast"));
    assert!(matches!(
        results[3].outcome,
        FetchOutcome::NetworkError { .. }
    ));
    assert!(matches!(
        results[4].outcome,
        FetchOutcome::HttpError { status_code: 503 }
    ));
}

#[tokio::test]
async fn test_timeout_is_a_failure_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stuck"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.fetch.request_timeout_seconds = 0.2;
    let fetcher = Fetcher::new(config.fetch, Executor::new(1)).unwrap();

    let result = fetcher.fetch(&format!("{}/stuck", server.uri())).await;
    assert!(matches!(
        result.outcome,
        FetchOutcome::NetworkError {
            timed_out: true,
            ..
        }
    ));
}

#[tokio::test]
async fn test_meta_refresh_is_followed_once() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/short",
        r#"<html><head><meta http-equiv="refresh" content="0;url=/middle"></head></html>"#
            .to_string(),
    )
    .await;
    serve_html(
        &server,
        "/middle",
        r#"<html><head><meta http-equiv="refresh" content="0;url=/final"></head><body>middle</body></html>"#
            .to_string(),
    )
    .await;
    serve_html(&server, "/final", "<html><body>final</body></html>".to_string()).await;

    let url = format!("{}/short", server.uri());

    let mut config = test_config();
    config.fetch.follow_meta_refresh = true;
    let following = Fetcher::new(config.fetch, Executor::new(1)).unwrap();
    let result = following.fetch(&url).await;

    assert_eq!(result.url, url);
    assert!(result.body().unwrap().contains("middle"));
    match &result.outcome {
        FetchOutcome::Success { final_url, .. } => {
            assert_eq!(final_url, &format!("{}/middle", server.uri()))
        }
        other => panic!("expected success, got {:?}", other),
    }

    let plain = Fetcher::new(test_config().fetch, Executor::new(1)).unwrap();
    let result = plain.fetch(&url).await;
    assert!(result.body().unwrap().contains("url=/middle"));
}
