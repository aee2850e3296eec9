//! Integration tests for [`HttpFetcher`] and [`TimeoutFetcher`] against a
//! mock metadata service.

use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use huginn::fetcher::{HttpFetcher, HttpFetcherConfig, TimeoutFetcher};
use huginn::{FetchError, FetchErrorKind, FetchOptions, Fetcher, Huginn, HuginnError, Metadata};

const ITEM: &str = "https://media.example/watch?v=abc";

fn sample_body() -> serde_json::Value {
    serde_json::json!({
        "id": "abc",
        "title": "Sample clip",
        "uploader": "someone",
        "duration_secs": 212.0,
        "thumbnails": [{ "url": "https://img.example/abc.jpg", "width": 1280, "height": 720 }],
        "formats": [
            { "format_id": "18", "ext": "mp4", "height": 360, "vcodec": "avc1", "tbr": 500.0 },
            { "format_id": "22", "ext": "mp4", "height": 720, "vcodec": "avc1", "filesize": 52000000 }
        ]
    })
}

async fn fetcher_for(server: &MockServer) -> HttpFetcher {
    HttpFetcher::new(HttpFetcherConfig::new(format!("{}/metadata", server.uri()))).unwrap()
}

#[tokio::test]
async fn decodes_metadata_and_forwards_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .and(query_param("url", ITEM))
        .and(query_param("quality", "720p"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server).await;
    let metadata = fetcher
        .fetch_metadata(ITEM, &FetchOptions::new().quality("720p"))
        .await
        .unwrap();

    assert_eq!(metadata.title, "Sample clip");
    assert_eq!(metadata.formats.len(), 2);
    assert_eq!(metadata.format_for_height(720).unwrap().format_id, "22");
    assert_eq!(metadata.duration(), Some(Duration::from_secs(212)));
}

#[tokio::test]
async fn quick_flag_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("quick", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server).await;
    fetcher
        .fetch_metadata(ITEM, &FetchOptions::new().quick(true))
        .await
        .unwrap();
}

#[tokio::test]
async fn user_agent_carries_the_build_version() {
    let server = MockServer::start().await;
    let agent = format!("huginn/{}", huginn::version_string());
    Mock::given(method("GET"))
        .and(header("user-agent", agent.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server).await;
    fetcher.fetch_metadata(ITEM, &FetchOptions::new()).await.unwrap();
    assert!(agent.contains(huginn::PKG_VERSION));
}

#[tokio::test]
async fn server_error_is_a_transient_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .await
        .fetch_metadata(ITEM, &FetchOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Provider);
    assert!(err.message().contains("503"));
    assert!(err.message().contains("overloaded"));
    assert!(err.is_transient());
}

#[tokio::test]
async fn undecodable_body_is_a_permanent_format_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .await
        .fetch_metadata(ITEM, &FetchOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Format);
    assert!(!err.is_transient());
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(
        HttpFetcherConfig::new(format!("{}/metadata", server.uri()))
            .timeout(Duration::from_millis(100)),
    )
    .unwrap();
    let err = fetcher
        .fetch_metadata(ITEM, &FetchOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Timeout);
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    // Bind then drop a server so the port is closed.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let fetcher = HttpFetcher::new(HttpFetcherConfig::new(format!("{uri}/metadata"))).unwrap();

    let err = fetcher
        .fetch_metadata(ITEM, &FetchOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Network);
}

#[test]
fn invalid_endpoint_is_a_configuration_error() {
    let result = HttpFetcher::new(HttpFetcherConfig::new("not a url"));
    assert!(matches!(result, Err(HuginnError::Configuration(_))));
}

#[tokio::test]
async fn scheduler_over_http_dedupes_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_body())
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let scheduler = Huginn::builder()
        .fetcher(fetcher_for(&server).await)
        .build()
        .unwrap();
    let options = FetchOptions::new();

    let (a, b, c) = tokio::join!(
        scheduler.fetch(ITEM, &options),
        scheduler.fetch(ITEM, &options),
        scheduler.fetch(ITEM, &options),
    );
    assert_eq!(a.unwrap().title, "Sample clip");
    assert!(b.is_ok());
    assert!(c.is_ok());

    scheduler.shutdown().await;
}

// ============================================================================
// TimeoutFetcher
// ============================================================================

struct Hanging;

#[async_trait]
impl Fetcher for Hanging {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn fetch_metadata(
        &self,
        _item_id: &str,
        _options: &FetchOptions,
    ) -> Result<Metadata, FetchError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_fetcher_fails_a_hanging_fetch() {
    let fetcher = TimeoutFetcher::new(Hanging, Duration::from_secs(30));
    assert_eq!(fetcher.name(), "hanging");

    let err = fetcher
        .fetch_metadata(ITEM, &FetchOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Timeout);
}

#[tokio::test]
async fn timeout_releases_the_dispatch_slot() {
    let scheduler = Huginn::builder()
        .fetcher(TimeoutFetcher::new(Hanging, Duration::from_millis(50)))
        .config(huginn::SchedulerConfig::new().max_concurrent(1))
        .build()
        .unwrap();

    let opts_a = FetchOptions::new();
    let opts_b = FetchOptions::new();
    let (a, b) = tokio::join!(
        scheduler.fetch("item-a", &opts_a),
        scheduler.fetch("item-b", &opts_b),
    );
    assert!(matches!(a, Err(HuginnError::Fetch(ref e)) if e.kind() == FetchErrorKind::Timeout));
    assert!(matches!(b, Err(HuginnError::Fetch(ref e)) if e.kind() == FetchErrorKind::Timeout));
    assert_eq!(scheduler.stats().active, 0);
}
