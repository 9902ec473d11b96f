//! Fetch interceptor: routing, pass-through, and response synthesis.

use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};

use pmtiles_protocol::{
    Dispatcher, FetchError, FetchInterceptor, FetchRequest, HttpClient,
};

use super::test_utils::{MockArchiveSource, RecordingHttpClient, UPSTREAM_MARKER};

fn interceptor(
    source: MockArchiveSource,
    inner: RecordingHttpClient,
) -> FetchInterceptor<MockArchiveSource> {
    FetchInterceptor::new(Arc::new(Dispatcher::new(source)), Arc::new(inner))
}

#[tokio::test]
async fn test_non_scheme_url_passes_through() {
    let inner = RecordingHttpClient::new();
    let forwarded = inner.requests_handle();
    let interceptor = interceptor(MockArchiveSource::new(), inner);

    let response = interceptor
        .execute("https://example.com/style.json".into())
        .await
        .unwrap();

    // The canned upstream response came back unchanged
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(UPSTREAM_MARKER));
    assert_eq!(response.body().as_ref(), b"upstream");

    let forwarded = forwarded.lock().unwrap();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].url, "https://example.com/style.json");
}

#[tokio::test]
async fn test_non_get_method_passes_through() {
    let inner = RecordingHttpClient::new();
    let forwarded = inner.requests_handle();
    let source = MockArchiveSource::new().with_tile(0, 0, 0, b"tile");
    let opened = source.opened_handle();
    let interceptor = interceptor(source, inner);

    let request = FetchRequest::new(Method::POST, "pmtiles://example/0/0/0.png");
    let response = interceptor.execute(request).await.unwrap();

    assert!(response.headers().contains_key(UPSTREAM_MARKER));
    assert_eq!(forwarded.lock().unwrap().len(), 1);
    // The archive layer never saw the request
    assert!(opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_failure_passes_through_unchanged() {
    let interceptor = interceptor(MockArchiveSource::new(), RecordingHttpClient::failing());

    let result = interceptor.execute("https://example.com/".into()).await;
    assert!(matches!(result, Err(FetchError::Upstream(_))));
}

#[tokio::test]
async fn test_tile_request_returns_bytes_and_content_type() {
    let source = MockArchiveSource::new()
        .with_tile(3, 1, 2, &[1, 2, 3])
        .with_tile_type(2);
    let inner = RecordingHttpClient::new();
    let forwarded = inner.requests_handle();
    let interceptor = interceptor(source, inner);

    let response = interceptor
        .execute("pmtiles://example/3/1/2.png".into())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    assert_eq!(response.body().as_ref(), &[1, 2, 3]);
    // Nothing reached the network
    assert!(forwarded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_absent_tile_returns_404_not_failure() {
    let source = MockArchiveSource::new().with_tile(3, 1, 2, &[1, 2, 3]);
    let interceptor = interceptor(source, RecordingHttpClient::new());

    let response = interceptor
        .execute("pmtiles://example/9/0/0.mvt".into())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.body().is_empty());
    assert!(!response.headers().contains_key(CONTENT_TYPE));
}

#[tokio::test]
async fn test_metadata_request_returns_document_verbatim() {
    let document = serde_json::json!({
        "tilejson": "3.0.0",
        "name": "test archive",
        "minzoom": 0,
        "maxzoom": 14,
    });
    let source = MockArchiveSource::new().with_metadata(document.clone());
    let metadata_urls = source.metadata_urls_handle();
    let interceptor = interceptor(source, RecordingHttpClient::new());

    let response = interceptor
        .execute("pmtiles://example".into())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, document);

    // The reader received the reconstructed custom-scheme self URL
    assert_eq!(
        *metadata_urls.lock().unwrap(),
        vec!["pmtiles://example".to_string()]
    );
}

#[tokio::test]
async fn test_open_failure_rejects() {
    let interceptor = interceptor(
        MockArchiveSource::new().failing_open(),
        RecordingHttpClient::new(),
    );

    let result = interceptor.execute("pmtiles://example".into()).await;
    assert!(matches!(result, Err(FetchError::Archive(_))));
}

#[tokio::test]
async fn test_tile_lookup_failure_rejects() {
    let interceptor = interceptor(
        MockArchiveSource::new().failing_tile(),
        RecordingHttpClient::new(),
    );

    let result = interceptor.execute("pmtiles://example/3/1/2.png".into()).await;
    assert!(matches!(result, Err(FetchError::Archive(_))));
}

#[tokio::test]
async fn test_unknown_tile_type_serves_octet_stream() {
    let source = MockArchiveSource::new()
        .with_tile(0, 0, 0, b"data")
        .with_tile_type(42);
    let interceptor = interceptor(source, RecordingHttpClient::new());

    let response = interceptor
        .execute("pmtiles://example/0/0/0.png".into())
        .await
        .unwrap();
    assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
}

#[tokio::test]
async fn test_mangled_nested_scheme_is_repaired() {
    let source = MockArchiveSource::new().with_tile(1, 2, 3, b"t");
    let opened = source.opened_handle();
    let interceptor = interceptor(source, RecordingHttpClient::new());

    interceptor
        .execute("pmtiles://https//tiles.example.com/planet.pmtiles/1/2/3.png".into())
        .await
        .unwrap();

    assert_eq!(
        *opened.lock().unwrap(),
        vec!["https://tiles.example.com/planet.pmtiles".to_string()]
    );
}

#[tokio::test]
async fn test_repeated_requests_share_one_reader() {
    let source = MockArchiveSource::new().with_tile(3, 1, 2, b"t");
    let open_count = source.open_count_handle();
    let interceptor = interceptor(source, RecordingHttpClient::new());

    interceptor
        .execute("pmtiles://example/3/1/2.png".into())
        .await
        .unwrap();
    interceptor
        .execute("pmtiles://example/9/9/9.png".into())
        .await
        .unwrap();
    interceptor
        .execute("pmtiles://example".into())
        .await
        .unwrap();

    assert_eq!(open_count.load(std::sync::atomic::Ordering::SeqCst), 1);
}
