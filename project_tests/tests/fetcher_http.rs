//! RemoteFetcher against an in-process provider.

use serde_json::json;
use std::time::Duration;

use lib_repopulse::{ErrorKind, FetchError, ProjectMetrics, ProjectRegistry};
use project_tests::{fetcher_for, octo_registry, octo_success, MockProvider, MockReply, TEST_TOKEN};

#[tokio::test]
async fn test_one_authenticated_post_per_batch() {
    let provider = MockProvider::always(MockReply::Json(octo_success())).await;
    let fetcher = fetcher_for(&provider, Duration::from_secs(2));

    fetcher.fetch_projects(&octo_registry()).await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some(format!("Bearer {}", TEST_TOKEN).as_str())
    );

    let body = &requests[0].body;
    let query = body["query"].as_str().unwrap();
    assert!(query.contains("item0: repository(owner: $owner0, name: $name0)"));
    assert!(query.contains("item1: repository(owner: $owner1, name: $name1)"));
    assert_eq!(body["variables"]["owner0"], "octo");
    assert_eq!(body["variables"]["name0"], "hello");
    assert_eq!(body["variables"]["name1"], "world");
}

#[tokio::test]
async fn test_metrics_follow_registry_order() {
    // Provider answers with keys in reverse order.
    let provider = MockProvider::always(MockReply::Json(json!({
        "data": {
            "item2": {"name": "c", "starCount": 3, "forkCount": 30},
            "item1": {"name": "b", "starCount": 2, "forkCount": 20},
            "item0": {"name": "a", "starCount": 1, "forkCount": 10}
        }
    })))
    .await;
    let fetcher = fetcher_for(&provider, Duration::from_secs(2));
    let registry = ProjectRegistry::from_specs(["x/a", "x/b", "x/c"]).unwrap();

    let metrics = fetcher.fetch_projects(&registry).await.unwrap();

    let names: Vec<&str> = metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(
        metrics[2],
        ProjectMetrics {
            name: "c".to_string(),
            stars: 3,
            forks: 30
        }
    );
}

#[tokio::test]
async fn test_provider_errors_become_query_error() {
    let provider = MockProvider::always(MockReply::Json(json!({
        "data": {
            "item0": {"name": "hello", "starCount": 5, "forkCount": 1},
            "item1": null
        },
        "errors": [{"message": "Could not resolve to a Repository with the name 'octo/world'."}]
    })))
    .await;
    let fetcher = fetcher_for(&provider, Duration::from_secs(2));

    let err = fetcher.fetch_projects(&octo_registry()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueryError);
    match err {
        FetchError::Query { details, partial } => {
            assert_eq!(details.len(), 1);
            assert!(details[0].contains("octo/world"));
            assert_eq!(partial.len(), 1);
            assert_eq!(partial[0].name, "hello");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_http_failure_is_transport_error() {
    let provider = MockProvider::always(MockReply::Status(502)).await;
    let fetcher = fetcher_for(&provider, Duration::from_secs(2));

    let err = fetcher.fetch_projects(&octo_registry()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportError);
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_unparseable_body_is_transport_error() {
    let provider = MockProvider::always(MockReply::Garbage).await;
    let fetcher = fetcher_for(&provider, Duration::from_secs(2));

    let err = fetcher.fetch_projects(&octo_registry()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportError);
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let provider = MockProvider::always(MockReply::Hang).await;
    let fetcher = fetcher_for(&provider, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let err = fetcher.fetch_projects(&octo_registry()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportError);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_empty_registry_sends_nothing() {
    let provider = MockProvider::always(MockReply::Json(octo_success())).await;
    let fetcher = fetcher_for(&provider, Duration::from_secs(2));

    let err = fetcher
        .fetch_projects(&ProjectRegistry::new(Vec::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::EmptyBatch));
    assert_eq!(provider.request_count(), 0);
}
