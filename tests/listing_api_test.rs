//! Tests for the two-phase listing-search API lookup, using mockito servers
//! and call-count assertions to pin down when the paused query is issued.

use mockito::Matcher;
use tripwatch::{ApiLookup, ListingStatusClient, WatchConfig};

fn client_for(server: &mockito::Server) -> ListingStatusClient {
    let config = WatchConfig::default().with_api_base_url(format!("{}/search", server.url()));
    ListingStatusClient::new(&config).expect("client builds")
}

fn body(count: u64, results: &str) -> String {
    format!(r#"{{"count": {count}, "results": [{results}]}}"#)
}

#[tokio::test]
async fn active_listing_short_circuits_paused_query() {
    let mut server = mockito::Server::new_async().await;
    let active = server
        .mock("GET", "/search")
        .match_query(Matcher::Exact("ids=42".into()))
        .with_body(body(
            1,
            r#"{"id": 42, "title": "Old Town walk", "status": "active"}"#,
        ))
        .expect(1)
        .create_async()
        .await;
    let paused = server
        .mock("GET", "/search")
        .match_query(Matcher::Exact("ids=42&paused=true".into()))
        .expect(0)
        .create_async()
        .await;

    let lookup = client_for(&server).lookup(42).await;

    assert_eq!(
        lookup,
        ApiLookup::Found {
            active: true,
            title: "Old Town walk".into(),
            reason: None,
        }
    );
    active.assert_async().await;
    paused.assert_async().await;
}

#[tokio::test]
async fn paused_listing_takes_title_from_second_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::Exact("ids=77".into()))
        .with_body(body(0, ""))
        .create_async()
        .await;
    let paused = server
        .mock("GET", "/search")
        .match_query(Matcher::Exact("ids=77&paused=true".into()))
        .with_body(body(
            1,
            r#"{"id": 77, "title": "Night boat tour", "status": "paused"}"#,
        ))
        .expect(1)
        .create_async()
        .await;

    let lookup = client_for(&server).lookup(77).await;

    assert_eq!(
        lookup,
        ApiLookup::Found {
            active: false,
            title: "Night boat tour".into(),
            reason: None,
        }
    );
    paused.assert_async().await;
}

#[tokio::test]
async fn non_active_first_hit_still_checks_paused_and_prefers_its_title() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::Exact("ids=9".into()))
        .with_body(body(
            1,
            r#"{"id": 9, "title": "", "status": "moderation"}"#,
        ))
        .create_async()
        .await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::Exact("ids=9&paused=true".into()))
        .with_body(body(
            1,
            r#"{"id": 9, "title": "Wine cellar visit", "status": "paused", "reason": "seasonal pause"}"#,
        ))
        .create_async()
        .await;

    let lookup = client_for(&server).lookup(9).await;

    assert_eq!(
        lookup,
        ApiLookup::Found {
            active: false,
            title: "Wine cellar visit".into(),
            reason: Some("seasonal pause".into()),
        }
    );
}

#[tokio::test]
async fn listing_missing_from_both_queries_is_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_body(body(0, ""))
        .expect(2)
        .create_async()
        .await;

    let lookup = client_for(&server).lookup(123456).await;
    assert_eq!(lookup, ApiLookup::NotFound);
}

#[tokio::test]
async fn server_failure_becomes_api_error_without_retry() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let lookup = client_for(&server).lookup(5).await;

    match lookup {
        ApiLookup::Error(detail) => assert!(detail.starts_with("API error:"), "{detail}"),
        other => panic!("expected ApiLookup::Error, got {other:?}"),
    }
    failing.assert_async().await;
}

#[tokio::test]
async fn malformed_body_becomes_api_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_body("not json at all")
        .create_async()
        .await;

    let lookup = client_for(&server).lookup(5).await;
    assert!(matches!(lookup, ApiLookup::Error(_)));
}
