//! Tests for the page classifier's fetch behavior: shape decisions over real
//! HTTP responses, immediate abort on non-DNS failures, and DNS retry.

use std::time::Duration;

use tripwatch::{PageClassifier, PageSignal, WatchConfig};

fn test_config() -> WatchConfig {
    WatchConfig::default()
        .with_politeness(Duration::ZERO, Duration::ZERO)
        .with_dns_retry_delay(Duration::from_millis(10))
        .with_max_fetch_attempts(3)
}

#[tokio::test]
async fn fetched_paused_page_yields_reason_and_title() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/experience/40064-old-town/")
        .with_body(
            r#"<div class="page-experience">
                 <div class="page-experience__wrap" style="display:none;"></div>
                 <div class="exp-paused">
                   <h2>Old Town walk</h2>
                   <p>Tour discontinued</p>
                 </div>
               </div>"#,
        )
        .create_async()
        .await;

    let classifier = PageClassifier::new(&test_config()).expect("classifier builds");
    let signal = classifier
        .classify(&format!("{}/experience/40064-old-town/", server.url()))
        .await;

    assert_eq!(
        signal,
        PageSignal::Paused {
            title: "Old Town walk".into(),
            reason: "Tour discontinued".into(),
        }
    );
}

#[tokio::test]
async fn collection_page_confirms_active() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/moscow/")
        .with_body(r#"<div class="destination">tour list</div>"#)
        .create_async()
        .await;

    let classifier = PageClassifier::new(&test_config()).expect("classifier builds");
    let signal = classifier
        .classify(&format!("{}/moscow/", server.url()))
        .await;
    assert_eq!(signal, PageSignal::Collection);
}

#[tokio::test]
async fn http_error_aborts_without_retry() {
    let mut server = mockito::Server::new_async().await;
    let gone = server
        .mock("GET", "/experience/1-gone/")
        .with_status(410)
        .expect(1)
        .create_async()
        .await;

    let classifier = PageClassifier::new(&test_config()).expect("classifier builds");
    let signal = classifier
        .classify(&format!("{}/experience/1-gone/", server.url()))
        .await;

    match signal {
        PageSignal::FetchFailed(detail) => {
            assert!(detail.starts_with("failed to retrieve page"), "{detail}");
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
    // One attempt only: HTTP failures are not DNS failures.
    gone.assert_async().await;
}

#[tokio::test]
async fn unresolvable_host_eventually_fails() {
    let classifier = PageClassifier::new(&test_config()).expect("classifier builds");
    let signal = classifier
        .classify("http://tripwatch-no-such-host.invalid/experience/1-x/")
        .await;
    assert!(matches!(signal, PageSignal::FetchFailed(_)));
}

#[tokio::test]
async fn inverted_politeness_bounds_do_not_break_fetching() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/moscow/")
        .with_body(r#"<div class="destination">tour list</div>"#)
        .create_async()
        .await;

    // The fields are public, so a config can arrive with min > max.
    let mut config = test_config();
    config.politeness_min = Duration::from_millis(5);
    config.politeness_max = Duration::from_millis(1);

    let classifier = PageClassifier::new(&config).expect("classifier builds");
    let signal = classifier
        .classify(&format!("{}/moscow/", server.url()))
        .await;
    assert_eq!(signal, PageSignal::Collection);
}

#[tokio::test]
async fn unknown_shape_flagged_for_review() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/weird/")
        .with_body("<html><body><div class='totally-new-layout'></div></body></html>")
        .create_async()
        .await;

    let classifier = PageClassifier::new(&test_config()).expect("classifier builds");
    let signal = classifier
        .classify(&format!("{}/weird/", server.url()))
        .await;
    assert_eq!(signal, PageSignal::Unknown);
}
