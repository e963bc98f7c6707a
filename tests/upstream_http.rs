mod support;

use std::time::Duration;

use rangecache::{
    cache::{FetchError, RangeFetcher, RangeKey, RangeProbe},
    infra::upstream::HttpRangeFetcher,
};

use support::{RESOURCE_LEN, Upstream, resource_body};

fn fetcher() -> HttpRangeFetcher {
    HttpRangeFetcher::new(Duration::from_secs(5)).expect("client should build")
}

fn key(start: u64, end: u64) -> RangeKey {
    RangeKey::new(start, end).expect("valid range")
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_content_is_returned_verbatim() {
    let upstream = Upstream::new(Duration::ZERO);
    let base = upstream.spawn().await;
    let resource = base.join("video.mp4").expect("resource url");

    let payload = fetcher()
        .fetch(&resource, key(100, 355))
        .await
        .expect("range fetch should succeed");

    assert_eq!(payload, resource_body().slice(100..=355));
    assert_eq!(upstream.range_gets(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_response_is_sliced_to_the_range() {
    let upstream = Upstream::new(Duration::ZERO);
    let base = upstream.spawn().await;
    let resource = base.join("plain.mp4").expect("resource url");

    let payload = fetcher()
        .fetch(&resource, key(9_000, 9_999))
        .await
        .expect("full body should be sliced");

    assert_eq!(payload.len(), 1_000);
    assert_eq!(payload, resource_body().slice(9_000..));
}

#[tokio::test(flavor = "multi_thread")]
async fn range_past_the_end_of_a_full_body_fails_on_length() {
    let upstream = Upstream::new(Duration::ZERO);
    let base = upstream.spawn().await;
    let resource = base.join("plain.mp4").expect("resource url");

    let err = fetcher()
        .fetch(&resource, key(9_990, 10_009))
        .await
        .expect_err("body is too short");

    assert_eq!(
        err,
        FetchError::Length {
            expected: 20,
            actual: 10
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_is_reported() {
    let upstream = Upstream::new(Duration::ZERO);
    let base = upstream.spawn().await;
    let resource = base.join("broken.mp4").expect("resource url");

    let err = fetcher()
        .fetch(&resource, key(0, 9))
        .await
        .expect_err("upstream fails");
    assert_eq!(err, FetchError::status(500));

    let err = fetcher()
        .probe(&resource)
        .await
        .expect_err("probe fails");
    assert_eq!(err, FetchError::status(500));
}

#[tokio::test(flavor = "multi_thread")]
async fn probe_reports_range_support_and_length() {
    let upstream = Upstream::new(Duration::ZERO);
    let base = upstream.spawn().await;

    let ranged = fetcher()
        .probe(&base.join("video.mp4").expect("resource url"))
        .await
        .expect("probe should succeed");
    assert!(ranged.supports_ranges);
    assert_eq!(ranged.total_length, RESOURCE_LEN as u64);

    let plain = fetcher()
        .probe(&base.join("plain.mp4").expect("resource url"))
        .await
        .expect("probe should succeed");
    assert!(!plain.supports_ranges);
    assert_eq!(plain.total_length, RESOURCE_LEN as u64);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_upstream_is_a_transport_error() {
    let resource = url::Url::parse("http://127.0.0.1:9/video.mp4").expect("resource url");
    let fetcher = HttpRangeFetcher::new(Duration::from_millis(500)).expect("client");

    let err = fetcher
        .fetch(&resource, key(0, 9))
        .await
        .expect_err("nothing listens on the discard port");
    assert!(matches!(err, FetchError::Transport { .. }));
}
