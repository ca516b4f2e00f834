// tests/pipeline_e2e.rs
//
// Trigger pipeline end to end: scripted collaborators for the failure paths,
// local mock servers for the full HTTP path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeUploader, ScriptedTransport, HERO_HTML};
use terminal_image_sync::config::CloudflareConfig;
use terminal_image_sync::fetch::{ReqwestTransport, TransportError};
use terminal_image_sync::store::InMemoryStore;
use terminal_image_sync::trigger::{DocumentPattern, IMAGE_URL_FIELD};
use terminal_image_sync::{
    CloudflareImages, Dispatch, ImageLocator, ImageUploader, PipelineFailure, ResilientFetcher,
    RetryPolicy, TerminalImagePipeline,
};

const DOC: &str = "Terminals/North Pier";

fn pipeline(
    transport: Arc<ScriptedTransport>,
    uploader: Arc<dyn ImageUploader>,
    store: &InMemoryStore,
) -> TerminalImagePipeline {
    TerminalImagePipeline::new(
        ImageLocator::new(common::fetcher(transport)),
        uploader,
        Arc::new(store.clone()),
        DocumentPattern::parse("Terminals/{TerminalName}").unwrap(),
    )
}

fn north_pier() -> terminal_image_sync::DocumentCreated {
    common::terminal_event(
        DOC,
        &[("name", "North Pier"), ("link", "https://port.test/north")],
    )
}

#[tokio::test(start_paused = true)]
async fn failing_fetch_leaves_document_untouched() {
    let transport = ScriptedTransport::always_timeout();
    let uploader = FakeUploader::ok("https://imagedelivery.net/xyz");
    let store = InMemoryStore::new();
    let p = pipeline(transport.clone(), uploader.clone(), &store);

    let out = p.dispatch(&north_pier()).await;

    assert!(matches!(out, Dispatch::Skipped(PipelineFailure::FetchFailed)), "{out:?}");
    assert_eq!(store.field(DOC, IMAGE_URL_FIELD), None);
    assert_eq!(store.write_count(), 0);
    assert_eq!(transport.calls().len(), 3);
    assert!(uploader.calls().is_empty(), "no upload after fetch failure");
}

#[tokio::test(start_paused = true)]
async fn missing_link_makes_no_calls() {
    let transport = ScriptedTransport::page(HERO_HTML);
    let uploader = FakeUploader::ok("https://imagedelivery.net/xyz");
    let store = InMemoryStore::new();
    let p = pipeline(transport.clone(), uploader.clone(), &store);

    let ev = common::terminal_event(DOC, &[("name", "North Pier")]);
    let err = p.handle(&ev).await.unwrap_err();

    assert_eq!(err.stage(), "field_missing");
    assert!(transport.calls().is_empty());
    assert!(uploader.calls().is_empty());
    assert_eq!(store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unexpected_markup_is_a_parse_failure() {
    let transport = ScriptedTransport::page("<html><body><img src='x.png'></body></html>");
    let uploader = FakeUploader::ok("https://imagedelivery.net/xyz");
    let store = InMemoryStore::new();
    let p = pipeline(transport, uploader.clone(), &store);

    let err = p.handle(&north_pier()).await.unwrap_err();

    assert!(matches!(err, PipelineFailure::ParseFailed(_)), "{err:?}");
    assert!(uploader.calls().is_empty());
    assert_eq!(store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_upload_leaves_document_untouched() {
    let transport = ScriptedTransport::page(HERO_HTML);
    let uploader = FakeUploader::rejecting(401);
    let store = InMemoryStore::new();
    let p = pipeline(transport, uploader.clone(), &store);

    let err = p.handle(&north_pier()).await.unwrap_err();

    assert_eq!(err.stage(), "upload_failed");
    assert_eq!(uploader.calls(), vec!["http://img.test/a.png".to_string()]);
    assert_eq!(store.field(DOC, IMAGE_URL_FIELD), None);
}

#[tokio::test(start_paused = true)]
async fn success_after_retries_writes_hosted_url() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::Timeout),
        Ok(terminal_image_sync::fetch::FetchedPage {
            status: 200,
            body: HERO_HTML.to_string(),
        }),
    ]);
    let uploader = FakeUploader::ok("https://imagedelivery.net/xyz");
    let store = InMemoryStore::new();
    let p = pipeline(transport.clone(), uploader.clone(), &store);

    let out = p.dispatch(&north_pier()).await;

    match out {
        Dispatch::Updated { hosted_url } => {
            assert_eq!(hosted_url, "https://imagedelivery.net/xyz/img-1/")
        }
        other => panic!("expected Updated, got {other:?}"),
    }
    assert_eq!(
        store.field(DOC, IMAGE_URL_FIELD).as_deref(),
        Some("https://imagedelivery.net/xyz/img-1/")
    );
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].1, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn documents_outside_pattern_are_ignored() {
    let transport = ScriptedTransport::page(HERO_HTML);
    let uploader = FakeUploader::ok("https://imagedelivery.net/xyz");
    let store = InMemoryStore::new();
    let p = pipeline(transport.clone(), uploader, &store);

    let ev = common::terminal_event(
        "Ports/North",
        &[("name", "North"), ("link", "https://port.test/north")],
    );
    assert!(matches!(p.dispatch(&ev).await, Dispatch::Ignored));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn full_http_path_with_mock_servers() {
    let pages = common::start_pages(&[
        (
            "/terminals/north",
            r#"<figure class="hero banner"><picture class="fixed-aspect"><img src="/media/north.jpg"></picture></figure>"#,
        ),
    ])
    .await;
    let (host, seen) = common::start_image_host(200, r#"{"result":{"id":"cf-77"}}"#).await;

    let fetcher = ResilientFetcher::new(
        Arc::new(ReqwestTransport::new().unwrap()),
        RetryPolicy {
            time_unit_ms: 10,
            ..RetryPolicy::default()
        },
    );
    let uploader = CloudflareImages::new(
        CloudflareConfig::new("tok", "acc", "https://imagedelivery.net/hash").with_api_base(&host),
    );
    let store = InMemoryStore::new();
    let p = TerminalImagePipeline::new(
        ImageLocator::new(fetcher),
        Arc::new(uploader),
        Arc::new(store.clone()),
        DocumentPattern::parse("Terminals/{TerminalName}").unwrap(),
    );

    let link = format!("{pages}/terminals/north");
    let ev = common::terminal_event(DOC, &[("name", "North Pier"), ("link", link.as_str())]);
    let hosted = p.handle(&ev).await.expect("pipeline ok");

    assert_eq!(hosted, "https://imagedelivery.net/hash/cf-77/");
    assert_eq!(store.field(DOC, IMAGE_URL_FIELD).as_deref(), Some(hosted.as_str()));

    // relative src was resolved against the page before upload
    let seen = seen.lock().unwrap().clone();
    assert!(seen[0].body.contains(&format!("{pages}/media/north.jpg")));
}
