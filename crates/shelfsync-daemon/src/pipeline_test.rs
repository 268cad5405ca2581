use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use rust_decimal::Decimal;
use serde_json::json;
use shelfsync_scraper::{ExtractionStrategy, RetryPolicy, SourceClient, UnavailableRenderer};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::publish::{PublishError, PublishFuture};

/// Counts publish calls; optionally fails every call.
struct CountingHook {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl PublishHook for CountingHook {
    fn name(&self) -> &str {
        "counting"
    }

    fn publish(&self) -> PublishFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(PublishError::Failed {
                    status: "exit status: 1".to_owned(),
                    stderr: "remote rejected".to_owned(),
                })
            } else {
                Ok(())
            }
        })
    }
}

fn options() -> NormalizeOptions {
    NormalizeOptions {
        markup: Decimal::new(500, 2),
        default_currency: "USD".to_owned(),
        title_blacklist: vec!["payment methods".to_owned()],
        base_url: None,
    }
}

fn pipeline(
    server: &MockServer,
    store_path: &Path,
    policy: EmptyCatalogPolicy,
) -> SyncPipeline<UnavailableRenderer> {
    let client = SourceClient::new(5, vec!["shelfsync-test/0.1".to_owned()], "en-US")
        .expect("failed to build test SourceClient");
    let fetcher = CatalogFetcher::new(
        client,
        UnavailableRenderer,
        format!("{}/menu", server.uri()),
        vec![ExtractionStrategy::JsonLd],
        RetryPolicy {
            max_attempts: 1,
            backoff: Duration::ZERO,
        },
    );
    SyncPipeline::new(fetcher, options(), CatalogStore::new(store_path), policy)
}

fn counting_hook(fail: bool) -> (Box<dyn PublishHook>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Box::new(CountingHook {
            calls: Arc::clone(&calls),
            fail,
        }),
        calls,
    )
}

fn menu_page(items: &serde_json::Value) -> String {
    let block = json!({
        "@type": "Menu",
        "hasMenuSection": [{"@type": "MenuSection", "hasMenuItem": items}]
    });
    format!(r#"<script type="application/ld+json">{block}</script>"#)
}

async fn serve_page(server: &MockServer, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path("/menu"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn prior_catalog() -> Vec<ProductRecord> {
    vec![ProductRecord {
        title: "Previous phone".to_owned(),
        description: String::new(),
        base_price: Decimal::new(10_000, 2),
        resale_price: Decimal::new(10_500, 2),
        currency: "USD".to_owned(),
        image_reference: None,
        source_image_url: None,
        captured_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
    }]
}

// -----------------------------------------------------------------------
// Successful cycles
// -----------------------------------------------------------------------

#[tokio::test]
async fn jsonld_menu_with_blacklisted_entry_stores_the_two_valid_records() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        200,
        menu_page(&json!([
            {"@type": "MenuItem", "name": "Moto G24", "offers": {"price": "110.00", "priceCurrency": "USD"}},
            {"@type": "MenuItem", "name": "Redmi 13", "offers": {"price": "120"}},
            {"@type": "MenuItem", "name": "Payment Methods"}
        ])),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("products.csv");
    let (hook, calls) = counting_hook(false);

    let outcome = pipeline(&server, &store_path, EmptyCatalogPolicy::Preserve)
        .with_publish_hook(hook)
        .run_once()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Replaced {
            records: 2,
            strategy: StrategyKind::JsonLd
        }
    );
    let stored = CatalogStore::new(&store_path).load().unwrap().unwrap();
    let titles: Vec<_> = stored.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, ["Moto G24", "Redmi 13"]);
    assert_eq!(stored[0].resale_price, Decimal::new(11_500, 2));
    assert_eq!(stored[1].resale_price, Decimal::new(12_500, 2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_image_leaves_image_file_empty() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        200,
        menu_page(&json!([{
            "@type": "MenuItem",
            "name": "Tablet",
            "image": "http://127.0.0.1:9/tablet.jpg",
            "offers": {"price": "80"}
        }])),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("products.csv");
    let images = ImageFetcher::new(2, None, dir.path().join("images")).unwrap();

    pipeline(&server, &store_path, EmptyCatalogPolicy::Preserve)
        .with_images(images, 2)
        .run_once()
        .await
        .unwrap();

    let stored = CatalogStore::new(&store_path).load().unwrap().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Tablet");
    assert_eq!(stored[0].base_price, Decimal::from(80));
    assert_eq!(stored[0].image_reference, None);
    assert_eq!(
        stored[0].source_image_url.as_deref(),
        Some("http://127.0.0.1:9/tablet.jpg")
    );
}

#[tokio::test]
async fn publish_failure_does_not_undo_the_store() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        200,
        menu_page(&json!([{"@type": "MenuItem", "name": "Cable", "offers": {"price": "3"}}])),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("products.csv");
    let (hook, calls) = counting_hook(true);

    let outcome = pipeline(&server, &store_path, EmptyCatalogPolicy::Preserve)
        .with_publish_hook(hook)
        .run_once()
        .await;

    assert!(matches!(outcome, Ok(SyncOutcome::Replaced { records: 1, .. })), "{outcome:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(CatalogStore::new(&store_path).load().unwrap().unwrap().len(), 1);
}

// -----------------------------------------------------------------------
// Failures and the empty-catalog policy
// -----------------------------------------------------------------------

#[tokio::test]
async fn total_extraction_failure_keeps_previous_catalog() {
    let server = MockServer::start().await;
    serve_page(&server, 500, String::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("products.csv");
    CatalogStore::new(&store_path).replace(&prior_catalog()).unwrap();
    let before = std::fs::read(&store_path).unwrap();
    let (hook, calls) = counting_hook(false);

    let err = pipeline(&server, &store_path, EmptyCatalogPolicy::Preserve)
        .with_publish_hook(hook)
        .run_once()
        .await
        .unwrap_err();

    assert!(
        matches!(err, SyncError::Fetch(FetchError::AllStrategiesExhausted { .. })),
        "{err:?}"
    );
    assert_eq!(std::fs::read(&store_path).unwrap(), before);
    assert_eq!(calls.load(Ordering::SeqCst), 0, "nothing to publish");
}

#[tokio::test]
async fn exhausted_extraction_writes_empty_catalog_under_overwrite_policy() {
    let server = MockServer::start().await;
    serve_page(&server, 200, "<html>no data</html>".to_owned()).await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("products.csv");
    CatalogStore::new(&store_path).replace(&prior_catalog()).unwrap();

    let outcome = pipeline(&server, &store_path, EmptyCatalogPolicy::Overwrite)
        .run_once()
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::WroteEmpty);
    assert_eq!(CatalogStore::new(&store_path).load().unwrap(), Some(vec![]));
}

#[tokio::test]
async fn fully_filtered_snapshot_is_skipped_under_preserve_policy() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        200,
        menu_page(&json!([
            {"@type": "MenuItem", "name": "Payment Methods"},
            {"@type": "MenuItem", "name": "   "}
        ])),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("products.csv");
    CatalogStore::new(&store_path).replace(&prior_catalog()).unwrap();

    let outcome = pipeline(&server, &store_path, EmptyCatalogPolicy::Preserve)
        .run_once()
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::SkippedEmpty);
    assert_eq!(
        CatalogStore::new(&store_path).load().unwrap(),
        Some(prior_catalog())
    );
}

#[tokio::test]
async fn store_failure_is_reported_and_skips_publish() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        200,
        menu_page(&json!([{"@type": "MenuItem", "name": "Cable"}])),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    // A non-empty directory where the catalog file should be.
    let store_path = dir.path().join("products.csv");
    std::fs::create_dir(&store_path).unwrap();
    std::fs::write(store_path.join("occupied"), b"x").unwrap();
    let (hook, calls) = counting_hook(false);

    let err = pipeline(&server, &store_path, EmptyCatalogPolicy::Preserve)
        .with_publish_hook(hook)
        .run_once()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Store(_)), "{err:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
