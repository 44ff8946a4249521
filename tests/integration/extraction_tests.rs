//! Static extraction and retries against mock item pages

use crate::common::{fetcher, html, json, output_section, profile};
use catalog_sweep::crawler::{DetailExtractor, ExtractOutcome, RetryPolicy};
use catalog_sweep::state::{FailureRecord, ProductRecord, Strategy};
use catalog_sweep::StockStatus;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BADGE_PAGE: &str = r#"<html><body>
    <h1>Tamiya Kit</h1>
    <div class="product-info__inventory"><span class="text-with-icon">Udsolgt</span></div>
</body></html>"#;

fn json_extractor(dir: &TempDir) -> DetailExtractor {
    let config = profile(&format!(
        r#"
[site]
name = "mockshop"
seed-url = "https://shop.example/collections/all"

[frontier]
mode = "pagination"
item-selector = ".product-card a"
next-selector = "a.next"

[extraction]
strategy = "json-endpoint"
price-suffix = " kr"

[selectors]
badges = [".product-info__inventory .text-with-icon", ".badge--sold-out"]
{}
"#,
        output_section(dir, false, true)
    ));
    DetailExtractor::new(fetcher(), Arc::new(config))
}

fn markup_extractor(dir: &TempDir) -> DetailExtractor {
    let config = profile(&format!(
        r#"
[site]
name = "mockmarkup"
seed-url = "https://shop.example/sitemap"

[frontier]
mode = "sitemap"
container-selector = "ul.prods"
item-selector = "a.item"
next-selector = "a[rel='next']"

[extraction]
strategy = "markup"
price-suffix = " kr"

[selectors]
title = "h1.title"
brand = "a.brand"
brand-attribute = "title"
brand-split = ": "
price = "meta[itemprop='price']"
price-attribute = "content"
sku = "span.sku"
stock = "p.stock"
variant-control = "div.variant-button"

[stock]
default = "unknown"

[[stock.rules]]
contains = "Ikke på lager"
status = "out-of-stock"

[[stock.rules]]
contains = "På lager"
status = "in-stock"
{}
"#,
        output_section(dir, true, false)
    ));
    DetailExtractor::new(fetcher(), Arc::new(config))
}

fn records(outcome: ExtractOutcome) -> Vec<ProductRecord> {
    match outcome {
        ExtractOutcome::Records(records) => records,
        other => panic!("expected records, got {:?}", other),
    }
}

#[tokio::test]
async fn test_badge_decides_stock_without_quantity() {
    let server = MockServer::start().await;
    let url = format!("{}/products/kit", server.uri());

    Mock::given(method("GET"))
        .and(path("/products/kit.json"))
        .respond_with(json(
            r#"{"product":{"title":"Tamiya Kit","vendor":"Tamiya","variants":[
                {"title":"Default Title","sku":"T-100","price":"129.00","inventory_quantity":0}
            ]}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products/kit"))
        .respond_with(html(BADGE_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let records = records(json_extractor(&dir).extract(&url).await);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title.as_deref(), Some("Tamiya Kit"));
    assert_eq!(records[0].brand.as_deref(), Some("Tamiya"));
    assert_eq!(records[0].price.as_deref(), Some("129.00 kr"));
    assert_eq!(records[0].stock, StockStatus::OutOfStock);
    assert_eq!(records[0].quantity, Some(0));
    assert_eq!(records[0].source_url, url);
}

#[tokio::test]
async fn test_availability_flag_wins_over_badge() {
    let server = MockServer::start().await;
    let url = format!("{}/products/kit", server.uri());

    Mock::given(method("GET"))
        .and(path("/products/kit.json"))
        .respond_with(json(
            r#"{"product":{"title":"Tamiya Kit","vendor":"Tamiya","variants":[
                {"title":"Red","sku":"T-1","price":"99.5","available":true,"inventory_quantity":0},
                {"title":"Blue","sku":"T-2","price":129,"available":false,"inventory_quantity":-3}
            ]}}"#,
        ))
        .mount(&server)
        .await;

    // Every variant carries a flag, so the badge page is never needed
    Mock::given(method("GET"))
        .and(path("/products/kit"))
        .respond_with(html(BADGE_PAGE))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let records = records(json_extractor(&dir).extract(&url).await);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].variant_label.as_deref(), Some("Red"));
    assert_eq!(records[0].price.as_deref(), Some("99.50 kr"));
    assert_eq!(records[0].stock, StockStatus::InStock);
    assert_eq!(records[1].price.as_deref(), Some("129.00 kr"));
    assert_eq!(records[1].stock, StockStatus::OutOfStock);
    assert_eq!(records[1].quantity, Some(0));
}

#[tokio::test]
async fn test_extraction_is_repeatable() {
    let server = MockServer::start().await;
    let url = format!("{}/products/kit", server.uri());

    Mock::given(method("GET"))
        .and(path("/products/kit.json"))
        .respond_with(json(
            r#"{"product":{"title":"Kit","vendor":"Revell","variants":[
                {"title":"A","sku":"R-1","price":"10.00","inventory_quantity":4},
                {"title":"B","sku":"R-2","price":"12.00","inventory_quantity":2}
            ]}}"#,
        ))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = json_extractor(&dir);

    let first = records(extractor.extract(&url).await);
    let second = records(extractor.extract(&url).await);

    assert_eq!(first, second);
    assert!(first.iter().all(|r| r.stock == StockStatus::InStock));
}

#[tokio::test]
async fn test_markup_record() {
    let server = MockServer::start().await;
    let url = format!("{}/shop/spitfire", server.uri());

    Mock::given(method("GET"))
        .and(path("/shop/spitfire"))
        .respond_with(html(
            r#"<html><head><meta itemprop="price" content="249.95"></head><body>
                <h1 class="title">Spitfire Mk.I</h1>
                <p><a class="brand" title="Mærke: Airfix">Airfix</a></p>
                <span class="sku">A-0521</span>
                <p class="stock">Ikke på lager</p>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let records = records(markup_extractor(&dir).extract(&url).await);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title.as_deref(), Some("Spitfire Mk.I"));
    assert_eq!(records[0].brand.as_deref(), Some("Airfix"));
    assert_eq!(records[0].sku.as_deref(), Some("A-0521"));
    assert_eq!(records[0].price.as_deref(), Some("249.95 kr"));
    assert_eq!(records[0].stock, StockStatus::OutOfStock);
    assert_eq!(records[0].variant_label, None);
}

#[tokio::test]
async fn test_variant_marker_defers() {
    let server = MockServer::start().await;
    let url = format!("{}/shop/paint-set", server.uri());

    Mock::given(method("GET"))
        .and(path("/shop/paint-set"))
        .respond_with(html(
            r#"<html><body>
                <h1 class="title">Paint set</h1>
                <div class="variant-button data"><label>10 ml</label></div>
                <div class="variant-button data"><label>20 ml</label></div>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let outcome = markup_extractor(&dir).extract(&url).await;

    assert!(matches!(outcome, ExtractOutcome::Deferred(ref deferred) if *deferred == url));
}

#[tokio::test]
async fn test_transient_failure_uses_exact_budget() {
    let server = MockServer::start().await;
    let url = format!("{}/products/kit", server.uri());

    Mock::given(method("GET"))
        .and(path("/products/kit.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let policy = RetryPolicy::new(2, Duration::ZERO);
    let outcome = json_extractor(&dir).extract_with(&url, &policy).await;

    match outcome {
        ExtractOutcome::Failed {
            url: failed_url,
            error,
            placeholder,
        } => {
            assert_eq!(failed_url, url);
            assert_eq!(error.reason(), "transient_network");
            assert!(placeholder.is_placeholder());
            assert_eq!(placeholder.source_url, url);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_retryable_failure_stops_after_one_attempt() {
    let server = MockServer::start().await;
    let url = format!("{}/products/gone", server.uri());

    Mock::given(method("GET"))
        .and(path("/products/gone.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let policy = RetryPolicy::new(3, Duration::ZERO);
    let outcome = json_extractor(&dir).extract_with(&url, &policy).await;

    assert!(matches!(
        outcome,
        ExtractOutcome::Failed { ref error, .. } if error.reason() == "http_status"
    ));
}

#[tokio::test]
async fn test_success_on_second_attempt_is_not_quarantined() {
    let server = MockServer::start().await;
    let url = format!("{}/products/kit", server.uri());

    Mock::given(method("GET"))
        .and(path("/products/kit.json"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products/kit.json"))
        .respond_with(json(
            r#"{"product":{"title":"Kit","vendor":"Revell","variants":[
                {"title":"A","sku":"R-1","price":"10.00","available":true}
            ]}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = json_extractor(&dir);
    let policy = RetryPolicy::new(2, Duration::ZERO);
    let mut failures: Vec<FailureRecord> = Vec::new();

    let outcome = policy
        .run_or_quarantine(&url, Strategy::Static, &mut failures, |_| {
            extractor.try_extract(&url)
        })
        .await
        .unwrap();

    assert!(failures.is_empty());
    let records = records(outcome.expect("second attempt should succeed"));
    assert_eq!(records[0].sku.as_deref(), Some("R-1"));
}
