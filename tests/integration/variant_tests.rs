//! Deferred variant replay through a renderer session

use crate::common::{fetcher, html, lines, output_section, profile};
use catalog_sweep::config::Config;
use catalog_sweep::crawler::{Orchestrator, RunMode, VariantResolver};
use catalog_sweep::render::{HttpRenderer, PageRenderer};
use catalog_sweep::StockStatus;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn variant_profile(base: &str, dir: &TempDir) -> Config {
    profile(&format!(
        r##"
[site]
name = "mockvariants"
seed-url = "{base}/sitemap"

[frontier]
mode = "sitemap"
container-selector = "ul.prods"
item-selector = "a.item"
next-selector = "a[rel='next']"
settle-ms = 0

[extraction]
strategy = "markup"
price-suffix = " kr"

[selectors]
title = "h1.title"
price = "span.price"
sku = "span.sku"
stock = "span.stock"
variant-control = "a.variant"

[variants]
ready-selector = "#zoomHook"
price-selector = "span.selected-price"
sku-selector = "span.selected-sku"
stock-selector = "span.selected-stock"
settle-ms = 0
navigation-attempts = 2
navigation-backoff-ms = 0
batch-size = 1

[retry]
max-attempts = 1
backoff-secs = 0

[stock]
default = "in-stock"

[[stock.rules]]
contains = "Udsolgt"
status = "out-of-stock"
{output}
"##,
        base = base,
        output = output_section(dir, true, false)
    ))
}

/// Item page; `selected` fills the selected-variant region
fn item_page(selected: Option<(&str, &str, &str)>) -> String {
    let region = match selected {
        Some((price, sku, stock)) => format!(
            r#"<span class="selected-price">{}</span>
               <span class="selected-sku">{}</span>
               <span class="selected-stock">{}</span>"#,
            price, sku, stock
        ),
        None => String::new(),
    };
    format!(
        r#"<html><body>
            <div id="zoomHook"></div>
            <h1 class="title">Paint set</h1>
            <span class="price">49.00</span>
            <span class="sku">PS-0</span>
            <span class="stock">På lager</span>
            <a class="variant" href="/shop/paint/red">Red</a>
            <a class="variant" href="/shop/paint/blue">Blue</a>
            {}
        </body></html>"#,
        region
    )
}

async fn mount_paint_set(server: &MockServer, base_hits: u64) {
    Mock::given(method("GET"))
        .and(path("/shop/paint"))
        .respond_with(html(&item_page(None)))
        .expect(base_hits)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shop/paint/red"))
        .respond_with(html(&item_page(Some(("45.00", "PS-R", "På lager")))))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shop/paint/blue"))
        .respond_with(html(&item_page(Some(("52.00", "PS-B", "Udsolgt")))))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resolver_reads_every_variant() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_paint_set(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let config = variant_profile(&base, &dir);
    let resolver = VariantResolver::new(Arc::new(config));

    let renderer = HttpRenderer::new(fetcher());
    let mut session = renderer.open_session().await.unwrap();
    let url = format!("{}/shop/paint", base);

    let records = resolver.resolve(session.as_mut(), &url).await.unwrap();
    session.close().await.unwrap();

    assert_eq!(records.len(), 2);

    assert_eq!(records[0].variant_label.as_deref(), Some("Red"));
    assert_eq!(records[0].price.as_deref(), Some("45.00 kr"));
    assert_eq!(records[0].sku.as_deref(), Some("PS-R"));
    assert_eq!(records[0].stock, StockStatus::InStock);

    assert_eq!(records[1].variant_label.as_deref(), Some("Blue"));
    assert_eq!(records[1].price.as_deref(), Some("52.00 kr"));
    assert_eq!(records[1].stock, StockStatus::OutOfStock);

    // Baseline fields carry over to every variant
    assert!(records.iter().all(|r| r.title.as_deref() == Some("Paint set")));
    assert!(records.iter().all(|r| r.source_url == url));
}

#[tokio::test]
async fn test_missing_ready_marker_fails_url() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/shop/broken"))
        .respond_with(html("<html><body><h1 class=\"title\">Broken</h1></body></html>"))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let resolver = VariantResolver::new(Arc::new(variant_profile(&base, &dir)));
    let renderer = HttpRenderer::new(fetcher());
    let mut session = renderer.open_session().await.unwrap();

    let error = resolver
        .resolve(session.as_mut(), &format!("{}/shop/broken", base))
        .await
        .unwrap_err();

    assert_eq!(error.reason(), "render_timeout");
}

#[tokio::test]
async fn test_deferred_urls_are_replayed() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Fetched once statically, once by the renderer
    mount_paint_set(&server, 2).await;

    // Carries the marker on the static fetch, then disappears
    Mock::given(method("GET"))
        .and(path("/shop/glue"))
        .respond_with(html(&item_page(None)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/glue"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shop/brush"))
        .respond_with(html(
            r#"<html><body>
                <h1 class="title">Brush</h1>
                <span class="price">15</span>
                <span class="sku">BR-1</span>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = variant_profile(&base, &dir);
    let links = format!(
        "Product Link\n{base}/shop/paint\n{base}/shop/glue\n{base}/shop/brush\n",
        base = base
    );
    std::fs::write(&config.output.links_path, links).unwrap();

    let details_path = config.output.details_path.clone();
    let deferred_path = config.output.deferred_path.clone();
    let failures_path = config.output.failures_path.clone();
    let checkpoint_path = config.checkpoint_path();

    let renderer = Arc::new(HttpRenderer::new(fetcher()));
    let stats = Orchestrator::new(config, "variant-hash", renderer)
        .unwrap()
        .run(RunMode::DetailsOnly)
        .await
        .unwrap();

    assert_eq!(stats.deferred, 2);
    assert_eq!(stats.variants_replayed, 2);
    assert_eq!(stats.failures, 1);

    assert_eq!(lines(&deferred_path).len(), 3);

    let details = lines(&details_path);
    // header, brush, red, blue, glue placeholder
    assert_eq!(details.len(), 5);
    assert!(details.contains(&format!(
        "Brush,N/A,N/A,BR-1,15.00 kr,In Stock,{}/shop/brush",
        base
    )));
    assert!(details.contains(&format!(
        "Paint set,N/A,Red,PS-R,45.00 kr,In Stock,{}/shop/paint",
        base
    )));
    assert!(details.contains(&format!(
        "Paint set,N/A,Blue,PS-B,52.00 kr,Out of Stock,{}/shop/paint",
        base
    )));
    assert!(details.contains(&format!("N/A,N/A,N/A,N/A,N/A,N/A,{}/shop/glue", base)));

    let failures = lines(&failures_path);
    assert_eq!(failures.len(), 2);
    assert!(failures[1].starts_with(&format!("{}/shop/glue,transient_network,", base)));

    let checkpoint = catalog_sweep::output::Checkpoint::load(std::path::Path::new(&checkpoint_path))
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.variants_replayed, 2);
    assert!(checkpoint.completed);
}
