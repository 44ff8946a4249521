//! Full runs through the orchestrator

use crate::common::{fetcher, html, json, lines, output_section, path_in, profile};
use catalog_sweep::config::Config;
use catalog_sweep::crawler::{Orchestrator, RunMode};
use catalog_sweep::output::{Checkpoint, OutputStreams, RunStats};
use catalog_sweep::render::{HttpRenderer, NoopRenderer};
use catalog_sweep::state::ProductRecord;
use catalog_sweep::StockStatus;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HASH: &str = "profile-hash";

fn shop_profile(base: &str, dir: &TempDir) -> Config {
    profile(&format!(
        r#"
[site]
name = "mockshop"
seed-url = "{base}/collections/all"

[frontier]
mode = "pagination"
item-selector = ".product-card a"
next-selector = "a.next"
settle-ms = 0

[extraction]
strategy = "json-endpoint"
price-suffix = " kr"

[retry]
max-attempts = 2
backoff-secs = 0

[batch]
size = 2
workers = 2
{output}
"#,
        base = base,
        output = output_section(dir, true, false)
    ))
}

fn write_links(config: &Config, urls: &[String]) {
    let mut content = String::from("Product Link\n");
    for url in urls {
        content.push_str(url);
        content.push('\n');
    }
    std::fs::write(&config.output.links_path, content).unwrap();
}

async fn mount_product(server: &MockServer, slug: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/products/{}.json", slug)))
        .respond_with(json(&format!(
            r#"{{"product":{{"title":"Kit {slug}","vendor":"Tamiya","variants":[
                {{"title":"Default","sku":"SKU-{slug}","price":"50.00","available":true}}
            ]}}}}"#,
            slug = slug
        )))
        .expect(expected)
        .mount(server)
        .await;
}

fn orchestrator(config: Config) -> Orchestrator {
    Orchestrator::new(config, HASH, Arc::new(NoopRenderer)).unwrap()
}

#[tokio::test]
async fn test_details_only_routes_every_outcome() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_product(&server, "a", 1).await;

    Mock::given(method("GET"))
        .and(path("/products/b.json"))
        .respond_with(json(
            r#"{"product":{"title":"Kit b","vendor":"Revell","variants":[
                {"title":"Red","sku":"B-1","price":"10.00","available":true},
                {"title":"Blue","sku":"B-2","price":"11.00","available":false}
            ]}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products/c.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = shop_profile(&base, &dir);
    let urls: Vec<String> = ["a", "b", "c", "a"]
        .iter()
        .map(|slug| format!("{}/products/{}", base, slug))
        .collect();
    write_links(&config, &urls);

    let details_path = config.output.details_path.clone();
    let failures_path = config.output.failures_path.clone();
    let deferred_path = config.output.deferred_path.clone();
    let checkpoint_path = config.checkpoint_path();

    let stats = orchestrator(config).run(RunMode::DetailsOnly).await.unwrap();

    assert_eq!(stats.urls_processed, 3);
    assert_eq!(stats.records_written, 3);
    assert_eq!(stats.placeholders_written, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.batches_flushed, 2);

    let details = lines(&details_path);
    assert_eq!(details[0], "Title,Brand,Variants,SKU,Price,Stock Status,URL");
    assert_eq!(details.len(), 5);
    assert!(details.contains(&format!(
        "Kit b,Revell,Blue,B-2,11.00 kr,Out of Stock,{}/products/b",
        base
    )));
    assert!(details.contains(&format!("N/A,N/A,N/A,N/A,N/A,N/A,{}/products/c", base)));

    let failures = lines(&failures_path);
    assert_eq!(failures.len(), 2);
    assert!(failures[1].starts_with(&format!("{}/products/c,http_status,", base)));

    assert_eq!(lines(&deferred_path), vec!["URL"]);

    let checkpoint = Checkpoint::load(Path::new(&checkpoint_path))
        .unwrap()
        .expect("checkpoint should exist");
    assert!(checkpoint.completed);
    assert_eq!(checkpoint.batches_flushed, 2);
}

#[tokio::test]
async fn test_resume_skips_flushed_batches_without_duplicates() {
    let server = MockServer::start().await;
    let base = server.uri();

    // The first batch was flushed before the interruption
    mount_product(&server, "p1", 0).await;
    mount_product(&server, "p2", 0).await;
    for slug in ["p3", "p4", "p5"] {
        mount_product(&server, slug, 1).await;
    }

    let dir = TempDir::new().unwrap();
    let config = shop_profile(&base, &dir);
    let urls: Vec<String> = (1..=5)
        .map(|i| format!("{}/products/p{}", base, i))
        .collect();
    write_links(&config, &urls);

    // Simulate the interrupted run: one flushed batch, then a row written
    // after the last flush point
    {
        let mut streams = OutputStreams::open(&config.output, None).unwrap();
        for url in &urls[..2] {
            streams
                .write_record(&ProductRecord {
                    title: Some("Kit".to_string()),
                    stock: StockStatus::InStock,
                    ..ProductRecord::placeholder(url.as_str())
                })
                .unwrap();
        }
        let sizes = streams.flush().unwrap();

        streams
            .write_record(&ProductRecord {
                title: Some("Stray".to_string()),
                ..ProductRecord::placeholder(urls[2].as_str())
            })
            .unwrap();
        streams.flush().unwrap();

        let mut checkpoint = Checkpoint::new(HASH, config.batch.size, &urls);
        checkpoint.batches_flushed = 1;
        checkpoint.sizes = sizes;
        checkpoint.save(Path::new(&config.checkpoint_path())).unwrap();
    }

    let details_path = config.output.details_path.clone();
    let stats = orchestrator(config)
        .with_resume(true)
        .run(RunMode::DetailsOnly)
        .await
        .unwrap();

    assert_eq!(stats.urls_processed, 3);
    assert_eq!(stats.batches_flushed, 2);

    let details = lines(&details_path);
    assert_eq!(details.len(), 6);
    assert!(!details.iter().any(|line| line.starts_with("Stray")));

    for url in &urls {
        let rows = details.iter().filter(|line| line.ends_with(url.as_str())).count();
        assert_eq!(rows, 1, "expected exactly one row for {}", url);
    }
}

#[tokio::test]
async fn test_incompatible_checkpoint_starts_fresh() {
    let server = MockServer::start().await;
    let base = server.uri();

    for slug in ["p1", "p2"] {
        mount_product(&server, slug, 1).await;
    }

    let dir = TempDir::new().unwrap();
    let config = shop_profile(&base, &dir);
    let urls: Vec<String> = (1..=2)
        .map(|i| format!("{}/products/p{}", base, i))
        .collect();
    write_links(&config, &urls);

    let mut stale = Checkpoint::new("another-profile", config.batch.size, &urls);
    stale.batches_flushed = 1;
    stale.save(Path::new(&config.checkpoint_path())).unwrap();

    let details_path = config.output.details_path.clone();
    orchestrator(config)
        .with_resume(true)
        .run(RunMode::DetailsOnly)
        .await
        .unwrap();

    assert_eq!(lines(&details_path).len(), 3);
}

#[tokio::test]
async fn test_regenerated_link_file_of_same_length_starts_fresh() {
    let server = MockServer::start().await;
    let base = server.uri();

    for slug in ["q1", "q2", "p3", "p4", "p5"] {
        mount_product(&server, slug, 1).await;
    }

    let dir = TempDir::new().unwrap();
    let config = shop_profile(&base, &dir);
    let url = |slug: &str| format!("{}/products/{}", base, slug);

    // Batch 1 of the old list was flushed
    let old: Vec<String> = ["p1", "p2", "p3", "p4", "p5"].iter().map(|s| url(s)).collect();
    {
        let mut streams = OutputStreams::open(&config.output, None).unwrap();
        for u in &old[..2] {
            streams.write_record(&ProductRecord::placeholder(u.as_str())).unwrap();
        }
        let mut checkpoint = Checkpoint::new(HASH, config.batch.size, &old);
        checkpoint.batches_flushed = 1;
        checkpoint.sizes = streams.flush().unwrap();
        checkpoint.save(Path::new(&config.checkpoint_path())).unwrap();
    }

    let new: Vec<String> = ["q1", "q2", "p3", "p4", "p5"].iter().map(|s| url(s)).collect();
    write_links(&config, &new);

    let details_path = config.output.details_path.clone();
    let stats = orchestrator(config)
        .with_resume(true)
        .run(RunMode::DetailsOnly)
        .await
        .unwrap();

    assert_eq!(stats.urls_processed, 5);
    let details = lines(&details_path);
    assert_eq!(details.len(), 6);
    for u in &new {
        let rows = details.iter().filter(|line| line.ends_with(u.as_str())).count();
        assert_eq!(rows, 1, "expected exactly one row for {}", u);
    }
    assert!(!details.iter().any(|line| line.ends_with(&old[0])));
}

#[tokio::test]
async fn test_completed_run_is_not_repeated() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_product(&server, "a", 1).await;

    let dir = TempDir::new().unwrap();
    let config = shop_profile(&base, &dir);
    write_links(&config, &[format!("{}/products/a", base)]);
    let details_path = config.output.details_path.clone();

    orchestrator(config.clone())
        .run(RunMode::DetailsOnly)
        .await
        .unwrap();

    let again = orchestrator(config)
        .with_resume(true)
        .run(RunMode::DetailsOnly)
        .await
        .unwrap();

    assert_eq!(again, RunStats::default());
    assert_eq!(lines(&details_path).len(), 2);
}

#[tokio::test]
async fn test_links_then_details() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/collections/all"))
        .respond_with(html(
            r#"<html><body>
                <div class="product-card"><a href="/products/a">A</a></div>
                <div class="product-card"><a href="/products/b">B</a></div>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_product(&server, "a", 1).await;
    mount_product(&server, "b", 1).await;

    let dir = TempDir::new().unwrap();
    let config = shop_profile(&base, &dir);
    let links_path = path_in(&dir, "links.csv");
    let details_path = config.output.details_path.clone();

    let renderer = Arc::new(HttpRenderer::new(fetcher()));
    let stats = Orchestrator::new(config, HASH, renderer)
        .unwrap()
        .run(RunMode::LinksThenDetails)
        .await
        .unwrap();

    assert_eq!(stats.links_discovered, 2);
    assert_eq!(stats.records_written, 2);
    assert_eq!(lines(&links_path).len(), 3);

    let details = lines(&details_path);
    assert_eq!(details.len(), 3);
    assert!(details.contains(&format!(
        "Kit a,Tamiya,Default,SKU-a,50.00 kr,In Stock,{}/products/a",
        base
    )));
}
