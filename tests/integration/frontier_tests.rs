//! Listing traversal against a mock shop

use crate::common::{html, lines, output_section, path_in, profile};
use catalog_sweep::config::{Config, HttpConfig};
use catalog_sweep::crawler::{LinkFrontier, StaticFetcher};
use catalog_sweep::render::{HttpRenderer, PageRenderer};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

fn pagination_profile(seed: &str, dir: &TempDir) -> Config {
    profile(&format!(
        r#"
[site]
name = "mockshop"
seed-url = "{seed}"

[frontier]
mode = "pagination"
item-selector = ".product-card a"
next-selector = "a.next"
disabled-class = "disabled"
settle-ms = 0

[extraction]
strategy = "json-endpoint"
{output}
"#,
        seed = seed,
        output = output_section(dir, false, false)
    ))
}

fn listing(items: &[&str], next: &str) -> String {
    let cards: String = items
        .iter()
        .map(|href| format!(r#"<div class="product-card"><a href="{}">Kit</a></div>"#, href))
        .collect();
    format!("<html><body><main>{}</main>{}</body></html>", cards, next)
}

async fn walk(config: &Config, link_file: Option<String>) -> Vec<String> {
    let renderer = HttpRenderer::new(StaticFetcher::new(&HttpConfig::default()).unwrap());
    let mut session = renderer.open_session().await.unwrap();

    let mut frontier = LinkFrontier::new(config.frontier.clone());
    if let Some(path) = link_file {
        frontier = frontier.with_link_file(path);
    }

    let links = frontier
        .walk(session.as_mut(), &config.site.seed_url)
        .collect_all()
        .await
        .unwrap();
    session.close().await.unwrap();
    links
}

#[tokio::test]
async fn test_pagination_until_next_is_disabled() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/collections/all"))
        .respond_with(html(&listing(
            &["/products/a", "/products/b", "/products/c"],
            r#"<a class="next" href="/collections/all/page/2">Next</a>"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    // The disabled control still carries an href; following it would loop
    Mock::given(method("GET"))
        .and(path("/collections/all/page/2"))
        .respond_with(html(&listing(
            &["/products/d"],
            r#"<a class="next disabled" href="/collections/all">Next</a>"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = pagination_profile(&format!("{}/collections/all", base), &dir);

    let links = walk(&config, None).await;

    assert_eq!(
        links,
        vec![
            format!("{}/products/a", base),
            format!("{}/products/b", base),
            format!("{}/products/c", base),
            format!("{}/products/d", base),
        ]
    );
}

#[tokio::test]
async fn test_repeated_page_ends_walk() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/collections/all"))
        .respond_with(html(&listing(
            &["/products/a", "/products/b"],
            r#"<a class="next" href="/collections/all/page/2">Next</a>"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    // Points back at the first page without being disabled
    Mock::given(method("GET"))
        .and(path("/collections/all/page/2"))
        .respond_with(html(&listing(
            &["/products/b", "/products/c"],
            r#"<a class="next" href="/collections/all">Next</a>"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = pagination_profile(&format!("{}/collections/all", base), &dir);

    let links = walk(&config, None).await;

    // Each link once, in discovery order
    assert_eq!(
        links,
        vec![
            format!("{}/products/a", base),
            format!("{}/products/b", base),
            format!("{}/products/c", base),
        ]
    );
}

#[tokio::test]
async fn test_links_written_to_link_file() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/collections/all"))
        .respond_with(html(&listing(
            &["/products/a?utm_source=grid", "/products/b#reviews"],
            "",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = pagination_profile(&format!("{}/collections/all", base), &dir);
    let link_path = path_in(&dir, "links.csv");

    let links = walk(&config, Some(link_path.clone())).await;

    assert_eq!(links.len(), 2);
    assert_eq!(
        lines(&link_path),
        vec![
            "Product Link".to_string(),
            format!("{}/products/a", base),
            format!("{}/products/b", base),
        ]
    );
}

#[tokio::test]
async fn test_failing_page_keeps_links_found_so_far() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/collections/all"))
        .respond_with(html(&listing(
            &["/products/a"],
            r#"<a class="next" href="/collections/all/page/2">Next</a>"#,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/collections/all/page/2"))
        .respond_with(wiremock::ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = pagination_profile(&format!("{}/collections/all", base), &dir);
    let link_path = path_in(&dir, "links.csv");

    let links = walk(&config, Some(link_path.clone())).await;

    assert_eq!(links, vec![format!("{}/products/a", base)]);
    assert_eq!(lines(&link_path).len(), 2);
}

#[tokio::test]
async fn test_sitemap_walks_every_collection() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap"))
        .respond_with(html(
            r#"<html><body><ul class="cats">
                <li><a href="/sitemap/planes">Planes</a></li>
                <li><a href="/sitemap/boats">Boats</a></li>
                <li><a href="/sitemap/planes">Planes again</a></li>
            </ul></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    // Links outside the container are navigation, not items
    Mock::given(method("GET"))
        .and(path("/sitemap/planes"))
        .respond_with(html(
            r#"<html><body>
                <nav><a class="item" href="/shop/about">About</a></nav>
                <ul class="prods">
                    <li><a class="item" href="/shop/spitfire">Spitfire</a></li>
                    <li><a class="item" href="/shop/mustang">Mustang</a></li>
                </ul>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sitemap/boats"))
        .respond_with(html(
            r#"<html><body><ul class="prods">
                <li><a class="item" href="/shop/bismarck">Bismarck</a></li>
                <li><a class="item" href="/shop/spitfire">Spitfire</a></li>
            </ul></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = profile(&format!(
        r#"
[site]
name = "mocksitemap"
seed-url = "{base}/sitemap"

[frontier]
mode = "sitemap"
collection-selector = "ul.cats a"
container-selector = "ul.prods"
item-selector = "a.item"
next-selector = "a[rel='next']"
ready-selector = "ul.prods"
settle-ms = 0

[extraction]
strategy = "markup"

[selectors]
title = "h1"
{output}
"#,
        base = base,
        output = output_section(&dir, false, false)
    ));

    let links = walk(&config, None).await;

    assert_eq!(
        links,
        vec![
            format!("{}/shop/spitfire", base),
            format!("{}/shop/mustang", base),
            format!("{}/shop/bismarck", base),
        ]
    );
}

#[tokio::test]
async fn test_max_pages_caps_walk() {
    let server = MockServer::start().await;
    let base = server.uri();

    for (page, items, next) in [
        ("/collections/all", ["/products/a"], "/collections/all/page/2"),
        ("/collections/all/page/2", ["/products/b"], "/collections/all/page/3"),
        ("/collections/all/page/3", ["/products/c"], "/collections/all/page/4"),
    ] {
        let hits = if page.ends_with("/3") { 0 } else { 1 };
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html(&listing(
                &items,
                &format!(r#"<a class="next" href="{}">Next</a>"#, next),
            )))
            .expect(hits)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = pagination_profile(&format!("{}/collections/all", base), &dir);
    config.frontier.max_pages = Some(2);

    let links = walk(&config, None).await;

    assert_eq!(
        links,
        vec![format!("{}/products/a", base), format!("{}/products/b", base)]
    );
}

#[tokio::test]
async fn test_sitemap_clicks_next_within_collection() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap"))
        .respond_with(html(
            r#"<html><body><ul class="cats">
                <li><a href="/sitemap/planes">Planes</a></li>
            </ul></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sitemap/planes"))
        .respond_with(html(
            r#"<html><body>
                <ul class="prods">
                    <li><a class="item" href="/shop/spitfire">Spitfire</a></li>
                    <li><a class="item" href="/shop/mustang">Mustang</a></li>
                </ul>
                <a rel="next" href="/sitemap/planes/2">Next</a>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    // Last page: the control is rendered but disabled
    Mock::given(method("GET"))
        .and(path("/sitemap/planes/2"))
        .respond_with(html(
            r#"<html><body>
                <ul class="prods">
                    <li><a class="item" href="/shop/zero">Zero</a></li>
                    <li><a class="item" href="/shop/mustang">Mustang</a></li>
                </ul>
                <a rel="next" aria-disabled="true" href="/sitemap/planes">Next</a>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = profile(&format!(
        r#"
[site]
name = "mocksitemap"
seed-url = "{base}/sitemap"

[frontier]
mode = "sitemap"
collection-selector = "ul.cats a"
container-selector = "ul.prods"
item-selector = "a.item"
next-selector = "a[rel='next']"
ready-selector = "ul.prods"
settle-ms = 0

[extraction]
strategy = "markup"

[selectors]
title = "h1"
{output}
"#,
        base = base,
        output = output_section(&dir, false, false)
    ));

    let links = walk(&config, None).await;

    assert_eq!(
        links,
        vec![
            format!("{}/shop/spitfire", base),
            format!("{}/shop/mustang", base),
            format!("{}/shop/zero", base),
        ]
    );
}
