//! Listing traversal
//!
//! A [`LinkFrontier`] walks a site's listing pages through a renderer
//! session and yields item links lazily. Two traversal modes exist:
//! - pagination: follow the `href` of an explicit "next page" link
//! - sitemap: read item links inside a container, then click "next"
//!
//! Either way the walk ends when no enabled "next" control is left, when a
//! page repeats, or when `max-pages` is reached. A page that cannot be
//! loaded ends the walk early; the links found so far are kept.

use crate::config::{FrontierConfig, FrontierMode};
use crate::output::LinkFile;
use crate::render::{ElementHandle, RenderError, RenderResult, RendererSession};
use crate::url::resolve_href;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Discovers item links from a seed listing
#[derive(Debug, Clone)]
pub struct LinkFrontier {
    config: FrontierConfig,
    link_path: Option<PathBuf>,
}

impl LinkFrontier {
    pub fn new(config: FrontierConfig) -> Self {
        Self {
            config,
            link_path: None,
        }
    }

    /// Also append every discovered link to the link file at `path`
    pub fn with_link_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.link_path = Some(path.into());
        self
    }

    /// Starts a fresh walk from `seed`
    ///
    /// Nothing is fetched until the walk is polled. The link file, if any,
    /// is truncated on the first poll.
    pub fn walk<'s>(&self, session: &'s mut dyn RendererSession, seed: &str) -> FrontierWalk<'s> {
        FrontierWalk {
            session,
            config: self.config.clone(),
            seed: seed.to_string(),
            link_path: self.link_path.clone(),
            link_file: None,
            cursor: Cursor::Seed,
            collections: VecDeque::new(),
            visited_pages: HashSet::new(),
            seen: HashSet::new(),
            buffer: VecDeque::new(),
            pages_fetched: 0,
        }
    }
}

/// How the walk reaches the next listing page
#[derive(Debug)]
enum NextControl {
    Href(Url),
    Click(ElementHandle),
}

/// What one listing page yielded
#[derive(Debug)]
struct ListingPage {
    items: Vec<String>,
    next: Option<NextControl>,
}

#[derive(Debug)]
enum Cursor {
    Seed,
    NextCollection,
    Load(Url),
    Click(ElementHandle),
    Finished,
}

/// An in-progress walk; poll with [`next`](FrontierWalk::next)
pub struct FrontierWalk<'s> {
    session: &'s mut dyn RendererSession,
    config: FrontierConfig,
    seed: String,
    link_path: Option<PathBuf>,
    link_file: Option<LinkFile>,
    cursor: Cursor,
    collections: VecDeque<Url>,
    visited_pages: HashSet<String>,
    seen: HashSet<String>,
    buffer: VecDeque<String>,
    pages_fetched: u32,
}

impl<'s> FrontierWalk<'s> {
    /// Next unseen item link, loading listing pages as needed
    ///
    /// Returns `Ok(None)` once the walk is exhausted. Only a failing link
    /// file is an error; page failures end the walk quietly.
    pub async fn next(&mut self) -> crate::Result<Option<String>> {
        loop {
            if let Some(link) = self.buffer.pop_front() {
                return Ok(Some(link));
            }
            if matches!(self.cursor, Cursor::Finished) {
                return Ok(None);
            }
            self.advance().await?;
        }
    }

    /// Drains the walk into a list
    pub async fn collect_all(mut self) -> crate::Result<Vec<String>> {
        let mut links = Vec::new();
        while let Some(link) = self.next().await? {
            links.push(link);
        }
        tracing::info!(
            "Walk finished: {} links from {} listing pages",
            links.len(),
            self.pages_fetched
        );
        Ok(links)
    }

    /// Listing pages processed so far
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    async fn advance(&mut self) -> crate::Result<()> {
        match std::mem::replace(&mut self.cursor, Cursor::Finished) {
            Cursor::Seed => self.start().await,
            Cursor::NextCollection => {
                if let Some(collection) = self.collections.pop_front() {
                    tracing::info!("Walking collection {}", collection);
                    self.cursor = Cursor::Load(collection);
                }
                Ok(())
            }
            Cursor::Load(url) => {
                if let Err(e) = self.session.navigate(url.as_str()).await {
                    self.abort(url.as_str(), &e);
                    return Ok(());
                }
                self.process_page().await
            }
            Cursor::Click(control) => {
                if let Err(e) = self.session.click(&control).await {
                    self.abort(control.selector(), &e);
                    return Ok(());
                }
                self.process_page().await
            }
            Cursor::Finished => Ok(()),
        }
    }

    async fn start(&mut self) -> crate::Result<()> {
        if let Some(path) = &self.link_path {
            self.link_file = Some(LinkFile::create(path)?);
        }

        let seed = Url::parse(&self.seed)?;
        let Some(selector) = self.config.collection_selector.clone() else {
            self.cursor = Cursor::Load(seed);
            return Ok(());
        };

        if let Err(e) = self.session.navigate(seed.as_str()).await {
            self.abort(seed.as_str(), &e);
            return Ok(());
        }
        self.settle().await;

        match self.read_collections(&selector, &seed).await {
            Ok(collections) if !collections.is_empty() => {
                tracing::info!("Found {} collections on {}", collections.len(), seed);
                self.collections = collections.into();
                self.cursor = Cursor::NextCollection;
                Ok(())
            }
            Ok(_) => {
                tracing::warn!("No collections matched '{}', walking the seed itself", selector);
                self.process_page().await
            }
            Err(e) => {
                self.abort(seed.as_str(), &e);
                Ok(())
            }
        }
    }

    async fn read_collections(&self, selector: &str, seed: &Url) -> RenderResult<Vec<Url>> {
        let mut seen = HashSet::new();
        let mut collections = Vec::new();

        for handle in self.session.query_all(selector).await? {
            let Some(href) = self.session.attribute(&handle, "href").await? else {
                continue;
            };
            if let Some(url) = resolve_href(&href, seed) {
                if seen.insert(url.to_string()) {
                    collections.push(url);
                }
            }
        }

        Ok(collections)
    }

    /// Harvests the page the session is on and decides where to go next
    async fn process_page(&mut self) -> crate::Result<()> {
        if let Some(ready) = self.config.ready_selector.clone() {
            let timeout = Duration::from_secs(self.config.ready_timeout_secs);
            if let Err(e) = self.session.wait_for(&ready, timeout).await {
                self.abort(&ready, &e);
                return Ok(());
            }
        }
        self.settle().await;

        let page_url = match self.session.current_url().await {
            Ok(url) => url,
            Err(e) => {
                self.abort("current page", &e);
                return Ok(());
            }
        };

        let repeated = !self.visited_pages.insert(page_url.clone());
        if repeated && self.config.mode == FrontierMode::Pagination {
            tracing::info!("Listing page {} repeated, ending listing", page_url);
            self.cursor = Cursor::NextCollection;
            return Ok(());
        }

        let page = match self.read_listing(&page_url).await {
            Ok(page) => page,
            Err(e) => {
                self.abort(&page_url, &e);
                return Ok(());
            }
        };
        self.pages_fetched += 1;

        let fresh: Vec<String> = page
            .items
            .into_iter()
            .filter(|link| self.seen.insert(link.clone()))
            .collect();

        // A click that leaves the URL unchanged is only a loop if nothing new appeared
        if repeated && fresh.is_empty() {
            tracing::info!("Listing page {} yielded nothing new, ending listing", page_url);
            self.cursor = Cursor::NextCollection;
            return Ok(());
        }

        tracing::info!(
            "Listing page {} ({}): {} new links, {} total",
            self.pages_fetched,
            page_url,
            fresh.len(),
            self.seen.len()
        );

        if let Some(file) = self.link_file.as_mut() {
            file.append(&fresh)?;
        }
        self.buffer.extend(fresh);

        if let Some(max) = self.config.max_pages {
            if self.pages_fetched >= max {
                tracing::info!("Reached max-pages ({}), ending walk", max);
                self.cursor = Cursor::Finished;
                return Ok(());
            }
        }

        self.cursor = match page.next {
            Some(NextControl::Href(url)) if !self.visited_pages.contains(url.as_str()) => {
                Cursor::Load(url)
            }
            Some(NextControl::Click(control)) => Cursor::Click(control),
            _ => Cursor::NextCollection,
        };
        Ok(())
    }

    async fn read_listing(&self, page_url: &str) -> RenderResult<ListingPage> {
        let base = Url::parse(page_url).map_err(|e| RenderError::Navigation {
            url: page_url.to_string(),
            message: e.to_string(),
        })?;

        let item_selector = match (&self.config.mode, &self.config.container_selector) {
            (FrontierMode::Sitemap, Some(container)) => {
                format!("{} {}", container, self.config.item_selector)
            }
            _ => self.config.item_selector.clone(),
        };

        let mut items = Vec::new();
        for handle in self.session.query_all(&item_selector).await? {
            if let Some(href) = self.session.attribute(&handle, "href").await? {
                if let Some(url) = resolve_href(&href, &base) {
                    items.push(url.to_string());
                }
            }
        }

        let next = self.find_next(&base).await?;
        Ok(ListingPage { items, next })
    }

    async fn find_next(&self, base: &Url) -> RenderResult<Option<NextControl>> {
        let Some(control) = self.session.query_first(&self.config.next_selector).await? else {
            return Ok(None);
        };

        if self.is_disabled(&control).await? {
            tracing::debug!("Next control is disabled");
            return Ok(None);
        }

        match self.config.mode {
            FrontierMode::Pagination => {
                let href = self.session.attribute(&control, "href").await?;
                Ok(href
                    .and_then(|h| resolve_href(&h, base))
                    .map(NextControl::Href))
            }
            FrontierMode::Sitemap => Ok(Some(NextControl::Click(control))),
        }
    }

    async fn is_disabled(&self, control: &ElementHandle) -> RenderResult<bool> {
        if let Some(class) = &self.config.disabled_class {
            let classes = self.session.attribute(control, "class").await?;
            if classes.is_some_and(|c| c.split_whitespace().any(|name| name == class)) {
                return Ok(true);
            }
        }

        if self.session.attribute(control, "disabled").await?.is_some() {
            return Ok(true);
        }

        let aria = self.session.attribute(control, "aria-disabled").await?;
        Ok(aria.is_some_and(|value| value.eq_ignore_ascii_case("true")))
    }

    async fn settle(&self) {
        if self.config.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        }
    }

    fn abort(&mut self, at: &str, error: &RenderError) {
        tracing::warn!(
            "Listing walk aborted at {}: {} (keeping {} links)",
            at,
            error,
            self.seen.len()
        );
        self.cursor = Cursor::Finished;
    }
}
