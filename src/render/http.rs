//! Script-less renderer backed by plain HTTP fetches
//!
//! The current page is kept as raw markup and re-parsed per query, since
//! `scraper::Html` cannot be held across await points.

use super::{
    cookie_header, Cookie, ElementHandle, PageRenderer, RenderError, RenderResult,
    RendererSession,
};
use crate::crawler::{ExtractError, StaticFetcher};
use crate::url::resolve_href;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

/// Renderer whose sessions fetch pages with [`StaticFetcher`]
#[derive(Clone)]
pub struct HttpRenderer {
    fetcher: StaticFetcher,
}

impl HttpRenderer {
    pub fn new(fetcher: StaticFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn open_session(&self) -> RenderResult<Box<dyn RendererSession>> {
        Ok(Box::new(HttpSession {
            fetcher: self.fetcher.clone(),
            page: None,
            cookies: Vec::new(),
        }))
    }
}

struct LoadedPage {
    url: Url,
    markup: String,
}

struct HttpSession {
    fetcher: StaticFetcher,
    page: Option<LoadedPage>,
    cookies: Vec<Cookie>,
}

impl HttpSession {
    fn page(&self) -> RenderResult<&LoadedPage> {
        self.page.as_ref().ok_or(RenderError::NoPage)
    }

    /// Runs `read` against the element behind `handle`
    fn with_element<T>(
        &self,
        handle: &ElementHandle,
        read: impl FnOnce(ElementRef<'_>) -> T,
    ) -> RenderResult<T> {
        let page = self.page()?;
        let selector = parse_selector(handle.selector())?;
        let document = Html::parse_document(&page.markup);
        let element = document
            .select(&selector)
            .nth(handle.index())
            .ok_or_else(|| RenderError::ElementMissing(handle.selector().to_string()))?;
        Ok(read(element))
    }

    /// Follows the `href` of an anchor, the only click a static page supports
    async fn follow(&mut self, handle: &ElementHandle) -> RenderResult<()> {
        let href = self.with_element(handle, |el| el.value().attr("href").map(str::to_string))?;
        let base = self.page()?.url.clone();

        let target = href
            .as_deref()
            .and_then(|h| resolve_href(h, &base))
            .ok_or_else(|| {
                RenderError::Interaction(format!(
                    "'{}' has no followable href and scripts are not executed",
                    handle.selector()
                ))
            })?;

        self.navigate(target.as_str()).await
    }
}

#[async_trait]
impl RendererSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> RenderResult<()> {
        let parsed = Url::parse(url).map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let header = cookie_header(&self.cookies, &parsed);

        let fetched = self
            .fetcher
            .fetch_page(url, header.as_deref())
            .await
            .map_err(|e| navigation_error(url, e))?;

        self.page = Some(LoadedPage {
            url: fetched.final_url,
            markup: fetched.body,
        });
        Ok(())
    }

    async fn current_url(&self) -> RenderResult<String> {
        Ok(self.page()?.url.to_string())
    }

    async fn query_all(&self, selector: &str) -> RenderResult<Vec<ElementHandle>> {
        let page = self.page()?;
        let parsed = parse_selector(selector)?;
        let document = Html::parse_document(&page.markup);
        let count = document.select(&parsed).count();
        Ok((0..count).map(|i| ElementHandle::new(selector, i)).collect())
    }

    async fn text(&self, element: &ElementHandle) -> RenderResult<Option<String>> {
        self.with_element(element, |el| {
            let text = el.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then_some(text)
        })
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> RenderResult<Option<String>> {
        self.with_element(element, |el| el.value().attr(name).map(|v| v.trim().to_string()))
    }

    async fn click(&mut self, element: &ElementHandle) -> RenderResult<()> {
        self.follow(element).await
    }

    async fn force_click(&mut self, element: &ElementHandle) -> RenderResult<()> {
        self.follow(element).await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> RenderResult<()> {
        // Nothing changes a static page after load, so the check is immediate
        if self.query_all(selector).await?.is_empty() {
            Err(RenderError::Timeout {
                selector: selector.to_string(),
                timeout,
            })
        } else {
            Ok(())
        }
    }

    async fn add_cookies(&mut self, cookies: &[Cookie]) -> RenderResult<()> {
        self.cookies.extend_from_slice(cookies);
        Ok(())
    }

    async fn close(self: Box<Self>) -> RenderResult<()> {
        Ok(())
    }
}

fn parse_selector(selector: &str) -> RenderResult<Selector> {
    Selector::parse(selector).map_err(|_| RenderError::InvalidSelector(selector.to_string()))
}

fn navigation_error(url: &str, error: ExtractError) -> RenderError {
    RenderError::Navigation {
        url: url.to_string(),
        message: error.to_string(),
    }
}
