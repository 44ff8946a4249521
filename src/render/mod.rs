//! Renderer abstraction for script-capable page sessions
//!
//! The rendering engine is an external collaborator. The pipeline only sees
//! two traits: [`PageRenderer`] opens sessions and [`RendererSession`] drives
//! one page at a time (navigate, query, read, click, wait). A session is an
//! explicit resource: it is opened at the start of a phase, passed by `&mut`
//! to every operation that needs it, and closed when the phase ends.
//!
//! Two implementations ship with the crate:
//! - [`HttpRenderer`]: fetches markup over HTTP and answers queries against
//!   it; clicks on anchors follow their `href`. No script runs, so it can
//!   walk href-based listings but not JavaScript variant pickers.
//! - [`NoopRenderer`]: refuses to open sessions, for static-only profiles.

mod cookies;
mod http;

pub use cookies::{cookie_header, load_cookies, Cookie};
pub use http::HttpRenderer;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a renderer session
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {timeout:?} waiting for '{selector}'")]
    Timeout { selector: String, timeout: Duration },

    #[error("Element '{0}' is not present")]
    ElementMissing(String),

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("No page loaded in this session")]
    NoPage,

    #[error("Renderer session lost: {0}")]
    SessionLost(String),

    #[error("Renderer unavailable: {0}")]
    Unavailable(String),
}

impl RenderError {
    /// The session itself is gone and must be re-acquired
    pub fn is_session_loss(&self) -> bool {
        matches!(self, Self::SessionLost(_) | Self::Unavailable(_))
    }
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Opaque reference to an element of the currently rendered page
///
/// A handle is the n-th match of a selector at query time. It is only
/// meaningful to the session that produced it, and may go stale once the
/// page changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    selector: String,
    index: usize,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// A single stateful page session
#[async_trait]
pub trait RendererSession: Send + Sync {
    /// Load `url`, replacing the current page
    async fn navigate(&mut self, url: &str) -> RenderResult<()>;

    /// Resolved URL of the current page (after redirects and clicks)
    async fn current_url(&self) -> RenderResult<String>;

    /// All elements currently matching `selector`, in document order
    async fn query_all(&self, selector: &str) -> RenderResult<Vec<ElementHandle>>;

    /// Visible text of an element, trimmed; `None` when empty
    async fn text(&self, element: &ElementHandle) -> RenderResult<Option<String>>;

    async fn attribute(&self, element: &ElementHandle, name: &str)
        -> RenderResult<Option<String>>;

    /// Native click, which may fail when the element is occluded
    async fn click(&mut self, element: &ElementHandle) -> RenderResult<()>;

    /// Script-driven activation that ignores overlays
    async fn force_click(&mut self, element: &ElementHandle) -> RenderResult<()>;

    /// Wait until `selector` matches at least one element
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> RenderResult<()>;

    async fn add_cookies(&mut self, cookies: &[Cookie]) -> RenderResult<()>;

    /// Release the session and everything it holds
    async fn close(self: Box<Self>) -> RenderResult<()>;

    /// First element matching `selector`
    async fn query_first(&self, selector: &str) -> RenderResult<Option<ElementHandle>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }
}

/// A rendering engine that can open sessions
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn open_session(&self) -> RenderResult<Box<dyn RendererSession>>;
}

/// A renderer used when no rendering engine is available
pub struct NoopRenderer;

#[async_trait]
impl PageRenderer for NoopRenderer {
    async fn open_session(&self) -> RenderResult<Box<dyn RendererSession>> {
        Err(RenderError::Unavailable(
            "no renderer configured, static extraction only".to_string(),
        ))
    }
}
