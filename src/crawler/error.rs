//! Per-URL failure classes
//!
//! These never abort a run. They decide whether a URL is retried and what
//! reason is recorded when it is quarantined.

use crate::render::RenderError;
use thiserror::Error;

/// Why extracting a single URL failed
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("Transient network failure for {url}: {message}")]
    TransientNetwork { url: String, message: String },

    #[error("Render timeout for {url}: {message}")]
    RenderTimeout { url: String, message: String },

    #[error("Selector '{selector}' matched nothing on {url}")]
    SelectorMiss { url: String, selector: String },

    #[error("Malformed payload at {url}: {message}")]
    MalformedPayload { url: String, message: String },

    #[error("Renderer session lost on {url}: {message}")]
    SessionLoss { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("No variant of {url} could be activated ({controls} controls)")]
    VariantUnresolved { url: String, controls: usize },

    #[error("Extraction worker for {url} did not finish: {message}")]
    WorkerAborted { url: String, message: String },
}

impl ExtractError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork { .. } | Self::RenderTimeout { .. } | Self::SessionLoss { .. }
        )
    }

    /// Short class name written to the failure file
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TransientNetwork { .. } => "transient_network",
            Self::RenderTimeout { .. } => "render_timeout",
            Self::SelectorMiss { .. } => "selector_miss",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::SessionLoss { .. } => "session_loss",
            Self::HttpStatus { .. } => "http_status",
            Self::VariantUnresolved { .. } => "variant_unresolved",
            Self::WorkerAborted { .. } => "worker_aborted",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::TransientNetwork { url, .. }
            | Self::RenderTimeout { url, .. }
            | Self::SelectorMiss { url, .. }
            | Self::MalformedPayload { url, .. }
            | Self::SessionLoss { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::VariantUnresolved { url, .. }
            | Self::WorkerAborted { url, .. } => url,
        }
    }

    pub fn is_session_loss(&self) -> bool {
        matches!(self, Self::SessionLoss { .. })
    }

    /// Classifies a renderer error raised while processing `url`
    pub fn from_render(url: &str, error: RenderError) -> Self {
        let url = url.to_string();
        match error {
            RenderError::Navigation { message, .. } => Self::TransientNetwork { url, message },
            RenderError::Timeout { .. } | RenderError::Interaction(_) => Self::RenderTimeout {
                url,
                message: error.to_string(),
            },
            RenderError::ElementMissing(selector) | RenderError::InvalidSelector(selector) => {
                Self::SelectorMiss { url, selector }
            }
            RenderError::NoPage | RenderError::SessionLost(_) | RenderError::Unavailable(_) => {
                Self::SessionLoss {
                    url,
                    message: error.to_string(),
                }
            }
        }
    }
}
