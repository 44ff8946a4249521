//! Catalog-Sweep: a resilient crawl-and-extract pipeline for product catalogs
//!
//! This crate discovers every item URL of a catalog site by walking its
//! paginated listings or sitemap, extracts structured product records from
//! each item page, and falls back to an interactive renderer session for
//! pages whose variant pickers only resolve with client-side script.
//! Progress is flushed in checkpointed batches so long runs can be resumed.

pub mod config;
pub mod crawler;
pub mod output;
pub mod render;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Catalog-Sweep operations
///
/// These are run-level failures. Failures of a single URL never surface here;
/// they are classified as [`crawler::ExtractError`] and quarantined.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Renderer error: {0}")]
    Render(#[from] render::RenderError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Output writer stopped: {0}")]
    Writer(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector in config: {0}")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Catalog-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Orchestrator, RunMode};
pub use state::{ProductRecord, StockStatus};
pub use url::canonicalize_url;
