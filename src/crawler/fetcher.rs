//! HTTP fetcher implementation
//!
//! This module handles every plain HTTP request of a run:
//! - Building the HTTP client from the profile's `[http]` section
//! - GET requests for product pages and JSON endpoints
//! - Classifying failures into retryable and terminal classes

use crate::config::HttpConfig;
use crate::crawler::ExtractError;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// Response body
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The `[http]` section of the site profile
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches raw documents without a renderer
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: Client,
}

impl StaticFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Fetches the body of `url`
    pub async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        self.fetch_page(url, None).await.map(|page| page.body)
    }

    /// Fetches `url`, optionally sending a `Cookie` header
    ///
    /// # Error Classes
    ///
    /// | Condition | Class |
    /// |-----------|-------|
    /// | Timeout, connection failure, truncated body | TransientNetwork |
    /// | HTTP 408, 429, 5xx | TransientNetwork |
    /// | Any other non-success status | HttpStatus |
    /// | Unparseable URL | MalformedPayload |
    pub async fn fetch_page(
        &self,
        url: &str,
        cookie_header: Option<&str>,
    ) -> Result<FetchedPage, ExtractError> {
        let target = Url::parse(url).map_err(|e| ExtractError::MalformedPayload {
            url: url.to_string(),
            message: format!("invalid URL: {}", e),
        })?;

        let mut request = self.client.get(target);
        if let Some(cookies) = cookie_header {
            request = request.header(header::COOKIE, cookies);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url, status));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(url, &e))?;

        tracing::debug!("Fetched {} ({} bytes)", final_url, body.len());

        Ok(FetchedPage { final_url, body })
    }
}

fn classify_request_error(url: &str, error: &reqwest::Error) -> ExtractError {
    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    };

    ExtractError::TransientNetwork {
        url: url.to_string(),
        message,
    }
}

fn classify_status(url: &str, status: StatusCode) -> ExtractError {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ExtractError::TransientNetwork {
            url: url.to_string(),
            message: format!("HTTP {}", status.as_u16()),
        }
    } else {
        ExtractError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }
    }
}
