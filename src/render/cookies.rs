//! Session cookie store
//!
//! Cookies are kept in the JSON shape browser drivers export: an array of
//! objects with `name`, `value`, `domain`, `path` and driver-specific extras.
use crate::url::cookie_domain_matches;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// One stored cookie; fields beyond the basics are carried through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Cookie {
    /// Whether the cookie would be sent with a request to `url`
    pub fn applies_to(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };

        if let Some(domain) = &self.domain {
            if !cookie_domain_matches(domain, host) {
                return false;
            }
        }

        if self.secure == Some(true) && url.scheme() != "https" {
            return false;
        }

        match &self.path {
            Some(path) if !path.is_empty() => url.path().starts_with(path.as_str()),
            _ => true,
        }
    }
}

/// Loads the cookie store at `path`
///
/// A missing or malformed store is not fatal: the problem is logged and an
/// empty set is returned, so the run continues unauthenticated.
pub fn load_cookies(path: &Path) -> Vec<Cookie> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Cookie store {} not readable: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<Cookie>>(&content) {
        Ok(cookies) => {
            tracing::info!("Loaded {} cookies from {}", cookies.len(), path.display());
            cookies
        }
        Err(e) => {
            tracing::warn!("Cookie store {} is malformed: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Builds a `Cookie` request header for `url`, if any cookie applies
pub fn cookie_header(cookies: &[Cookie], url: &Url) -> Option<String> {
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|c| c.applies_to(url))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
