//! URL handling module
//!
//! This module provides item URL canonicalization, href resolution against
//! a page URL, and cookie domain matching.

mod matcher;
mod normalize;

pub use matcher::cookie_domain_matches;
pub use normalize::canonicalize_url;

use ::url::Url;

/// Resolves an href found on `base` into a canonical absolute URL
///
/// Returns None if the link should be excluded:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` schemes
/// - anything that does not resolve to HTTP(S)
pub fn resolve_href(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute = base.join(href).ok()?;
    canonicalize_url(absolute.as_str()).ok()
}
