use crate::UrlError;
use url::Url;

/// Query parameters that never identify a product
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "mc_eid",
    "_pos",
    "_sid",
    "_ss",
    "_psq",
];

/// Canonicalizes an item URL so the frontier can deduplicate it
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Require a host (the `url` crate already lowercases it)
/// 3. Remove the fragment
/// 4. Remove tracking query parameters (`utm_*`, `fbclid`, Shopify's
///    search-position markers, ...), keeping the rest in their original order
/// 5. Remove an empty query string
///
/// The path is left untouched: shops route `/products/a` and `/products/a/`
/// differently often enough that rewriting it would break fetches.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::canonicalize_url;
///
/// let url = canonicalize_url("https://Shop.Example/products/kit?utm_source=x#reviews").unwrap();
/// assert_eq!(url.as_str(), "https://shop.example/products/kit");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let kept = filter_query_params(&url);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

/// Drops tracking parameters, preserving the order of the rest
fn filter_query_params(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
