/// Checks whether a cookie's `domain` attribute covers a request host
///
/// Follows the browser rules closely enough for stored session cookies:
/// 1. Exact match: "shop.example" covers only "shop.example"
/// 2. Leading dot: ".shop.example" covers "shop.example" and every
///    subdomain ("www.shop.example", "a.b.shop.example")
///
/// Both sides are compared case-insensitively.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::cookie_domain_matches;
///
/// assert!(cookie_domain_matches(".modelsport.dk", "modelsport.dk"));
/// assert!(cookie_domain_matches(".modelsport.dk", "www.modelsport.dk"));
/// assert!(!cookie_domain_matches("modelsport.dk", "www.modelsport.dk"));
/// ```
pub fn cookie_domain_matches(cookie_domain: &str, host: &str) -> bool {
    let domain = cookie_domain.to_lowercase();
    let host = host.to_lowercase();

    if let Some(base) = domain.strip_prefix('.') {
        if base.is_empty() {
            return false;
        }
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        !domain.is_empty() && host == domain
    }
}
