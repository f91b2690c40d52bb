use url::Url;

/// Query parameters a tracking redirect may carry the real destination under.
pub const REDIRECT_PARAMS: &[&str] = &["u", "provider_website", "url", "redirect_url", "dest"];

/// Resolve an anchor's href to the site it actually points at.
///
/// Tracking redirects are unwrapped when one of [`REDIRECT_PARAMS`] is present.
/// A link to a foreign host is returned as written. A plain link back into
/// the directory itself is not a target and yields `None`.
pub fn resolve_link_target(href: &str, origin: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let absolute = origin.join(href).ok()?;

    for name in REDIRECT_PARAMS {
        let inner = absolute
            .query_pairs()
            .find(|(k, _)| k == *name)
            .map(|(_, v)| v.trim().to_string());
        if let Some(inner) = inner.filter(|v| !v.is_empty()) {
            return Some(inner);
        }
    }

    let host = absolute.host_str().map(bare_host);
    let own = origin.host_str().map(bare_host);
    if host.is_some() && host != own {
        // Protocol-relative links take the origin's scheme.
        if href.starts_with("//") {
            return Some(absolute.to_string());
        }
        return Some(href.to_string());
    }
    None
}

/// Canonical form of a detail link: absolute, fragment dropped.
pub fn canonical_url(href: &str, origin: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let mut url = origin.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn bare_host(host: &str) -> &str {
    host.trim_start_matches("www.")
}
