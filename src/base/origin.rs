//! Reducing URLs to origins (scheme + host + port).
//!
//! An origin URL keeps its scheme, host and explicit port and has an empty
//! path (`/`), no query, no fragment and no userinfo. This is the shape
//! Chromium's `GURL::GetOrigin()` produces.

use url::Url;

/// Returns true for `http` and `https` URLs.
pub fn is_http_or_https(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Reduces `url` to its origin. Returns `None` for URLs without a host.
pub fn origin_of(url: &Url) -> Option<Url> {
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return None;
    }
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin.set_username("").ok()?;
    origin.set_password(None).ok()?;
    Some(origin)
}

/// True when `url` is already in origin form.
pub fn is_origin(url: &Url) -> bool {
    origin_of(url).as_ref() == Some(url)
}

/// Host key used to de-duplicate batches. Empty for host-less URLs.
pub fn host_key(url: &Url) -> &str {
    url.host_str().unwrap_or("")
}
