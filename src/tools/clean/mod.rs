mod tests;
mod utils;

use utils::*;
use url::Url;

use crate::error::{FetchError, Result};

/// Repair a hand-typed URL.
///
/// Performs the following operations in order:
/// 1. Trim and turn backslashes into forward slashes
/// 2. Fix a scheme missing one slash (`http:/x`)
/// 3. Collapse extra slashes after the scheme (`http:///x`)
/// 4. Fix a missing colon (`https//x`)
/// 5. Strip a `www` glued before the scheme (`wwwhttps://x`)
/// 6. Turn a scheme-less `www.` host into `https://` + the bare host
/// 7. Prepend `https://` when no scheme is present
/// 8. Collapse doubled slashes right after the scheme separator
///
/// Never fails; garbage in gives a string that [`is_valid_url`] rejects.
///
/// # Examples
/// ```
/// use tierfetch::tools::clean::normalize_url;
///
/// assert_eq!(normalize_url("www.example.com"), "https://example.com");
/// assert_eq!(normalize_url("wwwhttps://example.com"), "https://example.com");
/// assert_eq!(normalize_url("https://www.example.com"), "https://www.example.com");
/// ```
pub fn normalize_url(raw: &str) -> String {
    let mut url = raw.trim().replace('\\', "/");
    if url.is_empty() {
        return url;
    }

    if let Some(fixed) = fix_missing_slash(&url) {
        url = fixed;
    }
    url = collapse_extra_slashes(&url);
    if let Some(fixed) = fix_missing_colon(&url) {
        url = fixed;
    }
    url = strip_www_before_scheme(&url);

    if starts_with_www(&url) {
        url = format!("https://{}", &url[4..]);
    } else if !has_scheme(&url) {
        url = format!("https://{url}");
    }

    collapse_slashes_after_scheme(&url)
}

/// Check that a URL is absolute http(s) with a non-empty host.
pub fn is_valid_url(url: &str) -> bool {
    parse_target(url).is_ok()
}

/// Parse a URL that must be absolute http(s) with a non-empty host.
pub fn parse_target(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

/// `scheme://host[:port]` of a parsed target, without a trailing slash.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
