/// Private helpers for URL repair
use once_cell::sync::Lazy;
use regex::Regex;

static MISSING_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(https?):/([^/])").expect("valid regex"));
static EXTRA_SLASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(https?):///*").expect("valid regex"));
static MISSING_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(https?)//").expect("valid regex"));
static WWW_BEFORE_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^wwwhttps?://").expect("valid regex"));
static WWW_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^www\.").expect("valid regex"));
static ANY_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("valid regex"));
static SLASHES_AFTER_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(https?://)/*").expect("valid regex"));

/// `http:/x` → `https://x`. Returns `None` when the pattern does not apply.
///
/// A scheme typed with a broken separator is rewritten as `https`.
pub(super) fn fix_missing_slash(url: &str) -> Option<String> {
    if MISSING_SLASH.is_match(url) {
        Some(MISSING_SLASH.replace(url, "https://$2").into_owned())
    } else {
        None
    }
}

/// `http:///x` → `http://x`
pub(super) fn collapse_extra_slashes(url: &str) -> String {
    EXTRA_SLASHES.replace(url, "$1://").into_owned()
}

/// `https//x` → `https://x`, keeping the typed scheme. Returns `None` when
/// the pattern does not apply.
pub(super) fn fix_missing_colon(url: &str) -> Option<String> {
    if MISSING_COLON.is_match(url) {
        Some(MISSING_COLON.replace(url, "$1://").into_owned())
    } else {
        None
    }
}

/// `wwwhttps://x` → `https://x`
pub(super) fn strip_www_before_scheme(url: &str) -> String {
    WWW_BEFORE_SCHEME.replace(url, "https://").into_owned()
}

pub(super) fn starts_with_www(url: &str) -> bool {
    WWW_PREFIX.is_match(url)
}

pub(super) fn has_scheme(url: &str) -> bool {
    ANY_SCHEME.is_match(url)
}

/// `https:////x` → `https://x`
pub(super) fn collapse_slashes_after_scheme(url: &str) -> String {
    SLASHES_AFTER_SCHEME.replace(url, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_missing_slash() {
        assert_eq!(
            fix_missing_slash("http:/example.com").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(fix_missing_slash("http://example.com"), None);
    }

    #[test]
    fn test_collapse_extra_slashes() {
        assert_eq!(collapse_extra_slashes("http:///x.com"), "http://x.com");
        assert_eq!(collapse_extra_slashes("https://x.com"), "https://x.com");
    }

    #[test]
    fn test_fix_missing_colon() {
        assert_eq!(
            fix_missing_colon("https//example.com").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            fix_missing_colon("http//example.com").as_deref(),
            Some("http://example.com")
        );
        assert_eq!(fix_missing_colon("https://example.com"), None);
    }

    #[test]
    fn test_scheme_detection() {
        assert!(has_scheme("ftp://x"));
        assert!(has_scheme("https://x"));
        assert!(!has_scheme("example.com"));
        assert!(!has_scheme("https//x"));
    }

    #[test]
    fn test_www_detection() {
        assert!(starts_with_www("WWW.example.com"));
        assert!(!starts_with_www("wwwexample.com"));
    }
}
