#![cfg(test)]
mod tests {
    use crate::tools::clean::*;

    const MESSY: [&str; 14] = [
        "example.com",
        "www.example.com",
        "http:/example.com",
        "https///example.com",
        "wwwhttps://example.com",
        "https:////example.com/a//b",
        "  HTTP://Example.com/path  ",
        "example.com\\path\\to",
        "ftp://files.example.com",
        "/just/a/path",
        "http:/",
        "",
        "https//",
        "mailto:someone@example.com",
    ];

    #[test]
    fn test_documented_repairs() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("www.example.com"), "https://example.com");
        assert_eq!(normalize_url("http:/example.com"), "https://example.com");
        assert_eq!(normalize_url("https///example.com"), "https://example.com");
        assert_eq!(normalize_url("wwwhttps://example.com"), "https://example.com");
        assert_eq!(normalize_url("http:///example.com"), "http://example.com");
        assert_eq!(normalize_url("https//example.com"), "https://example.com");
    }

    #[test]
    fn test_missing_colon_keeps_scheme() {
        assert_eq!(normalize_url("http//example.com"), "http://example.com");
        assert_eq!(normalize_url("http//example.com/a?b=1"), "http://example.com/a?b=1");
        let once = normalize_url("http//example.com");
        assert_eq!(normalize_url(&once), once);
    }

    #[test]
    fn test_bare_www_host_gets_https() {
        assert_eq!(normalize_url("www.example.com"), "https://example.com");
        assert_eq!(normalize_url("WWW.example.com/a"), "https://example.com/a");
        assert_eq!(
            normalize_url("https://www.example.com"),
            "https://www.example.com"
        );
    }

    #[test]
    fn test_well_formed_http_is_kept() {
        assert_eq!(normalize_url("http://example.com/x"), "http://example.com/x");
    }

    #[test]
    fn test_backslashes_become_slashes() {
        assert_eq!(
            normalize_url("example.com\\path\\to"),
            "https://example.com/path/to"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in MESSY {
            let once = normalize_url(raw);
            assert_eq!(normalize_url(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_is_valid_rejects_bad_urls() {
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("mailto:someone@example.com"));
        assert!(!is_valid_url("file:///etc/passwd"));
        assert!(is_valid_url("http://example.com"));
        assert!(is_valid_url("https://example.com/a?b=c"));
    }

    #[test]
    fn test_origin_of() {
        let url = parse_target("https://example.com:8443/a/b?c").unwrap();
        assert_eq!(origin_of(&url), "https://example.com:8443");
    }
}
