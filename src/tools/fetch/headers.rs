use super::identity::Identity;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

/// Browser family implied by a user-agent, so client hints stay consistent
/// with it (Firefox and Safari never send `sec-ch-ua`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Chromium { major: u32, edge: bool },
    Firefox,
    Safari,
    Other,
}

fn family_of(ua: &str) -> Family {
    if ua.contains("Firefox/") {
        return Family::Firefox;
    }
    if let Some(major) = version_after(ua, "Chrome/") {
        return Family::Chromium {
            major,
            edge: ua.contains("Edg/"),
        };
    }
    if ua.contains("Safari/") && ua.contains("Version/") {
        return Family::Safari;
    }
    Family::Other
}

fn version_after(ua: &str, marker: &str) -> Option<u32> {
    let rest = &ua[ua.find(marker)? + marker.len()..];
    rest.split(|c: char| !c.is_ascii_digit()).next()?.parse().ok()
}

fn platform_of(ua: &str) -> &'static str {
    if ua.contains("Android") {
        "\"Android\""
    } else if ua.contains("Windows") {
        "\"Windows\""
    } else if ua.contains("Macintosh") || ua.contains("Mac OS X") {
        "\"macOS\""
    } else if ua.contains("Linux") || ua.contains("X11") {
        "\"Linux\""
    } else {
        "\"Unknown\""
    }
}

/// Ordered header pairs for an identity, User-Agent included.
///
/// Kept backend-neutral so clients built on other `http` versions can reuse it.
pub(crate) fn header_pairs(identity: &Identity) -> Vec<(&'static str, String)> {
    let mut pairs: Vec<(&'static str, String)> = vec![
        ("user-agent", identity.user_agent.clone()),
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".into(),
        ),
        ("accept-language", "en-US,en;q=0.9".into()),
        ("accept-encoding", "gzip, deflate, br".into()),
        ("cache-control", "no-cache".into()),
        ("pragma", "no-cache".into()),
        ("connection", "keep-alive".into()),
        ("upgrade-insecure-requests", "1".into()),
        ("sec-fetch-mode", "navigate".into()),
        ("sec-fetch-dest", "document".into()),
        ("sec-fetch-site", identity.site_hint.as_header().into()),
    ];

    if let Family::Chromium { major, edge } = family_of(&identity.user_agent) {
        let brand = if edge {
            format!("\"Microsoft Edge\";v=\"{major}\"")
        } else {
            format!("\"Google Chrome\";v=\"{major}\"")
        };
        pairs.push((
            "sec-ch-ua",
            format!("\"Chromium\";v=\"{major}\", \"Not=A?Brand\";v=\"24\", {brand}"),
        ));
        pairs.push(("sec-ch-ua-mobile", "?0".into()));
        pairs.push(("sec-ch-ua-platform", platform_of(&identity.user_agent).into()));
    }

    if !identity.referer.is_empty() {
        pairs.push(("referer", identity.referer.clone()));
    }
    if let Some(cookie) = identity.cookie_header() {
        pairs.push(("cookie", cookie));
    }

    pairs
}

/// Build the reqwest header map for an identity.
///
/// Values that are not valid header text are skipped; the User-Agent falls
/// back to a bare `Mozilla/5.0`.
pub(crate) fn headers_for_identity(identity: &Identity) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (k, v) in header_pairs(identity) {
        let name = HeaderName::from_static(k);
        if let Ok(val) = HeaderValue::from_str(&v) {
            headers.insert(name, val);
        }
    }

    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
    }

    headers
}
