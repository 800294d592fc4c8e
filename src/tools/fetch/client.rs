use super::backend::BackendKind;
use crate::error::{FetchError, Result};
use reqwest::{redirect, Client, Proxy};
use std::time::Duration;

const REDIRECT_LIMIT: usize = 10;
const POOL_IDLE_TIMEOUT_SEC: u64 = 90;
const POOL_MAX_IDLE_PER_HOST: usize = 20;

/// Build a reqwest client for one backend flavor.
///
/// Each flavor presents a different wire fingerprint:
/// - `Baseline` → HTTP/1.1 only over rustls (plain pooled session)
/// - `Http2` → ALPN-negotiated HTTP/2 over rustls
/// - `TlsFingerprint` → platform TLS stack (needs the `native-tls` feature)
///
/// Clients carry their own cookie store and are meant to live for one
/// orchestrated fetch.
pub(crate) fn build_client(kind: BackendKind, proxy: Option<&str>) -> Result<Client> {
    let builder = Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::limited(REDIRECT_LIMIT))
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SEC))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST);

    let builder = match kind {
        BackendKind::Baseline => builder.use_rustls_tls().http1_only(),
        BackendKind::Http2 => builder.use_rustls_tls().http2_adaptive_window(true),
        BackendKind::TlsFingerprint => native_tls(builder)?,
        BackendKind::Impersonate => return Err(FetchError::BackendUnavailable(kind)),
    };

    let builder = match proxy {
        Some(p) => builder.proxy(Proxy::all(p).map_err(|e| FetchError::InvalidProxy(format!("{p}: {e}")))?),
        None => builder,
    };

    builder
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

#[cfg(feature = "native-tls")]
fn native_tls(builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
    Ok(builder.use_native_tls())
}

#[cfg(not(feature = "native-tls"))]
fn native_tls(_builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
    Err(FetchError::BackendUnavailable(BackendKind::TlsFingerprint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_and_http2_always_build() {
        assert!(build_client(BackendKind::Baseline, None).is_ok());
        assert!(build_client(BackendKind::Http2, None).is_ok());
    }

    #[test]
    fn bad_proxy_is_reported() {
        let err = build_client(BackendKind::Baseline, Some("not a proxy url")).unwrap_err();
        assert!(matches!(err, FetchError::InvalidProxy(_)));
    }

    #[test]
    fn proxy_is_accepted() {
        assert!(build_client(BackendKind::Baseline, Some("http://127.0.0.1:8080")).is_ok());
    }

    #[cfg(not(feature = "native-tls"))]
    #[test]
    fn tls_fingerprint_needs_feature() {
        let err = build_client(BackendKind::TlsFingerprint, None).unwrap_err();
        assert_eq!(err, FetchError::BackendUnavailable(BackendKind::TlsFingerprint));
    }
}
