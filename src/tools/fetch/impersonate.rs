//! Chrome-emulating backend: TLS ClientHello, HTTP/2 settings and header
//! order all match a real Chrome build. Only compiled with `impersonate`.

use super::backend::{BackendConnector, BackendKind, FetchBackend};
use crate::error::{FetchError, Result};

#[derive(Debug, Clone, Default)]
pub struct ImpersonateConnector;

impl ImpersonateConnector {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(feature = "impersonate"))]
impl BackendConnector for ImpersonateConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Impersonate
    }

    fn probe(&self) -> bool {
        false
    }

    fn connect(&self, _proxy: Option<&str>) -> Result<Box<dyn FetchBackend>> {
        Err(FetchError::BackendUnavailable(BackendKind::Impersonate))
    }
}

#[cfg(feature = "impersonate")]
mod enabled {
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    use super::*;
    use crate::tools::fetch::backend::{into_outcome, Attempt};
    use crate::tools::fetch::headers::header_pairs;
    use crate::tools::fetch::types::{FetchResponse, TierOutcome};

    const REDIRECT_LIMIT: usize = 10;

    fn build(proxy: Option<&str>) -> Result<wreq::Client> {
        let builder = wreq::Client::builder()
            .emulation(wreq_util::Emulation::Chrome131)
            .redirect(wreq::redirect::Policy::limited(REDIRECT_LIMIT));
        let builder = match proxy {
            Some(p) => builder.proxy(
                wreq::Proxy::all(p).map_err(|e| FetchError::InvalidProxy(format!("{p}: {e}")))?,
            ),
            None => builder,
        };
        builder.build().map_err(|e| FetchError::Client(e.to_string()))
    }

    impl BackendConnector for ImpersonateConnector {
        fn kind(&self) -> BackendKind {
            BackendKind::Impersonate
        }

        fn probe(&self) -> bool {
            build(None).is_ok()
        }

        fn connect(&self, proxy: Option<&str>) -> Result<Box<dyn FetchBackend>> {
            Ok(Box::new(ImpersonateBackend {
                client: build(proxy)?,
            }))
        }
    }

    struct ImpersonateBackend {
        client: wreq::Client,
    }

    impl ImpersonateBackend {
        async fn send(&self, attempt: &Attempt<'_>) -> Result<FetchResponse> {
            let mut req = self
                .client
                .get(attempt.url.as_str())
                .timeout(attempt.timeout);
            for (name, value) in header_pairs(attempt.identity) {
                req = req.header(name, value);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let final_url = resp.url().to_string();
            let mut headers: BTreeMap<String, String> = BTreeMap::new();
            for (name, value) in resp.headers() {
                if let Ok(value) = value.to_str() {
                    headers
                        .entry(name.as_str().to_string())
                        .and_modify(|v| {
                            v.push_str(", ");
                            v.push_str(value);
                        })
                        .or_insert_with(|| value.to_string());
                }
            }
            let body = resp
                .text()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            Ok(FetchResponse {
                status,
                headers,
                body,
                final_url,
                source: BackendKind::Impersonate.source(),
            })
        }
    }

    #[async_trait]
    impl FetchBackend for ImpersonateBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Impersonate
        }

        async fn fetch(&self, attempt: &Attempt<'_>) -> TierOutcome {
            match self.send(attempt).await {
                Ok(response) => into_outcome(response),
                Err(e) => TierOutcome::TransportError(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "impersonate"))]
    #[test]
    fn absent_without_feature() {
        let connector = ImpersonateConnector::new();
        assert!(!connector.probe());
        assert!(matches!(
            connector.connect(None),
            Err(FetchError::BackendUnavailable(BackendKind::Impersonate))
        ));
    }

    #[cfg(feature = "impersonate")]
    #[test]
    fn builds_with_feature() {
        assert!(ImpersonateConnector::new().probe());
    }
}
