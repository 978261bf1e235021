use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_ENCODING, USER_AGENT};
use std::time::Duration;

use super::{FetchResult, PageFetcher, PageTarget};
use crate::errors::FetchError;
use crate::proxy::ProxyBinding;

/// Client identity presented by the static variant
const USER_AGENT_VALUE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/// Deadline for the proxy verification probe at session start
const PROXY_PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Static-variant fetcher: a plain HTTP client.
///
/// Transport compression (gzip/deflate) is decoded transparently before the
/// body reaches the controller. Every navigation action is a fresh GET of
/// the target URL; click-style advancement only exists in the rendered
/// variant.
pub struct HttpFetcher {
    proxy: Option<ProxyBinding>,
    proxy_check_url: String,
    client: Option<reqwest::Client>,
}

impl HttpFetcher {
    /// Create a fetcher; the session opens on `connect`
    pub fn new(proxy: Option<ProxyBinding>, proxy_check_url: &str) -> Self {
        Self {
            proxy,
            proxy_check_url: proxy_check_url.to_string(),
            client: None,
        }
    }

    fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        let mut builder = reqwest::Client::builder();

        if let Some(binding) = &self.proxy {
            let proxy = reqwest::Proxy::all(binding.http_url())
                .map_err(|e| FetchError::ProxyUnavailable(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn connect(&mut self) -> Result<(), FetchError> {
        // Reconnecting an open session is a no-op.
        if self.client.is_some() {
            return Ok(());
        }

        let client = self.build_client()?;

        // A configured proxy is verified up front; an unreachable proxy is
        // fatal rather than retryable.
        if self.proxy.is_some() {
            ::log::info!("Verifying proxy via {}", self.proxy_check_url);
            let probe = client
                .get(&self.proxy_check_url)
                .timeout(PROXY_PROBE_TIMEOUT)
                .send()
                .await
                .map_err(|e| FetchError::ProxyUnavailable(e.to_string()))?;
            ::log::debug!("Proxy check responded with status {}", probe.status());
        }

        self.client = Some(client);
        Ok(())
    }

    async fn fetch(
        &mut self,
        target: &PageTarget,
        timeout: Duration,
    ) -> Result<FetchResult, FetchError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| FetchError::Navigation("fetcher not connected".to_string()))?;

        ::log::debug!("GET {}", target.url);
        let response = client
            .get(&target.url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!("http status {status}")));
        }

        let url = response.url().to_string();
        let content_encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(FetchResult {
            body,
            url,
            status: status.as_u16(),
            content_encoding,
        })
    }

    async fn close(&mut self) {
        self.client = None;
    }
}

/// Classifies reqwest failures into the fetch taxonomy
fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }
    FetchError::Network(err.to_string())
}
