use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use std::time::{Duration, Instant};

use super::{FetchResult, NavAction, PageFetcher, PageTarget};
use crate::errors::FetchError;
use crate::proxy::ProxyBinding;

/// Poll interval while waiting for the content container to appear
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Rendered-variant fetcher: one WebDriver session for the whole run.
///
/// Every navigation waits until the content container is present before the
/// page source is snapshotted, so the controller only sees pages that have
/// finished rendering their listing.
pub struct BrowserFetcher {
    webdriver_url: String,
    proxy: Option<ProxyBinding>,
    proxy_check_url: String,
    /// Selector whose presence marks the page as content-ready
    wait_selector: String,
    /// Selector for the control activated on click-next targets
    next_selector: String,
    client: Option<Client>,
}

impl BrowserFetcher {
    /// Create a fetcher; the WebDriver session opens on `connect`
    pub fn new(
        webdriver_url: &str,
        proxy: Option<ProxyBinding>,
        proxy_check_url: &str,
        wait_selector: &str,
        next_selector: &str,
    ) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            proxy,
            proxy_check_url: proxy_check_url.to_string(),
            wait_selector: wait_selector.to_string(),
            next_selector: next_selector.to_string(),
            client: None,
        }
    }

    /// Handle to the live session, for the live-document extractor.
    /// `None` until `connect` succeeds.
    pub fn client_handle(&self) -> Option<Client> {
        self.client.clone()
    }

    /// Browser capabilities for the session: headless, plus proxy arguments
    /// when a binding is configured
    fn capabilities(&self) -> serde_json::map::Map<String, serde_json::Value> {
        let mut args = vec!["--headless=new".to_string(), "--disable-gpu".to_string()];
        if let Some(binding) = &self.proxy {
            args.push(binding.server_arg());
            args.push("--ignore-certificate-errors".to_string());
        }

        let mut caps = serde_json::map::Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            serde_json::json!({ "args": args }),
        );
        caps
    }

    /// Blocks until the content container exists on the current page,
    /// or the deadline passes
    async fn wait_for_content(&self, client: &Client, deadline: Duration) -> Result<(), FetchError> {
        let started = Instant::now();
        loop {
            let found = client
                .find_all(Locator::Css(&self.wait_selector))
                .await
                .map_err(|e| map_cmd_error(e, "waiting for content"))?;
            if !found.is_empty() {
                return Ok(());
            }
            if started.elapsed() >= deadline {
                ::log::warn!(
                    "Container `{}` did not appear within {:?}",
                    self.wait_selector,
                    deadline
                );
                return Err(FetchError::Timeout);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn connect(&mut self) -> Result<(), FetchError> {
        // Reconnecting an open session is a no-op.
        if self.client.is_some() {
            return Ok(());
        }

        let client = match ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(&self.webdriver_url)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
                return Err(FetchError::Network(format!(
                    "webdriver unreachable at {}: {e}",
                    self.webdriver_url
                )));
            }
        };
        ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);

        // A configured proxy is verified by navigating through it once
        // before the crawl starts; failure here is fatal for the run.
        if self.proxy.is_some() {
            ::log::info!("Verifying proxy via {}", self.proxy_check_url);
            if let Err(e) = client.goto(&self.proxy_check_url).await {
                if let Err(close_err) = client.close().await {
                    ::log::warn!("Failed to close client after proxy check: {}", close_err);
                }
                return Err(FetchError::ProxyUnavailable(e.to_string()));
            }
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

        match target.action {
            NavAction::Navigate => {
                ::log::debug!("Navigating to {}", target.url);
                client
                    .goto(&target.url)
                    .await
                    .map_err(|e| map_cmd_error(e, "navigating"))?;
            }
            NavAction::Reload => {
                ::log::debug!("Reloading {}", target.url);
                client
                    .refresh()
                    .await
                    .map_err(|e| map_cmd_error(e, "reloading"))?;
            }
            NavAction::ClickNext => {
                ::log::debug!("Clicking next control on {}", target.url);
                let controls = client
                    .find_all(Locator::Css(&self.next_selector))
                    .await
                    .map_err(|e| map_cmd_error(e, "locating next control"))?;
                let control = controls.into_iter().next().ok_or_else(|| {
                    FetchError::Navigation(format!(
                        "next control `{}` disappeared before click",
                        self.next_selector
                    ))
                })?;
                control
                    .click()
                    .await
                    .map_err(|e| map_cmd_error(e, "clicking next control"))?;
            }
        }

        self.wait_for_content(client, timeout).await?;

        let body = client
            .source()
            .await
            .map_err(|e| map_cmd_error(e, "getting page source"))?;
        let url = client
            .current_url()
            .await
            .map(|u| u.to_string())
            .unwrap_or_else(|_| target.url.clone());

        Ok(FetchResult {
            body,
            url,
            status: 200,
            content_encoding: None,
        })
    }

    async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
    }
}

/// Classifies WebDriver command failures into the fetch taxonomy
fn map_cmd_error(error: fantoccini::error::CmdError, context: &str) -> FetchError {
    let text = error.to_string();
    if text.contains("Unable to find session") {
        return FetchError::Navigation(format!("lost session while {context}"));
    }
    if text.contains("timeout") || text.contains("timed out") {
        return FetchError::Timeout;
    }
    FetchError::Navigation(format!("failed while {context}: {text}"))
}
