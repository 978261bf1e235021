pub mod browser;
pub mod http;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::FetchError;

/// How a fetcher should reach a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    /// Load the URL fresh
    Navigate,

    /// Activate the current page's "next" control and wait for the new page
    ClickNext,

    /// Force a full reload of the current target
    Reload,
}

/// Addressable unit of pagination: a URL plus the navigation action
/// needed to reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    /// URL of the page
    pub url: String,

    /// Navigation action to perform
    pub action: NavAction,
}

impl PageTarget {
    /// Target reached by a fresh load
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            action: NavAction::Navigate,
        }
    }

    /// Target reached by activating the current page's "next" control
    pub fn click_next(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            action: NavAction::ClickNext,
        }
    }

    /// The same target, reached by a full reload
    pub fn as_reload(&self) -> Self {
        Self {
            url: self.url.clone(),
            action: NavAction::Reload,
        }
    }
}

/// One fetched page. Owned by the controller for a single loop iteration.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Decoded body text (transport compression already undone)
    pub body: String,

    /// URL the content was actually served from
    pub url: String,

    /// HTTP status (synthesized 200 for rendered snapshots)
    pub status: u16,

    /// Transport encoding that was decoded, if the server declared one
    pub content_encoding: Option<String>,
}

/// Capability that retrieves one page's content per call.
///
/// Implementations never retry internally - retry policy belongs to the
/// pagination controller.
#[async_trait]
pub trait PageFetcher: Send {
    /// Open the session and verify the proxy binding, if any.
    ///
    /// An unreachable proxy surfaces as `FetchError::ProxyUnavailable`,
    /// which is fatal for the whole run.
    async fn connect(&mut self) -> Result<(), FetchError>;

    /// Retrieve the target's content, bounded by `timeout`
    async fn fetch(
        &mut self,
        target: &PageTarget,
        timeout: Duration,
    ) -> Result<FetchResult, FetchError>;

    /// Release the session
    async fn close(&mut self);
}
