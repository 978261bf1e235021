use thiserror::Error;

/// Errors produced by a `PageFetcher`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure. Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// The operation exceeded its per-attempt deadline. Retryable; a retry
    /// forces a full reload of the current target.
    #[error("timed out")]
    Timeout,

    /// The configured proxy could not be reached at session start.
    /// Fatal - the run aborts and nothing is exported.
    #[error("proxy unavailable: {0}")]
    ProxyUnavailable(String),

    /// Navigation or session failure while loading a page. Page-level,
    /// not retried.
    #[error("navigation failed: {0}")]
    Navigation(String),
}

impl FetchError {
    /// Whether the same page may be attempted again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Timeout)
    }

    /// Short machine-readable kind for the structured error report.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout => "timeout",
            FetchError::ProxyUnavailable(_) => "proxy-unavailable",
            FetchError::Navigation(_) => "navigation",
        }
    }
}

/// Page-level extraction failures. Per-element problems (a missing field on
/// one candidate element) never surface here; the extractor skips the
/// element and logs it.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    /// The live document became unreachable mid-extraction.
    #[error("lost page session: {0}")]
    Session(String),
}

/// Run-level export failures. Fatal.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Union of the failures a whole crawl run can surface to the caller.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CrawlError {
    /// Short machine-readable kind for the structured error report.
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlError::Fetch(e) => e.kind(),
            CrawlError::Export(_) => "export-io",
            CrawlError::Config(_) => "config",
        }
    }
}
