// Re-export modules
pub mod config;
pub mod controller;
pub mod errors;
pub mod export;
pub mod extract;
pub mod fetchers;
pub mod proxy;
pub mod records;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{CrawlConfig, ExtractSchema, FetchMode, FieldRule};
pub use controller::{RunOutcome, RunStatus};
pub use errors::CrawlError;
pub use records::{FieldValue, Record};

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use controller::{PaginationController, RetryPolicy};
use extract::Extractor;
use extract::dom::DomExtractor;
use extract::live::LiveExtractor;
use fetchers::PageFetcher;
use fetchers::browser::BrowserFetcher;
use fetchers::http::HttpFetcher;

/// Summary of a finished run, reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    /// Deduplicated records written to the output file
    pub total_records: usize,

    /// Pages successfully fetched
    pub pages_fetched: usize,

    /// `complete`, `page-aborted` or `cancelled`
    pub status: String,

    /// Path of the CSV file
    pub saved_file: String,
}

/// Builder for a single crawl run
pub struct Crawl {
    config: CrawlConfig,
    cancel: Arc<AtomicBool>,
}

impl Crawl {
    /// Create a crawl from a configuration
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load configuration from a JSON file
    pub fn with_config_file(
        path: impl AsRef<Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = CrawlConfig::from_file(path)?;
        Ok(Self::new(config))
    }

    /// Load configuration from a JSON string
    pub fn with_config_str(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config = CrawlConfig::from_json(json)?;
        Ok(Self::new(config))
    }

    /// Flag that aborts the run at its next state transition, keeping the
    /// records gathered so far
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Run the crawl to completion: fetch and extract every page, dedupe
    /// once, export, and summarize.
    ///
    /// Page-level failures still produce a report covering the records
    /// gathered before them; only fatal failures (unreachable proxy, no
    /// session, export I/O) return an error, and then nothing is written.
    pub async fn run(self) -> Result<CrawlReport, CrawlError> {
        let mut config = self.config;

        // Override the WebDriver URL with an environment variable if provided
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                config.webdriver_url = webdriver_url;
            }
        }

        ::log::info!(
            "Starting crawl of {} ({:?} mode)",
            config.start_url,
            config.mode
        );

        // The proxy binding is chosen once here and held for the whole run.
        let proxy = proxy::choose_proxy(&config.proxies);

        let (fetcher, extractor): (Box<dyn PageFetcher>, Box<dyn Extractor>) = match config.mode {
            FetchMode::Static => (
                Box::new(HttpFetcher::new(proxy, &config.proxy_check_url)),
                Box::new(DomExtractor::new()),
            ),
            FetchMode::Rendered => {
                let mut browser = BrowserFetcher::new(
                    &config.webdriver_url,
                    proxy,
                    &config.proxy_check_url,
                    &config.schema.container,
                    &config.schema.next_control,
                );
                // The live extractor shares the fetcher's session, so the
                // session has to open before the controller takes over.
                browser.connect().await?;
                let client = browser.client_handle().ok_or_else(|| {
                    CrawlError::Config("webdriver session missing after connect".to_string())
                })?;
                (Box::new(browser), Box::new(LiveExtractor::new(client)))
            }
        };

        let mut controller = PaginationController::new(
            fetcher,
            extractor,
            config.schema.clone(),
            RetryPolicy::from_config(&config),
            self.cancel.clone(),
        );

        let outcome = controller.run(&config.start_url).await?;

        let records = records::dedupe_by_key(outcome.records, &config.identity_key);
        let path = export::export_csv(&records, &config.columns, Path::new(&config.output_dir))?;

        Ok(CrawlReport {
            total_records: records.len(),
            pages_fetched: outcome.pages_fetched,
            status: outcome.status.label().to_string(),
            saved_file: path.display().to_string(),
        })
    }
}
