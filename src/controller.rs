use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::timeout;

use crate::config::{CrawlConfig, ExtractSchema};
use crate::errors::FetchError;
use crate::extract::{Extraction, Extractor, NextPage};
use crate::fetchers::{FetchResult, PageFetcher, PageTarget};
use crate::records::Record;
use crate::utils::backoff_delay;

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The last page reported no next affordance
    Complete,

    /// One page was abandoned (retries exhausted, navigation failure, or a
    /// failed extraction); the records gathered before it are kept
    PageAborted { url: String, attempts: u32 },

    /// The operator flag was raised mid-run
    Cancelled,
}

impl RunStatus {
    /// Short machine-readable label for the run summary
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::PageAborted { .. } => "page-aborted",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

/// What a finished run hands to deduplication and export
#[derive(Debug)]
pub struct RunOutcome {
    /// Accumulated records, in extraction order, not yet deduplicated
    pub records: Vec<Record>,

    /// Pages successfully fetched
    pub pages_fetched: usize,

    /// How the run ended
    pub status: RunStatus,
}

/// Retry policy for one run
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fetch attempts per page before the run gives up on it
    pub max_attempts: u32,

    /// Deadline for a single fetch attempt
    pub attempt_timeout: Duration,

    /// Base delay between retry attempts, in milliseconds
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            backoff_base_ms: config.backoff_base_ms,
        }
    }
}

/// Mutable state of one run. Owned exclusively by the controller and
/// dropped when the run finishes.
struct RunState {
    target: PageTarget,
    attempt: u32,
    records: Vec<Record>,
    pages_fetched: usize,
}

/// The run loop's current position. Terminal and Failed are absorbing:
/// once reached, the loop exits on the next iteration.
enum Phase {
    Fetching,
    Extracting(FetchResult),
    Advancing(NextPage),
    Terminal,
    Failed(RunStatus),
}

/// Drives Fetch -> Extract -> Advance across a pagination chain.
///
/// Strictly sequential: page N+1's target is only known once page N has
/// been extracted, so there is never more than one fetch in flight.
/// Retry policy lives here, not in the fetchers.
pub struct PaginationController {
    fetcher: Box<dyn PageFetcher>,
    extractor: Box<dyn Extractor>,
    schema: ExtractSchema,
    policy: RetryPolicy,
    cancel: Arc<AtomicBool>,
}

impl PaginationController {
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        extractor: Box<dyn Extractor>,
        schema: ExtractSchema,
        policy: RetryPolicy,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            schema,
            policy,
            cancel,
        }
    }

    /// Run the state machine to completion, starting from `start_url`.
    ///
    /// `Ok` covers full success, cancellation, and page-aborted partial
    /// success - the outcome says which. `Err` is reserved for fatal
    /// failures (unreachable proxy, no session), after which nothing may
    /// be exported.
    pub async fn run(&mut self, start_url: &str) -> Result<RunOutcome, FetchError> {
        self.fetcher.connect().await?;
        let result = self.run_loop(start_url).await;
        self.fetcher.close().await;
        result
    }

    async fn run_loop(&mut self, start_url: &str) -> Result<RunOutcome, FetchError> {
        let mut state = RunState {
            target: PageTarget::navigate(start_url),
            attempt: 0,
            records: Vec::new(),
            pages_fetched: 0,
        };
        let mut phase = Phase::Fetching;

        loop {
            // Cancellation is checked at the top of every transition. It
            // never overrides an already-terminal phase.
            if self.cancel.load(Ordering::SeqCst)
                && !matches!(phase, Phase::Terminal | Phase::Failed(_))
            {
                ::log::warn!("Cancellation requested, stopping run");
                phase = Phase::Failed(RunStatus::Cancelled);
            }

            phase = match phase {
                Phase::Fetching => self.fetch_current(&mut state).await?,
                Phase::Extracting(page) => self.extract_page(&mut state, page).await,
                Phase::Advancing(next) => advance(&mut state, next),
                Phase::Terminal => {
                    ::log::info!(
                        "Run complete: {} records from {} pages",
                        state.records.len(),
                        state.pages_fetched
                    );
                    return Ok(RunOutcome {
                        records: state.records,
                        pages_fetched: state.pages_fetched,
                        status: RunStatus::Complete,
                    });
                }
                Phase::Failed(status) => {
                    ::log::warn!(
                        "Run stopped ({}): keeping {} records from {} pages",
                        status.label(),
                        state.records.len(),
                        state.pages_fetched
                    );
                    return Ok(RunOutcome {
                        records: state.records,
                        pages_fetched: state.pages_fetched,
                        status,
                    });
                }
            };
        }
    }

    /// One fetch attempt on the current target, with the retry decision
    async fn fetch_current(&mut self, state: &mut RunState) -> Result<Phase, FetchError> {
        ::log::debug!(
            "Fetching {} (attempt {}/{})",
            state.target.url,
            state.attempt + 1,
            self.policy.max_attempts
        );

        let deadline = self.policy.attempt_timeout;
        let result = match timeout(deadline, self.fetcher.fetch(&state.target, deadline)).await {
            Ok(result) => result,
            // The attempt overran its deadline. The pending operation is
            // dropped here, so a late result can never touch RunState.
            Err(_) => Err(FetchError::Timeout),
        };

        match result {
            Ok(page) => {
                state.pages_fetched += 1;
                Ok(Phase::Extracting(page))
            }
            Err(error @ FetchError::ProxyUnavailable(_)) => {
                ::log::error!("Fatal fetch failure: {}", error);
                Err(error)
            }
            Err(error) if error.is_retryable() && state.attempt + 1 < self.policy.max_attempts => {
                let delay = backoff_delay(self.policy.backoff_base_ms, state.attempt);
                ::log::warn!(
                    "Fetch of {} failed ({}), retrying after {:?}",
                    state.target.url,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;

                // A timed-out page may be stuck mid-render; retry it with
                // a full reload instead of repeating the same action.
                if matches!(error, FetchError::Timeout) {
                    state.target = state.target.as_reload();
                }
                state.attempt += 1;
                Ok(Phase::Fetching)
            }
            Err(error) => {
                let attempts = state.attempt + 1;
                ::log::error!(
                    "Giving up on {} after {} attempt(s): {}",
                    state.target.url,
                    attempts,
                    error
                );
                Ok(Phase::Failed(RunStatus::PageAborted {
                    url: state.target.url.clone(),
                    attempts,
                }))
            }
        }
    }

    /// Extract the fetched page and append its records
    async fn extract_page(&mut self, state: &mut RunState, page: FetchResult) -> Phase {
        let page_url = page.url.clone();
        match self.extractor.extract(&page, &self.schema).await {
            Ok(Extraction { records, next }) => {
                state.records.extend(records);
                match next {
                    NextPage::None => Phase::Terminal,
                    other => Phase::Advancing(other),
                }
            }
            Err(error) => {
                ::log::error!("Extraction failed on {}: {}", page_url, error);
                Phase::Failed(RunStatus::PageAborted {
                    url: page_url,
                    attempts: state.attempt + 1,
                })
            }
        }
    }
}

/// Construct the next target and reset the attempt counter
fn advance(state: &mut RunState, next: NextPage) -> Phase {
    match next {
        NextPage::None => Phase::Terminal,
        NextPage::Url(url) => {
            state.target = PageTarget::navigate(url);
            state.attempt = 0;
            Phase::Fetching
        }
        NextPage::Click => {
            state.target = PageTarget::click_next(state.target.url.clone());
            state.attempt = 0;
            Phase::Fetching
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractSchema;
    use crate::extract::dom::DomExtractor;
    use crate::fetchers::NavAction;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Fetcher double that replays a script of fetch outcomes and records
    /// the targets it was asked for
    struct ScriptedFetcher {
        script: VecDeque<Result<FetchResult, FetchError>>,
        targets: Arc<Mutex<Vec<PageTarget>>>,
        connect_error: Option<FetchError>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<FetchResult, FetchError>>) -> Self {
            Self {
                script: script.into(),
                targets: Arc::new(Mutex::new(Vec::new())),
                connect_error: None,
            }
        }

        fn failing_connect(error: FetchError) -> Self {
            let mut fetcher = Self::new(Vec::new());
            fetcher.connect_error = Some(error);
            fetcher
        }

        fn target_log(&self) -> Arc<Mutex<Vec<PageTarget>>> {
            self.targets.clone()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn connect(&mut self) -> Result<(), FetchError> {
            match self.connect_error.take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        async fn fetch(
            &mut self,
            target: &PageTarget,
            _timeout: Duration,
        ) -> Result<FetchResult, FetchError> {
            self.targets.lock().unwrap().push(target.clone());
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Navigation("script exhausted".to_string())))
        }

        async fn close(&mut self) {}
    }

    fn page(body: &str, url: &str) -> FetchResult {
        FetchResult {
            body: body.to_string(),
            url: url.to_string(),
            status: 200,
            content_encoding: None,
        }
    }

    fn listing_page(quotes: &[(&str, &str)], next_href: Option<&str>) -> String {
        let mut html = String::from("<html><body>");
        for (text, author) in quotes {
            html.push_str(&format!(
                r#"<div class="quote"><span class="text">{text}</span><small class="author">{author}</small></div>"#
            ));
        }
        if let Some(href) = next_href {
            html.push_str(&format!(r#"<ul class="pager"><li class="next"><a href="{href}">Next</a></li></ul>"#));
        }
        html.push_str("</body></html>");
        html
    }

    fn controller(fetcher: ScriptedFetcher) -> PaginationController {
        controller_with(fetcher, 3, Arc::new(AtomicBool::new(false)))
    }

    fn controller_with(
        fetcher: ScriptedFetcher,
        max_attempts: u32,
        cancel: Arc<AtomicBool>,
    ) -> PaginationController {
        let policy = RetryPolicy {
            max_attempts,
            attempt_timeout: Duration::from_secs(5),
            backoff_base_ms: 0,
        };
        PaginationController::new(
            Box::new(fetcher),
            Box::new(DomExtractor::new()),
            ExtractSchema::default(),
            policy,
            cancel,
        )
    }

    fn texts(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|record| record.get("text").unwrap().joined())
            .collect()
    }

    #[tokio::test]
    async fn test_three_page_chain_terminates_in_three_fetches() {
        let script = vec![
            Ok(page(
                &listing_page(&[("q1", "a1"), ("q2", "a2")], Some("/page/2/")),
                "https://example.com/page/1/",
            )),
            Ok(page(
                &listing_page(&[("q3", "a3"), ("q4", "a4")], Some("/page/3/")),
                "https://example.com/page/2/",
            )),
            Ok(page(
                &listing_page(&[("q5", "a5")], None),
                "https://example.com/page/3/",
            )),
        ];
        let fetcher = ScriptedFetcher::new(script);
        let targets = fetcher.target_log();

        let outcome = controller(fetcher)
            .run("https://example.com/page/1/")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(outcome.pages_fetched, 3);
        assert_eq!(texts(&outcome.records), vec!["q1", "q2", "q3", "q4", "q5"]);
        assert_eq!(targets.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_mid_chain_is_retried_with_a_reload() {
        let script = vec![
            Ok(page(
                &listing_page(&[("q1", "a1"), ("q2", "a2")], Some("/page/2/")),
                "https://example.com/page/1/",
            )),
            Err(FetchError::Timeout),
            Ok(page(
                &listing_page(&[("q3", "a3"), ("q4", "a4")], Some("/page/3/")),
                "https://example.com/page/2/",
            )),
            Ok(page(
                &listing_page(&[("q5", "a5")], None),
                "https://example.com/page/3/",
            )),
        ];
        let fetcher = ScriptedFetcher::new(script);
        let targets = fetcher.target_log();

        let outcome = controller(fetcher)
            .run("https://example.com/page/1/")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(texts(&outcome.records), vec!["q1", "q2", "q3", "q4", "q5"]);

        // The retry after the timeout reloads page 2 instead of repeating
        // the original navigation.
        let seen = targets.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[2].action, NavAction::Reload);
        assert_eq!(seen[2].url, seen[1].url);
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_prior_pages_records() {
        let script = vec![
            Ok(page(
                &listing_page(&[("q1", "a1"), ("q2", "a2")], Some("/page/2/")),
                "https://example.com/page/1/",
            )),
            Err(FetchError::Timeout),
            Err(FetchError::Timeout),
            Err(FetchError::Timeout),
        ];
        let fetcher = ScriptedFetcher::new(script);
        let targets = fetcher.target_log();

        let outcome = controller(fetcher)
            .run("https://example.com/page/1/")
            .await
            .unwrap();

        match &outcome.status {
            RunStatus::PageAborted { attempts, .. } => assert_eq!(*attempts, 3),
            other => panic!("expected page-aborted, got {other:?}"),
        }
        assert_eq!(texts(&outcome.records), vec!["q1", "q2"]);
        // Exactly max_attempts fetches of page 2, plus the one for page 1.
        assert_eq!(targets.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_navigation_error_is_not_retried() {
        let script = vec![
            Ok(page(
                &listing_page(&[("q1", "a1")], Some("/page/2/")),
                "https://example.com/page/1/",
            )),
            Err(FetchError::Navigation("tab crashed".to_string())),
        ];
        let fetcher = ScriptedFetcher::new(script);
        let targets = fetcher.target_log();

        let outcome = controller(fetcher)
            .run("https://example.com/page/1/")
            .await
            .unwrap();

        match &outcome.status {
            RunStatus::PageAborted { attempts, .. } => assert_eq!(*attempts, 1),
            other => panic!("expected page-aborted, got {other:?}"),
        }
        assert_eq!(texts(&outcome.records), vec!["q1"]);
        assert_eq!(targets.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_fatal() {
        let fetcher = ScriptedFetcher::failing_connect(FetchError::ProxyUnavailable(
            "connection refused".to_string(),
        ));

        let result = controller(fetcher).run("https://example.com/").await;
        assert!(matches!(result, Err(FetchError::ProxyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_proxy_failure_mid_run_aborts_without_records() {
        let script = vec![Err(FetchError::ProxyUnavailable(
            "tunnel dropped".to_string(),
        ))];
        let fetcher = ScriptedFetcher::new(script);

        let result = controller(fetcher).run("https://example.com/").await;
        assert!(matches!(result, Err(FetchError::ProxyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_the_first_fetch() {
        let script = vec![Ok(page(
            &listing_page(&[("q1", "a1")], None),
            "https://example.com/",
        ))];
        let fetcher = ScriptedFetcher::new(script);
        let targets = fetcher.target_log();

        let cancel = Arc::new(AtomicBool::new(true));
        let outcome = controller_with(fetcher, 3, cancel)
            .run("https://example.com/")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert!(outcome.records.is_empty());
        assert!(targets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_page_with_no_next_is_terminal() {
        let script = vec![Ok(page(
            &listing_page(&[("q1", "a1")], None),
            "https://example.com/",
        ))];
        let fetcher = ScriptedFetcher::new(script);

        let outcome = controller(fetcher).run("https://example.com/").await.unwrap();
        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(texts(&outcome.records), vec!["q1"]);
    }
}
