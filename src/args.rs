use clap::{Parser, ValueEnum};
use page_reaper::{CrawlConfig, FetchMode};

#[derive(Parser, Debug)]
#[command(name = "page-reaper")]
#[command(about = "Crawls a paginated listing and exports the extracted records to CSV")]
#[command(version)]
pub struct Args {
    /// URL of the first listing page (may come from --config instead)
    pub url: Option<String>,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// How pages are fetched (static HTTP client or rendered WebDriver session)
    #[arg(short, long, value_enum)]
    pub mode: Option<FetchModeArg>,

    /// Field whose value identifies a record for deduplication
    #[arg(long)]
    pub key: Option<String>,

    /// Fetch attempts per page before the run gives up on it
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Proxy pool entry (host:port); repeatable, one is chosen at random
    #[arg(long = "proxy")]
    pub proxies: Vec<String>,

    /// Directory the CSV file is written into
    #[arg(short, long)]
    pub output_dir: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FetchModeArg {
    Static,
    Rendered,
}

/// Convert from CLI argument fetch mode to internal fetch mode
pub fn convert_fetch_mode(arg_mode: FetchModeArg) -> FetchMode {
    match arg_mode {
        FetchModeArg::Static => FetchMode::Static,
        FetchModeArg::Rendered => FetchMode::Rendered,
    }
}

/// Layer the CLI overrides on top of the base configuration
pub fn apply_overrides(mut config: CrawlConfig, args: &Args) -> CrawlConfig {
    if let Some(url) = &args.url {
        config.start_url = url.clone();
    }
    if let Some(mode) = args.mode {
        config.mode = convert_fetch_mode(mode);
    }
    if let Some(key) = &args.key {
        config.identity_key = key.clone();
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(timeout) = args.timeout {
        config.attempt_timeout_secs = timeout;
    }
    if !args.proxies.is_empty() {
        config.proxies = args.proxies.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }
    config
}
