use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// How pages are acquired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Plain HTTP client over statically parsed markup
    #[default]
    Static,

    /// WebDriver session over the live rendered document
    Rendered,
}

/// One field to extract from each container element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field name, also used as the CSV column name
    pub name: String,

    /// CSS selector, evaluated relative to the container element
    pub selector: String,

    /// A record is only emitted when every required field is non-empty
    #[serde(default)]
    pub required: bool,

    /// Collect every match instead of the first one
    #[serde(default)]
    pub multi: bool,
}

/// Selector schema describing what to extract from each page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSchema {
    /// Selector matching each candidate element on the page
    pub container: String,

    /// Fields to extract from each candidate, in output order
    pub fields: Vec<FieldRule>,

    /// Selector for the "next page" control
    pub next_control: String,
}

impl Default for ExtractSchema {
    /// Schema for the quotes demo site
    fn default() -> Self {
        Self {
            container: ".quote".to_string(),
            fields: vec![
                FieldRule {
                    name: "text".to_string(),
                    selector: ".text".to_string(),
                    required: true,
                    multi: false,
                },
                FieldRule {
                    name: "author".to_string(),
                    selector: ".author".to_string(),
                    required: true,
                    multi: false,
                },
                FieldRule {
                    name: "tags".to_string(),
                    selector: ".tags .tag".to_string(),
                    required: false,
                    multi: true,
                },
            ],
            next_control: "li.next > a".to_string(),
        }
    }
}

impl ExtractSchema {
    /// Names of the fields that must be present for a record to be emitted
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|rule| rule.required)
            .map(|rule| rule.name.as_str())
    }
}

/// Configuration for one crawl run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// URL of the first listing page
    pub start_url: String,

    /// What to extract from each page
    #[serde(default)]
    pub schema: ExtractSchema,

    /// Field whose value identifies a record for deduplication
    #[serde(default = "default_identity_key")]
    pub identity_key: String,

    /// CSV columns, in output order
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,

    /// Fetch attempts per page before the run gives up on it
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Deadline for a single fetch attempt, in seconds
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Base delay between retry attempts, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Proxy pool (`host:port` entries); one is chosen at random per run
    #[serde(default)]
    pub proxies: Vec<String>,

    /// URL probed at session start to verify the chosen proxy
    #[serde(default = "default_proxy_check_url")]
    pub proxy_check_url: String,

    /// Static HTTP client or rendered WebDriver session
    #[serde(default)]
    pub mode: FetchMode,

    /// URL for the WebDriver instance (rendered mode only)
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Directory the CSV file is written into
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl CrawlConfig {
    /// Create a configuration with default values
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            schema: ExtractSchema::default(),
            identity_key: default_identity_key(),
            columns: default_columns(),
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            proxies: Vec::new(),
            proxy_check_url: default_proxy_check_url(),
            mode: FetchMode::default(),
            webdriver_url: default_webdriver_url(),
            output_dir: default_output_dir(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Box<dyn Error>> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }
}

/// Default identity key, matching the default schema
fn default_identity_key() -> String {
    "text".to_string()
}

/// Default output columns, matching the default schema
fn default_columns() -> Vec<String> {
    vec![
        "text".to_string(),
        "author".to_string(),
        "tags".to_string(),
    ]
}

/// Default fetch attempts per page
fn default_max_attempts() -> u32 {
    3
}

/// Default per-attempt deadline in seconds
fn default_attempt_timeout_secs() -> u64 {
    60
}

/// Default retry backoff base in milliseconds
fn default_backoff_base_ms() -> u64 {
    500
}

/// Default URL used to verify a configured proxy
fn default_proxy_check_url() -> String {
    "http://httpbin.org/ip".to_string()
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

/// Default output directory
fn default_output_dir() -> String {
    "data".to_string()
}
