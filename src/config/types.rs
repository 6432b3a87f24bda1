use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure for trimtrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub site: Vec<SiteEntry>,
}

impl Config {
    /// Looks up the site entry with the given name
    pub fn site(&self, name: &str) -> Option<&SiteEntry> {
        self.site.iter().find(|s| s.name == name)
    }
}

/// Engine behavior configuration
///
/// Everything the original spiders kept as class-level constants (concurrency,
/// per-request delays, retry budget) lives here and is passed into the driver
/// at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of branches fetched concurrently
    #[serde(rename = "max-concurrent-branches")]
    pub max_concurrent_branches: u32,

    /// Politeness delay applied before every request (milliseconds)
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: u64,

    /// Retry budget for transient fetch failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base backoff between retries (milliseconds, doubled per attempt)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the records file
    #[serde(rename = "records-path")]
    pub records_path: String,

    /// Records file format
    #[serde(default)]
    pub format: OutputFormat,

    /// Path of the abandoned-branch log
    #[serde(rename = "failure-log-path")]
    pub failure_log_path: String,
}

/// Supported record file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Jsonl,
}

/// Per-site configuration entry
///
/// One `[[site]]` table per target site. The `defaults` table supplies field
/// values a stage fills in when the source omits them (e.g. transmission);
/// defaults are site policy, never engine behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Registered site name (e.g. "chevrolet")
    pub name: String,

    /// Zip code sent with dealer-localized requests
    #[serde(rename = "zip-code")]
    pub zip_code: Option<String>,

    /// Dealer search radius in miles
    #[serde(rename = "search-radius")]
    pub search_radius: Option<u32>,

    /// Body types excluded at the catalog stage; empty disables the filter
    #[serde(rename = "excluded-body-types", default)]
    pub excluded_body_types: Vec<String>,

    /// Seed URLs for sites that take them (dealer inventory template)
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Field name -> value applied when the source response omits the field
    #[serde(default)]
    pub defaults: HashMap<String, String>,
}

impl SiteEntry {
    /// Creates a minimal entry with just a name (tests, registry listing)
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            zip_code: None,
            search_radius: None,
            excluded_body_types: Vec::new(),
            seeds: Vec::new(),
            defaults: HashMap::new(),
        }
    }

    /// Returns the configured default for a record field, if any
    pub fn default_for(&self, field: &str) -> Option<&str> {
        self.defaults.get(field).map(String::as_str)
    }
}
