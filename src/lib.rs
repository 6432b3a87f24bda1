//! Trimtrawl: vehicle configurator traversal scraper
//!
//! This crate implements a generic tree-walking scrape engine for automaker
//! configurator sites, threading a partial vehicle record through each level
//! of a site's discovery tree until it is complete and emitted.

pub mod config;
pub mod engine;
pub mod output;
pub mod record;
pub mod sites;

use thiserror::Error;

/// Main error type for trimtrawl operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors produced by the fetch layer
///
/// Transient conditions (timeouts, 408/429/403/5xx) are retried inside the
/// fetcher; `RetriesExhausted` is what the driver sees when the budget runs
/// out. All fetch errors are branch-local.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Retries exhausted for {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

/// Errors produced by stage functions when a response does not match the
/// expected shape
///
/// These are recoverable: the driver abandons the owning branch and logs it,
/// sibling branches are unaffected.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Response shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Script variable not found: {0}")]
    ScriptVar(String),
}

/// Errors produced by record sinks
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for trimtrawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for stage functions
pub type StageResult = std::result::Result<engine::StageOutcome, StageError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Driver, Fetcher, HttpFetcher, RenderMode, StageOutcome, StageRequest};
pub use record::VehicleRecord;
