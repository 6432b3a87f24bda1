//! Fetch layer
//!
//! This module defines the fetcher seam between the traversal engine and the
//! network, and the default reqwest-backed implementation:
//! - Building the HTTP client
//! - GET/POST dispatch from a [`StageRequest`]
//! - Retry with exponential backoff for transient failures
//! - Error classification into the crate's fetch taxonomy
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 404 and other 4xx | Immediate failure |
//! | HTTP 403 / 408 / 429 / 5xx | Counts against the retry budget |
//! | Timeout | Counts against the retry budget |
//! | Connection refused | Immediate failure |
//!
//! Exhausting the budget surfaces as [`FetchError::RetriesExhausted`]; the
//! driver abandons the owning branch only.

use crate::config::EngineConfig;
use crate::engine::request::{HttpMethod, StageRequest};
use crate::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// A fetched response handed to a stage function
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Response body (JSON text or markup)
    pub body: String,
}

impl FetchResponse {
    /// Convenience constructor for fixture responses in tests
    pub fn new(final_url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            final_url: final_url.into(),
            status,
            body: body.into(),
        }
    }
}

/// Network collaborator of the traversal engine
///
/// The engine issues every request through this trait, so transports are
/// swappable: the default [`HttpFetcher`] speaks plain HTTP, a browser-backed
/// implementation would honor [`RenderMode::Rendered`](crate::RenderMode) by
/// returning post-render markup, and tests substitute canned fixtures.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &StageRequest) -> Result<FetchResponse, FetchError>;
}

/// Outcome of a single send attempt, before retry accounting
enum Attempt {
    Done(FetchResponse),
    Transient(FetchError),
    Fatal(FetchError),
}

/// Default reqwest-backed fetcher with bounded retry
///
/// Serves both render modes over plain HTTP; sites whose rendered stages
/// need a real browser plug a different [`Fetcher`] into the driver.
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    /// Builds a fetcher from the engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Sends the request once and classifies the result
    async fn send(&self, request: &StageRequest) -> Attempt {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return classify_send_error(&request.url, e),
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        if is_transient_status(status) {
            return Attempt::Transient(FetchError::Status {
                url: request.url.clone(),
                status,
            });
        }

        if !(200..300).contains(&status) {
            return Attempt::Fatal(FetchError::Status {
                url: request.url.clone(),
                status,
            });
        }

        match response.text().await {
            Ok(body) => Attempt::Done(FetchResponse {
                final_url,
                status,
                body,
            }),
            Err(e) => Attempt::Transient(FetchError::Network {
                url: request.url.clone(),
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &StageRequest) -> Result<FetchResponse, FetchError> {
        let mut failures = 0u32;
        let mut backoff = self.retry_backoff;

        loop {
            match self.send(request).await {
                Attempt::Done(response) => return Ok(response),
                Attempt::Fatal(error) => return Err(error),
                Attempt::Transient(error) => {
                    failures += 1;
                    if failures >= self.max_retries {
                        return Err(FetchError::RetriesExhausted {
                            url: request.url.clone(),
                            attempts: failures,
                            last: error.to_string(),
                        });
                    }

                    tracing::debug!(
                        "Transient failure for {} (attempt {}/{}): {}",
                        request.url,
                        failures,
                        self.max_retries,
                        error
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

/// Statuses that count against the retry budget
///
/// 403 is included: the configurator gateways answer it for cold sessions
/// and recover on a later attempt.
fn is_transient_status(status: u16) -> bool {
    status == 403 || status == 408 || status == 429 || (500..600).contains(&status)
}

fn classify_send_error(url: &str, error: reqwest::Error) -> Attempt {
    if error.is_timeout() {
        Attempt::Transient(FetchError::Timeout {
            url: url.to_string(),
        })
    } else if error.is_connect() {
        Attempt::Fatal(FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        })
    } else {
        Attempt::Fatal(FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        })
    }
}
