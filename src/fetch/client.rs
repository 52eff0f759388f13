use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use tokio::time::sleep;

use crate::config::HttpSettings;
use crate::error::{AppError, Context};

use super::{FetchResult, ShutdownSignal};

/// Single-shot GET against the upstream API. Implementations must release the
/// response on every path; retries live in [`RemoteFetcher`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> FetchResult<Vec<u8>>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, application/xml;q=0.9"),
        );
        let agent = HeaderValue::from_str(&settings.user_agent)
            .with_context(|| format!("Invalid user agent: {}", settings.user_agent))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to construct HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> FetchResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            // Dropping the response here hands the connection back to the pool.
            return Err(AppError::message(format!(
                "Request for {} failed with status {}",
                url, status
            )));
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

/// Result of a fetch after retries. Failures here are data, not errors: the
/// caller records them on the job and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded(Vec<u8>),
    Exhausted { attempts: u32, last_error: String },
    Cancelled,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Succeeded(_))
    }
}

/// Wraps a transport with bounded retries, optional backoff and shutdown.
#[derive(Clone)]
pub struct RemoteFetcher {
    transport: Arc<dyn Transport>,
    max_attempts: u32,
    retry_backoff: Duration,
    shutdown: ShutdownSignal,
}

impl RemoteFetcher {
    pub fn new(transport: Arc<dyn Transport>, settings: &HttpSettings, shutdown: ShutdownSignal) -> Self {
        Self {
            transport,
            max_attempts: settings.max_attempts.max(1),
            retry_backoff: settings.retry_backoff,
            shutdown,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut shutdown = self.shutdown.clone();
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if shutdown.is_triggered() {
                return FetchOutcome::Cancelled;
            }

            let result = tokio::select! {
                result = self.transport.get(url) => result,
                _ = shutdown.triggered() => return FetchOutcome::Cancelled,
            };

            match result {
                Ok(body) => return FetchOutcome::Succeeded(body),
                Err(err) => {
                    debug!("attempt {attempt}/{} for {url} failed: {err}", self.max_attempts);
                    last_error = err.to_string();
                }
            }

            if attempt < self.max_attempts && !self.retry_backoff.is_zero() {
                // Double the wait for each further attempt.
                let delay = self.retry_backoff * 2_u32.saturating_pow(attempt - 1);
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown.triggered() => return FetchOutcome::Cancelled,
                }
            }
        }

        warn!(
            "giving up on {url} after {} attempts: {last_error}",
            self.max_attempts
        );
        FetchOutcome::Exhausted {
            attempts: self.max_attempts,
            last_error,
        }
    }
}
