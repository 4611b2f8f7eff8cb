// src/utils/http.rs

//! HTTP client utilities.
//!
//! Every download goes through [`retry`]: a fixed delay between attempts with
//! up to 250ms of random jitter, and a single [`AppError::Fetch`] once the
//! attempts are exhausted.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// How many times to attempt a request and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    fn backoff(&self) -> Duration {
        if self.delay.is_zero() {
            return self.delay;
        }
        let jitter_ms: u64 = rand::rng().random_range(0..=250);
        self.delay + Duration::from_millis(jitter_ms)
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, url: &str, mut op: F) -> Result<T>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(url, attempt, max_attempts, "Downloading");

        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= max_attempts => {
                return Err(AppError::Fetch {
                    url: url.to_string(),
                    attempts: attempt,
                    message: error.to_string(),
                });
            }
            Err(error) => {
                let delay = policy.backoff();
                warn!(
                    url,
                    attempt,
                    max_attempts,
                    ?delay,
                    error = %error,
                    "Download attempt failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Source of remote content.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch a page as text.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Fetch a binary document.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`Fetch`] implementation backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(
            create_async_client(config)?,
            RetryPolicy::from_config(config),
        ))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let client = &self.client;
        retry(&self.policy, url, || async move {
            client.get(url).send().await?.error_for_status()?.text().await
        })
        .await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let client = &self.client;
        retry(&self.policy, url, || async move {
            let bytes = client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            Ok::<_, reqwest::Error>(bytes.to_vec())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(&instant_policy(3), "https://example.com", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("attempt {n} failed"))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&instant_policy(3), "https://example.com/x.pdf", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("connection reset") }
        })
        .await;

        match result.unwrap_err() {
            AppError::Fetch {
                url,
                attempts,
                message,
            } => {
                assert_eq!(url, "https://example.com/x.pdf");
                assert_eq!(attempts, 3);
                assert_eq!(message, "connection reset");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let _ = retry(&instant_policy(0), "u", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("nope") }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&HttpConfig::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }

    #[test]
    fn test_create_client() {
        assert!(create_async_client(&HttpConfig::default()).is_ok());
    }
}
