use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::StatsApiError;

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for StatsApiError {
    fn is_transient(&self) -> bool {
        match self {
            StatsApiError::Request(_) | StatsApiError::Http { .. } | StatsApiError::Decode(_) => {
                true
            }
            StatsApiError::Schema(_) | StatsApiError::Io(_) => false,
        }
    }
}

impl Retryable for anyhow::Error {
    fn is_transient(&self) -> bool {
        self.chain().any(|cause| {
            cause
                .downcast_ref::<StatsApiError>()
                .map(Retryable::is_transient)
                .unwrap_or_else(|| cause.downcast_ref::<reqwest::Error>().is_some())
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
        }
    }

    /// Random wait drawn uniformly from `[min_backoff, max_backoff]`
    pub fn backoff(&self) -> Duration {
        if self.max_backoff <= self.min_backoff {
            return self.min_backoff;
        }
        rand::thread_rng().gen_range(self.min_backoff..=self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of
    /// attempts. The last error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff();
                    debug!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        label, attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
