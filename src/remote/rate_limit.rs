//! Minimum-interval limiter shared by every call to the statistics service.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Default pause between two remote calls
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(600);

/// Guarantees at least `cooldown` between the end of one call and the
/// start of the next.
///
/// The last completion time sits behind an async mutex that a [`Slot`]
/// holds for the whole call, so callers sharing a limiter run one at a time
/// no matter which task or thread they come from.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_call: Mutex<Option<Instant>>,
}

/// Permission to perform one remote call. Dropping it records the call as
/// finished, including when the call errored or its future was cancelled.
pub struct Slot<'a> {
    guard: MutexGuard<'a, Option<Instant>>,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        *self.guard = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_call: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Wait for the cooldown to elapse and take the slot.
    pub async fn acquire(&self) -> Slot<'_> {
        let guard = self.last_call.lock().await;

        if let Some(last) = *guard {
            let ready_at = last + self.cooldown;
            let now = Instant::now();
            if ready_at > now {
                debug!("Rate limiter waiting {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }

        Slot { guard }
    }

    /// Run `call` inside a slot.
    pub async fn run<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let _slot = self.acquire().await;
        call.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        limiter.run(async {}).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(600));
        let start = Instant::now();

        limiter.run(async {}).await;
        limiter.run(async {}).await;
        limiter.run(async {}).await;

        assert!(start.elapsed() >= Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_measured_from_call_end() {
        let limiter = RateLimiter::new(Duration::from_millis(600));

        limiter
            .run(tokio::time::sleep(Duration::from_millis(1000)))
            .await;
        let finished = Instant::now();
        limiter.run(async {}).await;

        assert!(finished.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_call_still_counts() {
        let limiter = RateLimiter::new(Duration::from_millis(600));
        let result: Result<(), &str> = limiter.run(async { Err("boom") }).await;
        assert!(result.is_err());

        let start = Instant::now();
        limiter.run(async {}).await;
        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialised() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(600)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.run(async { Instant::now() }).await
                })
            })
            .collect();

        let mut started = Vec::new();
        for handle in handles {
            started.push(handle.await.unwrap());
        }
        started.sort();

        for pair in started.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(600));
        }
        assert!(start.elapsed() >= Duration::from_millis(1800));
    }
}
