pub mod client;
pub mod rate_limit;
pub mod retry;

pub use client::{ClipAsset, StatsClient, StatsSource, VideoQuality};
pub use rate_limit::{RateLimiter, Slot};
pub use retry::{Retryable, RetryPolicy};
