//! Rate limiting algorithm trait and implementations.
//!
//! This module defines the `Algorithm` trait and provides implementations
//! for various rate limiting algorithms.
//!
//! # Available Algorithms
//!
//! - **Token Bucket** (default): Controlled bursts with refilling tokens
//! - **Leaky Bucket** (`leaky-bucket` feature): Smooth constant output rate
//! - **Fixed Window** (default): Simple counter per time window
//! - **Sliding Window Log** (`sliding-log` feature): High precision, stores all timestamps
//! - **Sliding Window Counter** (default): Weighted window for balanced accuracy

#[cfg(feature = "leaky-bucket")]
mod leaky_bucket;
#[cfg(feature = "sliding-log")]
mod sliding_log;
mod fixed_window;
mod sliding_window;
mod token_bucket;

#[cfg(feature = "leaky-bucket")]
pub use leaky_bucket::LeakyBucket;
#[cfg(feature = "sliding-log")]
pub use sliding_log::SlidingLog;
pub use fixed_window::FixedWindow;
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;

use std::future::Future;

use crate::decision::Decision;
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::Storage;

/// Rate limiting algorithm trait.
///
/// Each algorithm provides different trade-offs between accuracy, memory usage,
/// and burst handling. All implementations must be thread-safe.
///
/// # Algorithm Comparison
///
/// | Algorithm | Accuracy | Memory | Burst | Best For |
/// |-----------|----------|--------|-------|----------|
/// | Token Bucket | High | Low | Excellent | Bursty traffic |
/// | Leaky Bucket | High | Medium | None | Smooth output |
/// | Fixed Window | Low | Low | Poor | Simple use cases |
/// | Sliding Window Log | Highest | High | Good | Precision critical |
/// | Sliding Window Counter | Medium | Low | Good | General purpose |
pub trait Algorithm: Send + Sync + 'static {
    /// Get the algorithm name (for logging/metrics).
    fn name(&self) -> &'static str;

    /// Namespace a caller-supplied key with this algorithm's storage prefix,
    /// so two algorithms sharing a store never collide on the same raw key.
    fn storage_key(&self, key: &str) -> String {
        key.to_string()
    }

    /// Check if a request is allowed AND record it atomically.
    ///
    /// This is the primary method for rate limiting. It checks whether the
    /// request should be allowed and, if so, records it against the quota.
    fn check_and_record<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> impl Future<Output = Result<Decision>> + Send;

    /// Check without recording (peek at current state).
    ///
    /// Useful for displaying rate limit info without consuming quota.
    fn check<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> impl Future<Output = Result<Decision>> + Send;

    /// Reset the rate limit for a key.
    fn reset<S: Storage>(&self, storage: &S, key: &str) -> impl Future<Output = Result<()>> + Send {
        async move { storage.delete(&self.storage_key(key)).await }
    }

    /// Diagnostic snapshot of a key's current state, for the admin `stats` operation.
    ///
    /// The default implementation reports the fields common to every
    /// algorithm; implementations with richer internal state (e.g. token
    /// bucket's available tokens) override this to add algorithm-specific
    /// entries.
    fn stats<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> impl Future<Output = Result<serde_json::Map<String, serde_json::Value>>> + Send {
        async move {
            let decision = self.check(storage, key, quota).await?;
            let info = decision.info();
            let mut map = serde_json::Map::new();
            map.insert("algorithm".into(), self.name().into());
            map.insert("limit".into(), info.limit.into());
            map.insert("remaining".into(), info.remaining.into());
            map.insert("reset_epoch_ms".into(), info.reset_epoch_ms.into());
            map.insert("window_start_ms".into(), info.window_start_ms.into());
            Ok(map)
        }
    }
}
