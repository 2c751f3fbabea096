//! Sliding Log rate limiting algorithm.
//!
//! The Sliding Log algorithm stores timestamps of all requests within the window,
//! providing the highest accuracy but with higher memory usage.

use std::sync::Arc;
use std::time::Duration;

use crate::algorithm::Algorithm;
use crate::clock::{Clock, SystemClock};
use crate::decision::{Decision, RateLimitInfo};
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::{Storage, StorageEntry};

/// Sliding Log rate limiting algorithm.
///
/// Stores timestamp of every request for highest precision.
/// Best for accuracy-critical applications.
#[derive(Clone)]
pub struct SlidingLog {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SlidingLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingLog").finish()
    }
}

impl Default for SlidingLog {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingLog {
    /// Create a new Sliding Log algorithm instance using the system clock.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a new Sliding Log algorithm instance driven by a custom clock.
    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Filter timestamps to only those still within the window: a
    /// timestamp survives when it is strictly less than `window_ms` old.
    /// Checked as `ts + window_ms > now` rather than `ts > now - window_ms`
    /// so it doesn't underflow (and wrongly evict everything) when
    /// `now < window_ms`.
    fn filter_window(&self, timestamps: &[u64], now: u64, window_ms: u64) -> Vec<u64> {
        timestamps
            .iter()
            .filter(|&&ts| ts + window_ms > now)
            .copied()
            .collect()
    }
}

impl Algorithm for SlidingLog {
    fn name(&self) -> &'static str {
        "sliding-window-log"
    }

    fn storage_key(&self, key: &str) -> String {
        format!("sliding_window_log:{key}")
    }

    async fn check_and_record<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let now = self.now_ms();
        let window_ms = quota.window().as_millis() as u64;
        let window_start = now.saturating_sub(window_ms);
        let ttl = Duration::from_millis(window_ms * 2);
        let limit = quota.max_requests();
        let storage_key = self.storage_key(key);

        let decision = storage
            .execute_atomic(&storage_key, ttl, |entry| {
                let mut timestamps = entry
                    .and_then(|e| e.timestamps)
                    .unwrap_or_default();

                timestamps = self.filter_window(&timestamps, now, window_ms);
                let current_count = timestamps.len() as u64;

                if current_count < limit {
                    timestamps.push(now);
                    let new_entry = StorageEntry::with_timestamps(timestamps);

                    let remaining = limit - current_count - 1;
                    let info =
                        RateLimitInfo::new(limit, remaining, now + window_ms, window_start)
                            .with_algorithm("sliding-window-log");

                    (new_entry, Decision::allowed(info))
                } else {
                    let new_entry = StorageEntry::with_timestamps(timestamps.clone());

                    let oldest = timestamps.first().copied().unwrap_or(now);
                    let retry_ms = oldest + window_ms - now;

                    let info =
                        RateLimitInfo::new(limit, 0, oldest + window_ms, window_start)
                            .with_algorithm("sliding-window-log")
                            .with_retry_after_s(retry_ms.div_ceil(1000));

                    (new_entry, Decision::denied(info))
                }
            })
            .await?;

        Ok(decision)
    }

    async fn check<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let now = self.now_ms();
        let window_ms = quota.window().as_millis() as u64;
        let window_start = now.saturating_sub(window_ms);
        let limit = quota.max_requests();

        let entry = storage.get(&self.storage_key(key)).await?;
        let timestamps = entry.and_then(|e| e.timestamps).unwrap_or_default();

        let filtered = self.filter_window(&timestamps, now, window_ms);
        let current_count = filtered.len() as u64;

        let remaining = limit.saturating_sub(current_count);
        let reset_epoch_ms = if let Some(&oldest) = filtered.first() {
            oldest + window_ms
        } else {
            now + window_ms
        };

        let info = RateLimitInfo::new(limit, remaining, reset_epoch_ms, window_start)
            .with_algorithm("sliding-window-log");

        Ok(if current_count < limit {
            Decision::allowed(info)
        } else {
            let oldest = filtered.first().copied().unwrap_or(now);
            let retry_ms = oldest + window_ms - now;
            Decision::denied(info.with_retry_after_s(retry_ms.div_ceil(1000)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_sliding_log_basic() {
        let algorithm = SlidingLog::new();
        let storage = MemoryStorage::new();
        let quota = Quota::per_minute(5);

        for i in 1..=5 {
            let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
            assert!(decision.is_allowed(), "Request {} should be allowed", i);
        }

        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_denied());
    }

    #[tokio::test]
    async fn test_sliding_log_precision() {
        let clock = crate::clock::TestClock::new(0);
        let algorithm = SlidingLog::with_clock(clock.clone());
        let storage = MemoryStorage::new();
        // 2 requests per 200ms
        let quota = Quota::new(2, Duration::from_millis(200));

        algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        clock.advance(50);
        algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();

        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_denied());

        // Advance past the first request's expiry from the window.
        clock.advance(200);

        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_sliding_log_window_edge() {
        let clock = crate::clock::TestClock::new(0);
        let algorithm = SlidingLog::with_clock(clock.clone());
        let storage = MemoryStorage::new();
        let quota = Quota::new(1, Duration::from_millis(30000));

        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_allowed());

        clock.set(29999);
        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_denied());

        clock.set(30000);
        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_sliding_log_algorithm_tag() {
        let algorithm = SlidingLog::new();
        let storage = MemoryStorage::new();
        let quota = Quota::per_minute(5);

        let decision = algorithm.check_and_record(&storage, "user:tag", &quota).await.unwrap();
        assert_eq!(decision.info().algorithm, Some("sliding-window-log"));
    }
}
