//! Fixed Window rate limiting algorithm.
//!
//! Counts requests within aligned, non-overlapping windows. Simple and cheap,
//! but allows up to `2 * capacity` requests across a window boundary.

use std::sync::Arc;
use std::time::Duration;

use crate::algorithm::Algorithm;
use crate::clock::{Clock, SystemClock};
use crate::decision::{Decision, RateLimitInfo};
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::{Storage, StorageEntry};

/// Fixed Window rate limiting algorithm.
#[derive(Clone)]
pub struct FixedWindow {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for FixedWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindow").finish()
    }
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedWindow {
    /// Create a new Fixed Window algorithm instance using the system clock.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a new Fixed Window algorithm instance driven by a custom clock.
    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn window_start(&self, now: u64, window_ms: u64) -> u64 {
        (now / window_ms) * window_ms
    }
}

impl Algorithm for FixedWindow {
    fn name(&self) -> &'static str {
        "fixed-window"
    }

    fn storage_key(&self, key: &str) -> String {
        format!("fixed_window:{key}")
    }

    async fn check_and_record<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let now = self.now_ms();
        let window_ms = quota.window().as_millis() as u64;
        let window_start = self.window_start(now, window_ms);
        let ttl = Duration::from_millis(window_ms * 2);
        let capacity = quota.max_requests();
        let storage_key = self.storage_key(key);

        let decision = storage
            .execute_atomic(&storage_key, ttl, |entry| {
                let count = match entry {
                    Some(e) if e.window_start == window_start => e.count,
                    _ => 0,
                };

                if count < capacity {
                    let new_entry = StorageEntry::new(count + 1, window_start);
                    let remaining = capacity - count - 1;
                    let info = RateLimitInfo::new(
                        capacity,
                        remaining,
                        window_start + window_ms,
                        window_start,
                    )
                    .with_algorithm("fixed-window");

                    (new_entry, Decision::allowed(info))
                } else {
                    let new_entry = StorageEntry::new(count, window_start);
                    let retry_ms = (window_start + window_ms).saturating_sub(now).max(1);
                    let info = RateLimitInfo::new(
                        capacity,
                        0,
                        window_start + window_ms,
                        window_start,
                    )
                    .with_algorithm("fixed-window")
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
        let window_start = self.window_start(now, window_ms);
        let capacity = quota.max_requests();

        let entry = storage.get(&self.storage_key(key)).await?;
        let count = match entry {
            Some(e) if e.window_start == window_start => e.count,
            _ => 0,
        };

        let remaining = capacity.saturating_sub(count);
        let info = RateLimitInfo::new(capacity, remaining, window_start + window_ms, window_start)
            .with_algorithm("fixed-window");

        Ok(if count < capacity {
            Decision::allowed(info)
        } else {
            let retry_ms = (window_start + window_ms).saturating_sub(now).max(1);
            Decision::denied(info.with_retry_after_s(retry_ms.div_ceil(1000)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_fixed_window_basic() {
        let algorithm = FixedWindow::new();
        let storage = MemoryStorage::new();
        let quota = Quota::per_minute(5);

        for i in 1..=5 {
            let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
            assert!(decision.is_allowed(), "Request {} should be allowed", i);
        }

        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_denied());
        assert!(decision.info().retry_after_s.is_some());
    }

    #[tokio::test]
    async fn test_fixed_window_resets_on_boundary() {
        let clock = crate::clock::TestClock::new(0);
        let algorithm = FixedWindow::with_clock(clock.clone());
        let storage = MemoryStorage::new();
        let quota = Quota::new(2, Duration::from_millis(150));

        algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();

        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_denied());

        clock.advance(200);

        let decision = algorithm.check_and_record(&storage, "user:1", &quota).await.unwrap();
        assert!(decision.is_allowed(), "new window should reset the counter");

        let peek = algorithm.check(&storage, "user:1", &quota).await.unwrap();
        assert_eq!(peek.info().remaining, 1);
    }

    #[tokio::test]
    async fn test_fixed_window_algorithm_tag() {
        let algorithm = FixedWindow::new();
        let storage = MemoryStorage::new();
        let quota = Quota::per_minute(5);

        let decision = algorithm.check_and_record(&storage, "user:tag", &quota).await.unwrap();
        assert_eq!(decision.info().algorithm, Some("fixed-window"));
    }
}
