//! Sliding Window Counter rate limiting algorithm.
//!
//! Generalizes the classic "weighted current + previous window" formula:
//! requests are tracked in fixed-size sub-buckets (`window_ms / sub_windows`
//! wide) so the previous window's count can be reconstructed exactly rather
//! than approximated as one opaque total, but the decay applied to it is
//! still the whole-window decay from the two-window formula — a sub-bucket
//! fully inside the current (epoch-aligned) window counts in full, one
//! inside the previous window counts at weight `1 - p` where `p` is how far
//! `now` has moved into the current window. At `sub_windows = 2` this is
//! algebraically identical to the two-window formula.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::algorithm::Algorithm;
use crate::clock::{Clock, SystemClock};
use crate::decision::{Decision, RateLimitInfo};
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::{Storage, StorageEntry};

/// Sliding Window Counter rate limiting algorithm.
#[derive(Clone)]
pub struct SlidingWindow {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SlidingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindow").finish()
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindow {
    /// Create a new Sliding Window algorithm instance using the system clock.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a new Sliding Window algorithm instance driven by a custom clock.
    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn bucket_width_ms(&self, window_ms: u64, sub_windows: u32) -> u64 {
        (window_ms / sub_windows as u64).max(1)
    }

    fn bucket_start(&self, ts: u64, bucket_width: u64) -> u64 {
        (ts / bucket_width) * bucket_width
    }

    /// Start of the epoch-aligned window of width `window_ms` containing `now`.
    fn current_window_start(&self, now: u64, window_ms: u64) -> u64 {
        (now / window_ms) * window_ms
    }

    /// Drop sub-buckets that have rotated out of both the current and
    /// previous window.
    fn prune(&self, buckets: &mut BTreeMap<u64, u64>, prev_window_start: u64) {
        buckets.retain(|&start, _| start >= prev_window_start);
    }

    /// Weighted estimate of requests within the current sliding window,
    /// per the two-window formula: the current (epoch-aligned) window's
    /// count is exact, the previous window's count decays as `now` moves
    /// through the current window.
    fn weighted_count(
        &self,
        buckets: &BTreeMap<u64, u64>,
        current_window_start: u64,
        prev_window_start: u64,
        window_ms: u64,
        now: u64,
    ) -> f64 {
        let p = (now - current_window_start) as f64 / window_ms as f64;

        buckets
            .iter()
            .map(|(&start, &count)| {
                if start >= current_window_start {
                    count as f64
                } else if start >= prev_window_start {
                    count as f64 * (1.0 - p)
                } else {
                    0.0
                }
            })
            .sum()
    }
}

impl Algorithm for SlidingWindow {
    fn name(&self) -> &'static str {
        "sliding-window-counter"
    }

    fn storage_key(&self, key: &str) -> String {
        format!("sliding_window_counter:{key}")
    }

    async fn check_and_record<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let now = self.now_ms();
        let window_ms = quota.window().as_millis() as u64;
        let sub_windows = quota.effective_sub_windows();
        let bucket_width = self.bucket_width_ms(window_ms, sub_windows);
        let current_window_start = self.current_window_start(now, window_ms);
        let prev_window_start = current_window_start.saturating_sub(window_ms);
        let reset_epoch_ms = current_window_start + window_ms;
        let ttl = Duration::from_millis(window_ms + bucket_width);
        let limit = quota.max_requests();
        let storage_key = self.storage_key(key);

        let decision = storage
            .execute_atomic(&storage_key, ttl, |entry| {
                let mut buckets = entry.map(|e| e.sub_buckets_or_default()).unwrap_or_default();
                self.prune(&mut buckets, prev_window_start);

                let weighted = self.weighted_count(
                    &buckets,
                    current_window_start,
                    prev_window_start,
                    window_ms,
                    now,
                );

                if (weighted as u64) < limit {
                    let current_bucket = self.bucket_start(now, bucket_width);
                    *buckets.entry(current_bucket).or_insert(0) += 1;

                    let remaining = (limit as f64 - weighted - 1.0).max(0.0) as u64;
                    let new_entry = StorageEntry::with_sub_buckets(buckets);
                    let info =
                        RateLimitInfo::new(limit, remaining, reset_epoch_ms, current_window_start)
                            .with_algorithm("sliding-window-counter");

                    (new_entry, Decision::allowed(info))
                } else {
                    let retry_ms = reset_epoch_ms.saturating_sub(now).max(1);

                    let new_entry = StorageEntry::with_sub_buckets(buckets);
                    let info = RateLimitInfo::new(limit, 0, reset_epoch_ms, current_window_start)
                        .with_algorithm("sliding-window-counter")
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
        let current_window_start = self.current_window_start(now, window_ms);
        let prev_window_start = current_window_start.saturating_sub(window_ms);
        let reset_epoch_ms = current_window_start + window_ms;
        let limit = quota.max_requests();

        let entry = storage.get(&self.storage_key(key)).await?;
        let mut buckets = entry.map(|e| e.sub_buckets_or_default()).unwrap_or_default();
        self.prune(&mut buckets, prev_window_start);

        let weighted = self.weighted_count(
            &buckets,
            current_window_start,
            prev_window_start,
            window_ms,
            now,
        );
        let remaining = (limit as f64 - weighted).max(0.0) as u64;

        let info = RateLimitInfo::new(limit, remaining, reset_epoch_ms, current_window_start)
            .with_algorithm("sliding-window-counter");

        Ok(if (weighted as u64) < limit {
            Decision::allowed(info)
        } else {
            let retry_ms = reset_epoch_ms.saturating_sub(now).max(1);
            Decision::denied(info.with_retry_after_s(retry_ms.div_ceil(1000)))
        })
    }
}
