//! Leaky Bucket rate limiting algorithm.
//!
//! The Leaky Bucket algorithm smooths out bursty traffic by processing
//! requests at a constant rate, like water leaking from a bucket.

use std::sync::Arc;
use std::time::Duration;

use crate::algorithm::Algorithm;
use crate::clock::{Clock, SystemClock};
use crate::decision::{Decision, DecisionMetadata, RateLimitInfo};
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::{Storage, StorageEntry};

/// Leaky Bucket rate limiting algorithm.
///
/// Enforces a constant output rate regardless of input bursts.
/// Requests that would overflow the bucket are rejected.
#[derive(Clone)]
pub struct LeakyBucket {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LeakyBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeakyBucket").finish()
    }
}

impl Default for LeakyBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl LeakyBucket {
    /// Create a new Leaky Bucket algorithm instance using the system clock.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a new Leaky Bucket algorithm instance driven by a custom clock.
    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Calculate how much has "leaked" based on elapsed time.
    fn calculate_leak(&self, elapsed_ms: u64, leak_rate: f64) -> f64 {
        let elapsed_secs = elapsed_ms as f64 / 1000.0;
        elapsed_secs * leak_rate
    }
}

impl Algorithm for LeakyBucket {
    fn name(&self) -> &'static str {
        "leaky-bucket"
    }

    fn storage_key(&self, key: &str) -> String {
        format!("leaky_bucket:{key}")
    }

    async fn check_and_record<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        let now = self.now_ms();
        let max_level = quota.effective_burst() as f64;
        let leak_rate = quota.effective_refill_rate(); // drops leak out per second

        let ttl_ms = ((max_level / leak_rate) * 1000.0 * 2.0) as u64;
        let ttl = Duration::from_millis(ttl_ms.max(1000));
        let storage_key = self.storage_key(key);

        let decision = storage
            .execute_atomic(&storage_key, ttl, |entry| {
                let (mut level, last_update) = match entry {
                    Some(e) => (e.tokens.unwrap_or(0.0), e.last_update),
                    None => (0.0, now),
                };

                if now > last_update {
                    let elapsed = now - last_update;
                    let leaked = self.calculate_leak(elapsed, leak_rate);
                    level = (level - leaked).max(0.0);
                }

                if level + 1.0 <= max_level {
                    level += 1.0;
                    let new_entry = StorageEntry::with_tokens(level, now);

                    let remaining = (max_level - level).floor() as u64;
                    let drain_ms = (level / leak_rate * 1000.0).ceil() as u64;

                    let info = RateLimitInfo::new(max_level as u64, remaining, now + drain_ms, now)
                        .with_algorithm("leaky-bucket")
                        .with_metadata(DecisionMetadata::new().with_tokens_available(max_level - level));

                    (new_entry, Decision::allowed(info))
                } else {
                    let new_entry = StorageEntry::with_tokens(level, now);

                    let wait_ms = ((level + 1.0 - max_level) / leak_rate * 1000.0).ceil() as u64;

                    let info = RateLimitInfo::new(max_level as u64, 0, now + wait_ms, now)
                        .with_algorithm("leaky-bucket")
                        .with_retry_after_s(wait_ms.div_ceil(1000));

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
        let max_level = quota.effective_burst() as f64;
        let leak_rate = quota.effective_refill_rate();

        let entry = storage.get(&self.storage_key(key)).await?;

        let (mut level, last_update) = match entry {
            Some(e) => (e.tokens.unwrap_or(0.0), e.last_update),
            None => (0.0, now),
        };

        if now > last_update {
            let elapsed = now - last_update;
            let leaked = self.calculate_leak(elapsed, leak_rate);
            level = (level - leaked).max(0.0);
        }

        let remaining = (max_level - level).floor() as u64;
        let drain_ms = (level / leak_rate * 1000.0).ceil() as u64;

        let info = RateLimitInfo::new(max_level as u64, remaining, now + drain_ms, now)
            .with_algorithm("leaky-bucket");

        Ok(if level + 1.0 <= max_level {
            Decision::allowed(info)
        } else {
            let wait_ms = ((level + 1.0 - max_level) / leak_rate * 1000.0).ceil() as u64;
            Decision::denied(info.with_retry_after_s(wait_ms.div_ceil(1000)))
        })
    }
}
