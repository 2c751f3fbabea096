//! Quota configuration for rate limiting.
//!
//! A `Quota` defines the rate limiting parameters: how many requests are allowed
//! over what time period, and optionally how much burst capacity is available.
//!
//! # Examples
//!
//! ```ignore
//! use skp_ratelimit::Quota;
//! use std::time::Duration;
//!
//! // 100 requests per minute
//! let quota = Quota::per_minute(100);
//!
//! // 100 requests per minute with burst of 150
//! let quota = Quota::per_minute(100).with_burst(150);
//!
//! // Custom: 50 requests per 30 seconds
//! let quota = Quota::new(50, Duration::from_secs(30));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// The algorithm a policy selects, as used by the engine registry and the
/// configuration surface. Distinct from any one engine's own type — this is
/// the tag carried by the immutable policy record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Token bucket: controlled bursts with a refilling allowance.
    TokenBucket,
    /// Leaky bucket: smooth constant output rate.
    LeakyBucket,
    /// Fixed window: simple counter reset on aligned boundaries.
    FixedWindow,
    /// Sliding window log: stores every admitted timestamp.
    SlidingLog,
    /// Sliding window counter: weighted estimate across two windows.
    SlidingCounter,
}

impl AlgorithmKind {
    /// The lowercase kebab-case tag reported in a `Decision` and in the
    /// `X-RateLimit-Algorithm` header.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TokenBucket => "token-bucket",
            Self::LeakyBucket => "leaky-bucket",
            Self::FixedWindow => "fixed-window",
            Self::SlidingLog => "sliding-window-log",
            Self::SlidingCounter => "sliding-window-counter",
        }
    }

    /// Parse a kebab-case or snake_case algorithm tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "token-bucket" | "token_bucket" => Some(Self::TokenBucket),
            "leaky-bucket" | "leaky_bucket" => Some(Self::LeakyBucket),
            "fixed-window" | "fixed_window" => Some(Self::FixedWindow),
            "sliding-window-log" | "sliding_log" | "sliding_window_log" => Some(Self::SlidingLog),
            "sliding-window-counter" | "sliding_counter" | "sliding_window_counter" => {
                Some(Self::SlidingCounter)
            }
            _ => None,
        }
    }

    /// A short human description, for the admin `algorithms` listing.
    pub fn description(&self) -> &'static str {
        match self {
            Self::TokenBucket => "Controlled bursts with a continuously refilling allowance",
            Self::LeakyBucket => "Smooths bursts into a constant output rate",
            Self::FixedWindow => "Counts requests within aligned, non-overlapping windows",
            Self::SlidingLog => "Tracks every request timestamp for precise window accounting",
            Self::SlidingCounter => {
                "Estimates a sliding window from weighted current/previous counters"
            }
        }
    }
}

/// Rate limiting quota configuration.
///
/// A quota defines the maximum number of requests allowed within a time window,
/// along with optional burst capacity for handling traffic spikes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    /// Maximum number of requests in the window.
    max_requests: u64,

    /// Time window duration.
    window: Duration,

    /// Maximum burst size (defaults to max_requests if not set).
    burst: Option<u64>,

    /// Refill rate for token-based algorithms (tokens per second).
    /// If not set, calculated from max_requests / window.
    refill_rate: Option<f64>,

    /// Which algorithm this quota is intended for. Engines are constructed
    /// directly in code and don't need this, but the config-driven admission
    /// pipeline and engine registry use it to pick an engine dynamically.
    kind: Option<AlgorithmKind>,

    /// Number of sub-buckets per window (sliding window counter only).
    sub_windows: Option<u32>,
}

impl Quota {
    /// Create a new quota with the given maximum requests and window.
    ///
    /// # Arguments
    ///
    /// * `max_requests` - Maximum requests allowed in the window
    /// * `window` - Duration of the rate limiting window
    ///
    /// # Panics
    ///
    /// Panics if `max_requests` is 0 or `window` is zero duration.
    pub fn new(max_requests: u64, window: Duration) -> Self {
        assert!(max_requests > 0, "max_requests must be greater than 0");
        assert!(!window.is_zero(), "window must be non-zero");

        Self {
            max_requests,
            window,
            burst: None,
            refill_rate: None,
            kind: None,
            sub_windows: None,
        }
    }

    /// Create a quota allowing `n` requests per second.
    pub fn per_second(n: u64) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// Create a quota allowing `n` requests per minute.
    pub fn per_minute(n: u64) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// Create a quota allowing `n` requests per hour.
    pub fn per_hour(n: u64) -> Self {
        Self::new(n, Duration::from_secs(3600))
    }

    /// Create a quota allowing `n` requests per day.
    pub fn per_day(n: u64) -> Self {
        Self::new(n, Duration::from_secs(86400))
    }

    /// Try to create a new quota, returning an error if invalid.
    pub fn try_new(max_requests: u64, window: Duration) -> Result<Self> {
        if max_requests == 0 {
            return Err(ConfigError::InvalidQuota("max_requests must be greater than 0".into()).into());
        }
        if window.is_zero() {
            return Err(ConfigError::InvalidQuota("window must be non-zero".into()).into());
        }
        Ok(Self {
            max_requests,
            window,
            burst: None,
            refill_rate: None,
            kind: None,
            sub_windows: None,
        })
    }

    /// Set the burst size (maximum requests that can be made instantly).
    ///
    /// Burst must be >= max_requests.
    pub fn with_burst(mut self, burst: u64) -> Self {
        self.burst = Some(burst.max(self.max_requests));
        self
    }

    /// Set a custom refill rate (tokens per second).
    ///
    /// If not set, the refill rate is calculated as `max_requests / window_seconds`.
    pub fn with_refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = Some(rate);
        self
    }

    /// Tag this quota with the algorithm it is meant to be used with.
    pub fn with_kind(mut self, kind: AlgorithmKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the number of sub-windows (sliding window counter only).
    pub fn with_sub_windows(mut self, sub_windows: u32) -> Self {
        self.sub_windows = Some(sub_windows);
        self
    }

    /// The algorithm kind this quota was tagged with, if any.
    pub fn kind(&self) -> Option<AlgorithmKind> {
        self.kind
    }

    /// Number of sub-windows to use for the sliding window counter,
    /// defaulting to 2 when unset.
    pub fn effective_sub_windows(&self) -> u32 {
        self.sub_windows.unwrap_or(2).max(1)
    }

    /// Get the maximum requests allowed per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Get the window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Get the effective burst size.
    ///
    /// Returns the configured burst, or `max_requests` if not set.
    pub fn effective_burst(&self) -> u64 {
        self.burst.unwrap_or(self.max_requests)
    }

    /// Get the effective refill rate (tokens per second).
    ///
    /// Returns the configured rate, or calculates from `max_requests / window_seconds`.
    pub fn effective_refill_rate(&self) -> f64 {
        self.refill_rate.unwrap_or_else(|| {
            self.max_requests as f64 / self.window.as_secs_f64()
        })
    }

    /// Calculate how long until a quota would be fully replenished.
    pub fn full_replenish_time(&self) -> Duration {
        self.window
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Builder for creating quotas with validation.
#[derive(Debug, Default)]
pub struct QuotaBuilder {
    max_requests: Option<u64>,
    window: Option<Duration>,
    burst: Option<u64>,
    refill_rate: Option<f64>,
    kind: Option<AlgorithmKind>,
    sub_windows: Option<u32>,
}

impl QuotaBuilder {
    /// Create a new quota builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum requests per window.
    pub fn max_requests(mut self, n: u64) -> Self {
        self.max_requests = Some(n);
        self
    }

    /// Set the window duration.
    pub fn window(mut self, duration: Duration) -> Self {
        self.window = Some(duration);
        self
    }

    /// Set the burst size.
    pub fn burst(mut self, n: u64) -> Self {
        self.burst = Some(n);
        self
    }

    /// Set the refill rate.
    pub fn refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = Some(rate);
        self
    }

    /// Set the algorithm kind.
    pub fn kind(mut self, kind: AlgorithmKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the number of sub-windows (sliding window counter only).
    pub fn sub_windows(mut self, sub_windows: u32) -> Self {
        self.sub_windows = Some(sub_windows);
        self
    }

    /// Build the quota, returning an error if invalid.
    pub fn build(self) -> Result<Quota> {
        let max_requests = self.max_requests
            .ok_or_else(|| ConfigError::MissingRequired("max_requests".into()))?;
        let window = self.window
            .ok_or_else(|| ConfigError::MissingRequired("window".into()))?;

        let mut quota = Quota::try_new(max_requests, window)?;

        if let Some(burst) = self.burst {
            quota = quota.with_burst(burst);
        }
        if let Some(rate) = self.refill_rate {
            quota = quota.with_refill_rate(rate);
        }
        if let Some(kind) = self.kind {
            quota = quota.with_kind(kind);
        }
        if let Some(sub_windows) = self.sub_windows {
            quota = quota.with_sub_windows(sub_windows);
        }

        Ok(quota)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_per_second() {
        let quota = Quota::per_second(10);
        assert_eq!(quota.max_requests(), 10);
        assert_eq!(quota.window(), Duration::from_secs(1));
        assert_eq!(quota.effective_burst(), 10);
        assert!((quota.effective_refill_rate() - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_quota_per_minute() {
        let quota = Quota::per_minute(60);
        assert_eq!(quota.max_requests(), 60);
        assert_eq!(quota.window(), Duration::from_secs(60));
        assert!((quota.effective_refill_rate() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_quota_with_burst() {
        let quota = Quota::per_minute(60).with_burst(100);
        assert_eq!(quota.max_requests(), 60);
        assert_eq!(quota.effective_burst(), 100);
    }

    #[test]
    fn test_quota_burst_minimum() {
        // Burst should be at least max_requests
        let quota = Quota::per_minute(60).with_burst(30);
        assert_eq!(quota.effective_burst(), 60);
    }

    #[test]
    fn test_quota_builder() {
        let quota = QuotaBuilder::new()
            .max_requests(100)
            .window(Duration::from_secs(60))
            .burst(150)
            .build()
            .unwrap();

        assert_eq!(quota.max_requests(), 100);
        assert_eq!(quota.window(), Duration::from_secs(60));
        assert_eq!(quota.effective_burst(), 150);
    }

    #[test]
    fn test_quota_builder_missing_fields() {
        let result = QuotaBuilder::new()
            .max_requests(100)
            .build();
        assert!(result.is_err());

        let result = QuotaBuilder::new()
            .window(Duration::from_secs(60))
            .build();
        assert!(result.is_err());
    }

    #[test]
    #[should_panic]
    fn test_quota_zero_requests_panics() {
        Quota::new(0, Duration::from_secs(60));
    }

    #[test]
    #[should_panic]
    fn test_quota_zero_window_panics() {
        Quota::new(100, Duration::ZERO);
    }

    #[test]
    fn test_quota_with_kind_and_sub_windows() {
        let quota = Quota::per_minute(60)
            .with_kind(AlgorithmKind::SlidingCounter)
            .with_sub_windows(4);
        assert_eq!(quota.kind(), Some(AlgorithmKind::SlidingCounter));
        assert_eq!(quota.effective_sub_windows(), 4);
    }

    #[test]
    fn test_quota_default_sub_windows() {
        let quota = Quota::per_minute(60);
        assert_eq!(quota.effective_sub_windows(), 2);
    }

    #[test]
    fn test_algorithm_kind_tag_roundtrip() {
        for kind in [
            AlgorithmKind::TokenBucket,
            AlgorithmKind::LeakyBucket,
            AlgorithmKind::FixedWindow,
            AlgorithmKind::SlidingLog,
            AlgorithmKind::SlidingCounter,
        ] {
            assert_eq!(AlgorithmKind::from_tag(kind.tag()), Some(kind));
        }
    }
}
