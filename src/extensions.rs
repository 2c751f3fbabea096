//! Request extensions for accessing rate limit info in handlers.
//!
//! This module provides extension types that can be injected into
//! request handlers to access rate limit information.
//!
//! # Example
//!
//! ```ignore
//! use axum::Extension;
//! use skp_ratelimit::extensions::RateLimitExt;
//!
//! async fn handler(Extension(rate_limit): Extension<RateLimitExt>) {
//!     println!("Remaining: {}", rate_limit.remaining);
//! }
//! ```

use chrono::{TimeZone, Utc};

use crate::decision::Decision;
use crate::quota::Quota;

/// Rate limit information available via request extensions.
///
/// This is automatically added to requests when using the rate limit middleware.
#[derive(Debug, Clone)]
pub struct RateLimitExt {
    /// The key used for rate limiting this request.
    pub key: String,
    /// The quota applied to this request.
    pub quota: Quota,
    /// The rate limit decision.
    pub decision: Decision,
    /// Whether the request was allowed.
    pub allowed: bool,
    /// Remaining requests in the current window.
    pub remaining: u64,
    /// Maximum requests allowed.
    pub limit: u64,
    /// Epoch seconds (UTC) at which the window resets.
    pub reset_epoch_s: u64,
}

impl RateLimitExt {
    /// Create a new rate limit extension from a decision.
    pub fn new(key: impl Into<String>, quota: Quota, decision: Decision) -> Self {
        let info = decision.info();
        Self {
            key: key.into(),
            allowed: decision.is_allowed(),
            remaining: info.remaining,
            limit: info.limit,
            reset_epoch_s: info.reset_epoch_s(),
            quota,
            decision,
        }
    }

    /// Check if the request was allowed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Check if the request was denied.
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }
}

/// Rate limit info that can be serialized to JSON.
///
/// Useful for returning rate limit information in API responses.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimitResponse {
    /// Whether the request was allowed.
    pub allowed: bool,
    /// Maximum requests allowed per window.
    pub limit: u64,
    /// Remaining requests in current window.
    pub remaining: u64,
    /// Epoch seconds (UTC) at which the rate limit resets.
    pub reset_in_seconds: u64,
    /// Seconds to wait before retrying, present only when denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl From<&RateLimitExt> for RateLimitResponse {
    fn from(ext: &RateLimitExt) -> Self {
        Self {
            allowed: ext.allowed,
            limit: ext.limit,
            remaining: ext.remaining,
            reset_in_seconds: ext.reset_epoch_s,
            retry_after_seconds: ext.decision.info().retry_after_s,
        }
    }
}

/// Body of the standard 429 response, matching the deny-body contract.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimitErrorBody {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub timestamp: u64,
    #[serde(rename = "rateLimit")]
    pub rate_limit: RateLimitErrorDetail,
}

/// The `rateLimit` object nested in [`RateLimitErrorBody`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimitErrorDetail {
    pub algorithm: String,
    #[serde(rename = "resetTime")]
    pub reset_time: u64,
    #[serde(rename = "retryAfter")]
    pub retry_after: u64,
    #[serde(rename = "resetTimeFormatted")]
    pub reset_time_formatted: String,
}

impl RateLimitErrorBody {
    /// Build the deny body from a denied decision and the current time.
    ///
    /// `now_epoch_ms` is passed in rather than read from the system clock so
    /// callers can reuse the same timestamp they used for the decision.
    pub fn from_decision(decision: &Decision, now_epoch_ms: u64) -> Self {
        let info = decision.info();
        let reset_time = info.reset_epoch_ms;
        let reset_time_formatted = Utc
            .timestamp_millis_opt(reset_time as i64)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        Self {
            error: "Too Many Requests".to_string(),
            message: "Rate limit exceeded. Please try again later.".to_string(),
            status: 429,
            timestamp: now_epoch_ms,
            rate_limit: RateLimitErrorDetail {
                algorithm: info.algorithm.unwrap_or("unknown").to_string(),
                reset_time,
                retry_after: info.retry_after_seconds(),
                reset_time_formatted,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::RateLimitInfo;

    #[test]
    fn test_rate_limit_ext() {
        let info = RateLimitInfo::new(100, 50, 60_000, 0);
        let decision = Decision::allowed(info);
        let quota = Quota::per_minute(100);

        let ext = RateLimitExt::new("user:123", quota, decision);

        assert!(ext.is_allowed());
        assert!(!ext.is_denied());
        assert_eq!(ext.remaining, 50);
        assert_eq!(ext.limit, 100);
    }

    #[test]
    fn test_rate_limit_response_serialization() {
        let info = RateLimitInfo::new(100, 0, 30_000, 0).with_retry_after_s(30);
        let decision = Decision::denied(info);
        let quota = Quota::per_minute(100);

        let ext = RateLimitExt::new("user:123", quota, decision);
        let response: RateLimitResponse = (&ext).into();

        assert!(!response.allowed);
        assert_eq!(response.limit, 100);
        assert_eq!(response.remaining, 0);
        assert_eq!(response.retry_after_seconds, Some(30));
    }

    #[test]
    fn test_rate_limit_error_body() {
        let info = RateLimitInfo::new(100, 0, 90_000, 60_000)
            .with_retry_after_s(30)
            .with_algorithm("token-bucket");
        let decision = Decision::denied(info);

        let body = RateLimitErrorBody::from_decision(&decision, 60_000);

        assert_eq!(body.status, 429);
        assert_eq!(body.rate_limit.algorithm, "token-bucket");
        assert_eq!(body.rate_limit.reset_time, 90_000);
        assert_eq!(body.rate_limit.retry_after, 30);
        assert_eq!(body.rate_limit.reset_time_formatted, "1970-01-01 00:01:30");
    }
}
