//! Modular rate limiting and admission-control library for Rust.
//!
//! `skp_ratelimit` provides a comprehensive admission-control solution with:
//!
//! - **Five Algorithms**: Token Bucket, Leaky Bucket, Fixed Window, Sliding
//!   Window Log, and Sliding Window Counter
//! - **Pluggable Storage**: In-memory with GC, Redis with connection pooling
//! - **Per-Route Quotas**: Different limits for different endpoints
//! - **Composite Keys**: Rate limit by IP + Path, User + API Key, etc.
//! - **Framework Integration**: Axum and Actix-web middleware
//!
//! # Quick Start
//!
//! ```ignore
//! use skp_ratelimit::{TokenBucket, Quota, MemoryStorage, Algorithm};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Create storage and algorithm
//!     let storage = MemoryStorage::new();
//!     let algorithm = TokenBucket::new();
//!     let quota = Quota::per_second(10).with_burst(15);
//!
//!     // Check and record a request
//!     let decision = algorithm.check_and_record(&storage, "user:123", &quota).await.unwrap();
//!
//!     if decision.is_allowed() {
//!         println!("Request allowed! {} remaining", decision.info().remaining);
//!     } else {
//!         println!("Rate limited! Retry after {}s", decision.info().retry_after_seconds());
//!     }
//! }
//! ```
//!
//! # Algorithms
//!
//! | Algorithm | Best For | Memory | Feature Flag |
//! |-----------|----------|--------|--------------|
//! | Token Bucket | Bursty traffic | Low | default |
//! | Leaky Bucket | Smooth output | Low | `leaky-bucket` |
//! | Fixed Window | Simple use cases | Low | default |
//! | Sliding Window Log | Precision critical | High | `sliding-log` |
//! | Sliding Window Counter | General purpose | Low | default |
//!
//! # Feature Flags
//!
//! - `memory` (default): In-memory storage with garbage collection
//! - `redis`: Redis storage backend
//! - `axum`: Axum middleware integration
//! - `actix`: Actix-web middleware integration
//! - `leaky-bucket`: Leaky Bucket algorithm
//! - `sliding-log`: Sliding Window Log algorithm

pub mod admin;
pub mod algorithm;
pub mod clock;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod extensions;
pub mod headers;
pub mod key;
pub mod manager;
pub mod pipeline;
pub mod quota;
pub mod storage;

#[cfg(feature = "axum")]
pub mod middleware;

// Re-export main types
pub use admin::AdminApi;
pub use algorithm::Algorithm;
pub use clock::{Clock, SystemClock, TestClock};
pub use config::{RateLimiterConfig, ValidatedConfig};
pub use decision::{Decision, DecisionMetadata, RateLimitInfo};
pub use engine::{AnyAlgorithm, EngineRegistry};
pub use error::{ConfigError, ConnectionError, FailMode, RateLimitError, Result, StorageError};
pub use key::{CompositeKey, FnKey, GlobalKey, Key, StaticKey};
pub use manager::{RateLimitManager, RateLimitManagerBuilder, RouteConfig};
pub use pipeline::{AdmissionPipeline, ExclusionList};
pub use quota::{AlgorithmKind, Quota, QuotaBuilder};
pub use storage::{Storage, StorageEntry};

// Re-export extensions and headers
pub use extensions::{RateLimitExt, RateLimitResponse};
pub use headers::RateLimitHeaders;

// Re-export algorithms
pub use algorithm::{FixedWindow, SlidingWindow, TokenBucket};

#[cfg(feature = "leaky-bucket")]
pub use algorithm::LeakyBucket;

#[cfg(feature = "sliding-log")]
pub use algorithm::SlidingLog;

// Re-export storage types
#[cfg(feature = "memory")]
pub use storage::{GcConfig, GcInterval, MemoryStorage};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::admin::AdminApi;
    pub use crate::algorithm::Algorithm;
    pub use crate::clock::{Clock, SystemClock, TestClock};
    pub use crate::config::RateLimiterConfig;
    pub use crate::decision::{Decision, RateLimitInfo};
    pub use crate::engine::{AnyAlgorithm, EngineRegistry};
    pub use crate::error::{FailMode, RateLimitError, Result};
    pub use crate::pipeline::AdmissionPipeline;
    pub use crate::quota::{AlgorithmKind, Quota};
    pub use crate::storage::Storage;

    pub use crate::algorithm::{FixedWindow, SlidingWindow, TokenBucket};

    #[cfg(feature = "leaky-bucket")]
    pub use crate::algorithm::LeakyBucket;

    #[cfg(feature = "sliding-log")]
    pub use crate::algorithm::SlidingLog;

    #[cfg(feature = "memory")]
    pub use crate::storage::{GcConfig, GcInterval, MemoryStorage};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_integration_fixed_window() {
        use crate::prelude::*;

        let storage = MemoryStorage::new();
        let algorithm = FixedWindow::new();
        let quota = Quota::per_second(5);

        // Should allow exactly `capacity` requests within the window.
        for i in 1..=5 {
            let decision = algorithm
                .check_and_record(&storage, "user:1", &quota)
                .await
                .unwrap();
            assert!(decision.is_allowed(), "Request {} should be allowed", i);
        }

        // Should deny once the window is exhausted.
        let decision = algorithm
            .check_and_record(&storage, "user:1", &quota)
            .await
            .unwrap();
        assert!(decision.is_denied());
        assert!(decision.info().retry_after_s.is_some());
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_integration_token_bucket() {
        let storage = MemoryStorage::new();
        let algorithm = TokenBucket::new();
        let quota = Quota::per_minute(60).with_burst(10);

        let decision = algorithm
            .check_and_record(&storage, "user:1", &quota)
            .await
            .unwrap();

        assert!(decision.is_allowed());
        assert_eq!(decision.info().remaining, 9);
        assert_eq!(decision.info().algorithm, Some("token-bucket"));
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_integration_headers() {
        let storage = MemoryStorage::new();
        let algorithm = FixedWindow::new();
        let quota = Quota::per_minute(100);

        let decision = algorithm
            .check_and_record(&storage, "user:1", &quota)
            .await
            .unwrap();

        let headers = decision.info().to_headers();
        assert!(headers.iter().any(|(k, _)| *k == "X-RateLimit-Limit"));
        assert!(headers.iter().any(|(k, _)| *k == "X-RateLimit-Remaining"));
        assert!(headers.iter().any(|(k, _)| *k == "X-RateLimit-Reset"));
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_integration_config_driven_admission() {
        use crate::prelude::*;

        let toml_str = r#"
            default_algorithm = "fixed-window"

            [algorithms.fixed-window]
            capacity = 3
            window_ms = 60000

            [url_patterns."/api/auth/**"]
            algorithm = "token-bucket"
            capacity = 1
            window_ms = 60000
        "#;
        let config = RateLimiterConfig::load(toml_str).unwrap();

        let pipeline = AdmissionPipeline::from_config(
            config,
            MemoryStorage::new(),
            crate::key::StaticKey::new("user:1"),
        );

        let decision = pipeline
            .admit("/api/auth/login", &())
            .await
            .unwrap()
            .unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.info().algorithm, Some("token-bucket"));

        let denied = pipeline
            .admit("/api/auth/login", &())
            .await
            .unwrap()
            .unwrap();
        assert!(denied.is_denied());
    }
}
