//! Rate limit manager for per-route configuration.
//!
//! The `RateLimitManager` allows you to configure different rate limits
//! for different routes or patterns, with optional default fallback.
//!
//! # Example
//!
//! ```ignore
//! use skp_ratelimit::{RateLimitManager, Quota, TokenBucket, MemoryStorage};
//!
//! let storage = MemoryStorage::new();
//! let manager = RateLimitManager::builder()
//!     .default_quota(Quota::per_second(10))
//!     .route("/api/search", Quota::per_minute(30))
//!     .route("/api/auth/login", Quota::per_minute(5))
//!     .route_pattern("/api/users/*", Quota::per_second(20))
//!     .build(TokenBucket::new(), storage);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::algorithm::Algorithm;
use crate::decision::Decision;
use crate::error::Result;
use crate::key::Key;
use crate::quota::Quota;
use crate::storage::Storage;

/// A rate limit configuration for a specific route.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// The quota for this route.
    pub quota: Quota,
    /// Optional custom key suffix.
    pub key_suffix: Option<String>,
}

impl RouteConfig {
    /// Create a new route config with the given quota.
    pub fn new(quota: Quota) -> Self {
        Self {
            quota,
            key_suffix: None,
        }
    }

    /// Add a custom key suffix.
    pub fn with_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_suffix = Some(suffix.into());
        self
    }
}

impl From<Quota> for RouteConfig {
    fn from(quota: Quota) -> Self {
        Self::new(quota)
    }
}

/// Manager for per-route rate limiting.
///
/// This provides a centralized way to configure different rate limits
/// for different routes or patterns.
pub struct RateLimitManager<A, S, K> {
    algorithm: A,
    storage: Arc<S>,
    key_extractor: K,
    default_quota: Option<Quota>,
    routes: HashMap<String, RouteConfig>,
    patterns: Vec<(String, RouteConfig)>,
}

impl<A, S, K> RateLimitManager<A, S, K>
where
    A: Algorithm,
    S: Storage,
{
    /// Create a new rate limit manager builder.
    pub fn builder() -> RateLimitManagerBuilder<K> {
        RateLimitManagerBuilder::new()
    }

    /// Check and record a request.
    pub async fn check_and_record<R>(&self, path: &str, request: &R) -> Result<Decision>
    where
        K: Key<R>,
    {
        let config = self.get_config(path);

        let Some(quota) = config.map(|c| &c.quota).or(self.default_quota.as_ref()) else {
            // No quota configured, allow the request
            let now = crate::storage::current_timestamp_ms();
            return Ok(Decision::allowed(crate::decision::RateLimitInfo::new(
                u64::MAX,
                u64::MAX,
                now + 3_600_000,
                now,
            )));
        };

        // Build the key
        let base_key = self.key_extractor.extract(request).unwrap_or_else(|| "unknown".to_string());
        let key = if let Some(suffix) = config.and_then(|c| c.key_suffix.as_ref()) {
            format!("{}:{}", base_key, suffix)
        } else {
            format!("{}:{}", base_key, path)
        };

        self.algorithm
            .check_and_record(&*self.storage, &key, quota)
            .await
    }

    /// Check without recording.
    pub async fn check<R>(&self, path: &str, request: &R) -> Result<Decision>
    where
        K: Key<R>,
    {
        let config = self.get_config(path);

        let Some(quota) = config.map(|c| &c.quota).or(self.default_quota.as_ref()) else {
            let now = crate::storage::current_timestamp_ms();
            return Ok(Decision::allowed(crate::decision::RateLimitInfo::new(
                u64::MAX,
                u64::MAX,
                now + 3_600_000,
                now,
            )));
        };

        let base_key = self.key_extractor.extract(request).unwrap_or_else(|| "unknown".to_string());
        let key = if let Some(suffix) = config.and_then(|c| c.key_suffix.as_ref()) {
            format!("{}:{}", base_key, suffix)
        } else {
            format!("{}:{}", base_key, path)
        };

        self.algorithm.check(&*self.storage, &key, quota).await
    }

    /// Get the configuration for a path.
    ///
    /// An exact route takes priority. Otherwise the matching pattern with the
    /// longest literal (non-wildcard) portion wins; ties are broken
    /// lexicographically by pattern string.
    fn get_config(&self, path: &str) -> Option<&RouteConfig> {
        if let Some(config) = self.routes.get(path) {
            return Some(config);
        }

        let mut best: Option<&(String, RouteConfig)> = None;
        for entry @ (pattern, _) in &self.patterns {
            if !pattern_matches(pattern, path) {
                continue;
            }
            best = Some(match best {
                None => entry,
                Some((best_pattern, _)) => {
                    let ordering = literal_length(pattern)
                        .cmp(&literal_length(best_pattern))
                        .then_with(|| best_pattern.cmp(pattern));
                    if ordering == std::cmp::Ordering::Greater {
                        entry
                    } else {
                        best.unwrap()
                    }
                }
            });
        }
        best.map(|(_, config)| config)
    }

    /// Reset rate limit for a specific key.
    pub async fn reset(&self, key: &str) -> Result<()> {
        self.algorithm.reset(&*self.storage, key).await
    }
}

/// Check if a glob pattern matches a path.
///
/// - `?` matches exactly one character within a path segment (never `/`).
/// - `*` matches zero or more characters within a single path segment.
/// - `**` matches zero or more characters across segment boundaries.
pub(crate) fn pattern_matches(pattern: &str, path: &str) -> bool {
    glob_match(pattern.as_bytes(), path.as_bytes())
}

fn glob_match(pattern: &[u8], path: &[u8]) -> bool {
    match pattern.first() {
        None => path.is_empty(),
        Some(b'?') => {
            matches!(path.first(), Some(&c) if c != b'/') && glob_match(&pattern[1..], &path[1..])
        }
        Some(b'*') if pattern.get(1) == Some(&b'*') => {
            // `**`: try every split point, including across `/`.
            (0..=path.len()).any(|k| glob_match(&pattern[2..], &path[k..]))
        }
        Some(b'*') => {
            // `*`: try every split point within the current segment only.
            let segment_end = path.iter().position(|&c| c == b'/').unwrap_or(path.len());
            (0..=segment_end).any(|k| glob_match(&pattern[1..], &path[k..]))
        }
        Some(&c) => {
            matches!(path.first(), Some(&p) if p == c) && glob_match(&pattern[1..], &path[1..])
        }
    }
}

/// Length of a pattern's literal (non-wildcard) portion, used to rank
/// multiple matching patterns by specificity.
pub(crate) fn literal_length(pattern: &str) -> usize {
    pattern.chars().filter(|c| *c != '*' && *c != '?').count()
}

/// Builder for RateLimitManager.
pub struct RateLimitManagerBuilder<K> {
    default_quota: Option<Quota>,
    routes: HashMap<String, RouteConfig>,
    patterns: Vec<(String, RouteConfig)>,
    key_extractor: Option<K>,
}

impl<K> Default for RateLimitManagerBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RateLimitManagerBuilder<K> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            default_quota: None,
            routes: HashMap::new(),
            patterns: Vec::new(),
            key_extractor: None,
        }
    }

    /// Set the default quota for routes without specific configuration.
    pub fn default_quota(mut self, quota: Quota) -> Self {
        self.default_quota = Some(quota);
        self
    }

    /// Add a rate limit for a specific route.
    pub fn route(mut self, path: impl Into<String>, config: impl Into<RouteConfig>) -> Self {
        self.routes.insert(path.into(), config.into());
        self
    }

    /// Add a rate limit for a route pattern.
    ///
    /// Patterns support `*` for single segment and `**` for multiple segments.
    pub fn route_pattern(
        mut self,
        pattern: impl Into<String>,
        config: impl Into<RouteConfig>,
    ) -> Self {
        self.patterns.push((pattern.into(), config.into()));
        self
    }

    /// Set the key extractor.
    pub fn key_extractor(mut self, extractor: K) -> Self {
        self.key_extractor = Some(extractor);
        self
    }

    /// Build the manager with the given algorithm and storage.
    pub fn build<A, S>(self, algorithm: A, storage: S) -> RateLimitManager<A, S, K>
    where
        K: Default,
    {
        RateLimitManager {
            algorithm,
            storage: Arc::new(storage),
            key_extractor: self.key_extractor.unwrap_or_default(),
            default_quota: self.default_quota,
            routes: self.routes,
            patterns: self.patterns,
        }
    }

    /// Build the manager with a specific key extractor.
    pub fn build_with_key<A, S>(
        self,
        algorithm: A,
        storage: S,
        key_extractor: K,
    ) -> RateLimitManager<A, S, K> {
        RateLimitManager {
            algorithm,
            storage: Arc::new(storage),
            key_extractor,
            default_quota: self.default_quota,
            routes: self.routes,
            patterns: self.patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches_exact() {
        assert!(pattern_matches("/api/users", "/api/users"));
        assert!(!pattern_matches("/api/users", "/api/posts"));
    }

    #[test]
    fn test_pattern_matches_single_wildcard() {
        assert!(pattern_matches("/api/*/posts", "/api/users/posts"));
        assert!(pattern_matches("/api/*/posts", "/api/admins/posts"));
        assert!(!pattern_matches("/api/*/posts", "/api/users/comments"));
    }

    #[test]
    fn test_pattern_matches_double_wildcard() {
        assert!(pattern_matches("/api/**", "/api/users"));
        assert!(pattern_matches("/api/**", "/api/users/123/posts"));
        assert!(!pattern_matches("/api/**", "/v2/api/users"));
    }

    #[test]
    fn test_pattern_matches_question_mark() {
        assert!(pattern_matches("/api/v?/users", "/api/v1/users"));
        assert!(pattern_matches("/api/v?/users", "/api/v2/users"));
        assert!(!pattern_matches("/api/v?/users", "/api/v10/users"));
        assert!(!pattern_matches("/api/v?/users", "/api//users"));
    }

    #[cfg(feature = "memory")]
    #[test]
    fn test_longest_pattern_wins() {
        use crate::key::StaticKey;
        use crate::storage::MemoryStorage;
        use crate::algorithm::TokenBucket;

        let manager = RateLimitManager::builder()
            .route_pattern("/api/**", Quota::per_minute(100))
            .route_pattern("/api/users/*", Quota::per_minute(10))
            .build_with_key(TokenBucket::new(), MemoryStorage::new(), StaticKey::new("k"));

        let config = manager.get_config("/api/users/42");
        assert_eq!(config.unwrap().quota.max_requests(), 10);
    }

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length("/api/users"), 10);
        assert_eq!(literal_length("/api/*/posts"), 11);
        assert_eq!(literal_length("/api/**"), 5);
    }

    #[test]
    fn test_route_config_from_quota() {
        let config: RouteConfig = Quota::per_minute(60).into();
        assert_eq!(config.quota.max_requests(), 60);
        assert!(config.key_suffix.is_none());
    }
}
