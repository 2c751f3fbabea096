//! Engine registry: constructs and memoizes algorithm engines by their
//! policy parameters, so that two routes sharing the same `(kind, capacity,
//! rate, window_ms, sub_windows)` reuse a single engine instance instead of
//! duplicating state.
//!
//! This is the dynamic counterpart to picking a concrete `Algorithm` type at
//! compile time: the registry resolves an [`AlgorithmKind`] tag (as carried
//! by a [`Quota`] or loaded from configuration) to a boxed engine at
//! runtime, dispatched through [`AnyAlgorithm`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::algorithm::{Algorithm, FixedWindow, SlidingWindow, TokenBucket};
#[cfg(feature = "leaky-bucket")]
use crate::algorithm::LeakyBucket;
#[cfg(feature = "sliding-log")]
use crate::algorithm::SlidingLog;
use crate::decision::Decision;
use crate::error::{ConfigError, Result};
use crate::quota::{AlgorithmKind, Quota};
use crate::storage::Storage;

/// A single registry key: the algorithm kind plus the quota parameters that
/// determine an engine's behavior. Two policies with identical values here
/// are backed by the same engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegistryKey {
    kind: AlgorithmKind,
    capacity: u64,
    burst: u64,
    window_ms: u64,
    sub_windows: u32,
}

impl RegistryKey {
    fn from_quota(kind: AlgorithmKind, quota: &Quota) -> Self {
        Self {
            kind,
            capacity: quota.max_requests(),
            burst: quota.effective_burst(),
            window_ms: quota.window().as_millis() as u64,
            sub_windows: quota.effective_sub_windows(),
        }
    }
}

/// Runtime enum dispatcher over the five engine implementations.
///
/// Unlike a generic `Algorithm` type parameter, this lets a single
/// [`EngineRegistry`] hold engines of different kinds side by side, as
/// required when different routes select different algorithms at
/// configuration time rather than compile time.
#[derive(Debug, Clone)]
pub enum AnyAlgorithm {
    /// Token bucket engine.
    TokenBucket(TokenBucket),
    /// Leaky bucket engine.
    #[cfg(feature = "leaky-bucket")]
    LeakyBucket(LeakyBucket),
    /// Fixed window engine.
    FixedWindow(FixedWindow),
    /// Sliding window log engine.
    #[cfg(feature = "sliding-log")]
    SlidingLog(SlidingLog),
    /// Sliding window counter engine.
    SlidingCounter(SlidingWindow),
}

impl AnyAlgorithm {
    /// Construct the engine for a given algorithm kind.
    ///
    /// Returns a configuration error for kinds whose supporting feature is
    /// not compiled in, matching the "unknown algorithm tag" rejection
    /// described for the configuration surface.
    fn from_kind(kind: AlgorithmKind) -> Result<Self> {
        Ok(match kind {
            AlgorithmKind::TokenBucket => Self::TokenBucket(TokenBucket::new()),
            AlgorithmKind::FixedWindow => Self::FixedWindow(FixedWindow::new()),
            AlgorithmKind::SlidingCounter => Self::SlidingCounter(SlidingWindow::new()),
            #[cfg(feature = "leaky-bucket")]
            AlgorithmKind::LeakyBucket => Self::LeakyBucket(LeakyBucket::new()),
            #[cfg(not(feature = "leaky-bucket"))]
            AlgorithmKind::LeakyBucket => {
                return Err(ConfigError::InvalidAlgorithm(
                    "leaky-bucket algorithm requires the `leaky-bucket` feature".into(),
                )
                .into())
            }
            #[cfg(feature = "sliding-log")]
            AlgorithmKind::SlidingLog => Self::SlidingLog(SlidingLog::new()),
            #[cfg(not(feature = "sliding-log"))]
            AlgorithmKind::SlidingLog => {
                return Err(ConfigError::InvalidAlgorithm(
                    "sliding-window-log algorithm requires the `sliding-log` feature".into(),
                )
                .into())
            }
        })
    }

    /// Algorithm tag of the wrapped engine.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TokenBucket(a) => a.name(),
            #[cfg(feature = "leaky-bucket")]
            Self::LeakyBucket(a) => a.name(),
            Self::FixedWindow(a) => a.name(),
            #[cfg(feature = "sliding-log")]
            Self::SlidingLog(a) => a.name(),
            Self::SlidingCounter(a) => a.name(),
        }
    }

    /// Check a request against this engine and record it on admission.
    pub async fn check_and_record<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<Decision> {
        match self {
            Self::TokenBucket(a) => a.check_and_record(storage, key, quota).await,
            #[cfg(feature = "leaky-bucket")]
            Self::LeakyBucket(a) => a.check_and_record(storage, key, quota).await,
            Self::FixedWindow(a) => a.check_and_record(storage, key, quota).await,
            #[cfg(feature = "sliding-log")]
            Self::SlidingLog(a) => a.check_and_record(storage, key, quota).await,
            Self::SlidingCounter(a) => a.check_and_record(storage, key, quota).await,
        }
    }

    /// Peek at a key's current state without recording a request.
    pub async fn check<S: Storage>(&self, storage: &S, key: &str, quota: &Quota) -> Result<Decision> {
        match self {
            Self::TokenBucket(a) => a.check(storage, key, quota).await,
            #[cfg(feature = "leaky-bucket")]
            Self::LeakyBucket(a) => a.check(storage, key, quota).await,
            Self::FixedWindow(a) => a.check(storage, key, quota).await,
            #[cfg(feature = "sliding-log")]
            Self::SlidingLog(a) => a.check(storage, key, quota).await,
            Self::SlidingCounter(a) => a.check(storage, key, quota).await,
        }
    }

    /// Reset this engine's state for a key.
    pub async fn reset<S: Storage>(&self, storage: &S, key: &str) -> Result<()> {
        match self {
            Self::TokenBucket(a) => a.reset(storage, key).await,
            #[cfg(feature = "leaky-bucket")]
            Self::LeakyBucket(a) => a.reset(storage, key).await,
            Self::FixedWindow(a) => a.reset(storage, key).await,
            #[cfg(feature = "sliding-log")]
            Self::SlidingLog(a) => a.reset(storage, key).await,
            Self::SlidingCounter(a) => a.reset(storage, key).await,
        }
    }

    /// Diagnostic snapshot for the admin `stats` operation.
    pub async fn stats<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        match self {
            Self::TokenBucket(a) => a.stats(storage, key, quota).await,
            #[cfg(feature = "leaky-bucket")]
            Self::LeakyBucket(a) => a.stats(storage, key, quota).await,
            Self::FixedWindow(a) => a.stats(storage, key, quota).await,
            #[cfg(feature = "sliding-log")]
            Self::SlidingLog(a) => a.stats(storage, key, quota).await,
            Self::SlidingCounter(a) => a.stats(storage, key, quota).await,
        }
    }
}

/// Registry that memoizes engine instances by their algorithm kind and
/// quota parameters.
///
/// The registry is write-once per key and otherwise read-only: once an
/// engine exists for a `(kind, capacity, rate, window_ms, sub_windows)`
/// tuple, every caller asking for that same tuple gets the same `Arc`.
#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: RwLock<HashMap<RegistryKey, Arc<AnyAlgorithm>>>,
}

impl EngineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the engine for a quota, constructing and caching one if this
    /// is the first request for its parameters.
    ///
    /// Returns a configuration error if the quota carries no algorithm kind,
    /// or a kind whose supporting feature isn't compiled in.
    pub fn resolve(&self, quota: &Quota) -> Result<Arc<AnyAlgorithm>> {
        let kind = quota.kind().ok_or_else(|| {
            ConfigError::InvalidAlgorithm("quota has no algorithm kind set".into())
        })?;
        self.resolve_kind(kind, quota)
    }

    /// Resolve the engine for an explicit kind, independent of whether the
    /// quota itself carries one (used by the admin surface, which addresses
    /// engines by algorithm tag directly).
    pub fn resolve_kind(&self, kind: AlgorithmKind, quota: &Quota) -> Result<Arc<AnyAlgorithm>> {
        let registry_key = RegistryKey::from_quota(kind, quota);

        if let Some(engine) = self.engines.read().get(&registry_key) {
            return Ok(Arc::clone(engine));
        }

        let mut engines = self.engines.write();
        if let Some(engine) = engines.get(&registry_key) {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(AnyAlgorithm::from_kind(kind)?);
        engines.insert(registry_key, Arc::clone(&engine));
        Ok(engine)
    }

    /// Number of distinct engine instances currently memoized.
    pub fn len(&self) -> usize {
        self.engines.read().len()
    }

    /// Whether the registry holds no engines yet.
    pub fn is_empty(&self) -> bool {
        self.engines.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_registry_memoizes_identical_params() {
        let registry = EngineRegistry::new();
        let quota = Quota::per_minute(60).with_kind(AlgorithmKind::TokenBucket);

        let a = registry.resolve(&quota).unwrap();
        let b = registry.resolve(&quota).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_distinguishes_different_params() {
        let registry = EngineRegistry::new();
        let a = Quota::per_minute(60).with_kind(AlgorithmKind::TokenBucket);
        let b = Quota::per_minute(120).with_kind(AlgorithmKind::TokenBucket);

        registry.resolve(&a).unwrap();
        registry.resolve(&b).unwrap();

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_rejects_quota_without_kind() {
        let registry = EngineRegistry::new();
        let quota = Quota::per_minute(60);

        assert!(registry.resolve(&quota).is_err());
    }

    #[tokio::test]
    async fn test_different_kinds_do_not_collide_on_one_raw_key() {
        let registry = EngineRegistry::new();
        let storage = MemoryStorage::new();

        let token_quota = Quota::per_minute(1).with_kind(AlgorithmKind::TokenBucket);
        let fixed_quota = Quota::per_minute(1).with_kind(AlgorithmKind::FixedWindow);

        let token_engine = registry.resolve(&token_quota).unwrap();
        let fixed_engine = registry.resolve(&fixed_quota).unwrap();

        // Exhaust the token bucket for this key...
        let first = token_engine
            .check_and_record(&storage, "user:1", &token_quota)
            .await
            .unwrap();
        assert!(first.is_allowed());
        let second = token_engine
            .check_and_record(&storage, "user:1", &token_quota)
            .await
            .unwrap();
        assert!(second.is_denied());

        // ...a fixed window under the same raw key is unaffected.
        let decision = fixed_engine
            .check_and_record(&storage, "user:1", &fixed_quota)
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_resolved_engine_is_usable() {
        let registry = EngineRegistry::new();
        let storage = MemoryStorage::new();
        let quota = Quota::per_minute(5).with_kind(AlgorithmKind::FixedWindow);

        let engine = registry.resolve(&quota).unwrap();
        let decision = engine
            .check_and_record(&storage, "user:1", &quota)
            .await
            .unwrap();

        assert!(decision.is_allowed());
        assert_eq!(engine.name(), "fixed-window");
    }
}
