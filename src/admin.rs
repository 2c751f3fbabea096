//! Admin surface: `stats`, `reset`, and `algorithms` operations over the
//! engine registry.
//!
//! This is a plain async API, not a transport handler — a host application
//! wires these methods into whatever router (axum, actix, a gRPC service,
//! an internal CLI) it already uses.

use std::collections::HashMap;

use serde::Serialize;

use crate::engine::EngineRegistry;
use crate::quota::{AlgorithmKind, Quota};
use crate::storage::Storage;

/// Response body for [`AdminApi::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub algorithm: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub stats: serde_json::Map<String, serde_json::Value>,
    pub timestamp: u64,
}

/// Per-engine outcome of a [`AdminApi::reset`] call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetOutcome {
    Success,
    Failed(String),
}

impl std::fmt::Display for ResetOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Response body for [`AdminApi::reset`].
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub message: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "resetResults")]
    pub reset_results: HashMap<String, String>,
    pub timestamp: u64,
}

/// One entry in the [`AdminApi::algorithms`] listing.
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmInfo {
    pub tag: String,
    pub description: String,
}

/// Admin surface over an [`EngineRegistry`] and a fixed set of
/// per-algorithm quota parameters (the same values a policy's
/// configuration would carry).
pub struct AdminApi<S> {
    registry: EngineRegistry,
    storage: S,
    quotas: HashMap<AlgorithmKind, Quota>,
}

impl<S: Storage> AdminApi<S> {
    /// Create an admin surface backed by `storage`, with `quotas` supplying
    /// the parameters (capacity, window, etc.) to use per algorithm kind
    /// when no route-specific policy applies.
    pub fn new(storage: S, quotas: HashMap<AlgorithmKind, Quota>) -> Self {
        Self {
            registry: EngineRegistry::new(),
            storage,
            quotas,
        }
    }

    fn quota_for(&self, kind: AlgorithmKind) -> Quota {
        self.quotas
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Quota::per_minute(60))
            .with_kind(kind)
    }

    /// Diagnostic snapshot of a user's current state under one algorithm.
    pub async fn stats(&self, user_id: &str, algorithm: AlgorithmKind) -> crate::error::Result<StatsResponse> {
        let quota = self.quota_for(algorithm);
        let engine = self.registry.resolve_kind(algorithm, &quota)?;
        let key = format!("user:{}", user_id);
        let stats = engine.stats(&self.storage, &key, &quota).await?;

        Ok(StatsResponse {
            algorithm: algorithm.tag().to_string(),
            user_id: user_id.to_string(),
            stats,
            timestamp: crate::storage::current_timestamp_ms(),
        })
    }

    /// Reset a user's state across every known algorithm. Per-engine
    /// failures are recorded individually and never abort the batch.
    pub async fn reset(&self, user_id: &str) -> ResetResponse {
        let key = format!("user:{}", user_id);
        let mut reset_results = HashMap::new();

        for kind in [
            AlgorithmKind::TokenBucket,
            AlgorithmKind::LeakyBucket,
            AlgorithmKind::FixedWindow,
            AlgorithmKind::SlidingLog,
            AlgorithmKind::SlidingCounter,
        ] {
            let quota = self.quota_for(kind);
            let outcome = match self.registry.resolve_kind(kind, &quota) {
                Ok(engine) => match engine.reset(&self.storage, &key).await {
                    Ok(()) => ResetOutcome::Success,
                    Err(e) => ResetOutcome::Failed(e.to_string()),
                },
                Err(e) => ResetOutcome::Failed(e.to_string()),
            };
            reset_results.insert(kind.tag().to_string(), outcome.to_string());
        }

        ResetResponse {
            message: "rate limit reset".to_string(),
            user_id: user_id.to_string(),
            reset_results,
            timestamp: crate::storage::current_timestamp_ms(),
        }
    }

    /// Enumerate every known algorithm tag with a human description.
    pub fn algorithms(&self) -> Vec<AlgorithmInfo> {
        [
            AlgorithmKind::TokenBucket,
            AlgorithmKind::LeakyBucket,
            AlgorithmKind::FixedWindow,
            AlgorithmKind::SlidingLog,
            AlgorithmKind::SlidingCounter,
        ]
        .into_iter()
        .map(|kind| AlgorithmInfo {
            tag: kind.tag().to_string(),
            description: kind.description().to_string(),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn quotas() -> HashMap<AlgorithmKind, Quota> {
        let mut map = HashMap::new();
        map.insert(AlgorithmKind::FixedWindow, Quota::per_minute(10));
        map
    }

    #[tokio::test]
    async fn test_stats_reports_algorithm_tag() {
        let admin = AdminApi::new(MemoryStorage::new(), quotas());
        let stats = admin.stats("42", AlgorithmKind::FixedWindow).await.unwrap();

        assert_eq!(stats.algorithm, "fixed-window");
        assert_eq!(stats.user_id, "42");
    }

    #[tokio::test]
    async fn test_reset_covers_every_algorithm() {
        let admin = AdminApi::new(MemoryStorage::new(), quotas());
        let response = admin.reset("42").await;

        assert_eq!(response.reset_results.len(), 5);
        assert!(response.reset_results.values().all(|v| v == "success"));
    }

    #[test]
    fn test_algorithms_listing_has_five_entries() {
        let admin = AdminApi::new(MemoryStorage::new(), quotas());
        assert_eq!(admin.algorithms().len(), 5);
    }
}
