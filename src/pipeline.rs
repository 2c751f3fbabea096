//! Admission pipeline: ties route selection, key derivation, and the engine
//! registry into the single call a framework integration needs per request.
//!
//! This is the dynamic, configuration-driven counterpart to
//! [`crate::manager::RateLimitManager`] (which fixes one algorithm at
//! compile time): each route may select a different algorithm, resolved
//! through an [`EngineRegistry`].

use crate::decision::Decision;
use crate::engine::EngineRegistry;
use crate::error::Result;
use crate::key::Key;
use crate::manager::{literal_length, pattern_matches};
use crate::quota::Quota;
use crate::storage::Storage;

/// Request paths excluded from rate limiting entirely (e.g. health probes).
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    paths: Vec<String>,
}

impl ExclusionList {
    /// Create an empty exclusion list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude an exact path from admission control.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Whether `path` bypasses the pipeline.
    pub fn excludes(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

/// Admission pipeline combining longest-pattern-match route selection,
/// principal-key derivation, and per-route engine resolution.
pub struct AdmissionPipeline<S, K> {
    registry: EngineRegistry,
    storage: S,
    key_extractor: K,
    enabled: bool,
    default_quota: Quota,
    patterns: Vec<(String, Quota)>,
    exclusions: ExclusionList,
}

impl<S: Storage, K> AdmissionPipeline<S, K> {
    /// Build a pipeline from validated configuration.
    pub fn from_config(config: crate::config::ValidatedConfig, storage: S, key_extractor: K) -> Self {
        Self {
            registry: EngineRegistry::new(),
            storage,
            key_extractor,
            enabled: config.enabled,
            default_quota: config.default_quota,
            patterns: config
                .patterns
                .into_iter()
                .map(|(pattern, _, quota)| (pattern, quota))
                .collect(),
            exclusions: ExclusionList::new(),
        }
    }

    /// Set the paths that bypass the pipeline entirely.
    pub fn with_exclusions(mut self, exclusions: ExclusionList) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Select the quota for a path: exact matches aren't tracked here (the
    /// configuration surface only carries patterns), so every path is
    /// matched against `url_patterns` by longest literal length, falling
    /// back to the default policy; ties are broken lexicographically by
    /// pattern string.
    fn select_quota(&self, path: &str) -> &Quota {
        let mut best: Option<&(String, Quota)> = None;
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
        best.map(|(_, quota)| quota).unwrap_or(&self.default_quota)
    }

    /// Run a request through the pipeline: select a policy, derive the
    /// principal key, and admit or reject against the resolved engine.
    ///
    /// Returns `Ok(None)` for excluded paths and when the configuration has
    /// `enabled = false`, both of which bypass admission control entirely.
    pub async fn admit<R>(&self, path: &str, request: &R) -> Result<Option<Decision>>
    where
        K: Key<R>,
    {
        if !self.enabled || self.exclusions.excludes(path) {
            return Ok(None);
        }

        let quota = self.select_quota(path);
        let engine = self.registry.resolve(quota)?;
        let principal = self
            .key_extractor
            .extract(request)
            .unwrap_or_else(|| "anonymous".to_string());
        let key = format!("{}:{}", principal, path);

        let decision = engine.check_and_record(&self.storage, &key, quota).await?;
        Ok(Some(decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimiterConfig;
    use crate::key::StaticKey;
    use crate::storage::MemoryStorage;

    fn config() -> crate::config::ValidatedConfig {
        let toml_str = r#"
            default_algorithm = "fixed-window"

            [algorithms.fixed-window]
            capacity = 100
            window_ms = 60000

            [url_patterns."/api/auth/**"]
            algorithm = "token-bucket"
            capacity = 5
            window_ms = 60000
        "#;
        RateLimiterConfig::load(toml_str).unwrap()
    }

    #[tokio::test]
    async fn test_admits_against_default_policy() {
        let pipeline = AdmissionPipeline::from_config(config(), MemoryStorage::new(), StaticKey::new("user:1"));

        let decision = pipeline.admit("/health", &()).await.unwrap().unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.info().limit, 100);
    }

    #[tokio::test]
    async fn test_admits_against_matching_pattern() {
        let pipeline = AdmissionPipeline::from_config(config(), MemoryStorage::new(), StaticKey::new("user:1"));

        let decision = pipeline.admit("/api/auth/login", &()).await.unwrap().unwrap();
        assert_eq!(decision.info().limit, 5);
        assert_eq!(decision.info().algorithm, Some("token-bucket"));
    }

    #[tokio::test]
    async fn test_excluded_path_bypasses_pipeline() {
        let pipeline = AdmissionPipeline::from_config(config(), MemoryStorage::new(), StaticKey::new("user:1"))
            .with_exclusions(ExclusionList::new().with_path("/healthz"));

        let decision = pipeline.admit("/healthz", &()).await.unwrap();
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn test_disabled_config_bypasses_pipeline() {
        let toml_str = r#"
            enabled = false
            default_algorithm = "fixed-window"

            [algorithms.fixed-window]
            capacity = 100
            window_ms = 60000
        "#;
        let config = RateLimiterConfig::load(toml_str).unwrap();
        let pipeline = AdmissionPipeline::from_config(config, MemoryStorage::new(), StaticKey::new("user:1"));

        let decision = pipeline.admit("/anything", &()).await.unwrap();
        assert!(decision.is_none());
    }
}
