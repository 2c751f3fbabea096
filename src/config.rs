//! Static configuration surface.
//!
//! Parses a TOML document describing which algorithm is enabled, its
//! parameters, and the per-route overrides matched by glob pattern. Invalid
//! values (non-positive capacity/rate/window, an unknown algorithm tag) are
//! rejected at load time, before any engine is constructed.
//!
//! # Example
//!
//! ```ignore
//! use skp_ratelimit::config::RateLimiterConfig;
//!
//! let raw = std::fs::read_to_string("ratelimit.toml")?;
//! let config = RateLimiterConfig::load(&raw)?;
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::quota::{AlgorithmKind, Quota};

fn default_enabled() -> bool {
    true
}

/// Per-algorithm parameter block as it appears in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AlgorithmParams {
    pub capacity: u64,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub limit: Option<u64>,
    pub window_ms: u64,
    #[serde(default)]
    pub sub_windows: Option<u32>,
}

/// A `url_patterns` entry: a route-specific override of the algorithm and
/// its parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutePatternConfig {
    #[serde(default)]
    pub algorithm: Option<String>,
    pub capacity: u64,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub limit: Option<u64>,
    pub window_ms: u64,
    #[serde(default)]
    pub sub_windows: Option<u32>,
}

/// Raw, deserialized configuration, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimiterConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub default_algorithm: String,
    #[serde(default)]
    pub algorithms: HashMap<String, AlgorithmParams>,
    #[serde(default)]
    pub url_patterns: HashMap<String, RoutePatternConfig>,
}

impl RateLimiterConfig {
    /// Parse and validate a TOML document.
    pub fn load(toml_str: &str) -> Result<ValidatedConfig> {
        let raw: Self = toml::from_str(toml_str)
            .map_err(|e| ConfigError::InvalidQuota(format!("invalid TOML: {e}")))?;
        raw.validate()
    }

    /// Validate the raw configuration, resolving every algorithm tag and
    /// quota into their typed forms.
    pub fn validate(&self) -> Result<ValidatedConfig> {
        let default_kind = AlgorithmKind::from_tag(&self.default_algorithm).ok_or_else(|| {
            ConfigError::InvalidAlgorithm(format!(
                "unknown default_algorithm tag '{}'",
                self.default_algorithm
            ))
        })?;

        let default_quota = match self.algorithms.get(&self.default_algorithm) {
            Some(params) => build_quota(
                default_kind,
                params.capacity,
                params.rate,
                params.limit,
                params.window_ms,
                params.sub_windows,
            )?,
            None => {
                return Err(ConfigError::MissingRequired(format!(
                    "no parameters for default_algorithm '{}'",
                    self.default_algorithm
                ))
                .into())
            }
        };

        let mut patterns = Vec::with_capacity(self.url_patterns.len());
        for (pattern, route) in &self.url_patterns {
            let kind = match &route.algorithm {
                Some(tag) => AlgorithmKind::from_tag(tag).ok_or_else(|| {
                    ConfigError::InvalidAlgorithm(format!(
                        "unknown algorithm tag '{tag}' for pattern '{pattern}'"
                    ))
                })?,
                None => default_kind,
            };
            let quota = build_quota(
                kind,
                route.capacity,
                route.rate,
                route.limit,
                route.window_ms,
                route.sub_windows,
            )?;
            patterns.push((pattern.clone(), kind, quota));
        }

        Ok(ValidatedConfig {
            enabled: self.enabled,
            default_algorithm: default_kind,
            default_quota,
            patterns,
        })
    }
}

fn build_quota(
    kind: AlgorithmKind,
    capacity: u64,
    rate: Option<f64>,
    limit: Option<u64>,
    window_ms: u64,
    sub_windows: Option<u32>,
) -> Result<Quota> {
    if capacity == 0 {
        return Err(ConfigError::InvalidQuota("capacity must be positive".into()).into());
    }
    if window_ms == 0 {
        return Err(ConfigError::InvalidQuota("window_ms must be positive".into()).into());
    }
    if let Some(rate) = rate {
        if rate <= 0.0 {
            return Err(ConfigError::InvalidQuota("rate must be positive".into()).into());
        }
    }

    let mut quota = Quota::try_new(capacity, std::time::Duration::from_millis(window_ms))?
        .with_kind(kind);
    if let Some(rate) = rate {
        quota = quota.with_refill_rate(rate);
    }
    if let Some(limit) = limit {
        quota = quota.with_burst(limit);
    }
    if let Some(sub_windows) = sub_windows {
        quota = quota.with_sub_windows(sub_windows);
    }
    Ok(quota)
}

/// Configuration after tag resolution and validation, ready to drive an
/// [`crate::engine::EngineRegistry`] and admission pipeline.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub enabled: bool,
    pub default_algorithm: AlgorithmKind,
    pub default_quota: Quota,
    pub patterns: Vec<(String, AlgorithmKind, Quota)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let toml_str = r#"
            default_algorithm = "token-bucket"

            [algorithms.token-bucket]
            capacity = 100
            window_ms = 60000
        "#;

        let config = RateLimiterConfig::load(toml_str).unwrap();
        assert!(config.enabled);
        assert_eq!(config.default_algorithm, AlgorithmKind::TokenBucket);
        assert_eq!(config.default_quota.max_requests(), 100);
    }

    #[test]
    fn test_load_with_url_patterns() {
        let toml_str = r#"
            default_algorithm = "fixed-window"

            [algorithms.fixed-window]
            capacity = 50
            window_ms = 1000

            [url_patterns."/api/auth/**"]
            algorithm = "token-bucket"
            capacity = 5
            window_ms = 60000
            limit = 8
        "#;

        let config = RateLimiterConfig::load(toml_str).unwrap();
        assert_eq!(config.patterns.len(), 1);
        let (pattern, kind, quota) = &config.patterns[0];
        assert_eq!(pattern, "/api/auth/**");
        assert_eq!(*kind, AlgorithmKind::TokenBucket);
        assert_eq!(quota.max_requests(), 5);
        assert_eq!(quota.effective_burst(), 8);
    }

    #[test]
    fn test_rejects_unknown_algorithm_tag() {
        let toml_str = r#"
            default_algorithm = "gcra"

            [algorithms.gcra]
            capacity = 10
            window_ms = 1000
        "#;

        assert!(RateLimiterConfig::load(toml_str).is_err());
    }

    #[test]
    fn test_rejects_non_positive_capacity() {
        let toml_str = r#"
            default_algorithm = "token-bucket"

            [algorithms.token-bucket]
            capacity = 0
            window_ms = 1000
        "#;

        assert!(RateLimiterConfig::load(toml_str).is_err());
    }

    #[test]
    fn test_rejects_missing_default_algorithm_params() {
        let toml_str = r#"
            default_algorithm = "token-bucket"
        "#;

        assert!(RateLimiterConfig::load(toml_str).is_err());
    }

    #[test]
    fn test_enabled_defaults_true() {
        let toml_str = r#"
            default_algorithm = "token-bucket"

            [algorithms.token-bucket]
            capacity = 10
            window_ms = 1000
        "#;

        let config = RateLimiterConfig::load(toml_str).unwrap();
        assert!(config.enabled);
    }

    #[test]
    fn test_explicit_disabled() {
        let toml_str = r#"
            enabled = false
            default_algorithm = "token-bucket"

            [algorithms.token-bucket]
            capacity = 10
            window_ms = 1000
        "#;

        let config = RateLimiterConfig::load(toml_str).unwrap();
        assert!(!config.enabled);
    }
}
