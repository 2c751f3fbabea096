//! Storage entry type for rate limiting state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Entry stored in the storage backend.
///
/// This struct contains all state needed by rate limiting algorithms,
/// designed to be flexible enough for any algorithm type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageEntry {
    /// Request count (for window-based algorithms).
    pub count: u64,

    /// Window start timestamp (Unix milliseconds).
    pub window_start: u64,

    /// Available tokens (for token bucket algorithm).
    pub tokens: Option<f64>,

    /// Last update timestamp (Unix milliseconds).
    pub last_update: u64,

    /// Previous window count (for sliding window).
    pub prev_count: Option<u64>,

    /// Request timestamps (for sliding log algorithm).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<u64>>,

    /// Optional metadata (algorithm-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<u8>>,

    /// Sub-window bucket counts for the sliding window counter's sub-bucket
    /// form, keyed by `sub_window_start_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_buckets: Option<BTreeMap<u64, u64>>,
}

impl StorageEntry {
    /// Create a new storage entry for window-based algorithms.
    pub fn new(count: u64, window_start: u64) -> Self {
        Self {
            count,
            window_start,
            tokens: None,
            last_update: window_start,
            prev_count: None,
            timestamps: None,
            metadata: None,
            sub_buckets: None,
        }
    }

    /// Create a storage entry for token bucket.
    pub fn with_tokens(tokens: f64, last_update: u64) -> Self {
        Self {
            count: 0,
            window_start: last_update,
            tokens: Some(tokens),
            last_update,
            prev_count: None,
            timestamps: None,
            metadata: None,
            sub_buckets: None,
        }
    }

    /// Create a storage entry for sliding log.
    pub fn with_timestamps(timestamps: Vec<u64>) -> Self {
        let now = timestamps.last().copied().unwrap_or(0);
        Self {
            count: timestamps.len() as u64,
            window_start: now,
            tokens: None,
            last_update: now,
            prev_count: None,
            timestamps: Some(timestamps),
            metadata: None,
            sub_buckets: None,
        }
    }

    /// Set the token count.
    pub fn set_tokens(mut self, tokens: f64) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Set the last update timestamp.
    pub fn set_last_update(mut self, last_update: u64) -> Self {
        self.last_update = last_update;
        self
    }

    /// Set previous window count.
    pub fn set_prev_count(mut self, count: u64) -> Self {
        self.prev_count = Some(count);
        self
    }

    /// Set metadata.
    pub fn set_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Create a storage entry for the sliding window counter's sub-bucket form.
    pub fn with_sub_buckets(sub_buckets: BTreeMap<u64, u64>) -> Self {
        let last_update = sub_buckets.keys().next_back().copied().unwrap_or(0);
        Self {
            last_update,
            sub_buckets: Some(sub_buckets),
            ..Self::new(0, last_update)
        }
    }

    /// Set the sub-bucket map.
    pub fn set_sub_buckets(mut self, sub_buckets: BTreeMap<u64, u64>) -> Self {
        self.sub_buckets = Some(sub_buckets);
        self
    }

    /// Get the sub-bucket map, defaulting to empty.
    pub fn sub_buckets_or_default(&self) -> BTreeMap<u64, u64> {
        self.sub_buckets.clone().unwrap_or_default()
    }

    /// Get tokens, defaulting to 0.0 if not set.
    pub fn tokens_or_default(&self) -> f64 {
        self.tokens.unwrap_or(0.0)
    }
}

impl Default for StorageEntry {
    fn default() -> Self {
        Self {
            count: 0,
            window_start: 0,
            tokens: None,
            last_update: 0,
            prev_count: None,
            timestamps: None,
            metadata: None,
            sub_buckets: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_new() {
        let entry = StorageEntry::new(5, 1000);
        assert_eq!(entry.count, 5);
        assert_eq!(entry.window_start, 1000);
        assert!(entry.tokens.is_none());
    }

    #[test]
    fn test_entry_with_tokens() {
        let entry = StorageEntry::with_tokens(10.5, 2000);
        assert_eq!(entry.tokens, Some(10.5));
        assert_eq!(entry.tokens_or_default(), 10.5);
        assert_eq!(entry.last_update, 2000);
    }

    #[test]
    fn test_entry_with_timestamps() {
        let timestamps = vec![1000, 2000, 3000];
        let entry = StorageEntry::with_timestamps(timestamps.clone());
        assert_eq!(entry.timestamps, Some(timestamps));
        assert_eq!(entry.count, 3);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = StorageEntry::new(10, 1000).set_tokens(5.5).set_prev_count(3);
        let json = serde_json::to_string(&entry).unwrap();
        let deserialized: StorageEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, deserialized);
    }

    #[test]
    fn test_entry_with_sub_buckets() {
        let mut buckets = BTreeMap::new();
        buckets.insert(0, 3);
        buckets.insert(30_000, 1);
        let entry = StorageEntry::with_sub_buckets(buckets.clone());
        assert_eq!(entry.sub_buckets_or_default(), buckets);
        assert_eq!(entry.last_update, 30_000);
    }
}
