//! Indexer configuration.

use serde::{Deserialize, Serialize};

use crate::error::IndexingError;

/// Configuration for the batched indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Number of worker shards. Every collection hashes to exactly one
    /// shard, so this bounds write parallelism across collections.
    #[serde(default = "default_num_shards")]
    pub num_shards: usize,

    /// Seconds between garbage-collection sweeps of the chunk buffer.
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: u64,

    /// Age in seconds past which a buffered request is reclaimed. Requests
    /// whose sender disappeared mid-stream never complete; this bounds how
    /// long their chunks occupy the store.
    #[serde(default = "default_gc_prune_max_secs")]
    pub gc_prune_max_secs: u64,

    /// Worker poll sleep in milliseconds when a shard queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_num_shards() -> usize {
    4
}

fn default_gc_interval_secs() -> u64 {
    60
}

fn default_gc_prune_max_secs() -> u64 {
    3600
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            num_shards: default_num_shards(),
            gc_interval_secs: default_gc_interval_secs(),
            gc_prune_max_secs: default_gc_prune_max_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl IndexerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), IndexingError> {
        if self.num_shards == 0 {
            return Err(IndexingError::Config(
                "num_shards must be > 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(IndexingError::Config(
                "poll_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IndexerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_shards, 4);
        assert_eq!(config.gc_interval_secs, 60);
        assert_eq!(config.gc_prune_max_secs, 3600);
        assert_eq!(config.poll_interval_ms, 10);
    }

    #[test]
    fn test_zero_shards_rejected() {
        let config = IndexerConfig {
            num_shards: 0,
            ..IndexerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: IndexerConfig = serde_json::from_str("{\"num_shards\": 8}").unwrap();
        assert_eq!(config.num_shards, 8);
        assert_eq!(config.gc_prune_max_secs, 3600);
    }
}
