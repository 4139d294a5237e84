use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one cache key class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a snapshot is served without triggering regeneration.
    pub ttl: Duration,
    /// Upper bound on one producer invocation.
    pub regeneration_timeout: Duration,
    /// Maximum number of entries before the oldest is evicted.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            regeneration_timeout: Duration::from_secs(30),
            capacity: 1024,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// The `[cache]` section of the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_seconds")]
    pub list_ttl_seconds: u64,
    #[serde(default = "default_ttl_seconds")]
    pub post_ttl_seconds: u64,
    #[serde(default = "default_regeneration_timeout_seconds")]
    pub regeneration_timeout_seconds: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_ttl_seconds() -> u64 {
    10
}

fn default_regeneration_timeout_seconds() -> u64 {
    30
}

fn default_capacity() -> usize {
    1024
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            list_ttl_seconds: default_ttl_seconds(),
            post_ttl_seconds: default_ttl_seconds(),
            regeneration_timeout_seconds: default_regeneration_timeout_seconds(),
            capacity: default_capacity(),
        }
    }
}

impl CacheSettings {
    pub fn list_config(&self) -> CacheConfig {
        self.config_with_ttl(self.list_ttl_seconds)
    }

    pub fn post_config(&self) -> CacheConfig {
        self.config_with_ttl(self.post_ttl_seconds)
    }

    fn config_with_ttl(&self, ttl_seconds: u64) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(ttl_seconds),
            regeneration_timeout: Duration::from_secs(self.regeneration_timeout_seconds),
            capacity: self.capacity,
        }
    }
}
