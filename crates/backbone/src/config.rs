//! Backbone configuration structures and loaders.
use std::env;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration shared by the event/command backbone.
#[derive(Clone, Debug, Default)]
pub struct BackboneConfig {
    pub pool: PoolConfig,
    pub world: WorldConfig,
}

impl BackboneConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `POOL_WORKERS` - Worker thread count (default: 20)
    /// - `POOL_QUEUE_CAPACITY` - Pending task slots (default: 256)
    /// - `POOL_SHUTDOWN_GRACE_MS` - Grace period on shutdown (default: 5000)
    /// - `WORLD_SEED` - Seed for chunk generation (default: 0)
    ///
    /// Unset variables keep their defaults; set but unparsable ones are an
    /// error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(workers) = read_env::<usize>("POOL_WORKERS")? {
            config.pool.workers = workers.max(1);
        }
        if let Some(capacity) = read_env::<usize>("POOL_QUEUE_CAPACITY")? {
            config.pool.queue_capacity = capacity.max(1);
        }
        if let Some(millis) = read_env::<u64>("POOL_SHUTDOWN_GRACE_MS")? {
            config.pool.shutdown_grace = Duration::from_millis(millis);
        }
        if let Some(seed) = read_env::<u64>("WORLD_SEED")? {
            config.world.seed = seed;
        }

        Ok(config)
    }
}

/// Task pool sizing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker threads started by `TaskPool::start`.
    pub workers: usize,
    /// Tasks that may wait in the queue before `submit` is refused.
    pub queue_capacity: usize,
    /// How long shutdown waits for queued and running tasks.
    pub shutdown_grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 20,
            queue_capacity: 256,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldConfig {
    pub seed: u64,
}

/// Reads and parses `key`. `Ok(None)` when unset.
pub fn read_env<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BackboneConfig::default();
        assert_eq!(config.pool.workers, 20);
        assert_eq!(config.pool.queue_capacity, 256);
        assert_eq!(config.pool.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.world.seed, 0);
    }

    #[test]
    fn test_read_env_unset_is_none() {
        assert_eq!(
            read_env::<u64>("BACKBONE_TEST_SURELY_UNSET_VARIABLE"),
            Ok(None)
        );
    }
}
