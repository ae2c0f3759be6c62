//! # Pool configuration.
//!
//! [`PoolConfig`] fixes the pool's shape at construction: worker count,
//! per-worker queue capacity, and event-bus capacity.
//!
//! # Example
//! ```
//! use taskpool::PoolConfig;
//!
//! let mut cfg = PoolConfig::default();
//! cfg.workers = 8;
//! cfg.queue_len = 32;
//!
//! assert!(cfg.validate().is_ok());
//! ```

use crate::error::PoolError;

/// Shape of the pool, fixed at construction.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of workers. Must be positive; the pool never resizes.
    pub workers: usize,
    /// Maximum pending-or-executing tasks per worker. Must be positive.
    pub queue_len: usize,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for PoolConfig {
    /// Provides a default configuration:
    /// - `workers = 4`
    /// - `queue_len = 16`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: 4,
            queue_len: 16,
            bus_capacity: 1024,
        }
    }
}

impl PoolConfig {
    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.workers == 0 {
            return Err(PoolError::Config {
                reason: "workers must be greater than 0".into(),
            });
        }
        if self.queue_len == 0 {
            return Err(PoolError::Config {
                reason: "queue_len must be greater than 0".into(),
            });
        }
        if self.bus_capacity == 0 {
            return Err(PoolError::Config {
                reason: "bus_capacity must be greater than 0".into(),
            });
        }
        Ok(())
    }
}
