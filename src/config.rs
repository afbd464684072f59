//! # Global worker configuration.
//!
//! Provides [`Config`] centralized settings for the worker runtime and for
//! building job specs.
//!
//! Config is used in two ways:
//! 1. **Worker creation**: `Worker::new(config, subscribers)`
//! 2. **Job defaults**: `JobSpec::resolve(job, &resolver, id, &config)`
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `timeout = 0s` → no per-attempt timeout
//!
//! ## Pass-through defaults
//! Jobs whose policy is absent are not limited by any policy. The worker then
//! falls back to `default_max_attempts` and `default_backoff`.

use std::time::Duration;

use crate::policies::{DEFAULT_DELIMITER, JitterPolicy};

/// Global configuration for the worker runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for jobs to stop after shutdown was requested.
    pub grace: Duration,

    /// Maximum number of jobs running attempts at the same time (`0` = unlimited).
    pub max_concurrent: usize,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Default per-attempt timeout (`0s` = none).
    pub timeout: Duration,

    /// Delimiter of staged `backoff_period` values.
    pub backoff_delimiter: char,

    /// Attempts ceiling for jobs running without a policy.
    pub default_max_attempts: u32,

    /// Delay between attempts for jobs running without a policy.
    pub default_backoff: Duration,

    /// Jitter applied to policy delays.
    pub jitter: JitterPolicy,

    /// Refuse to run jobs whose policy is absent.
    pub require_policy: bool,
}

impl Config {
    /// Returns the global concurrency limit as an `Option`.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the default per-attempt timeout as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the pass-through attempts ceiling clamped to a minimum of 1.
    #[inline]
    pub fn default_max_attempts_clamped(&self) -> u32 {
        self.default_max_attempts.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `timeout = 0s` (no timeout)
    /// - `backoff_delimiter = ','`
    /// - `default_max_attempts = 3`, `default_backoff = 3s`
    /// - `jitter = None`, `require_policy = false`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            max_concurrent: 0,
            bus_capacity: 1024,
            timeout: Duration::ZERO,
            backoff_delimiter: DEFAULT_DELIMITER,
            default_max_attempts: 3,
            default_backoff: Duration::from_secs(3),
            jitter: JitterPolicy::None,
            require_policy: false,
        }
    }
}
