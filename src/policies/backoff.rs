//! # Backoff specification of a job policy.
//!
//! [`Backoff`] is the typed form of a policy's `backoff_period` column:
//! - [`Backoff::Fixed`] one delay reused for every retry;
//! - [`Backoff::Staged`] an ordered sequence of delays, one per retry ordinal.
//!
//! The stored value is parsed exactly once by [`Backoff::parse`]. A value
//! containing the delimiter is staged, anything else must be a single integer
//! number of seconds.
//!
//! Once a staged sequence runs out, the last stage is reused:
//!
//! ```text
//! "2,4,8"   attempt: 1   2   3   4   5
//!           delay:   2s  4s  8s  8s  8s
//! ```
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::Backoff;
//!
//! let staged = Backoff::parse("5, 10, 20", ',').unwrap();
//! assert_eq!(staged.delay_for(1), Duration::from_secs(5));
//! assert_eq!(staged.delay_for(3), Duration::from_secs(20));
//! assert_eq!(staged.delay_for(9), Duration::from_secs(20));
//!
//! let fixed = Backoff::parse("7", ',').unwrap();
//! assert_eq!(fixed.delay_for(42), Duration::from_secs(7));
//! ```

use std::time::Duration;

use thiserror::Error;

/// Delimiter separating the stages of a staged backoff.
pub const DEFAULT_DELIMITER: char = ',';

/// Failure to parse a stored backoff specification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed backoff {raw:?}: segment {segment:?} is not a non-negative integer")]
pub struct MalformedBackoff {
    /// The whole stored value.
    pub raw: String,
    /// The segment that failed to parse (trimmed).
    pub segment: String,
}

/// Delay strategy applied between attempts of a failing job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// One delay per retry ordinal; never empty.
    Staged(Vec<Duration>),
}

impl Default for Backoff {
    /// Returns `Fixed(0s)`.
    fn default() -> Self {
        Backoff::Fixed(Duration::ZERO)
    }
}

impl Backoff {
    /// Parses a stored backoff specification.
    ///
    /// Every segment is trimmed and must be a non-negative integer number of
    /// seconds. Empty segments (`"5,,10"`, `"5,"`) are rejected, so a staged
    /// result always holds at least one stage.
    pub fn parse(raw: &str, delimiter: char) -> Result<Self, MalformedBackoff> {
        if raw.contains(delimiter) {
            let stages = raw
                .split(delimiter)
                .map(|segment| parse_seconds(raw, segment))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Backoff::Staged(stages))
        } else {
            parse_seconds(raw, raw).map(Backoff::Fixed)
        }
    }

    /// Returns the delay to wait after attempt `attempt` (1-based) faults.
    ///
    /// Attempt `0` is treated as `1`. Staged sequences clamp to their last
    /// stage instead of running out.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Staged(stages) => {
                let idx = (attempt.max(1) as usize)
                    .min(stages.len())
                    .saturating_sub(1);
                stages.get(idx).copied().unwrap_or_default()
            }
        }
    }

    /// Number of configured stages (`1` for a fixed delay).
    pub fn stages(&self) -> usize {
        match self {
            Backoff::Fixed(_) => 1,
            Backoff::Staged(stages) => stages.len(),
        }
    }
}

fn parse_seconds(raw: &str, segment: &str) -> Result<Duration, MalformedBackoff> {
    let segment = segment.trim();
    segment
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| MalformedBackoff {
            raw: raw.to_string(),
            segment: segment.to_string(),
        })
}
