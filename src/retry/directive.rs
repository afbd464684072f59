//! # Per-attempt directives.
//!
//! [`AttemptDirective`] is what the controller hands to the execution
//! substrate at the start of every attempt; [`JobExtra`] is the subset exposed
//! to the job body and to telemetry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Attempt metadata for the job body and external telemetry.
///
/// Serialized with the keys `attempts`, `is_last_attempt` and `is_retry`.
/// Recomputed on every attempt, never cached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobExtra {
    /// Current attempt ordinal (1-based).
    pub attempts: u32,
    /// True on the final attempt the policy allows.
    pub is_last_attempt: bool,
    /// True on any attempt after the first.
    pub is_retry: bool,
}

impl JobExtra {
    /// Reads extras forwarded by another system.
    ///
    /// Missing or mistyped keys fall back to `0` / `false`.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobExtra;
    ///
    /// let extra = JobExtra::from_value(&serde_json::json!({ "attempts": 2, "is_retry": true }));
    /// assert_eq!(extra.attempts_count(), 2);
    /// assert!(extra.is_retry());
    /// assert!(!extra.is_last_attempt());
    /// ```
    pub fn from_value(value: &serde_json::Value) -> Self {
        let flag = |key: &str| value.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        Self {
            attempts: value
                .get("attempts")
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            is_last_attempt: flag("is_last_attempt"),
            is_retry: flag("is_retry"),
        }
    }

    /// Converts into a JSON object.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "attempts": self.attempts,
            "is_last_attempt": self.is_last_attempt,
            "is_retry": self.is_retry,
        })
    }

    pub fn is_retry(&self) -> bool {
        self.is_retry
    }

    pub fn attempts_count(&self) -> u32 {
        self.attempts
    }

    pub fn is_last_attempt(&self) -> bool {
        self.is_last_attempt
    }
}

/// Scheduling directives for one attempt.
///
/// `None` fields mean "no override": the substrate applies its own defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptDirective {
    /// Current attempt ordinal (1-based, clamped).
    pub attempt: u32,
    /// True when this attempt is the final one the policy allows.
    pub is_last_attempt: bool,
    /// True when `attempt > 1`.
    pub is_retry: bool,
    /// Delay to wait before the next attempt should this one fault.
    pub backoff: Option<Duration>,
    /// Authoritative attempts ceiling.
    pub max_attempts: Option<u32>,
    /// Fault budget.
    pub max_exceptions: Option<u32>,
}

impl AttemptDirective {
    /// Extracts the outward-facing [`JobExtra`].
    pub fn extra(&self) -> JobExtra {
        JobExtra {
            attempts: self.attempt,
            is_last_attempt: self.is_last_attempt,
            is_retry: self.is_retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_is_lenient() {
        let extra = JobExtra::from_value(&serde_json::json!({ "attempts": "3" }));
        assert_eq!(extra, JobExtra::default());

        let extra = JobExtra::from_value(&serde_json::Value::Null);
        assert_eq!(extra.attempts_count(), 0);
    }

    #[test]
    fn test_serialized_keys() {
        let extra = JobExtra {
            attempts: 3,
            is_last_attempt: true,
            is_retry: true,
        };
        assert_eq!(
            serde_json::to_value(extra).unwrap(),
            serde_json::json!({ "attempts": 3, "is_last_attempt": true, "is_retry": true })
        );
        assert_eq!(extra.to_value(), serde_json::to_value(extra).unwrap());
    }
}
