//! # Stored job policy record.
//!
//! [`PolicyRecord`] mirrors one row of the `job_policies` storage layout:
//!
//! ```text
//! id (pk) | title | description | active (indexed) | max_retry_count (2)
//! max_exceptions_count | time_window_period | backoff_period | delay
//! connection | queue | created_at | updated_at
//! ```
//!
//! The record is kept raw on purpose: values are validated by the
//! [`PolicyResolver`](crate::PolicyResolver), never here. Two leniencies of the
//! storage layer are absorbed during deserialization:
//! - `active` may be stored as `0`/`1` as well as `false`/`true`;
//! - `backoff_period` may be stored as an integer as well as a string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Default value of `max_retry_count` for new records.
pub const DEFAULT_MAX_RETRY_COUNT: i64 = 2;

/// One stored job policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Primary key.
    pub id: String,
    /// Descriptive only.
    #[serde(default)]
    pub title: String,
    /// Descriptive only.
    #[serde(default)]
    pub description: Option<String>,
    /// Inactive records are never handed to the resolver.
    #[serde(default, deserialize_with = "flag")]
    pub active: bool,
    /// Total attempts allowed (not retries after the first).
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: i64,
    /// Unhandled faults tolerated before the job is abandoned.
    #[serde(default)]
    pub max_exceptions_count: Option<i64>,
    /// Scheduling window in seconds.
    #[serde(default)]
    pub time_window_period: Option<i64>,
    /// Seconds, either one integer or a delimited sequence.
    #[serde(default, deserialize_with = "int_or_string")]
    pub backoff_period: Option<String>,
    /// Seconds to wait before the first attempt.
    #[serde(default)]
    pub delay: Option<i64>,
    /// Lane routing hint.
    #[serde(default)]
    pub connection: Option<String>,
    /// Lane routing hint.
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_max_retry_count() -> i64 {
    DEFAULT_MAX_RETRY_COUNT
}

fn flag<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(de)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

fn int_or_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    Ok(Option::<Raw>::deserialize(de)?.map(|raw| match raw {
        Raw::Int(i) => i.to_string(),
        Raw::Str(s) => s,
    }))
}

impl PolicyRecord {
    /// Creates an active record with default limits and no backoff.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: None,
            active: true,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            max_exceptions_count: None,
            time_window_period: None,
            backoff_period: None,
            delay: None,
            connection: None,
            queue: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns the record with an updated `active` flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Returns the record with an updated `max_retry_count`.
    pub fn with_max_retry_count(mut self, count: i64) -> Self {
        self.max_retry_count = count;
        self
    }

    /// Returns the record with an updated `max_exceptions_count`.
    pub fn with_max_exceptions_count(mut self, count: i64) -> Self {
        self.max_exceptions_count = Some(count);
        self
    }

    /// Returns the record with an updated `backoff_period`.
    pub fn with_backoff_period(mut self, period: impl Into<String>) -> Self {
        self.backoff_period = Some(period.into());
        self
    }

    /// Returns the record with an updated initial `delay`.
    pub fn with_delay(mut self, seconds: i64) -> Self {
        self.delay = Some(seconds);
        self
    }

    /// Returns the record with an updated `time_window_period`.
    pub fn with_time_window_period(mut self, seconds: i64) -> Self {
        self.time_window_period = Some(seconds);
        self
    }

    /// Returns the record routed to the given connection.
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Returns the record routed to the given queue.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_row_with_int_flags() {
        let rec: PolicyRecord = serde_json::from_value(serde_json::json!({
            "id": "invoice-sync",
            "title": "Invoice sync",
            "active": 1,
            "max_exceptions_count": 2,
            "backoff_period": 30,
            "queue": "billing",
            "created_at": "2024-05-22T11:10:39Z"
        }))
        .unwrap();

        assert!(rec.active);
        assert_eq!(rec.max_retry_count, DEFAULT_MAX_RETRY_COUNT);
        assert_eq!(rec.max_exceptions_count, Some(2));
        assert_eq!(rec.backoff_period.as_deref(), Some("30"));
        assert_eq!(rec.queue.as_deref(), Some("billing"));
        assert!(rec.connection.is_none());
        assert!(rec.created_at.is_some());
    }

    #[test]
    fn test_missing_active_defaults_to_inactive() {
        let rec: PolicyRecord =
            serde_json::from_value(serde_json::json!({ "id": "p", "backoff_period": "1,2" }))
                .unwrap();
        assert!(!rec.active);
        assert_eq!(rec.backoff_period.as_deref(), Some("1,2"));
    }

    #[test]
    fn test_null_backoff_is_none() {
        let rec: PolicyRecord =
            serde_json::from_value(serde_json::json!({ "id": "p", "backoff_period": null }))
                .unwrap();
        assert!(rec.backoff_period.is_none());
    }
}
