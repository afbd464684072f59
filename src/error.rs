//! Error types used by the policy engine, the policy store and jobs.
//!
//! This module defines the main error enums:
//!
//! - [`PolicyError`]: a policy could not be turned into a usable descriptor,
//!   or a job was invoked without the policy its contract requires.
//! - [`StoreError`]: the policy store failed to answer a lookup.
//! - [`JobError`]: errors raised by individual job attempts.
//! - [`RuntimeError`]: errors raised by the worker runtime itself.
//!
//! Each type provides `as_label` for logs/metrics. Note that an absent policy
//! is **not** an error: it is [`Resolution::Absent`](crate::Resolution::Absent).

use std::time::Duration;
use thiserror::Error;

use crate::policies::MalformedBackoff;

/// # Errors produced while resolving or enforcing a job policy.
///
/// All variants are fatal for the job that carries the policy: a broken policy
/// is a deployment defect, never a transient fault, so it is never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The record's `backoff_period` could not be parsed.
    #[error("policy {policy:?}: {source}")]
    MalformedBackoff {
        /// Identifier of the offending policy.
        policy: String,
        /// Parse failure details.
        #[source]
        source: MalformedBackoff,
    },

    /// A numeric field of the record is out of range.
    #[error("policy {policy:?}: invalid {field}: {reason}")]
    InvalidRecord {
        /// Identifier of the offending policy.
        policy: String,
        /// Name of the stored field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A job was invoked while carrying a failed or absent resolution that its
    /// contract does not accept.
    #[error("policy configuration error: {reason}")]
    Configuration {
        /// Human-readable cause.
        reason: String,
    },

    /// The policy store could not be queried.
    #[error("policy store: {0}")]
    Store(#[from] StoreError),
}

impl PolicyError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::PolicyError;
    ///
    /// let err = PolicyError::Configuration { reason: "no policy".into() };
    /// assert_eq!(err.as_label(), "policy_configuration");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PolicyError::MalformedBackoff { .. } => "policy_malformed_backoff",
            PolicyError::InvalidRecord { .. } => "policy_invalid_record",
            PolicyError::Configuration { .. } => "policy_configuration",
            PolicyError::Store(_) => "policy_store",
        }
    }
}

/// # Errors produced by a [`PolicyStore`](crate::PolicyStore).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Stored records could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The backing storage is not reachable.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// # Errors produced by job execution.
///
/// These represent the outcome of one attempt of a job body. `Fail` and
/// `Timeout` count against the fault budget, `Release` only consumes an
/// attempt, `Fatal` ends the job immediately.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Attempt exceeded its timeout duration.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable fatal error (never retried).
    #[error("fatal error (no retry): {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },

    /// Attempt failed but may succeed if retried.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// The job handed itself back for another attempt without faulting.
    ///
    /// `delay` overrides the policy backoff when set.
    #[error("released for retry")]
    Release {
        /// Delay before the next attempt.
        delay: Option<Duration>,
    },

    /// Attempt was cancelled due to worker shutdown.
    #[error("context cancelled")]
    Canceled,
}

impl JobError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Timeout { .. } => "job_timeout",
            JobError::Fatal { .. } => "job_fatal",
            JobError::Fail { .. } => "job_failed",
            JobError::Release { .. } => "job_released",
            JobError::Canceled => "job_canceled",
        }
    }

    /// Indicates whether another attempt may follow this error.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    ///
    /// assert!(JobError::Fail { reason: "boom".into() }.is_retryable());
    /// assert!(!JobError::Fatal { reason: "nope".into() }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobError::Fail { .. } | JobError::Timeout { .. } | JobError::Release { .. }
        )
    }

    /// Indicates whether the error counts against the fault budget.
    pub fn is_fault(&self) -> bool {
        matches!(self, JobError::Fail { .. } | JobError::Timeout { .. })
    }
}

/// # Errors produced by the worker runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some jobs remained stuck.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of jobs that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}
