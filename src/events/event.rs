//! # Runtime events emitted by the worker and job actors.
//!
//! The [`EventKind`] enum classifies event types:
//! - **Attempt events**: one attempt's flow (starting, stopped, failed, released, timeout)
//! - **Scheduling events**: dispatch delay and backoff before the next attempt
//! - **Terminal events**: why a job will not run again
//! - **Runtime events**: shutdown and subscriber health
//!
//! The [`Event`] struct carries metadata such as the job name, lane, attempt
//! extras and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_job("invoice-sync")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(4));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.job.as_deref(), Some("invoice-sync"));
//! assert_eq!(ev.delay_ms, Some(4_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::policies::Lane;
use crate::retry::JobExtra;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `job` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `job` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or worker token).
    ShutdownRequested,

    /// All jobs stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some jobs did not stop in time.
    GraceExceeded,

    // === Scheduling events ===
    /// First attempt postponed by the policy's initial delay.
    ///
    /// Sets: `job`, `lane`, `delay_ms`.
    DispatchDelayed,

    /// Next attempt scheduled after a failed or released attempt.
    ///
    /// Sets: `job`, `attempt` (previous attempt), `delay_ms`, `reason`.
    BackoffScheduled,

    // === Attempt events ===
    /// An attempt is starting.
    ///
    /// Sets: `job`, `lane`, `attempt`, `extra`.
    JobStarting,

    /// Attempt finished successfully **or** was cancelled gracefully.
    ///
    /// Sets: `job`, `attempt`.
    JobStopped,

    /// Attempt failed (counts against the fault budget unless fatal).
    ///
    /// Sets: `job`, `attempt`, `reason`.
    JobFailed,

    /// Attempt handed the job back for a later attempt without faulting.
    ///
    /// Sets: `job`, `attempt`, `delay_ms` (if requested).
    JobReleased,

    /// Attempt exceeded its timeout.
    ///
    /// Sets: `job`, `attempt`, `timeout_ms`.
    TimeoutHit,

    // === Terminal events ===
    /// Job was refused because its policy is unusable or missing.
    ///
    /// Sets: `job`, `reason`.
    PolicyRejected,

    /// Attempts ceiling reached.
    ///
    /// Sets: `job`, `attempt`, `reason` (last failure).
    AttemptsExhausted,

    /// Fault budget used up before the attempts ceiling.
    ///
    /// Sets: `job`, `attempt`, `reason` (last failure).
    FaultBudgetExceeded,

    /// The policy's time window would be overrun by the next attempt.
    ///
    /// Sets: `job`, `attempt`.
    WindowElapsed,

    /// Job returned a fatal error.
    ///
    /// Sets: `job`, `attempt`, `reason`.
    JobDead,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the job, if applicable.
    pub job: Option<Arc<str>>,
    /// Lane the job runs on (`connection/queue`).
    pub lane: Option<Arc<str>>,
    /// Attempt ordinal (starting from 1).
    pub attempt: Option<u32>,
    /// Attempt extras as seen by the job body.
    pub extra: Option<JobExtra>,
    /// Attempt timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job: None,
            lane: None,
            attempt: None,
            extra: None,
            timeout_ms: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a job name.
    #[inline]
    pub fn with_job(mut self, job: impl Into<Arc<str>>) -> Self {
        self.job = Some(job.into());
        self
    }

    /// Attaches a lane.
    #[inline]
    pub fn with_lane(mut self, lane: &Lane) -> Self {
        self.lane = Some(lane.to_string().into());
        self
    }

    /// Attaches an attempt ordinal.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches attempt extras.
    #[inline]
    pub fn with_extra(mut self, extra: JobExtra) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_job(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_job(subscriber)
            .with_reason(info)
    }

    /// True for events after which the job never runs again.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::PolicyRejected
                | EventKind::AttemptsExhausted
                | EventKind::FaultBudgetExceeded
                | EventKind::WindowElapsed
                | EventKind::JobDead
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::JobStarting);
        let b = Event::new(EventKind::JobStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::BackoffScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_lane_rendering() {
        let lane = Lane::new(None, Some("mail".into()));
        let ev = Event::new(EventKind::JobStarting).with_lane(&lane);
        assert_eq!(ev.lane.as_deref(), Some("default/mail"));
        assert!(!ev.is_terminal());
        assert!(Event::new(EventKind::FaultBudgetExceeded).is_terminal());
    }
}
