//! # LogWriter: events as `tracing` records.
//!
//! Routes every [`Event`] to a `tracing` macro at a level matching its kind.
//! Install any `tracing` subscriber (for example `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO  jobvisor::events: starting job="mail" lane="redis/mail" attempt=1 is_last_attempt=false
//! WARN  jobvisor::events: failed job="mail" attempt=1 reason="smtp refused"
//! INFO  jobvisor::events: backoff job="mail" after_attempt=1 delay_ms=2000
//! ERROR jobvisor::events: attempts exhausted job="mail" attempt=3
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let job = e.job.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ShutdownRequested => info!(target: "jobvisor::events", "shutdown requested"),
            EventKind::AllStoppedWithin => {
                info!(target: "jobvisor::events", "all jobs stopped within grace")
            }
            EventKind::GraceExceeded => warn!(target: "jobvisor::events", "grace exceeded"),
            EventKind::DispatchDelayed => info!(
                target: "jobvisor::events",
                job,
                lane = e.lane.as_deref(),
                delay_ms = e.delay_ms,
                "dispatch delayed"
            ),
            EventKind::JobStarting => info!(
                target: "jobvisor::events",
                job,
                lane = e.lane.as_deref(),
                attempt = e.attempt,
                is_last_attempt = e.extra.map(|x| x.is_last_attempt),
                "starting"
            ),
            EventKind::JobStopped => {
                debug!(target: "jobvisor::events", job, attempt = e.attempt, "stopped")
            }
            EventKind::JobFailed => {
                warn!(target: "jobvisor::events", job, attempt = e.attempt, reason, "failed")
            }
            EventKind::JobReleased => info!(
                target: "jobvisor::events",
                job,
                attempt = e.attempt,
                delay_ms = e.delay_ms,
                "released"
            ),
            EventKind::TimeoutHit => warn!(
                target: "jobvisor::events",
                job,
                attempt = e.attempt,
                timeout_ms = e.timeout_ms,
                "timeout"
            ),
            EventKind::BackoffScheduled => info!(
                target: "jobvisor::events",
                job,
                after_attempt = e.attempt,
                delay_ms = e.delay_ms,
                reason,
                "backoff"
            ),
            EventKind::PolicyRejected => {
                error!(target: "jobvisor::events", job, reason, "policy rejected")
            }
            EventKind::AttemptsExhausted => error!(
                target: "jobvisor::events",
                job,
                attempt = e.attempt,
                reason,
                "attempts exhausted"
            ),
            EventKind::FaultBudgetExceeded => error!(
                target: "jobvisor::events",
                job,
                attempt = e.attempt,
                reason,
                "fault budget exceeded"
            ),
            EventKind::WindowElapsed => {
                error!(target: "jobvisor::events", job, attempt = e.attempt, "time window elapsed")
            }
            EventKind::JobDead => {
                error!(target: "jobvisor::events", job, attempt = e.attempt, reason, "dead")
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "jobvisor::events", subscriber = job, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(target: "jobvisor::events", subscriber = job, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
