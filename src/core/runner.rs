//! # Run a single attempt of a job.
//!
//! Executes one attempt of a [`Job`] with an optional timeout and publishes
//! the attempt's terminal event to the [`Bus`].
//!
//! ## Event flow
//! ```text
//! Success:      job.spawn() → Ok(())                → JobStopped
//! Cancellation: job.spawn() → Err(Canceled)         → JobStopped
//! Release:      job.spawn() → Err(Release)          → JobReleased
//! Failure:      job.spawn() → Err(Fail/Fatal)       → JobFailed
//! Timeout:      deadline → cancel child → TimeoutHit → JobFailed
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** of `JobStopped`, `JobReleased`, `JobFailed`.
//! - `TimeoutHit` is published **in addition to** `JobFailed`.
//! - Each attempt runs on a **child token**; cancelling it never affects the parent.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{Job, JobContext};
use crate::policies::Lane;
use crate::retry::AttemptDirective;

/// Executes one attempt of `job` under `directive`.
pub async fn run_once<J: Job + ?Sized>(
    job: &J,
    parent: &CancellationToken,
    timeout: Option<Duration>,
    directive: AttemptDirective,
    lane: Option<Arc<Lane>>,
    bus: &Bus,
) -> Result<(), JobError> {
    let attempt = directive.attempt;
    let child = parent.child_token();
    let fut = job.spawn(JobContext::new(child.clone(), directive, lane));

    let res = match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, fut).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_job(job.name())
                        .with_attempt(attempt)
                        .with_timeout(dur),
                );
                Err(JobError::Timeout { timeout: dur })
            }
        },
        None => fut.await,
    };

    let ev = match &res {
        Ok(()) | Err(JobError::Canceled) => Event::new(EventKind::JobStopped),
        Err(JobError::Release { delay }) => {
            let ev = Event::new(EventKind::JobReleased);
            match delay {
                Some(d) => ev.with_delay(*d),
                None => ev,
            }
        }
        Err(e) => Event::new(EventKind::JobFailed).with_reason(e.to_string()),
    };
    bus.publish(ev.with_job(job.name()).with_attempt(attempt));
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobFn, JobRef};
    use crate::retry::RetryController;

    fn directive() -> AttemptDirective {
        RetryController::pass_through().begin_attempt(1).unwrap()
    }

    fn kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_publishes_hit_then_failed() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let job: JobRef = JobFn::arc("slow", |ctx: JobContext| async move {
            ctx.cancelled().await;
            Err::<(), _>(JobError::Canceled)
        });

        let res = run_once(
            job.as_ref(),
            &CancellationToken::new(),
            Some(Duration::from_secs(1)),
            directive(),
            None,
            &bus,
        )
        .await;

        assert!(matches!(res, Err(JobError::Timeout { .. })));
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::TimeoutHit, EventKind::JobFailed]
        );
    }

    #[tokio::test]
    async fn test_release_publishes_released() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let job: JobRef = JobFn::arc("later", |_ctx: JobContext| async {
            Err::<(), _>(JobError::Release {
                delay: Some(Duration::from_secs(30)),
            })
        });

        let parent = CancellationToken::new();
        let res = run_once(job.as_ref(), &parent, None, directive(), None, &bus).await;

        assert!(matches!(res, Err(JobError::Release { .. })));
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::JobReleased);
        assert_eq!(ev.delay_ms, Some(30_000));
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_context_carries_directive() {
        let bus = Bus::new(4);
        let job: JobRef = JobFn::arc("check", |ctx: JobContext| async move {
            if ctx.attempt() == 1 && !ctx.is_retry() && ctx.lane().is_none() {
                Ok(())
            } else {
                Err(JobError::Fatal {
                    reason: "unexpected context".into(),
                })
            }
        });

        let res = run_once(
            job.as_ref(),
            &CancellationToken::new(),
            None,
            directive(),
            None,
            &bus,
        )
        .await;
        assert!(res.is_ok());
    }
}
