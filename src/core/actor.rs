//! # JobActor: drives one job through its retry policy.
//!
//! The actor owns the attempt counter and the fault counter; the
//! [`RetryController`] only reads them and answers with directives.
//!
//! ## Event flow
//! ```text
//! [PolicyRejected] ─► exit Rejected
//! [DispatchDelayed] ─► sleep(initial delay)
//! loop {
//!   JobStarting ─► run_once ─► JobStopped  ─► exit Succeeded
//!                           ├► JobFailed (fatal) ─► JobDead ─► exit Fatal
//!                           ├► JobFailed / JobReleased
//!                           │     └─► after_fault(&directive, faults)
//!                           │           ├─ Stop(FaultBudgetExceeded) ─► FaultBudgetExceeded
//!                           │           ├─ Stop(Exhausted)           ─► AttemptsExhausted
//!                           │           └─ Retry{delay}
//!                           │                 ├─ window overrun ─► WindowElapsed
//!                           │                 └─ BackoffScheduled ─► sleep(delay)
//!                           └► (cancelled) ─► exit Canceled
//! }
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially** (never concurrent for one actor).
//! - The attempt counter is monotonic and starts at 1.
//! - Only `Fail` and `Timeout` increment the fault counter; `Release` only spends an attempt.
//! - A `Release { delay: Some(d) }` overrides the policy backoff for that wait.
//! - Managed jobs use the policy ceiling only; pass-through jobs use
//!   `default_max_attempts` and `default_backoff`.
//! - Cancellation is checked at safe points: before each attempt, while
//!   waiting for a permit and during every sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::Semaphore;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::runner::run_once;
use crate::error::JobError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{JobRef, JobSpec};
use crate::retry::{AttemptDirective, NextStep, RetryController, Terminal};

/// Why an actor stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorExit {
    /// An attempt completed successfully.
    Succeeded,
    /// The attempts ceiling was reached.
    Exhausted,
    /// The fault budget was used up.
    FaultBudgetExceeded,
    /// The next attempt would have started outside the policy's time window.
    WindowElapsed,
    /// The job returned a fatal error.
    Fatal,
    /// The policy was unusable (or missing while required); the job never ran.
    Rejected,
    /// The worker was shut down.
    Canceled,
}

impl ActorExit {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActorExit::Succeeded => "succeeded",
            ActorExit::Exhausted => "exhausted",
            ActorExit::FaultBudgetExceeded => "fault_budget_exceeded",
            ActorExit::WindowElapsed => "window_elapsed",
            ActorExit::Fatal => "fatal",
            ActorExit::Rejected => "rejected",
            ActorExit::Canceled => "canceled",
        }
    }

    /// True when the job will never succeed without outside intervention.
    pub fn is_dead(&self) -> bool {
        !matches!(self, ActorExit::Succeeded | ActorExit::Canceled)
    }
}

/// Final report of one job run by the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    /// Job name.
    pub job: String,
    /// Why the actor stopped.
    pub exit: ActorExit,
    /// Attempts started.
    pub attempts: u32,
    /// Attempts that counted as faults.
    pub faults: u32,
}

/// Defaults the actor falls back to when the job has no policy.
#[derive(Clone, Copy, Debug)]
pub struct JobActorParams {
    /// Per-attempt timeout (`None` = no timeout).
    pub timeout: Option<Duration>,
    /// Attempts ceiling for pass-through jobs (min 1).
    pub default_max_attempts: u32,
    /// Delay between attempts for pass-through jobs.
    pub default_backoff: Duration,
}

/// Runs one job under its [`RetryController`].
pub struct JobActor {
    job: JobRef,
    controller: Arc<RetryController>,
    params: JobActorParams,
    bus: Bus,
    semaphore: Option<Arc<Semaphore>>,
}

impl JobActor {
    pub fn new(
        spec: &JobSpec,
        params: JobActorParams,
        bus: Bus,
        semaphore: Option<Arc<Semaphore>>,
    ) -> Self {
        Self {
            job: Arc::clone(spec.job()),
            controller: Arc::clone(spec.controller()),
            params: JobActorParams {
                timeout: spec.timeout().or(params.timeout),
                ..params
            },
            bus,
            semaphore,
        }
    }

    /// Runs attempts until the job succeeds, stops for good, or `token` is cancelled.
    pub async fn run(self, token: CancellationToken) -> JobOutcome {
        let mut attempt: u32 = 0;
        let mut faults: u32 = 0;
        let exit = self.drive(&token, &mut attempt, &mut faults).await;

        JobOutcome {
            job: self.job.name().to_string(),
            exit,
            attempts: attempt,
            faults,
        }
    }

    async fn drive(
        &self,
        token: &CancellationToken,
        attempt: &mut u32,
        faults: &mut u32,
    ) -> ActorExit {
        let name = self.job.name();

        if let Err(err) = self.controller.ensure_runnable() {
            self.bus.publish(
                Event::new(EventKind::PolicyRejected)
                    .with_job(name)
                    .with_reason(err.to_string()),
            );
            return ActorExit::Rejected;
        }

        let lane = self.controller.lane().cloned().map(Arc::new);
        let started = Instant::now();

        if let Some(delay) = self.controller.initial_delay().filter(|d| !d.is_zero()) {
            let mut ev = Event::new(EventKind::DispatchDelayed)
                .with_job(name)
                .with_delay(delay);
            if let Some(lane) = &lane {
                ev = ev.with_lane(lane);
            }
            self.bus.publish(ev);

            if !sleep_or_cancel(delay, token).await {
                return ActorExit::Canceled;
            }
        }

        loop {
            if token.is_cancelled() {
                return ActorExit::Canceled;
            }
            let permit = match &self.semaphore {
                Some(sem) => select! {
                    res = Arc::clone(sem).acquire_owned() => match res {
                        Ok(permit) => Some(permit),
                        Err(_closed) => return ActorExit::Canceled,
                    },
                    _ = token.cancelled() => return ActorExit::Canceled,
                },
                None => None,
            };

            *attempt += 1;
            let directive = match self.controller.begin_attempt(*attempt) {
                Ok(d) => d,
                Err(err) => {
                    self.bus.publish(
                        Event::new(EventKind::PolicyRejected)
                            .with_job(name)
                            .with_reason(err.to_string()),
                    );
                    return ActorExit::Rejected;
                }
            };

            let mut ev = Event::new(EventKind::JobStarting)
                .with_job(name)
                .with_attempt(*attempt)
                .with_extra(directive.extra());
            if let Some(lane) = &lane {
                ev = ev.with_lane(lane);
            }
            self.bus.publish(ev);

            let res = run_once(
                self.job.as_ref(),
                token,
                self.params.timeout,
                directive.clone(),
                lane.clone(),
                &self.bus,
            )
            .await;
            drop(permit);

            let err = match res {
                Ok(()) => return ActorExit::Succeeded,
                Err(JobError::Canceled) => return ActorExit::Canceled,
                Err(err) => err,
            };
            if !err.is_retryable() {
                self.publish_terminal(EventKind::JobDead, *attempt, &err);
                return ActorExit::Fatal;
            }
            if err.is_fault() {
                *faults += 1;
            }

            let delay = match self.next_step(&directive, *faults) {
                NextStep::Stop(Terminal::FaultBudgetExceeded) => {
                    self.publish_terminal(EventKind::FaultBudgetExceeded, *attempt, &err);
                    return ActorExit::FaultBudgetExceeded;
                }
                NextStep::Stop(Terminal::Exhausted) => {
                    self.publish_terminal(EventKind::AttemptsExhausted, *attempt, &err);
                    return ActorExit::Exhausted;
                }
                NextStep::Stop(Terminal::Success) => return ActorExit::Succeeded,
                NextStep::Retry { delay } => match &err {
                    JobError::Release { delay: Some(requested) } => *requested,
                    _ => delay.unwrap_or(self.params.default_backoff),
                },
            };

            if let Some(window) = self.controller.time_window().filter(|w| !w.is_zero()) {
                if started.elapsed() + delay > window {
                    self.publish_terminal(EventKind::WindowElapsed, *attempt, &err);
                    return ActorExit::WindowElapsed;
                }
            }

            self.bus.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_job(name)
                    .with_attempt(*attempt)
                    .with_delay(delay)
                    .with_reason(err.to_string()),
            );
            if !sleep_or_cancel(delay, token).await {
                return ActorExit::Canceled;
            }
        }
    }

    /// Controller decision, with the pass-through ceiling applied on top.
    fn next_step(&self, directive: &AttemptDirective, faults: u32) -> NextStep {
        match self.controller.after_fault(directive, faults) {
            NextStep::Retry { .. }
                if !self.controller.is_managed()
                    && directive.attempt >= self.params.default_max_attempts.max(1) =>
            {
                NextStep::Stop(Terminal::Exhausted)
            }
            step => step,
        }
    }

    fn publish_terminal(&self, kind: EventKind, attempt: u32, err: &JobError) {
        self.bus.publish(
            Event::new(kind)
                .with_job(self.job.name())
                .with_attempt(attempt)
                .with_reason(err.to_string()),
        );
    }
}

/// Sleeps for `delay`; returns `false` if `token` was cancelled first.
async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    select! {
        _ = time::sleep(delay) => true,
        _ = token.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use crate::jobs::{JobContext, JobFn};
    use crate::policies::{Backoff, JitterPolicy, Lane, PolicyDescriptor};
    use crate::retry::JobExtra;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn params() -> JobActorParams {
        JobActorParams {
            timeout: None,
            default_max_attempts: 3,
            default_backoff: Duration::from_secs(3),
        }
    }

    fn managed(desc: PolicyDescriptor) -> RetryController {
        RetryController::managed(Arc::new(desc))
    }

    fn actor(job: JobRef, controller: RetryController, bus: &Bus) -> JobActor {
        JobActor::new(&JobSpec::new(job, controller, None), params(), bus.clone(), None)
    }

    fn failing(name: &'static str, calls: Arc<AtomicU32>) -> JobRef {
        JobFn::arc(name, move |_ctx: JobContext| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(JobError::Fail {
                    reason: "boom".into(),
                })
            }
        })
    }

    fn assert_elapsed(start: Instant, secs: u64) {
        let elapsed = start.elapsed();
        let expected = Duration::from_secs(secs);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "elapsed {elapsed:?}, expected ~{secs}s"
        );
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_policy_end_to_end() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let seen = Arc::new(Mutex::new(Vec::<JobExtra>::new()));
        let record = Arc::clone(&seen);
        let job: JobRef = JobFn::arc("mail", move |ctx: JobContext| {
            record.lock().unwrap().push(ctx.extra());
            async move {
                Err::<(), _>(JobError::Fail {
                    reason: "smtp".into(),
                })
            }
        });
        let desc = PolicyDescriptor::new(
            "mail",
            3,
            Backoff::Staged(vec![Duration::from_secs(2), Duration::from_secs(4)]),
        );

        let start = Instant::now();
        let out = actor(job, managed(desc), &bus)
            .run(CancellationToken::new())
            .await;

        assert_eq!(out.exit, ActorExit::Exhausted);
        assert_eq!(out.attempts, 3);
        assert_eq!(out.faults, 3);
        assert_elapsed(start, 6);

        let extras = seen.lock().unwrap().clone();
        let flags: Vec<_> = extras
            .iter()
            .map(|x| (x.attempts, x.is_last_attempt, x.is_retry))
            .collect();
        assert_eq!(flags, vec![(1, false, false), (2, false, true), (3, true, true)]);

        let delays: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == EventKind::BackoffScheduled)
            .map(|e| e.delay_ms)
            .collect();
        assert_eq!(delays, vec![Some(2_000), Some(4_000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jittered_sleep_matches_directive() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let told = Arc::new(Mutex::new(Vec::<Option<u32>>::new()));
        let record = Arc::clone(&told);
        let job: JobRef = JobFn::arc("jitter", move |ctx: JobContext| {
            let ms = ctx.directive().backoff.map(|d| d.as_millis() as u32);
            record.lock().unwrap().push(ms);
            async move {
                Err::<(), _>(JobError::Fail {
                    reason: "flaky".into(),
                })
            }
        });
        let desc = PolicyDescriptor::new("p", 6, Backoff::Fixed(Duration::from_secs(100)));
        let ctrl = managed(desc).with_jitter(JitterPolicy::Full);

        let out = actor(job, ctrl, &bus).run(CancellationToken::new()).await;
        assert_eq!(out.exit, ActorExit::Exhausted);

        let scheduled: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == EventKind::BackoffScheduled)
            .map(|e| e.delay_ms)
            .collect();
        let mut told = told.lock().unwrap().clone();
        // the last attempt is not followed by a backoff
        told.pop();
        assert_eq!(scheduled.len(), 5);
        assert_eq!(told, scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_budget_stops_early() {
        let bus = Bus::new(64);
        let calls = Arc::new(AtomicU32::new(0));
        let desc = PolicyDescriptor::new("p", 10, Backoff::Fixed(Duration::from_secs(1)))
            .with_max_exceptions(Some(2));

        let out = actor(failing("budget", calls.clone()), managed(desc), &bus)
            .run(CancellationToken::new())
            .await;

        assert_eq!(out.exit, ActorExit::FaultBudgetExceeded);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_through_uses_defaults() {
        let bus = Bus::new(64);
        let calls = Arc::new(AtomicU32::new(0));

        let start = Instant::now();
        let out = actor(failing("free", calls.clone()), RetryController::pass_through(), &bus)
            .run(CancellationToken::new())
            .await;

        assert_eq!(out.exit, ActorExit::Exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_elapsed(start, 6);
    }

    #[tokio::test]
    async fn test_rejected_policy_never_runs() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let calls = Arc::new(AtomicU32::new(0));
        let ctrl = RetryController::from_resolution(Err(PolicyError::Configuration {
            reason: "broken".into(),
        }));

        let out = actor(failing("bad", calls.clone()), ctrl, &bus)
            .run(CancellationToken::new())
            .await;

        assert_eq!(out.exit, ActorExit::Rejected);
        assert_eq!(out.attempts, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::PolicyRejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_is_not_a_fault() {
        let bus = Bus::new(64);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let job: JobRef = JobFn::arc("release", move |_ctx: JobContext| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(JobError::Release {
                        delay: Some(Duration::from_secs(10)),
                    })
                } else {
                    Ok(())
                }
            }
        });
        let desc = PolicyDescriptor::new("p", 5, Backoff::Fixed(Duration::from_secs(1)))
            .with_max_exceptions(Some(1));

        let start = Instant::now();
        let out = actor(job, managed(desc), &bus)
            .run(CancellationToken::new())
            .await;

        assert_eq!(out.exit, ActorExit::Succeeded);
        assert_eq!(out.attempts, 3);
        assert_eq!(out.faults, 0);
        assert_elapsed(start, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_elapsed() {
        let bus = Bus::new(64);
        let calls = Arc::new(AtomicU32::new(0));
        let desc = PolicyDescriptor::new("p", 10, Backoff::Fixed(Duration::from_secs(5)))
            .with_time_window(Some(Duration::from_secs(12)));

        let out = actor(failing("window", calls.clone()), managed(desc), &bus)
            .run(CancellationToken::new())
            .await;

        assert_eq!(out.exit, ActorExit::WindowElapsed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_and_lane() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let job: JobRef = JobFn::arc("lane", |ctx: JobContext| async move {
            match ctx.lane() {
                Some(lane) if lane.queue.as_deref() == Some("mail") => Ok(()),
                _ => Err(JobError::Fatal {
                    reason: "wrong lane".into(),
                }),
            }
        });
        let desc = PolicyDescriptor::new("p", 1, Backoff::default())
            .with_initial_delay(Some(Duration::from_secs(30)))
            .with_lane(Lane::new(Some("redis".into()), Some("mail".into())));

        let start = Instant::now();
        let out = actor(job, managed(desc), &bus)
            .run(CancellationToken::new())
            .await;

        assert_eq!(out.exit, ActorExit::Succeeded);
        assert_elapsed(start, 30);
        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, EventKind::DispatchDelayed);
        assert_eq!(first.lane.as_deref(), Some("redis/mail"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_stops_immediately() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let job: JobRef = JobFn::arc("fatal", |_ctx: JobContext| async {
            Err::<(), _>(JobError::Fatal {
                reason: "bad input".into(),
            })
        });

        let out = actor(job, RetryController::pass_through(), &bus)
            .run(CancellationToken::new())
            .await;

        assert_eq!(out.exit, ActorExit::Fatal);
        assert_eq!(out.attempts, 1);
        assert!(drain(&mut rx).iter().any(|e| e.kind == EventKind::JobDead));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let bus = Bus::new(64);
        let calls = Arc::new(AtomicU32::new(0));
        let desc = PolicyDescriptor::new("p", 5, Backoff::Fixed(Duration::from_secs(60)));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(10)).await;
            canceller.cancel();
        });

        let out = actor(failing("cancel", calls.clone()), managed(desc), &bus)
            .run(token)
            .await;

        assert_eq!(out.exit, ActorExit::Canceled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
