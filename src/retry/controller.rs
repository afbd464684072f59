//! # RetryController: per-job retry state machine.
//!
//! The controller turns a resolved policy plus the attempt ordinal reported by
//! the substrate into scheduling directives. It never sleeps, never counts
//! attempts itself and holds no per-attempt state, so one instance can be
//! shared by `Arc` with the actor driving the job.
//!
//! ## States
//! ```text
//! from_resolution(..)
//!   ├─ Ok(Managed(desc)) → Managed ──► begin_attempt(n) → Running(n)
//!   │                                    └─ after_fault(&directive, faults)
//!   │                                         ├─ faults >= max_exceptions → Stop(FaultBudgetExceeded)
//!   │                                         ├─ n >= max_attempts        → Stop(Exhausted)
//!   │                                         └─ otherwise                → Retry{ directive.backoff }
//!   ├─ Ok(Absent)        → PassThrough ──► directives carry no overrides,
//!   │                                      never claims the last attempt
//!   └─ Err(e)            → Rejected ──► begin_attempt(n) → Err(Configuration)
//! ```
//!
//! ## Rules
//! - `is_last_attempt` is evaluated at the **start** of an attempt, so the job
//!   body can act on its final try while it is still running.
//! - Directive computations never fail; ordinals outside `1..=max_attempts`
//!   are clamped.
//! - Randomness (jitter) only enters in [`RetryController::backoff_for`], which
//!   `begin_attempt` calls once. `after_fault` reuses the directive's delay, so
//!   the job body and the substrate see the same value.

use std::sync::Arc;
use std::time::Duration;

use crate::error::PolicyError;
use crate::policies::{JitterPolicy, Lane, PolicyDescriptor};
use crate::resolver::Resolution;
use crate::retry::directive::{AttemptDirective, JobExtra};

/// What the controller knows about its policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Policy resolved; all directives come from the descriptor.
    Managed(Arc<PolicyDescriptor>),
    /// Policy absent; the substrate's defaults apply.
    PassThrough,
    /// Resolution failed; the job must not run.
    Rejected(PolicyError),
}

/// Terminal outcome of a managed job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// An attempt completed successfully.
    Success,
    /// The attempts ceiling was reached.
    Exhausted,
    /// The fault budget was used up before the ceiling.
    FaultBudgetExceeded,
}

/// Decision taken after an attempt did not succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextStep {
    /// Run another attempt after `delay` (`None` = substrate default).
    Retry { delay: Option<Duration> },
    /// Stop for good.
    Stop(Terminal),
}

/// Computes retry directives for one job.
///
/// # Example
/// ```
/// use std::{sync::Arc, time::Duration};
/// use jobvisor::{Backoff, PolicyDescriptor, RetryController};
///
/// let desc = PolicyDescriptor::new(
///     "mail",
///     3,
///     Backoff::Staged(vec![Duration::from_secs(2), Duration::from_secs(4)]),
/// );
/// let ctrl = RetryController::managed(Arc::new(desc));
///
/// let third = ctrl.begin_attempt(3).unwrap();
/// assert!(third.is_last_attempt);
/// assert!(third.is_retry);
/// assert_eq!(third.backoff, Some(Duration::from_secs(4)));
/// ```
#[derive(Clone, Debug)]
pub struct RetryController {
    state: ControllerState,
    jitter: JitterPolicy,
    require_policy: bool,
}

impl RetryController {
    /// Controller for a resolved policy.
    pub fn managed(descriptor: Arc<PolicyDescriptor>) -> Self {
        Self::with_state(ControllerState::Managed(descriptor))
    }

    /// Controller for a job without a policy.
    pub fn pass_through() -> Self {
        Self::with_state(ControllerState::PassThrough)
    }

    /// Controller for whatever [`PolicyResolver::resolve`](crate::PolicyResolver::resolve)
    /// returned. Errors are kept and reported when the job is invoked.
    pub fn from_resolution(resolution: Result<Resolution, PolicyError>) -> Self {
        Self::with_state(match resolution {
            Ok(Resolution::Managed(desc)) => ControllerState::Managed(desc),
            Ok(Resolution::Absent) => ControllerState::PassThrough,
            Err(err) => ControllerState::Rejected(err),
        })
    }

    fn with_state(state: ControllerState) -> Self {
        Self {
            state,
            jitter: JitterPolicy::None,
            require_policy: false,
        }
    }

    /// Returns the controller with jitter applied to computed delays.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the controller refusing to run without a managed policy.
    pub fn require_policy(mut self, require: bool) -> Self {
        self.require_policy = require;
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Descriptor, when managed.
    pub fn descriptor(&self) -> Option<&Arc<PolicyDescriptor>> {
        match &self.state {
            ControllerState::Managed(desc) => Some(desc),
            _ => None,
        }
    }

    /// True when a policy is in charge.
    pub fn is_managed(&self) -> bool {
        matches!(self.state, ControllerState::Managed(_))
    }

    /// Lane requested by the policy.
    pub fn lane(&self) -> Option<&Lane> {
        self.descriptor().map(|d| d.lane())
    }

    /// Delay before the first attempt.
    pub fn initial_delay(&self) -> Option<Duration> {
        self.descriptor().and_then(|d| d.initial_delay())
    }

    /// Scheduling window of the policy.
    pub fn time_window(&self) -> Option<Duration> {
        self.descriptor().and_then(|d| d.time_window())
    }

    /// Authoritative attempts ceiling; `None` in pass-through.
    pub fn max_attempts(&self) -> Option<u32> {
        self.descriptor().map(|d| d.max_attempts())
    }

    /// Fault budget; `None` when uncapped or in pass-through.
    pub fn max_exceptions(&self) -> Option<u32> {
        self.descriptor().and_then(|d| d.max_exceptions())
    }

    /// Fails if the job must not run under the current state.
    pub fn ensure_runnable(&self) -> Result<(), PolicyError> {
        match &self.state {
            ControllerState::Managed(_) => Ok(()),
            ControllerState::PassThrough if !self.require_policy => Ok(()),
            ControllerState::PassThrough => Err(PolicyError::Configuration {
                reason: "job requires an active policy, none was found".to_string(),
            }),
            ControllerState::Rejected(err) => Err(PolicyError::Configuration {
                reason: err.to_string(),
            }),
        }
    }

    /// Directives for attempt `attempt`, computed at its start.
    pub fn begin_attempt(&self, attempt: u32) -> Result<AttemptDirective, PolicyError> {
        self.ensure_runnable()?;
        let attempt = attempt.max(1);

        Ok(AttemptDirective {
            attempt,
            is_last_attempt: self.is_last_attempt(attempt),
            is_retry: Self::is_retry(attempt),
            backoff: self.backoff_for(attempt),
            max_attempts: self.max_attempts(),
            max_exceptions: self.max_exceptions(),
        })
    }

    /// True when `attempt` is the final one the policy allows.
    ///
    /// Ordinals above the ceiling are clamped to it. Always `false` unless managed.
    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        match self.max_attempts() {
            Some(max) => attempt.clamp(1, max) == max,
            None => false,
        }
    }

    /// True on any attempt after the first.
    pub fn is_retry(attempt: u32) -> bool {
        attempt > 1
    }

    /// Delay to wait after attempt `attempt` faults.
    pub fn backoff_for(&self, attempt: u32) -> Option<Duration> {
        self.descriptor()
            .map(|d| self.jitter.apply(d.backoff().delay_for(attempt)))
    }

    /// Outward-facing extras for `attempt`; defaults when the job cannot run.
    pub fn extra(&self, attempt: u32) -> JobExtra {
        self.begin_attempt(attempt)
            .map(|d| d.extra())
            .unwrap_or_default()
    }

    /// Decides what follows a non-successful attempt run under `directive`.
    ///
    /// `faults` is the number of unhandled faults so far, including this one
    /// if it was a fault. The retry delay is the directive's `backoff`.
    pub fn after_fault(&self, directive: &AttemptDirective, faults: u32) -> NextStep {
        match &self.state {
            ControllerState::Managed(desc) => {
                if desc.max_exceptions().is_some_and(|max| faults >= max) {
                    return NextStep::Stop(Terminal::FaultBudgetExceeded);
                }
                if directive.attempt >= desc.max_attempts() {
                    return NextStep::Stop(Terminal::Exhausted);
                }
                NextStep::Retry {
                    delay: directive.backoff,
                }
            }
            ControllerState::PassThrough => NextStep::Retry { delay: None },
            // never reached: rejected jobs fail in `begin_attempt`
            ControllerState::Rejected(_) => NextStep::Stop(Terminal::Exhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{Backoff, MalformedBackoff};
    use proptest::prelude::*;

    fn staged(max_attempts: u32, stages: &[u64]) -> RetryController {
        let backoff = Backoff::Staged(stages.iter().copied().map(Duration::from_secs).collect());
        RetryController::managed(Arc::new(PolicyDescriptor::new("p", max_attempts, backoff)))
    }

    fn attempt(ctrl: &RetryController, n: u32) -> AttemptDirective {
        ctrl.begin_attempt(n).unwrap()
    }

    fn rejected() -> RetryController {
        RetryController::from_resolution(Err(PolicyError::MalformedBackoff {
            policy: "p".into(),
            source: MalformedBackoff {
                raw: "5,x".into(),
                segment: "x".into(),
            },
        }))
    }

    #[test]
    fn test_end_to_end_staged_directives() {
        let ctrl = staged(3, &[2, 4]);

        let d1 = ctrl.begin_attempt(1).unwrap();
        assert_eq!(d1.backoff, Some(Duration::from_secs(2)));
        assert!(!d1.is_last_attempt);
        assert!(!d1.is_retry);

        let d2 = ctrl.begin_attempt(2).unwrap();
        assert_eq!(d2.backoff, Some(Duration::from_secs(4)));
        assert!(!d2.is_last_attempt);
        assert!(d2.is_retry);

        let d3 = ctrl.begin_attempt(3).unwrap();
        assert_eq!(d3.backoff, Some(Duration::from_secs(4)));
        assert!(d3.is_last_attempt);
        assert!(d3.is_retry);
        assert_eq!(d3.max_attempts, Some(3));
    }

    #[test]
    fn test_attempt_zero_is_clamped() {
        let ctrl = staged(2, &[1]);
        let d = ctrl.begin_attempt(0).unwrap();
        assert_eq!(d.attempt, 1);
        assert!(!d.is_retry);
    }

    #[test]
    fn test_pass_through_has_no_overrides() {
        let ctrl = RetryController::from_resolution(Ok(Resolution::Absent));
        let d = ctrl.begin_attempt(7).unwrap();

        assert!(!d.is_last_attempt);
        assert!(d.is_retry);
        assert!(d.backoff.is_none());
        assert!(d.max_attempts.is_none());
        assert!(d.max_exceptions.is_none());
        assert_eq!(ctrl.after_fault(&d, 7), NextStep::Retry { delay: None });
    }

    #[test]
    fn test_pass_through_rejected_when_policy_required() {
        let ctrl = RetryController::pass_through().require_policy(true);
        let err = ctrl.begin_attempt(1).unwrap_err();
        assert_eq!(err.as_label(), "policy_configuration");
        assert_eq!(ctrl.extra(1), JobExtra::default());
    }

    #[test]
    fn test_rejected_policy_never_runs() {
        let ctrl = rejected();
        let err = ctrl.begin_attempt(1).unwrap_err();
        match err {
            PolicyError::Configuration { reason } => assert!(reason.contains("5,x")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fault_budget_stops_before_ceiling() {
        let desc = PolicyDescriptor::new("p", 5, Backoff::Fixed(Duration::from_secs(1)))
            .with_max_exceptions(Some(2));
        let ctrl = RetryController::managed(Arc::new(desc));

        assert_eq!(
            ctrl.after_fault(&attempt(&ctrl, 1), 1),
            NextStep::Retry {
                delay: Some(Duration::from_secs(1))
            }
        );
        assert_eq!(
            ctrl.after_fault(&attempt(&ctrl, 2), 2),
            NextStep::Stop(Terminal::FaultBudgetExceeded)
        );
    }

    #[test]
    fn test_released_attempts_do_not_spend_budget() {
        let desc = PolicyDescriptor::new("p", 4, Backoff::Fixed(Duration::from_secs(1)))
            .with_max_exceptions(Some(1));
        let ctrl = RetryController::managed(Arc::new(desc));

        assert!(matches!(ctrl.after_fault(&attempt(&ctrl, 1), 0), NextStep::Retry { .. }));
        assert!(matches!(ctrl.after_fault(&attempt(&ctrl, 3), 0), NextStep::Retry { .. }));
        assert_eq!(
            ctrl.after_fault(&attempt(&ctrl, 4), 0),
            NextStep::Stop(Terminal::Exhausted)
        );
    }

    #[test]
    fn test_exhausted_at_ceiling() {
        let ctrl = staged(2, &[3]);
        assert!(matches!(ctrl.after_fault(&attempt(&ctrl, 1), 1), NextStep::Retry { .. }));
        assert_eq!(
            ctrl.after_fault(&attempt(&ctrl, 2), 2),
            NextStep::Stop(Terminal::Exhausted)
        );
    }

    #[test]
    fn test_attempt_above_ceiling_reports_last() {
        let ctrl = staged(2, &[3]);
        assert!(ctrl.is_last_attempt(9));
    }

    #[test]
    fn test_jitter_bounded_by_policy_delay() {
        let ctrl = staged(3, &[10]).with_jitter(JitterPolicy::Full);
        for _ in 0..100 {
            let delay = ctrl.backoff_for(1).unwrap();
            assert!(delay <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_retry_delay_matches_directive_under_jitter() {
        let ctrl = staged(50, &[100]).with_jitter(JitterPolicy::Full);
        for n in 1..20 {
            let d = attempt(&ctrl, n);
            assert_eq!(ctrl.after_fault(&d, n), NextStep::Retry { delay: d.backoff });
        }
    }

    proptest! {
        #[test]
        fn last_attempt_iff_ceiling(max in 1u32..50, n in 1u32..50) {
            let ctrl = staged(max, &[1]);
            prop_assume!(n <= max);
            prop_assert_eq!(ctrl.begin_attempt(n).unwrap().is_last_attempt, n == max);
        }

        #[test]
        fn retry_iff_after_first(max in 1u32..50, n in 1u32..100) {
            let ctrl = staged(max, &[1]);
            prop_assert_eq!(ctrl.begin_attempt(n).unwrap().is_retry, n > 1);
        }

        #[test]
        fn fixed_delay_for_every_attempt(d in 0u64..10_000, n in 1u32..1_000) {
            let desc = PolicyDescriptor::new("p", 3, Backoff::Fixed(Duration::from_secs(d)));
            let ctrl = RetryController::managed(Arc::new(desc));
            prop_assert_eq!(ctrl.backoff_for(n), Some(Duration::from_secs(d)));
        }
    }
}
