//! # Per-attempt job context.
//!
//! [`JobContext`] is handed to [`Job::spawn`](crate::Job::spawn) once per
//! attempt. It carries the attempt's cancellation token (a child of the
//! worker token, cancelled on timeout) and the [`AttemptDirective`] computed
//! at the start of the attempt.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::policies::Lane;
use crate::retry::{AttemptDirective, JobExtra};

/// What a job body knows about the attempt it runs in.
#[derive(Clone, Debug)]
pub struct JobContext {
    token: CancellationToken,
    directive: AttemptDirective,
    lane: Option<Arc<Lane>>,
}

impl JobContext {
    pub fn new(
        token: CancellationToken,
        directive: AttemptDirective,
        lane: Option<Arc<Lane>>,
    ) -> Self {
        Self {
            token,
            directive,
            lane,
        }
    }

    /// Cancellation token of this attempt.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the attempt is cancelled (shutdown or timeout).
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn directive(&self) -> &AttemptDirective {
        &self.directive
    }

    /// Current attempt ordinal (1-based).
    pub fn attempt(&self) -> u32 {
        self.directive.attempt
    }

    /// True when this is the final attempt the policy allows.
    pub fn is_last_attempt(&self) -> bool {
        self.directive.is_last_attempt
    }

    /// True on any attempt after the first.
    pub fn is_retry(&self) -> bool {
        self.directive.is_retry
    }

    pub fn extra(&self) -> JobExtra {
        self.directive.extra()
    }

    /// Lane requested by the policy, if any.
    pub fn lane(&self) -> Option<&Lane> {
        self.lane.as_deref()
    }
}
