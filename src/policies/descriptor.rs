//! # Resolved, immutable job policy.
//!
//! A [`PolicyDescriptor`] is built once per job from a
//! [`PolicyRecord`](crate::PolicyRecord) by the
//! [`PolicyResolver`](crate::PolicyResolver) and never changes afterwards. It is
//! shared as `Arc<PolicyDescriptor>` between the controller and any number of
//! attempts without synchronization.

use std::fmt;
use std::time::Duration;

use crate::policies::backoff::Backoff;

/// Execution lane: the `(connection, queue)` pair a job is dispatched onto.
///
/// Both parts are opaque to the retry logic; `None` means "substrate default".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Lane {
    /// Connection name.
    pub connection: Option<String>,
    /// Queue name.
    pub queue: Option<String>,
}

impl Lane {
    /// Creates a lane from its parts.
    pub fn new(connection: Option<String>, queue: Option<String>) -> Self {
        Self { connection, queue }
    }

    /// True when neither part is set.
    pub fn is_default(&self) -> bool {
        self.connection.is_none() && self.queue.is_none()
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.connection.as_deref().unwrap_or("default"),
            self.queue.as_deref().unwrap_or("default")
        )
    }
}

/// Validated policy, ready for the [`RetryController`](crate::RetryController).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyDescriptor {
    id: String,
    max_attempts: u32,
    backoff: Backoff,
    max_exceptions: Option<u32>,
    initial_delay: Option<Duration>,
    time_window: Option<Duration>,
    lane: Lane,
}

impl PolicyDescriptor {
    /// Creates a descriptor with the given ceiling and backoff.
    ///
    /// `max_attempts` is clamped to at least `1`.
    pub fn new(id: impl Into<String>, max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            id: id.into(),
            max_attempts: max_attempts.max(1),
            backoff,
            max_exceptions: None,
            initial_delay: None,
            time_window: None,
            lane: Lane::default(),
        }
    }

    /// Returns the descriptor with a fault budget.
    pub fn with_max_exceptions(mut self, max: Option<u32>) -> Self {
        self.max_exceptions = max;
        self
    }

    /// Returns the descriptor with an initial dispatch delay.
    pub fn with_initial_delay(mut self, delay: Option<Duration>) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Returns the descriptor with a scheduling window.
    pub fn with_time_window(mut self, window: Option<Duration>) -> Self {
        self.time_window = window;
        self
    }

    /// Returns the descriptor routed to `lane`.
    pub fn with_lane(mut self, lane: Lane) -> Self {
        self.lane = lane;
        self
    }

    /// Identifier of the policy this descriptor was resolved from.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Total attempts allowed (`>= 1`).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff between attempts.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Unhandled faults tolerated, if capped.
    pub fn max_exceptions(&self) -> Option<u32> {
        self.max_exceptions
    }

    /// Delay before the first attempt, if any.
    pub fn initial_delay(&self) -> Option<Duration> {
        self.initial_delay
    }

    /// Scheduling window, measured from the first dispatch.
    pub fn time_window(&self) -> Option<Duration> {
        self.time_window
    }

    /// Lane the job runs on.
    pub fn lane(&self) -> &Lane {
        &self.lane
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attempts_clamped_to_one() {
        let d = PolicyDescriptor::new("p", 0, Backoff::default());
        assert_eq!(d.max_attempts(), 1);
    }

    #[test]
    fn test_lane_display() {
        let lane = Lane::new(Some("redis".into()), None);
        assert_eq!(lane.to_string(), "redis/default");
        assert!(!lane.is_default());
        assert!(Lane::default().is_default());
    }
}
