//! # Job liveness tracker with sequence-based ordering.
//!
//! Tracks which jobs are inside an attempt right now, so the worker can name
//! the stuck ones when the shutdown grace period runs out.
//!
//! ```text
//! Worker ──► Bus ──► listener ──► AliveTracker::update()
//!                                        │
//!                                        ▼
//!                          HashMap<String, JobState> (name → {seq, running})
//! ```
//!
//! ## Rules
//! - `JobStarting` opens an attempt; `JobStopped` / `JobFailed` / `JobReleased` close one.
//! - Job names need not be unique: jobs sharing a name share one counter, and a
//!   stuck report lists the name once per attempt still open.
//! - Other events only advance the job's last seen `seq`.
//! - Events with `seq <= last_seq` are **rejected** (stale).

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};

#[derive(Debug, Clone, Copy)]
struct JobState {
    last_seq: u64,
    running: u32,
}

/// Thread-safe tracker of jobs currently running an attempt.
#[derive(Debug, Default)]
pub struct AliveTracker {
    state: RwLock<HashMap<String, JobState>>,
}

impl AliveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `ev` if it is newer than the last event seen for its job.
    ///
    /// Returns `true` when the running count was written.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(name) = ev.job.as_deref() else {
            return false;
        };
        let opens = match ev.kind {
            EventKind::JobStarting => Some(true),
            EventKind::JobStopped | EventKind::JobFailed | EventKind::JobReleased => Some(false),
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => return false,
            _ => None,
        };

        let mut state = self.state.write().await;
        let entry = state.entry(name.to_string()).or_insert(JobState {
            last_seq: 0,
            running: 0,
        });
        if entry.last_seq != 0 && ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;
        match opens {
            Some(true) => entry.running += 1,
            Some(false) => entry.running = entry.running.saturating_sub(1),
            None => return false,
        }
        true
    }

    /// Sorted names of jobs currently inside an attempt, one entry per open attempt.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state
            .iter()
            .flat_map(|(name, js)| std::iter::repeat_n(name.clone(), js.running as usize))
            .collect();
        alive.sort_unstable();
        alive
    }

    pub async fn is_alive(&self, name: &str) -> bool {
        self.state
            .read()
            .await
            .get(name)
            .is_some_and(|js| js.running > 0)
    }
}
