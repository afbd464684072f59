//! # Worker: runs job actors, fans out events and shuts down gracefully.
//!
//! The [`Worker`] owns the event bus, the subscribers, the [`AliveTracker`]
//! and a root [`CancellationToken`]. `run` starts a listener feeding a
//! [`SubscriberSet`], spawns one [`JobActor`] per [`JobSpec`] and returns when
//! every actor has exited or shutdown has completed. Before returning it stops
//! the listener and waits until every subscriber has handled the events
//! published during the run.
//!
//! ## Architecture
//! ```text
//! Worker::run(Vec<JobSpec>)
//!   ├─ spawn listener (bus ─► AliveTracker + SubscriberSet)
//!   ├─ semaphore from cfg.max_concurrent (None = unlimited)
//!   ├─ JobActor::new(spec, params, bus, sem) ─► set.spawn(actor.run(child token))
//!   └─ wait for the first of:
//!        ├─ all actors exited              → Ok(outcomes)
//!        ├─ OS signal / Worker::shutdown() → ShutdownRequested
//!        │                                    └─ cancel root token
//!        │                                    └─ wait up to cfg.grace:
//!        │                                         ├─ all joined → AllStoppedWithin, Ok(outcomes)
//!        │                                         └─ timeout    → GraceExceeded,
//!        │                                                          Err(GraceExceeded{stuck})
//!   └─ stop listener ─► drain bus ─► SubscriberSet::shutdown (queues flushed)
//!
//! Event flow:
//!   JobActor ── publish ──► Bus ──► listener ──► AliveTracker::update
//!                                           └──► SubscriberSet::emit ──► subscribers
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use jobvisor::{
//!     ActorExit, Config, JobContext, JobError, JobFn, JobRef, JobSpec,
//!     MemoryPolicyStore, PolicyRecord, PolicyResolver, Worker,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = Config::default();
//! let store = MemoryPolicyStore::from_records([
//!     PolicyRecord::new("reports").with_max_retry_count(2).with_backoff_period("0"),
//! ]);
//! let resolver = PolicyResolver::from_config(Arc::new(store), &cfg);
//!
//! let job: JobRef = JobFn::arc("build-report", |ctx: JobContext| async move {
//!     if ctx.is_retry() {
//!         Ok(())
//!     } else {
//!         Err(JobError::Fail { reason: "cold cache".into() })
//!     }
//! });
//! let spec = JobSpec::resolve(job, &resolver, "reports", &cfg).await?;
//!
//! let worker = Worker::new(cfg, Vec::new());
//! let outcomes = worker.run(vec![spec]).await?;
//! assert_eq!(outcomes[0].exit, ActorExit::Succeeded);
//! assert_eq!(outcomes[0].attempts, 2);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::actor::{JobActor, JobActorParams, JobOutcome};
use crate::core::alive::AliveTracker;
use crate::core::shutdown;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::JobSpec;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Coordinates job actors, event delivery and graceful shutdown.
pub struct Worker {
    cfg: Config,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    alive: Arc<AliveTracker>,
    token: CancellationToken,
}

impl Worker {
    /// Creates a worker delivering events to `subscribers` while it runs.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            cfg,
            bus,
            subscribers,
            alive: Arc::new(AliveTracker::new()),
            token: CancellationToken::new(),
        }
    }

    /// Bus carrying every runtime event.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Jobs currently inside an attempt.
    pub async fn alive(&self) -> Vec<String> {
        self.alive.snapshot().await
    }

    /// Root token; cancelling it starts a graceful shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests a graceful shutdown of a running [`Worker::run`].
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Runs `jobs` until every actor exits or shutdown completes.
    ///
    /// Outcomes are returned in the order of `jobs`. Every event published
    /// during the run has reached the subscribers when this returns.
    /// Must be called inside a Tokio runtime.
    pub async fn run(&self, jobs: Vec<JobSpec>) -> Result<Vec<JobOutcome>, RuntimeError> {
        let listener = Listener::spawn(self);
        let res = self.drive(jobs).await;
        listener.stop().await;
        res
    }

    async fn drive(&self, jobs: Vec<JobSpec>) -> Result<Vec<JobOutcome>, RuntimeError> {
        let semaphore = self
            .cfg
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        let params = JobActorParams {
            timeout: self.cfg.default_timeout(),
            default_max_attempts: self.cfg.default_max_attempts_clamped(),
            default_backoff: self.cfg.default_backoff,
        };

        let mut set = JoinSet::new();
        for (idx, spec) in jobs.iter().enumerate() {
            let actor = JobActor::new(spec, params, self.bus.clone(), semaphore.clone());
            let child = self.token.child_token();
            set.spawn(async move { (idx, actor.run(child).await) });
        }

        let mut outcomes = Vec::with_capacity(jobs.len());
        let finished = tokio::select! {
            _ = join_all(&mut set, &mut outcomes) => true,
            _ = shutdown::shutdown_signal() => false,
            _ = self.token.cancelled() => false,
        };
        if !finished {
            self.bus.publish(Event::new(EventKind::ShutdownRequested));
            self.token.cancel();
            self.wait_with_grace(&mut set, &mut outcomes).await?;
        }

        outcomes.sort_by_key(|(idx, _)| *idx);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    async fn wait_with_grace(
        &self,
        set: &mut JoinSet<(usize, JobOutcome)>,
        outcomes: &mut Vec<(usize, JobOutcome)>,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        match tokio::time::timeout(grace, join_all(set, outcomes)).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                set.abort_all();
                let stuck = self.alive.snapshot().await;
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

/// Forwards bus events to the alive tracker and the subscriber set for the
/// duration of one [`Worker::run`].
struct Listener {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Listener {
    /// Subscribes to the bus before returning, so no event of the run is missed.
    fn spawn(worker: &Worker) -> Self {
        let rx = worker.bus.subscribe();
        let subs = SubscriberSet::new(worker.subscribers.clone(), worker.bus.clone());
        let stop = CancellationToken::new();
        let handle = tokio::spawn(listen(rx, Arc::clone(&worker.alive), subs, stop.clone()));
        Self { stop, handle }
    }

    /// Stops listening, then waits for every subscriber queue to drain.
    async fn stop(self) {
        self.stop.cancel();
        if let Err(err) = self.handle.await {
            tracing::error!(error = %err, "event listener did not complete");
        }
    }
}

async fn listen(
    mut rx: broadcast::Receiver<Event>,
    alive: Arc<AliveTracker>,
    subs: SubscriberSet,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            res = rx.recv() => match res {
                Ok(ev) => forward(&ev, &alive, &subs).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            },
            _ = stop.cancelled() => break,
        }
    }
    // events published before the stop request
    loop {
        match rx.try_recv() {
            Ok(ev) => forward(&ev, &alive, &subs).await,
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event listener lagged behind the bus");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    subs.shutdown().await;
}

async fn forward(ev: &Event, alive: &AliveTracker, subs: &SubscriberSet) {
    alive.update(ev).await;
    subs.emit(ev);
}

async fn join_all(set: &mut JoinSet<(usize, JobOutcome)>, out: &mut Vec<(usize, JobOutcome)>) {
    while let Some(res) = set.join_next().await {
        match res {
            Ok(outcome) => out.push(outcome),
            Err(err) => tracing::error!(error = %err, "job actor did not complete"),
        }
    }
}
