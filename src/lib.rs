//! # jobvisor
//!
//! **Jobvisor** is a policy-driven retry and backoff controller for
//! background jobs.
//!
//! Retry behavior lives in stored policy records (attempt ceilings, fault
//! budgets, fixed or staged backoff, dispatch delay, time window, target
//! lane). A job refers to a policy by id; the policy is resolved once into an
//! immutable descriptor, and a per-job controller turns it into per-attempt
//! directives that the bundled worker runtime honors.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   PolicyStore (records, active index)
//!        │ find_active_policy(id)
//!        ▼
//!   PolicyResolver ── resolve(id) ──► Resolution::{Managed(desc), Absent} | PolicyError
//!        │
//!        ▼
//!   RetryController (Managed | PassThrough | Rejected)
//!        │  begin_attempt(n) ─► AttemptDirective { is_last_attempt, is_retry, backoff, .. }
//!        │  after_fault(&directive, faults) ─► NextStep::{Retry{delay}, Stop(terminal)}
//!        ▼
//!   JobSpec ─────────────► Worker ──► JobActor (one per job, sequential attempts)
//!                             │            │ publish
//!                             │            ▼
//!                             └──────►    Bus ──► listener ──► AliveTracker
//!                                                          └─► SubscriberSet ──► subscribers
//! ```
//!
//! ### Lifecycle of one job
//! ```text
//! [initial delay] ─► loop {
//!   attempt += 1
//!   directive = controller.begin_attempt(attempt)
//!   publish JobStarting{ extra: {attempts, is_last_attempt, is_retry} }
//!   run_once(job, timeout, directive)
//!     ├─ Ok            ─► Succeeded
//!     ├─ Fatal         ─► JobDead
//!     └─ Fail/Timeout/Release
//!          ├─ faults >= max_exceptions ─► FaultBudgetExceeded
//!          ├─ attempt >= max_attempts  ─► AttemptsExhausted
//!          ├─ window would be overrun  ─► WindowElapsed
//!          └─ BackoffScheduled{delay} ─► sleep ─► continue
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                               |
//! |-------------------|----------------------------------------------------------|--------------------------------------------------|
//! | **Policies**      | Stored records and validated descriptors.                | [`PolicyRecord`], [`PolicyDescriptor`], [`Backoff`] |
//! | **Resolution**    | Look up and validate a policy by id.                     | [`PolicyStore`], [`PolicyResolver`], [`Resolution`] |
//! | **Retry control** | Per-attempt directives and stop decisions.               | [`RetryController`], [`AttemptDirective`], [`JobExtra`] |
//! | **Jobs**          | Jobs as trait objects or closures.                       | [`Job`], [`JobFn`], [`JobSpec`]                  |
//! | **Runtime**       | Run jobs with graceful shutdown.                         | [`Worker`], [`JobOutcome`]                       |
//! | **Subscriber API**| Hook into job lifecycle events.                          | [`Subscribe`], [`Event`]                         |
//! | **Errors**        | Typed errors for policies, jobs and the runtime.         | [`PolicyError`], [`JobError`], [`RuntimeError`]  |
//! | **Configuration** | Runtime settings and pass-through defaults.              | [`Config`]                                       |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber writing events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use jobvisor::{
//!     Config, JobContext, JobError, JobFn, JobRef, JobSpec, MemoryPolicyStore,
//!     PolicyResolver, Worker,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryPolicyStore::from_json(
//!         r#"[{ "id": "mail", "active": 1, "max_retry_count": 3, "backoff_period": "0,0" }]"#,
//!     )?;
//!     let cfg = Config::default();
//!     let resolver = PolicyResolver::from_config(Arc::new(store), &cfg);
//!
//!     let job: JobRef = JobFn::arc("send-mail", |ctx: JobContext| async move {
//!         if ctx.is_last_attempt() {
//!             return Ok(());
//!         }
//!         Err(JobError::Fail { reason: "smtp busy".into() })
//!     });
//!     let spec = JobSpec::resolve(job, &resolver, "mail", &cfg).await?;
//!
//!     let outcomes = Worker::new(cfg, Vec::new()).run(vec![spec]).await?;
//!     assert_eq!(outcomes[0].attempts, 3);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod jobs;
mod policies;
mod resolver;
mod retry;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{
    ActorExit, AliveTracker, JobActor, JobActorParams, JobOutcome, Worker, run_once,
};
pub use error::{JobError, PolicyError, RuntimeError, StoreError};
pub use events::{Bus, Event, EventKind};
pub use jobs::{BoxJobFuture, Job, JobContext, JobFn, JobRef, JobSpec};
pub use policies::{
    Backoff, DEFAULT_DELIMITER, DEFAULT_MAX_RETRY_COUNT, JitterPolicy, Lane, MalformedBackoff,
    PolicyDescriptor, PolicyRecord,
};
pub use resolver::{PolicyResolver, Resolution};
pub use retry::{AttemptDirective, ControllerState, JobExtra, NextStep, RetryController, Terminal};
pub use store::{MemoryPolicyStore, PolicyStore};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: a subscriber that writes events through `tracing`.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
