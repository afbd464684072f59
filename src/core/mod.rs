//! Runtime core: job execution and lifecycle.
//!
//! - [`runner`]: executes one attempt with timeout/cancellation and event publishing;
//! - [`actor`]: runs a single job under its retry controller;
//! - [`worker`]: orchestrates actors, handles shutdown, global concurrency;
//! - [`alive`]: tracks jobs inside an attempt for stuck-job reports;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod actor;
mod alive;
mod runner;
mod shutdown;
mod worker;

pub use actor::{ActorExit, JobActor, JobActorParams, JobOutcome};
pub use alive::AliveTracker;
pub use runner::run_once;
pub use worker::Worker;
