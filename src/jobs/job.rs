//! # Job abstraction.
//!
//! A [`Job`] has a stable [`name`](Job::name) and produces a fresh future per
//! attempt via [`spawn`](Job::spawn). The future receives a [`JobContext`]
//! carrying the cancellation token and the attempt's directive.
//!
//! The common handle type is [`JobRef`], an `Arc<dyn Job>` shared by the worker.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::error::JobError;
use crate::jobs::JobContext;

/// Boxed future returned by [`Job::spawn`].
pub type BoxJobFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send + 'static>>;

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// # Asynchronous, retryable unit of work.
///
/// Implementations return:
/// - `Ok(())` when the work is done,
/// - `Err(JobError::Fail)` for a retryable fault,
/// - `Err(JobError::Release { .. })` to be run again later without a fault,
/// - `Err(JobError::Fatal)` to stop for good,
/// - `Err(JobError::Canceled)` after observing cancellation.
///
/// # Example
/// ```
/// use jobvisor::{BoxJobFuture, Job, JobContext, JobError};
///
/// struct Ping;
///
/// impl Job for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     fn spawn(&self, ctx: JobContext) -> BoxJobFuture {
///         Box::pin(async move {
///             if ctx.is_cancelled() {
///                 return Err(JobError::Canceled);
///             }
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Job: Send + Sync + 'static {
    /// Returns a stable, human-readable job name.
    fn name(&self) -> &str;

    /// Creates the future for one attempt.
    fn spawn(&self, ctx: JobContext) -> BoxJobFuture;
}
