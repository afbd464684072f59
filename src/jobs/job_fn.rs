//! # Function-backed job (`JobFn`)
//!
//! [`JobFn`] wraps a closure `F: Fn(JobContext) -> Fut`, producing a fresh
//! future per attempt. State shared between attempts must be captured
//! explicitly (`Arc<...>`).
//!
//! ## Example
//! ```rust
//! use jobvisor::{JobContext, JobError, JobFn, JobRef};
//!
//! let job: JobRef = JobFn::arc("send-invoice", |ctx: JobContext| async move {
//!     if ctx.is_last_attempt() {
//!         // final try: notify before giving up...
//!     }
//!     Ok::<_, JobError>(())
//! });
//! assert_eq!(job.name(), "send-invoice");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use crate::error::JobError;
use crate::jobs::JobContext;
use crate::jobs::job::{BoxJobFuture, Job};

/// Function-backed job implementation.
#[derive(Debug)]
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the job as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> Job for JobFn<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, ctx: JobContext) -> BoxJobFuture {
        Box::pin((self.f)(ctx))
    }
}
