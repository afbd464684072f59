//! # Job abstractions and specifications.
//!
//! - [`Job`] trait for async retryable jobs
//! - [`JobFn`] closure-backed job
//! - [`JobRef`] shared handle (`Arc<dyn Job>`)
//! - [`JobContext`] per-attempt token and directive
//! - [`JobSpec`] job bundled with its retry controller

mod context;
mod job;
mod job_fn;
mod spec;

pub use context::JobContext;
pub use job::{BoxJobFuture, Job, JobRef};
pub use job_fn::JobFn;
pub use spec::JobSpec;
