//! # Job specification for policy-driven execution.
//!
//! [`JobSpec`] bundles a job with the [`RetryController`] that governs it and
//! an optional per-attempt timeout.
//!
//! A spec can be created:
//! - **Explicitly** with [`JobSpec::new`]
//! - **From a policy id** with [`JobSpec::resolve`] (fails on broken policies)
//! - **From a resolution result** with [`JobSpec::from_resolution`] (broken
//!   policies are kept and reported by the worker as `PolicyRejected`)

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::PolicyError;
use crate::jobs::JobRef;
use crate::resolver::{PolicyResolver, Resolution};
use crate::retry::RetryController;

/// Specification for running a job under its retry policy.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use jobvisor::{
///     Config, JobContext, JobError, JobFn, JobRef, JobSpec, MemoryPolicyStore,
///     PolicyRecord, PolicyResolver,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryPolicyStore::from_records([
///     PolicyRecord::new("mail").with_max_retry_count(3).with_backoff_period("2,4"),
/// ]);
/// let cfg = Config::default();
/// let resolver = PolicyResolver::from_config(Arc::new(store), &cfg);
///
/// let job: JobRef = JobFn::arc("send-mail", |_ctx: JobContext| async move {
///     Ok::<(), JobError>(())
/// });
///
/// let spec = JobSpec::resolve(job, &resolver, "mail", &cfg).await?;
/// assert_eq!(spec.controller().max_attempts(), Some(3));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JobSpec {
    job: JobRef,
    controller: Arc<RetryController>,
    timeout: Option<Duration>,
}

impl JobSpec {
    /// Creates a spec with explicit parameters.
    pub fn new(job: JobRef, controller: RetryController, timeout: Option<Duration>) -> Self {
        Self {
            job,
            controller: Arc::new(controller),
            timeout,
        }
    }

    /// Resolves `policy_id` and builds a spec inheriting jitter, policy
    /// requirement and timeout from `cfg`.
    ///
    /// Fails when the record is malformed, the store fails, or no active
    /// policy exists while `cfg.require_policy` is set.
    pub async fn resolve(
        job: JobRef,
        resolver: &PolicyResolver,
        policy_id: &str,
        cfg: &Config,
    ) -> Result<Self, PolicyError> {
        let resolution = resolver.resolve(policy_id).await?;
        let spec = Self::from_resolution(job, Ok(resolution), cfg);
        spec.controller.ensure_runnable()?;
        Ok(spec)
    }

    /// Builds a spec from a resolution result without failing.
    pub fn from_resolution(
        job: JobRef,
        resolution: Result<Resolution, PolicyError>,
        cfg: &Config,
    ) -> Self {
        let controller = RetryController::from_resolution(resolution)
            .with_jitter(cfg.jitter)
            .require_policy(cfg.require_policy);
        Self::new(job, controller, cfg.default_timeout())
    }

    /// Spec for a job without any policy.
    pub fn unmanaged(job: JobRef, cfg: &Config) -> Self {
        Self::from_resolution(job, Ok(Resolution::Absent), cfg)
    }

    pub fn job(&self) -> &JobRef {
        &self.job
    }

    /// Convenience: returns the job name.
    pub fn name(&self) -> &str {
        self.job.name()
    }

    pub fn controller(&self) -> &Arc<RetryController> {
        &self.controller
    }

    /// Per-attempt timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns a new spec with updated timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::jobs::{JobContext, JobFn};
    use crate::policies::PolicyRecord;
    use crate::store::MemoryPolicyStore;

    fn noop() -> JobRef {
        JobFn::arc("noop", |_ctx: JobContext| async { Ok::<(), JobError>(()) })
    }

    fn resolver(records: Vec<PolicyRecord>) -> PolicyResolver {
        PolicyResolver::new(Arc::new(MemoryPolicyStore::from_records(records)))
    }

    #[tokio::test]
    async fn test_resolve_fails_loudly_on_malformed() {
        let r = resolver(vec![PolicyRecord::new("p").with_backoff_period("5,x,20")]);
        let err = JobSpec::resolve(noop(), &r, "p", &Config::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "policy_malformed_backoff");
    }

    #[tokio::test]
    async fn test_resolve_absent_is_pass_through() {
        let r = resolver(vec![]);
        let spec = JobSpec::resolve(noop(), &r, "missing", &Config::default())
            .await
            .unwrap();
        assert!(!spec.controller().is_managed());
        assert!(spec.timeout().is_none());
    }

    #[tokio::test]
    async fn test_resolve_absent_rejected_when_required() {
        let cfg = Config {
            require_policy: true,
            ..Config::default()
        };
        let err = JobSpec::resolve(noop(), &resolver(vec![]), "missing", &cfg)
            .await
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "policy_configuration");
    }

    #[tokio::test]
    async fn test_config_timeout_inherited() {
        let cfg = Config {
            timeout: Duration::from_secs(9),
            ..Config::default()
        };
        let spec = JobSpec::unmanaged(noop(), &cfg);
        assert_eq!(spec.timeout(), Some(Duration::from_secs(9)));
        assert_eq!(spec.name(), "noop");
    }
}
