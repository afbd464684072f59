//! # Demo: staged_backoff
//!
//! Loads policies from JSON, resolves them and runs three jobs:
//! - `send-mail` under a staged policy (`"1,2"`), succeeding on its last attempt
//! - `import-feed` under a policy with a fault budget of 2
//! - `cleanup` with no policy (pass-through defaults from [`Config`])
//!
//! Events are written through `tracing` by [`LogWriter`].
//!
//! ## Flow
//! ```text
//! send-mail:   JobStarting(1) → JobFailed → BackoffScheduled(1s)
//!              JobStarting(2) → JobFailed → BackoffScheduled(2s)
//!              JobStarting(3, is_last_attempt) → JobStopped
//! import-feed: JobStarting(1) → JobFailed → BackoffScheduled(1s)
//!              JobStarting(2) → JobFailed → FaultBudgetExceeded
//! cleanup:     JobStarting(1) → JobStopped
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example staged_backoff --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use jobvisor::{
    Config, JobContext, JobError, JobFn, JobRef, JobSpec, LogWriter, MemoryPolicyStore,
    PolicyResolver, Subscribe, Worker,
};
use tracing_subscriber::EnvFilter;

const POLICIES: &str = r#"[
    { "id": "mail",  "title": "Outgoing mail", "active": 1, "max_retry_count": 3,
      "backoff_period": "1,2", "connection": "redis", "queue": "mail" },
    { "id": "feeds", "title": "Feed import", "active": true, "max_retry_count": 5,
      "max_exceptions_count": 2, "backoff_period": 1 },
    { "id": "old",   "title": "Retired", "active": 0, "max_retry_count": 9 }
]"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config {
        grace: Duration::from_secs(5),
        default_backoff: Duration::from_millis(500),
        ..Config::default()
    };
    let store = MemoryPolicyStore::from_json(POLICIES)?;
    let resolver = PolicyResolver::from_config(Arc::new(store), &cfg);

    let mail: JobRef = JobFn::arc("send-mail", |ctx: JobContext| async move {
        let lane = ctx.lane().map(ToString::to_string).unwrap_or_default();
        println!("[send-mail] extra={} lane={lane}", ctx.extra().to_value());
        if ctx.is_last_attempt() {
            Ok(())
        } else {
            Err(JobError::Fail {
                reason: "smtp 421".into(),
            })
        }
    });
    let feed: JobRef = JobFn::arc("import-feed", |_ctx: JobContext| async move {
        Err::<(), _>(JobError::Fail {
            reason: "upstream 503".into(),
        })
    });
    let cleanup: JobRef = JobFn::arc("cleanup", |_ctx: JobContext| async move {
        Ok::<(), JobError>(())
    });

    let specs = vec![
        JobSpec::resolve(mail, &resolver, "mail", &cfg).await?,
        JobSpec::resolve(feed, &resolver, "feeds", &cfg).await?,
        JobSpec::resolve(cleanup, &resolver, "old", &cfg).await?,
    ];

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let worker = Worker::new(cfg, subs);
    for outcome in worker.run(specs).await? {
        println!(
            "{:<12} exit={:<22} attempts={} faults={}",
            outcome.job,
            outcome.exit.as_label(),
            outcome.attempts,
            outcome.faults
        );
    }

    Ok(())
}
