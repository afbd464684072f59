//! # Policy resolution.
//!
//! [`PolicyResolver`] turns a policy id into a [`Resolution`]:
//!
//! ```text
//! resolve(id)
//!   ├─► store.find_active_policy(id)
//!   │     ├─ Err(e)          → Err(PolicyError::Store)
//!   │     ├─ None            → Ok(Absent)
//!   │     └─ Some(record)
//!   │          ├─ !active    → Ok(Absent)
//!   │          └─ active     → resolve_record(record)
//!   │                             ├─ Ok(desc) → Ok(Managed(Arc<desc>))
//!   │                             └─ Err(e)   → Err(MalformedBackoff | InvalidRecord)
//! ```
//!
//! `Absent` is a normal outcome: the job runs unmanaged under the substrate's
//! defaults. A record that cannot be parsed is a hard error, surfaced here so a
//! broken policy fails at resolution and never halfway through a retry chain.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::PolicyError;
use crate::policies::{Backoff, DEFAULT_DELIMITER, Lane, PolicyDescriptor, PolicyRecord};
use crate::store::PolicyStore;

/// Outcome of resolving a policy id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// An active policy was found and validated.
    Managed(Arc<PolicyDescriptor>),
    /// No active policy with this id; run with substrate defaults.
    Absent,
}

impl Resolution {
    /// Returns the descriptor when managed.
    pub fn descriptor(&self) -> Option<&Arc<PolicyDescriptor>> {
        match self {
            Resolution::Managed(desc) => Some(desc),
            Resolution::Absent => None,
        }
    }

    /// True for [`Resolution::Absent`].
    pub fn is_absent(&self) -> bool {
        matches!(self, Resolution::Absent)
    }
}

/// Resolves policy ids through a [`PolicyStore`].
#[derive(Clone)]
pub struct PolicyResolver {
    store: Arc<dyn PolicyStore>,
    delimiter: char,
}

impl PolicyResolver {
    /// Creates a resolver using the default `,` stage delimiter.
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            delimiter: DEFAULT_DELIMITER,
        }
    }

    /// Creates a resolver using `cfg.backoff_delimiter`.
    pub fn from_config(store: Arc<dyn PolicyStore>, cfg: &Config) -> Self {
        Self::new(store).with_delimiter(cfg.backoff_delimiter)
    }

    /// Returns the resolver with a different stage delimiter.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Stage delimiter in use.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Looks up `policy_id` and validates the record.
    pub async fn resolve(&self, policy_id: &str) -> Result<Resolution, PolicyError> {
        let Some(record) = self.store.find_active_policy(policy_id).await? else {
            tracing::debug!(policy = policy_id, "no active policy, running unmanaged");
            return Ok(Resolution::Absent);
        };
        if !record.active {
            tracing::debug!(policy = policy_id, "store returned inactive policy, ignoring");
            return Ok(Resolution::Absent);
        }

        match self.resolve_record(&record) {
            Ok(desc) => {
                tracing::debug!(
                    policy = policy_id,
                    max_attempts = desc.max_attempts(),
                    stages = desc.backoff().stages(),
                    lane = %desc.lane(),
                    "policy resolved"
                );
                Ok(Resolution::Managed(Arc::new(desc)))
            }
            Err(err) => {
                tracing::warn!(policy = policy_id, error = %err, "policy rejected");
                Err(err)
            }
        }
    }

    /// Validates one record into a descriptor; does not look at `active`.
    ///
    /// Pure: the same record always yields an equal descriptor.
    pub fn resolve_record(&self, record: &PolicyRecord) -> Result<PolicyDescriptor, PolicyError> {
        let id = record.id.as_str();

        let backoff = match record.backoff_period.as_deref().map(str::trim) {
            None | Some("") => Backoff::default(),
            Some(raw) => Backoff::parse(raw, self.delimiter).map_err(|source| {
                PolicyError::MalformedBackoff {
                    policy: id.to_string(),
                    source,
                }
            })?,
        };

        let max_attempts = positive(id, "max_retry_count", record.max_retry_count)?;
        let max_exceptions = record
            .max_exceptions_count
            .map(|v| positive(id, "max_exceptions_count", v))
            .transpose()?;
        let initial_delay = record
            .delay
            .map(|v| seconds(id, "delay", v))
            .transpose()?;
        let time_window = record
            .time_window_period
            .map(|v| seconds(id, "time_window_period", v))
            .transpose()?;

        Ok(PolicyDescriptor::new(id, max_attempts, backoff)
            .with_max_exceptions(max_exceptions)
            .with_initial_delay(initial_delay)
            .with_time_window(time_window)
            .with_lane(Lane::new(record.connection.clone(), record.queue.clone())))
    }
}

fn positive(policy: &str, field: &'static str, value: i64) -> Result<u32, PolicyError> {
    match u32::try_from(value) {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err(PolicyError::InvalidRecord {
            policy: policy.to_string(),
            field,
            reason: format!("expected an integer in 1..={}, got {value}", u32::MAX),
        }),
    }
}

fn seconds(policy: &str, field: &'static str, value: i64) -> Result<Duration, PolicyError> {
    u64::try_from(value)
        .map(Duration::from_secs)
        .map_err(|_| PolicyError::InvalidRecord {
            policy: policy.to_string(),
            field,
            reason: format!("expected non-negative seconds, got {value}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryPolicyStore;
    use async_trait::async_trait;

    fn resolver(records: impl IntoIterator<Item = PolicyRecord>) -> PolicyResolver {
        PolicyResolver::new(Arc::new(MemoryPolicyStore::from_records(records)))
    }

    fn bare() -> PolicyResolver {
        PolicyResolver::new(Arc::new(MemoryPolicyStore::new()))
    }

    fn secs(v: &[u64]) -> Vec<Duration> {
        v.iter().copied().map(Duration::from_secs).collect()
    }

    #[tokio::test]
    async fn test_inactive_resolves_like_missing() {
        let r = resolver([PolicyRecord::new("off").with_active(false)]);

        let inactive = r.resolve("off").await.unwrap();
        let missing = r.resolve("nope").await.unwrap();
        assert_eq!(inactive, Resolution::Absent);
        assert_eq!(inactive, missing);
    }

    #[tokio::test]
    async fn test_inactive_record_from_lenient_store_is_absent() {
        struct Lenient;

        #[async_trait]
        impl PolicyStore for Lenient {
            async fn find_active_policy(
                &self,
                id: &str,
            ) -> Result<Option<PolicyRecord>, StoreError> {
                Ok(Some(PolicyRecord::new(id).with_active(false)))
            }
        }

        let r = PolicyResolver::new(Arc::new(Lenient));
        assert!(r.resolve("any").await.unwrap().is_absent());
    }

    #[tokio::test]
    async fn test_staged_and_fixed_backoff() {
        let r = resolver([
            PolicyRecord::new("staged").with_backoff_period("5,10,20"),
            PolicyRecord::new("fixed").with_backoff_period("7"),
        ]);

        let staged = r.resolve("staged").await.unwrap();
        assert_eq!(
            staged.descriptor().unwrap().backoff(),
            &Backoff::Staged(secs(&[5, 10, 20]))
        );

        let fixed = r.resolve("fixed").await.unwrap();
        assert_eq!(
            fixed.descriptor().unwrap().backoff(),
            &Backoff::Fixed(Duration::from_secs(7))
        );
    }

    #[tokio::test]
    async fn test_malformed_backoff_fails() {
        let r = resolver([PolicyRecord::new("bad").with_backoff_period("5,x,20")]);

        let err = r.resolve("bad").await.unwrap_err();
        assert_eq!(err.as_label(), "policy_malformed_backoff");
        match err {
            PolicyError::MalformedBackoff { policy, source } => {
                assert_eq!(policy, "bad");
                assert_eq!(source.segment, "x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        struct Down;

        #[async_trait]
        impl PolicyStore for Down {
            async fn find_active_policy(
                &self,
                _id: &str,
            ) -> Result<Option<PolicyRecord>, StoreError> {
                Err(StoreError::Unavailable("connection refused".into()))
            }
        }

        let r = PolicyResolver::new(Arc::new(Down));
        let err = r.resolve("p").await.unwrap_err();
        assert!(matches!(err, PolicyError::Store(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_resolve_record_copies_fields() {
        let r = bare();
        let record = PolicyRecord::new("mail")
            .with_max_retry_count(4)
            .with_max_exceptions_count(2)
            .with_delay(10)
            .with_time_window_period(600)
            .with_backoff_period("3")
            .with_connection("redis")
            .with_queue("mail");

        let desc = r.resolve_record(&record).unwrap();
        assert_eq!(desc.id(), "mail");
        assert_eq!(desc.max_attempts(), 4);
        assert_eq!(desc.max_exceptions(), Some(2));
        assert_eq!(desc.initial_delay(), Some(Duration::from_secs(10)));
        assert_eq!(desc.time_window(), Some(Duration::from_secs(600)));
        assert_eq!(desc.lane().to_string(), "redis/mail");
    }

    #[test]
    fn test_defaults_applied() {
        let r = bare();
        let desc = r.resolve_record(&PolicyRecord::new("p")).unwrap();
        assert_eq!(desc.max_attempts(), 2);
        assert_eq!(desc.backoff(), &Backoff::Fixed(Duration::ZERO));
        assert!(desc.max_exceptions().is_none());
        assert!(desc.initial_delay().is_none());
        assert!(desc.lane().is_default());
    }

    #[test]
    fn test_blank_backoff_is_zero() {
        let r = bare();
        let desc = r
            .resolve_record(&PolicyRecord::new("p").with_backoff_period("  "))
            .unwrap();
        assert_eq!(desc.backoff(), &Backoff::Fixed(Duration::ZERO));
    }

    #[test]
    fn test_out_of_range_fields_rejected() {
        let r = bare();

        let err = r
            .resolve_record(&PolicyRecord::new("p").with_max_retry_count(0))
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::InvalidRecord { field: "max_retry_count", .. }
        ));

        let err = r
            .resolve_record(&PolicyRecord::new("p").with_delay(-1))
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidRecord { field: "delay", .. }));

        let err = r
            .resolve_record(&PolicyRecord::new("p").with_max_exceptions_count(0))
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::InvalidRecord { field: "max_exceptions_count", .. }
        ));
    }

    #[test]
    fn test_custom_delimiter() {
        let r = bare().with_delimiter('|');
        let desc = r
            .resolve_record(&PolicyRecord::new("p").with_backoff_period("1|2|3"))
            .unwrap();
        assert_eq!(desc.backoff(), &Backoff::Staged(secs(&[1, 2, 3])));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let r = resolver([PolicyRecord::new("p")
            .with_max_retry_count(3)
            .with_backoff_period("2,4")]);

        let a = r.resolve("p").await.unwrap();
        let b = r.resolve("p").await.unwrap();
        assert_eq!(a, b);
    }
}
