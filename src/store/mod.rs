//! # Policy storage contract.
//!
//! The engine never owns persistence. It consumes a [`PolicyStore`] that maps a
//! policy id to an **active** [`PolicyRecord`]. The active filter is part of
//! the lookup itself, so to the resolver an inactive record and a missing one
//! are indistinguishable.
//!
//! [`MemoryPolicyStore`] is the in-process implementation used by tests,
//! demos and small deployments that load their policies from JSON.

mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::policies::PolicyRecord;

pub use memory::MemoryPolicyStore;

/// Lookup contract for stored job policies.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use jobvisor::{PolicyRecord, PolicyStore, StoreError};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl PolicyStore for Fixed {
///     async fn find_active_policy(&self, id: &str) -> Result<Option<PolicyRecord>, StoreError> {
///         Ok((id == "default").then(|| PolicyRecord::new("default")))
///     }
/// }
/// ```
#[async_trait]
pub trait PolicyStore: Send + Sync + 'static {
    /// Returns the record for `id` if it exists **and** is active.
    async fn find_active_policy(&self, id: &str) -> Result<Option<PolicyRecord>, StoreError>;
}
