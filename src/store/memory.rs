//! # In-memory policy store.
//!
//! Keeps records keyed by id plus a separate index of active ids, the same
//! shape as the `job_policies` table with its index on `active`:
//!
//! ```text
//! find_active_policy(id):
//!   ├─ id ∉ active index → None
//!   └─ id ∈ active index → records[id].clone()
//! ```

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::policies::PolicyRecord;
use crate::store::PolicyStore;

#[derive(Default)]
struct Tables {
    records: HashMap<String, PolicyRecord>,
    active: HashSet<String>,
}

impl Tables {
    fn insert(&mut self, record: PolicyRecord) -> Option<PolicyRecord> {
        if record.active {
            self.active.insert(record.id.clone());
        } else {
            self.active.remove(&record.id);
        }
        self.records.insert(record.id.clone(), record)
    }
}

/// Policy store backed by a `HashMap` with an `active` index.
#[derive(Default)]
pub struct MemoryPolicyStore {
    tables: RwLock<Tables>,
}

impl MemoryPolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `records`; later duplicates replace earlier ones.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = PolicyRecord>) -> Self {
        let mut tables = Tables::default();
        for record in records {
            tables.insert(record);
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Loads a JSON array of records.
    ///
    /// # Example
    /// ```
    /// use jobvisor::MemoryPolicyStore;
    ///
    /// let store = MemoryPolicyStore::from_json(r#"[
    ///     { "id": "mail", "active": 1, "max_retry_count": 3, "backoff_period": "2,4" }
    /// ]"#).unwrap();
    /// ```
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let records: Vec<PolicyRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    /// Inserts or replaces a record; returns the previous one.
    pub async fn upsert(&self, record: PolicyRecord) -> Option<PolicyRecord> {
        self.tables.write().await.insert(record)
    }

    /// Removes a record; returns it if it existed.
    pub async fn remove(&self, id: &str) -> Option<PolicyRecord> {
        let mut tables = self.tables.write().await;
        tables.active.remove(id);
        tables.records.remove(id)
    }

    /// Flips the `active` flag of a stored record.
    ///
    /// Returns `false` if no record has this id.
    pub async fn set_active(&self, id: &str, active: bool) -> bool {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let Some(record) = tables.records.get_mut(id) else {
            return false;
        };
        record.active = active;
        if active {
            tables.active.insert(id.to_string());
        } else {
            tables.active.remove(id);
        }
        true
    }

    /// Number of stored records, active or not.
    pub async fn len(&self) -> usize {
        self.tables.read().await.records.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.records.is_empty()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn find_active_policy(&self, id: &str) -> Result<Option<PolicyRecord>, StoreError> {
        let tables = self.tables.read().await;
        if !tables.active.contains(id) {
            return Ok(None);
        }
        Ok(tables.records.get(id).cloned())
    }
}
