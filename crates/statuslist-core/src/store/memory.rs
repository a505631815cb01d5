//! In-process [`ListStore`] used as a test double.
//!
//! A transaction takes an exclusive lock on the whole store and works on a
//! private copy of it; [`ListTx::commit`] publishes the copy, dropping the
//! transaction discards it. That is stricter than PostgreSQL's row locks but
//! gives the same observable guarantees: no duplicate indices, no partial
//! writes, and rollback on every exit path.

use super::{ListStore, ListTx};
use crate::{CacheEntry, Error, PartitionKind, PartitionName, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use statuslist::{BitList, ListId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug)]
enum Partition {
    Tenant {
        lists: BTreeMap<ListId, BitList>,
        last_id: ListId,
    },
    Cache {
        entry: Option<CacheEntry>,
    },
}

#[derive(Clone, Debug, Default)]
struct State {
    partitions: HashMap<PartitionName, Partition>,
}

/// A [`ListStore`] that keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent [`ListStore::begin`] fail and
    /// [`ListStore::ping`] report `false`, simulating a lost database.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns a committed list, bypassing transactions.
    pub async fn snapshot_list(&self, partition: &PartitionName, list_id: ListId) -> Option<BitList> {
        match self.state.lock().await.partitions.get(partition) {
            Some(Partition::Tenant { lists, .. }) => lists.get(&list_id).cloned(),
            _ => None,
        }
    }

    /// Returns the committed number of lists in a tenant partition.
    pub async fn list_count(&self, partition: &PartitionName) -> usize {
        match self.state.lock().await.partitions.get(partition) {
            Some(Partition::Tenant { lists, .. }) => lists.len(),
            _ => 0,
        }
    }

    pub async fn has_partition(&self, partition: &PartitionName) -> bool {
        self.state.lock().await.partitions.contains_key(partition)
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::transaction(
                "could not start transaction",
                "memory store is unavailable",
            ));
        }
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = (*guard).clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn ping(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

/// A transaction on a [`MemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

impl MemoryTx {
    fn tenant_lists(&mut self, partition: &PartitionName) -> Result<&mut BTreeMap<ListId, BitList>> {
        match self.staged.partitions.get_mut(partition) {
            Some(Partition::Tenant { lists, .. }) => Ok(lists),
            Some(Partition::Cache { .. }) => Err(Error::Invariant {
                reason: format!("{partition} is a cache partition"),
            }),
            None => Err(Error::not_found(partition.subject())),
        }
    }
}

#[async_trait]
impl ListTx for MemoryTx {
    async fn ensure_partition(
        &mut self,
        partition: &PartitionName,
        kind: PartitionKind,
    ) -> Result<bool> {
        if self.staged.partitions.contains_key(partition) {
            return Ok(false);
        }
        let created = match kind {
            PartitionKind::Tenant => Partition::Tenant {
                lists: BTreeMap::new(),
                last_id: 0,
            },
            PartitionKind::Cache => Partition::Cache { entry: None },
        };
        self.staged.partitions.insert(partition.clone(), created);
        Ok(true)
    }

    async fn find_allocatable_list(&mut self, partition: &PartitionName) -> Result<Option<BitList>> {
        Ok(self
            .tenant_lists(partition)?
            .values()
            .find(|list| !list.is_fully_allocated())
            .cloned())
    }

    async fn lock_list(&mut self, partition: &PartitionName, list_id: ListId) -> Result<BitList> {
        self.fetch_list(partition, list_id).await
    }

    async fn fetch_list(&mut self, partition: &PartitionName, list_id: ListId) -> Result<BitList> {
        self.tenant_lists(partition)?
            .get(&list_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("list {list_id}")))
    }

    async fn insert_list(&mut self, partition: &PartitionName, list: &BitList) -> Result<ListId> {
        match self.staged.partitions.get_mut(partition) {
            Some(Partition::Tenant { lists, last_id }) => {
                *last_id += 1;
                let mut stored = list.clone();
                stored.set_list_id(*last_id);
                lists.insert(*last_id, stored);
                Ok(*last_id)
            }
            Some(Partition::Cache { .. }) => Err(Error::Invariant {
                reason: format!("{partition} is a cache partition"),
            }),
            None => Err(Error::not_found(partition.subject())),
        }
    }

    async fn update_list(&mut self, partition: &PartitionName, list: &BitList) -> Result<()> {
        let stored = self
            .tenant_lists(partition)?
            .get_mut(&list.list_id())
            .ok_or_else(|| Error::not_found(format!("list {}", list.list_id())))?;
        *stored = list.clone();
        Ok(())
    }

    async fn write_cache_entry(
        &mut self,
        partition: &PartitionName,
        bits: &[u8],
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        match self.staged.partitions.get_mut(partition) {
            Some(Partition::Cache { entry }) => {
                *entry = Some(CacheEntry {
                    bits: bits.to_vec(),
                    last_updated: updated_at,
                });
                Ok(())
            }
            Some(Partition::Tenant { .. }) => Err(Error::Invariant {
                reason: format!("{partition} is a tenant partition"),
            }),
            None => Err(Error::not_found(partition.subject())),
        }
    }

    async fn read_cache_entry(&mut self, partition: &PartitionName) -> Result<Option<CacheEntry>> {
        match self.staged.partitions.get(partition) {
            Some(Partition::Cache { entry }) => Ok(entry.clone()),
            _ => Ok(None),
        }
    }

    async fn commit(mut self) -> Result<()> {
        *self.guard = self.staged;
        Ok(())
    }
}
