use crate::{
    Allocation, Error, PartitionKind, PartitionName, Result, TenantId,
    cancel::cancellable,
    store::{ListStore, ListTx},
};
use core::num::NonZeroUsize;
use statuslist::BitList;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Hands out status list indices, one per issued credential.
///
/// Each call runs a single read-committed transaction:
///
/// 1. create the tenant partition if it is missing,
/// 2. lock a list that still has free indices,
/// 3. take its next index and write it back, or insert a fresh list and take
///    index 0 from it when every list is exhausted,
/// 4. commit.
///
/// The row lock taken in step 2 is the only thing keeping two concurrent
/// calls from handing out the same index; the loser blocks until the winner
/// commits and then reads the updated row. Tenants live in separate
/// partitions and never contend.
pub struct Allocator<S> {
    store: Arc<S>,
    list_size_in_bytes: NonZeroUsize,
}

impl<S> Clone for Allocator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            list_size_in_bytes: self.list_size_in_bytes,
        }
    }
}

impl<S: ListStore> Allocator<S> {
    /// New lists are created with `list_size_in_bytes * 8` indices.
    pub const fn new(store: Arc<S>, list_size_in_bytes: NonZeroUsize) -> Self {
        Self {
            store,
            list_size_in_bytes,
        }
    }

    pub const fn list_size_in_bytes(&self) -> NonZeroUsize {
        self.list_size_in_bytes
    }

    /// Allocates the next free index for `tenant`.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fires before the commit; nothing is
    ///   persisted.
    /// - [`Error::TransactionFailure`] if the store fails; the transaction is
    ///   rolled back.
    /// - [`Error::Invariant`] if a list selected as allocatable turns out to
    ///   be full.
    #[instrument(skip(self, tenant, cancel), fields(tenant = %tenant))]
    pub async fn allocate(&self, tenant: &TenantId, cancel: &CancellationToken) -> Result<Allocation> {
        let allocation = cancellable(cancel, self.allocate_in_tx(tenant)).await?;
        tracing::debug!(list_id = allocation.list_id, index = allocation.index, "allocated index");
        Ok(allocation)
    }

    async fn allocate_in_tx(&self, tenant: &TenantId) -> Result<Allocation> {
        let partition = PartitionName::for_tenant(tenant)?;
        let mut tx = self.store.begin().await?;

        tx.ensure_partition(&partition, PartitionKind::Tenant).await?;

        let allocation = match tx.find_allocatable_list(&partition).await? {
            Some(mut list) => {
                let index = list
                    .allocate_next_free_index()
                    .map_err(|e| match e {
                        statuslist::Error::FullyAllocated => Error::Invariant {
                            reason: format!(
                                "list {} was selected as allocatable but is full",
                                list.list_id()
                            ),
                        },
                        other => other.into(),
                    })?;
                tx.update_list(&partition, &list).await?;
                Allocation {
                    list_id: list.list_id(),
                    index,
                }
            }
            None => {
                let mut list = BitList::new(self.list_size_in_bytes.get());
                let index = list.allocate_next_free_index()?;
                let list_id = tx.insert_list(&partition, &list).await?;
                tracing::info!(list_id, capacity = list.capacity_bits(), "created list");
                Allocation { list_id, index }
            }
        };

        tx.commit().await?;
        Ok(allocation)
    }
}
