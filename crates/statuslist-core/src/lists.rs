//! The [`StatusLists`] facade.

use crate::{
    Allocation, Allocator, CacheEntry, CacheKey, PartitionName, RemoteCache, Result, Revoker,
    TenantId,
    cancel::cancellable,
    store::{ListStore, ListTx},
};
use core::num::NonZeroUsize;
use statuslist::{BitList, ListId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Every status list capability over one shared store.
///
/// This is what request handlers hold. Cloning is cheap and every clone
/// talks to the same store.
pub struct StatusLists<S> {
    store: Arc<S>,
    allocator: Allocator<S>,
    revoker: Revoker<S>,
    cache: RemoteCache<S>,
}

impl<S> Clone for StatusLists<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            allocator: self.allocator.clone(),
            revoker: self.revoker.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<S: ListStore> StatusLists<S> {
    pub fn new(store: Arc<S>, list_size_in_bytes: NonZeroUsize) -> Self {
        Self {
            allocator: Allocator::new(Arc::clone(&store), list_size_in_bytes),
            revoker: Revoker::new(Arc::clone(&store)),
            cache: RemoteCache::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// See [`Allocator::allocate`].
    pub async fn allocate(&self, tenant: &TenantId, cancel: &CancellationToken) -> Result<Allocation> {
        self.allocator.allocate(tenant, cancel).await
    }

    /// See [`Revoker::revoke`].
    pub async fn revoke(
        &self,
        tenant: &TenantId,
        list_id: ListId,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.revoker.revoke(tenant, list_id, index, cancel).await
    }

    /// Reads list `list_id` of `tenant` without locking it.
    #[instrument(skip(self, tenant, cancel), fields(tenant = %tenant))]
    pub async fn fetch_list(
        &self,
        tenant: &TenantId,
        list_id: ListId,
        cancel: &CancellationToken,
    ) -> Result<BitList> {
        cancellable(cancel, async {
            let partition = PartitionName::for_tenant(tenant)?;
            let mut tx = self.store.begin().await?;
            let list = tx.fetch_list(&partition, list_id).await?;
            tx.commit().await?;
            Ok(list)
        })
        .await
    }

    /// See [`RemoteCache::store`].
    pub async fn cache_list(&self, key: &CacheKey, bits: &[u8], cancel: &CancellationToken) -> Result<()> {
        self.cache.store(key, bits, cancel).await
    }

    /// See [`RemoteCache::fetch`].
    pub async fn cached_list(&self, key: &CacheKey, cancel: &CancellationToken) -> Result<Option<CacheEntry>> {
        self.cache.fetch(key, cancel).await
    }

    pub async fn ping(&self) -> bool {
        self.store.ping().await
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
