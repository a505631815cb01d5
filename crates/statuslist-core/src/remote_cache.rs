use crate::{
    CacheEntry, CacheKey, PartitionKind, PartitionName, Result,
    cancel::cancellable,
    store::{ListStore, ListTx},
};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Keeps the last verified copy of each remote issuer's status list.
///
/// Every issuer host gets its own single-row partition keyed by
/// [`CacheKey`]. Entries are overwritten on each successful verification and
/// never evicted.
pub struct RemoteCache<S> {
    store: Arc<S>,
}

impl<S> Clone for RemoteCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ListStore> RemoteCache<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stores `bits` as the current list of `key`, stamped with the current
    /// time.
    #[instrument(skip(self, bits, cancel), fields(key = %key, len = bits.len()))]
    pub async fn store(&self, key: &CacheKey, bits: &[u8], cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, async {
            let partition = PartitionName::for_cache(key)?;
            let mut tx = self.store.begin().await?;
            tx.ensure_partition(&partition, PartitionKind::Cache).await?;
            tx.write_cache_entry(&partition, bits, Utc::now()).await?;
            tx.commit().await
        })
        .await
    }

    /// Returns the cached list of `key`, if any.
    #[instrument(skip(self, cancel), fields(key = %key))]
    pub async fn fetch(&self, key: &CacheKey, cancel: &CancellationToken) -> Result<Option<CacheEntry>> {
        cancellable(cancel, async {
            let partition = PartitionName::for_cache(key)?;
            let mut tx = self.store.begin().await?;
            let entry = tx.read_cache_entry(&partition).await?;
            tx.commit().await?;
            Ok(entry)
        })
        .await
    }
}
