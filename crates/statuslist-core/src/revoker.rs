use crate::{
    PartitionName, Result, TenantId,
    cancel::cancellable,
    store::{ListStore, ListTx},
};
use statuslist::ListId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Sets revocation bits.
///
/// Revocation is the only other writer of a list besides the [`Allocator`],
/// and it takes the same row lock, so a revocation and an allocation on the
/// same list never lose each other's update.
///
/// [`Allocator`]: crate::Allocator
pub struct Revoker<S> {
    store: Arc<S>,
}

impl<S> Clone for Revoker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ListStore> Revoker<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Marks `index` of list `list_id` as revoked.
    ///
    /// Revoking an index twice is a no-op. Revoking an index that was never
    /// allocated is accepted.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`](crate::Error::NotFound) if the list does not
    ///   exist.
    /// - [`Error::IndexOutOfRange`](crate::Error::IndexOutOfRange) if the
    ///   index is beyond the list's capacity. Nothing is written.
    /// - [`Error::Cancelled`](crate::Error::Cancelled) if `cancel` fires
    ///   before the commit.
    #[instrument(skip(self, tenant, cancel), fields(tenant = %tenant))]
    pub async fn revoke(
        &self,
        tenant: &TenantId,
        list_id: ListId,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancellable(cancel, async {
            let partition = PartitionName::for_tenant(tenant)?;
            let mut tx = self.store.begin().await?;
            let mut list = tx.lock_list(&partition, list_id).await?;
            list.revoke_at_index(index)?;
            tx.update_list(&partition, &list).await?;
            tx.commit().await
        })
        .await?;
        tracing::info!("revoked index");
        Ok(())
    }
}
