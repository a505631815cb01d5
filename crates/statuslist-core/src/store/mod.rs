//! Persistence of status lists.
//!
//! A store maps each tenant onto its own partition (one table per tenant) and
//! exposes the small set of transactional primitives the allocator, revoker
//! and remote cache are built from. All concurrency control happens inside
//! the store: callers hold no locks of their own and never read and then
//! write a list outside a single transaction.
//!
//! ## Structure
//!
//! - [`ListStore`] - a connection handle that opens transactions.
//! - [`ListTx`] - one open transaction. Dropping it without calling
//!   [`ListTx::commit`] rolls it back.
//! - [`postgres::PgStore`] - the PostgreSQL implementation.
//! - [`memory::MemoryStore`] - an in-process double with the same
//!   transactional semantics, for tests.

pub mod memory;
pub mod postgres;

use crate::{CacheEntry, PartitionKind, PartitionName, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use statuslist::{BitList, ListId};

/// A handle to a transactional list store.
///
/// Implementations are cheap to share behind an [`Arc`](std::sync::Arc) and
/// are safe to use from many concurrent requests.
#[async_trait]
pub trait ListStore: Send + Sync + 'static {
    type Tx: ListTx;

    /// Opens a read-committed, read-write transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Returns whether the store currently answers requests.
    async fn ping(&self) -> bool;

    /// Releases the underlying connections.
    async fn close(&self) {}
}

/// An open transaction on a [`ListStore`].
#[async_trait]
pub trait ListTx: Send {
    /// Creates `partition` if it does not exist yet.
    ///
    /// Creation runs under a store-wide exclusive lock that is released when
    /// the transaction ends, so concurrent callers never race on the same
    /// name. Returns `true` if this call created the partition.
    async fn ensure_partition(
        &mut self,
        partition: &PartitionName,
        kind: PartitionKind,
    ) -> Result<bool>;

    /// Locks and returns one list of `partition` that still has free
    /// indices, or `None` if every list is exhausted.
    ///
    /// The row lock is held until the transaction ends. Concurrent callers
    /// block on it and then re-evaluate against the committed row.
    async fn find_allocatable_list(&mut self, partition: &PartitionName) -> Result<Option<BitList>>;

    /// Locks and returns list `list_id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`](crate::Error::NotFound) if the list or the
    /// partition does not exist.
    async fn lock_list(&mut self, partition: &PartitionName, list_id: ListId) -> Result<BitList>;

    /// Reads list `list_id` without locking it.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`](crate::Error::NotFound) if the list or the
    /// partition does not exist.
    async fn fetch_list(&mut self, partition: &PartitionName, list_id: ListId) -> Result<BitList>;

    /// Inserts a new list and returns the identifier the store assigned.
    async fn insert_list(&mut self, partition: &PartitionName, list: &BitList) -> Result<ListId>;

    /// Persists the bits and free count of an existing list.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`](crate::Error::NotFound) if no row has the list's
    /// identifier.
    async fn update_list(&mut self, partition: &PartitionName, list: &BitList) -> Result<()>;

    /// Overwrites the cached bits of a cache partition, inserting the entry
    /// if the partition holds none yet.
    async fn write_cache_entry(
        &mut self,
        partition: &PartitionName,
        bits: &[u8],
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Reads the cached entry of a cache partition.
    ///
    /// A missing partition reads as `None`.
    async fn read_cache_entry(&mut self, partition: &PartitionName) -> Result<Option<CacheEntry>>;

    /// Commits every change made in this transaction.
    async fn commit(self) -> Result<()>;
}
