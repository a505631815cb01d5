//! PostgreSQL implementation of [`ListStore`].
//!
//! Layout: one table per tenant,
//! `"tenant_id_<tenant>" (listID SERIAL PRIMARY KEY, list BYTEA, free INT)`,
//! and one table per remote cache key,
//! `"cache_<key>" (listID SERIAL PRIMARY KEY, list BYTEA, lastupdate TIMESTAMP)`.
//!
//! Table names are only ever built from a [`PartitionName`], and always
//! double-quoted, so the catalog name and the name used in statements match
//! exactly.

use super::{ListStore, ListTx};
use crate::{CacheEntry, Error, PartitionKind, PartitionName, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use core::time::Duration;
use sqlx::{
    PgPool, Postgres, Transaction,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use statuslist::{BitList, ListId};
use tracing::instrument;

/// Advisory lock key serializing partition creation across every process
/// sharing the database. Arbitrary but fixed.
const PARTITION_LOCK_KEY: i64 = 0x5354_4154_5553_4c53;

/// SQLSTATE `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Pool settings for [`PgStore::connect`].
#[derive(Clone, Debug)]
pub struct PgStoreOptions {
    pub max_connections: u32,
    /// How long to keep retrying the initial connection.
    pub connect_timeout: Duration,
    /// How long a request may wait for a pooled connection.
    pub acquire_timeout: Duration,
}

impl Default for PgStoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// A [`ListStore`] backed by a PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `url`, retrying with exponential backoff until
    /// `options.connect_timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailure`] if the URL is malformed or no
    /// connection could be established in time.
    pub async fn connect(url: &str, options: &PgStoreOptions) -> Result<Self> {
        let connect_options: PgConnectOptions = url
            .parse()
            .map_err(|e| Error::transaction("invalid database url", e))?;
        let deadline = tokio::time::Instant::now() + options.connect_timeout;
        let mut backoff = Duration::from_millis(250);

        loop {
            let attempt = PgPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.acquire_timeout)
                .connect_with(connect_options.clone())
                .await;

            match attempt {
                Ok(pool) => {
                    tracing::info!(max_connections = options.max_connections, "connected to postgres");
                    return Ok(Self::new(pool));
                }
                Err(e) if tokio::time::Instant::now() + backoff < deadline => {
                    tracing::warn!(error = %e, retry_in_ms = backoff.as_millis() as u64, "postgres not reachable, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
                Err(e) => return Err(Error::transaction("could not connect to postgres", e)),
            }
        }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ListStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::transaction("could not start transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED, READ WRITE")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::transaction("could not configure transaction", e))?;
        Ok(PgTx { tx })
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(sqlx::FromRow)]
struct ListRow {
    #[sqlx(rename = "listid")]
    list_id: ListId,
    list: Vec<u8>,
    free: i32,
}

impl TryFrom<ListRow> for BitList {
    type Error = Error;

    fn try_from(row: ListRow) -> Result<Self> {
        let free = usize::try_from(row.free).map_err(|_| Error::Invariant {
            reason: format!("list {} has a negative free count", row.list_id),
        })?;
        Ok(BitList::from_parts(row.list_id, row.list, free)?)
    }
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    list: Vec<u8>,
    lastupdate: NaiveDateTime,
}

fn free_column(list: &BitList) -> Result<i32> {
    i32::try_from(list.free()).map_err(|_| Error::Invariant {
        reason: format!("free count {} does not fit the free column", list.free()),
    })
}

/// Maps a query failure, turning a missing table into [`Error::NotFound`].
fn query_error(context: &'static str, partition: &PartitionName) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE) => {
            Error::not_found(partition.subject())
        }
        _ => Error::transaction(context, e),
    }
}

/// One open PostgreSQL transaction.
///
/// Dropping it without [`ListTx::commit`] rolls it back.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    async fn partition_exists(&mut self, partition: &PartitionName) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(partition.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| Error::transaction("could not query the catalog", e))
    }
}

#[async_trait]
impl ListTx for PgTx {
    #[instrument(level = "debug", skip(self, partition), fields(partition = %partition))]
    async fn ensure_partition(
        &mut self,
        partition: &PartitionName,
        kind: PartitionKind,
    ) -> Result<bool> {
        // Partitions are never dropped, so an existing one needs no lock.
        if self.partition_exists(partition).await? {
            return Ok(false);
        }

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(PARTITION_LOCK_KEY)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| Error::transaction("could not acquire the partition lock", e))?;

        if self.partition_exists(partition).await? {
            return Ok(false);
        }

        let table = partition.quoted();
        let ddl = match kind {
            PartitionKind::Tenant => format!(
                "CREATE TABLE {table} (listID SERIAL PRIMARY KEY, list BYTEA NOT NULL, free INT NOT NULL)"
            ),
            PartitionKind::Cache => format!(
                "CREATE TABLE {table} (listID SERIAL PRIMARY KEY, list BYTEA NOT NULL, lastupdate TIMESTAMP NOT NULL)"
            ),
        };
        sqlx::query(&ddl)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| Error::transaction("could not create partition", e))?;

        tracing::info!(?kind, "created partition");
        Ok(true)
    }

    async fn find_allocatable_list(&mut self, partition: &PartitionName) -> Result<Option<BitList>> {
        let sql = format!(
            "SELECT listID, list, free FROM {} WHERE free > 0 ORDER BY listID LIMIT 1 FOR UPDATE",
            partition.quoted()
        );
        sqlx::query_as::<_, ListRow>(&sql)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_error("could not select an allocatable list", partition))?
            .map(BitList::try_from)
            .transpose()
    }

    async fn lock_list(&mut self, partition: &PartitionName, list_id: ListId) -> Result<BitList> {
        let sql = format!(
            "SELECT listID, list, free FROM {} WHERE listID = $1 FOR UPDATE",
            partition.quoted()
        );
        sqlx::query_as::<_, ListRow>(&sql)
            .bind(list_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_error("could not lock list", partition))?
            .ok_or_else(|| Error::not_found(format!("list {list_id}")))?
            .try_into()
    }

    async fn fetch_list(&mut self, partition: &PartitionName, list_id: ListId) -> Result<BitList> {
        let sql = format!(
            "SELECT listID, list, free FROM {} WHERE listID = $1",
            partition.quoted()
        );
        sqlx::query_as::<_, ListRow>(&sql)
            .bind(list_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_error("could not read list", partition))?
            .ok_or_else(|| Error::not_found(format!("list {list_id}")))?
            .try_into()
    }

    async fn insert_list(&mut self, partition: &PartitionName, list: &BitList) -> Result<ListId> {
        let sql = format!(
            "INSERT INTO {} (list, free) VALUES ($1, $2) RETURNING listID",
            partition.quoted()
        );
        sqlx::query_scalar::<_, ListId>(&sql)
            .bind(list.as_bytes())
            .bind(free_column(list)?)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(query_error("could not insert list", partition))
    }

    async fn update_list(&mut self, partition: &PartitionName, list: &BitList) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET list = $1, free = $2 WHERE listID = $3",
            partition.quoted()
        );
        let done = sqlx::query(&sql)
            .bind(list.as_bytes())
            .bind(free_column(list)?)
            .bind(list.list_id())
            .execute(&mut *self.tx)
            .await
            .map_err(query_error("could not update list", partition))?;
        if done.rows_affected() == 0 {
            return Err(Error::not_found(format!("list {}", list.list_id())));
        }
        Ok(())
    }

    async fn write_cache_entry(
        &mut self,
        partition: &PartitionName,
        bits: &[u8],
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let table = partition.quoted();
        let updated_at = updated_at.naive_utc();

        let update = format!("UPDATE {table} SET list = $1, lastupdate = $2");
        let done = sqlx::query(&update)
            .bind(bits)
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(query_error("could not update cache entry", partition))?;

        if done.rows_affected() == 0 {
            let insert = format!("INSERT INTO {table} (list, lastupdate) VALUES ($1, $2)");
            sqlx::query(&insert)
                .bind(bits)
                .bind(updated_at)
                .execute(&mut *self.tx)
                .await
                .map_err(query_error("could not insert cache entry", partition))?;
        }
        Ok(())
    }

    async fn read_cache_entry(&mut self, partition: &PartitionName) -> Result<Option<CacheEntry>> {
        if !self.partition_exists(partition).await? {
            return Ok(None);
        }
        let sql = format!(
            "SELECT list, lastupdate FROM {} ORDER BY listID DESC LIMIT 1",
            partition.quoted()
        );
        let row = sqlx::query_as::<_, CacheRow>(&sql)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_error("could not read cache entry", partition))?;
        Ok(row.map(|row| CacheEntry {
            bits: row.list,
            last_updated: row.lastupdate.and_utc(),
        }))
    }

    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| Error::transaction("could not commit transaction", e))
    }
}
