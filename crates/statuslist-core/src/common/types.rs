//! # Identifiers and shared value types
//!
//! Tenant identifiers arrive from outside the service and end up embedded in
//! SQL identifiers, one table per tenant. Every dynamic identifier therefore
//! goes through [`PartitionName`], whose constructors are the only way to
//! obtain one and which reject anything outside `[a-zA-Z0-9_]`.
//!
//! ## Naming
//!
//! - tenant partitions: [`TENANT_TABLE_PREFIX`] + tenant id
//! - cache partitions: [`CACHE_TABLE_PREFIX`] + the first
//!   [`CACHE_KEY_TABLE_CHARS`] hex characters of the cache key
//!
//! Names are limited to [`MAX_IDENTIFIER_LEN`] bytes, PostgreSQL's identifier
//! limit, because the server would otherwise truncate them silently and two
//! tenants could share a table.

use chrono::{DateTime, Utc};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use statuslist::{ListId, StatusData};

use crate::{Error, Result};

/// Prefix of every tenant partition. Table names may not start with a digit.
pub const TENANT_TABLE_PREFIX: &str = "tenant_id_";

/// Prefix of every remote cache partition.
pub const CACHE_TABLE_PREFIX: &str = "cache_";

/// Longest identifier PostgreSQL keeps without truncation.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Hex characters of the cache key used in the cache partition name.
pub const CACHE_KEY_TABLE_CHARS: usize = 48;

/// Longest tenant identifier whose partition name still fits.
pub const MAX_TENANT_ID_LEN: usize = MAX_IDENTIFIER_LEN - TENANT_TABLE_PREFIX.len();

fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A validated tenant identifier.
///
/// # Example
///
/// ```
/// use statuslist_core::TenantId;
///
/// assert!(TenantId::new("42").is_ok());
/// assert!(TenantId::new("acme_corp").is_ok());
/// assert!(TenantId::new("42; DROP TABLE x").is_err());
/// assert!(TenantId::new("").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] if `id` is empty, contains
    /// anything besides ASCII letters, digits and `_`, or is longer than
    /// [`MAX_TENANT_ID_LEN`].
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !is_safe_identifier(&id) {
            return Err(Error::InvalidIdentifier {
                name: id,
                reason: "only ASCII letters, digits and '_' are allowed",
            });
        }
        if id.len() > MAX_TENANT_ID_LEN {
            return Err(Error::InvalidIdentifier {
                name: id,
                reason: "identifier is too long",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TenantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Fixed-length key of one remote issuing origin in the cache.
///
/// The key is the lowercase hex SHA-256 digest of the normalized host, so
/// every list published by the same origin shares one cache slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of every key in characters.
    pub const LEN: usize = 64;

    /// Derives the key of `host`.
    ///
    /// The host is trimmed and lowercased first. A port, when present, is
    /// part of the host and therefore of the key.
    ///
    /// ```
    /// use statuslist_core::CacheKey;
    ///
    /// let key = CacheKey::for_host("Issuer.Example.com");
    /// assert_eq!(key, CacheKey::for_host("issuer.example.com"));
    /// assert_eq!(key.as_str().len(), CacheKey::LEN);
    /// ```
    pub fn for_host(host: &str) -> Self {
        let normalized = host.trim().to_ascii_lowercase();
        Self(hex::encode(Sha256::digest(normalized.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which schema a partition carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    /// `(listID SERIAL PRIMARY KEY, list BYTEA, free INT)`
    Tenant,
    /// `(listID SERIAL PRIMARY KEY, list BYTEA, lastupdate TIMESTAMP)`
    Cache,
}

/// A validated name of one persistent partition (table).
///
/// This is the only type stores accept when building SQL identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionName(String);

impl PartitionName {
    pub fn for_tenant(tenant: &TenantId) -> Result<Self> {
        Self::validate(format!("{TENANT_TABLE_PREFIX}{tenant}"))
    }

    pub fn for_cache(key: &CacheKey) -> Result<Self> {
        let digest = key.as_str().get(..CACHE_KEY_TABLE_CHARS).unwrap_or(key.as_str());
        Self::validate(format!("{CACHE_TABLE_PREFIX}{digest}"))
    }

    /// Checks a fully composed name against `^[a-zA-Z0-9_]+$` and the
    /// identifier length limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`]; invalid names are never
    /// rewritten into valid ones.
    pub fn validate(name: String) -> Result<Self> {
        if !is_safe_identifier(&name) {
            return Err(Error::InvalidIdentifier {
                name,
                reason: "only ASCII letters, digits and '_' are allowed",
            });
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(Error::InvalidIdentifier {
                name,
                reason: "identifier is too long",
            });
        }
        Ok(Self(name))
    }

    /// The name as stored in the catalog.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// What the partition holds, phrased for clients: `tenant <id>` or
    /// `cache entry`. Never the physical table name.
    pub fn subject(&self) -> String {
        match self.0.strip_prefix(TENANT_TABLE_PREFIX) {
            Some(tenant) => format!("tenant {tenant}"),
            None => "cache entry".to_string(),
        }
    }

    /// The name as a double-quoted SQL identifier, preserving case.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an allocated index lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub list_id: ListId,
    pub index: usize,
}

impl Allocation {
    pub fn status_data(&self, tenant: &TenantId) -> StatusData {
        StatusData::new(tenant.as_str(), self.list_id, self.index)
    }
}

/// One cached remote list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub bits: Vec<u8>,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_ids_outside_the_safe_class_are_rejected() {
        for bad in [
            "", "a-b", "a b", "a;b", "ä", "x\"y", "tenant.id", "42'--", "a\0b",
        ] {
            assert!(
                matches!(TenantId::new(bad), Err(Error::InvalidIdentifier { .. })),
                "{bad:?} accepted"
            );
        }
        for good in ["42", "a", "Tenant_7", "___"] {
            assert!(TenantId::new(good).is_ok(), "{good:?} rejected");
        }
    }

    #[test]
    fn tenant_ids_must_fit_the_identifier_limit() {
        let longest = "t".repeat(MAX_TENANT_ID_LEN);
        let partition = PartitionName::for_tenant(&TenantId::new(longest).unwrap()).unwrap();
        assert_eq!(partition.as_str().len(), MAX_IDENTIFIER_LEN);

        assert!(TenantId::new("t".repeat(MAX_TENANT_ID_LEN + 1)).is_err());
    }

    #[test]
    fn tenant_id_deserialization_validates() {
        let ok: TenantId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(ok.as_str(), "42");
        assert!(serde_json::from_str::<TenantId>("\"4-2\"").is_err());
    }

    #[test]
    fn partition_names_are_prefixed_and_quoted() {
        let tenant = TenantId::new("Acme").unwrap();
        let partition = PartitionName::for_tenant(&tenant).unwrap();
        assert_eq!(partition.as_str(), "tenant_id_Acme");
        assert_eq!(partition.quoted(), "\"tenant_id_Acme\"");
    }

    #[test]
    fn composed_names_are_validated_again() {
        assert!(PartitionName::validate("tenant_id_ok".into()).is_ok());
        assert!(PartitionName::validate("tenant_id_x\"; --".into()).is_err());
        assert!(PartitionName::validate("x".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }

    #[test]
    fn cache_keys_are_fixed_length_hex_of_the_host() {
        let key = CacheKey::for_host("issuer.example.com:8443");
        assert_eq!(key.as_str().len(), CacheKey::LEN);
        assert!(key.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(key, CacheKey::for_host("issuer.example.com"));
        assert_eq!(key, CacheKey::for_host(" ISSUER.example.com:8443 "));
    }

    #[test]
    fn cache_partitions_fit_the_identifier_limit() {
        let partition = PartitionName::for_cache(&CacheKey::for_host("example.org")).unwrap();
        assert!(partition.as_str().starts_with(CACHE_TABLE_PREFIX));
        assert_eq!(
            partition.as_str().len(),
            CACHE_TABLE_PREFIX.len() + CACHE_KEY_TABLE_CHARS
        );
    }

    #[test]
    fn partition_subject_hides_table_names() {
        let tenant = PartitionName::for_tenant(&TenantId::new("Acme_1").unwrap()).unwrap();
        assert_eq!(tenant.subject(), "tenant Acme_1");

        let cache = PartitionName::for_cache(&CacheKey::for_host("example.org")).unwrap();
        assert_eq!(cache.subject(), "cache entry");
        assert!(!cache.subject().contains(CACHE_TABLE_PREFIX));
    }

    #[test]
    fn allocation_builds_tenant_scoped_status_path() {
        let tenant = TenantId::new("42").unwrap();
        let data = Allocation {
            list_id: 2,
            index: 0,
        }
        .status_data(&tenant);
        assert_eq!(data.index, 0);
        assert_eq!(data.status_url, "/status/42/2");
    }
}
