//! Error types for status list storage and mutation.
//!
//! This module defines the central `Error` enum shared by the allocator, the
//! revoker, the remote cache and every store implementation.
//!
//! ## Error Cases
//! - `FullyAllocated`: the list has no free index left. The allocator turns
//!   this into a new list and never surfaces it.
//! - `NotFound`: the referenced list or partition does not exist.
//! - `InvalidIdentifier`: a tenant or cache identifier failed validation. It
//!   is rejected, never sanitized.
//! - `IndexOutOfRange`: an index does not address a bit of the list.
//! - `TransactionFailure`: the store failed to begin, query or commit. The
//!   transaction is always rolled back.
//! - `Cancelled`: the caller's cancellation token fired before commit.
//! - `Invariant`: a store returned state the protocol rules out.
//! - `List`: any other failure of the underlying `statuslist` crate, such as
//!   an undecodable list.

pub type Result<T> = core::result::Result<T, Error>;

/// Boxed source error carried by [`Error::TransactionFailure`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for status list operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Every index of the list has been issued.
    #[error("list is already fully allocated")]
    FullyAllocated,

    /// The referenced list or partition does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// A tenant identifier or derived partition name is not allowed.
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: &'static str },

    /// The index does not address a bit of the list.
    #[error("index {index} is out of range for a list of {capacity} bits")]
    IndexOutOfRange { index: usize, capacity: usize },

    /// The backing store failed during begin, query or commit.
    #[error("{context}")]
    TransactionFailure {
        context: &'static str,
        #[source]
        source: BoxError,
    },

    /// The operation was cancelled before it committed.
    #[error("operation cancelled")]
    Cancelled,

    /// The store handed back state that the allocation protocol rules out.
    #[error("invariant violated: {reason}")]
    Invariant { reason: String },

    /// Any other failure reported by the list itself.
    #[error(transparent)]
    List(statuslist::Error),
}

impl Error {
    /// Wraps a store failure with the operation that was running.
    pub fn transaction<E>(context: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::TransactionFailure {
            context,
            source: source.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// HTTP-equivalent status used when the error leaves the service.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidIdentifier { .. } | Self::IndexOutOfRange { .. } => 400,
            Self::List(statuslist::Error::Decode(_)) => 422,
            Self::Cancelled => 503,
            Self::FullyAllocated
            | Self::TransactionFailure { .. }
            | Self::Invariant { .. }
            | Self::List(_) => 500,
        }
    }

    /// Message safe to hand to clients.
    ///
    /// Store failures only expose their operation context, never the source
    /// error, so query text and connection details stay internal.
    pub fn public_message(&self) -> String {
        match self {
            Self::TransactionFailure { context, .. } => format!("storage failure: {context}"),
            Self::Invariant { .. } | Self::FullyAllocated => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<statuslist::Error> for Error {
    fn from(err: statuslist::Error) -> Self {
        match err {
            statuslist::Error::FullyAllocated => Self::FullyAllocated,
            statuslist::Error::IndexOutOfRange { index, capacity } => {
                Self::IndexOutOfRange { index, capacity }
            }
            other => Self::List(other),
        }
    }
}
