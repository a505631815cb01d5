use core::fmt;

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that a [`BitList`](crate::BitList) operation can produce.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// Every index of the list has already been handed out.
    ///
    /// Callers that own a store react to this by creating a fresh list; it is
    /// not a failure of the request itself.
    FullyAllocated,

    /// The index does not address a bit inside the list.
    IndexOutOfRange {
        /// The rejected index.
        index: usize,
        /// Number of addressable bits in the list.
        capacity: usize,
    },

    /// Persisted parts disagree: the free count exceeds the bit capacity.
    InvalidFreeCount {
        /// The rejected free count.
        free: usize,
        /// Number of addressable bits in the list.
        capacity: usize,
    },

    /// An encoded list could not be decoded.
    ///
    /// Only available when the `codec` feature is enabled.
    #[cfg_attr(docsrs, doc(cfg(feature = "codec")))]
    #[cfg(feature = "codec")]
    Decode(crate::DecodeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FullyAllocated => f.write_str("list is already fully allocated"),
            Self::IndexOutOfRange { index, capacity } => {
                write!(f, "index {index} is out of range for a list of {capacity} bits")
            }
            Self::InvalidFreeCount { free, capacity } => {
                write!(f, "free count {free} exceeds list capacity of {capacity} bits")
            }
            #[cfg(feature = "codec")]
            Self::Decode(e) => write!(f, "could not decode status list: {e}"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            #[cfg(feature = "codec")]
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "codec")]
impl From<crate::DecodeError> for Error {
    fn from(e: crate::DecodeError) -> Self {
        Self::Decode(e)
    }
}
