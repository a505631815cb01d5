#[cfg(test)]
mod tests;

use crate::{Error, Result};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Store-assigned identifier of a list inside one tenant partition.
///
/// Identifiers are handed out by the backing store when a list is first
/// inserted and increase monotonically within a partition. A list that has not
/// been persisted yet carries [`UNASSIGNED_LIST_ID`].
pub type ListId = i32;

/// Placeholder [`ListId`] for lists that have not been inserted yet.
pub const UNASSIGNED_LIST_ID: ListId = 0;

/// A fixed-capacity bitmap with linear index allocation.
///
/// Bit `i` of the logical bitmap lives in byte `i / 8` at bit position
/// `i % 8`, with the least significant bit holding the lowest index of the
/// byte. A set bit means the credential at that index has been revoked.
///
/// Two independent pieces of state are tracked:
///
/// - the bits themselves (revocation state), and
/// - the free count (issuance state): how many indices have not been handed
///   out yet.
///
/// Indices are issued strictly in ascending order starting at zero. Once the
/// free count reaches zero the list is terminal for allocation and the owner
/// must create a new one.
///
/// `BitList` performs no I/O. It is meant to be loaded, mutated and written
/// back inside a single store transaction.
///
/// # Example
///
/// ```
/// use statuslist::BitList;
///
/// let mut list = BitList::new(1);
/// assert_eq!(list.capacity_bits(), 8);
///
/// let index = list.allocate_next_free_index().unwrap();
/// assert_eq!(index, 0);
///
/// list.revoke_at_index(index).unwrap();
/// assert!(list.check_bit_at_index(index).unwrap());
/// assert!(!list.check_bit_at_index(1).unwrap());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitList {
    list_id: ListId,
    bits: Vec<u8>,
    free: usize,
}

impl BitList {
    /// Creates an unpersisted list of `size_in_bytes * 8` bits, all cleared
    /// and all free.
    pub fn new(size_in_bytes: usize) -> Self {
        Self {
            list_id: UNASSIGNED_LIST_ID,
            bits: vec![0; size_in_bytes],
            free: size_in_bytes * 8,
        }
    }

    /// Rebuilds a list from its persisted columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFreeCount`] if `free` is larger than the number
    /// of bits in `bits`.
    pub fn from_parts(list_id: ListId, bits: Vec<u8>, free: usize) -> Result<Self> {
        let capacity = bits.len() * 8;
        if free > capacity {
            return Err(Error::InvalidFreeCount { free, capacity });
        }
        Ok(Self {
            list_id,
            bits,
            free,
        })
    }

    /// Wraps raw bytes (for example a decoded remote list) for bit lookups.
    ///
    /// The free count is zero: such a list is only ever read.
    pub fn from_bytes(bits: Vec<u8>) -> Self {
        Self {
            list_id: UNASSIGNED_LIST_ID,
            bits,
            free: 0,
        }
    }

    pub const fn list_id(&self) -> ListId {
        self.list_id
    }

    /// Records the identifier the store assigned on insert.
    pub fn set_list_id(&mut self, list_id: ListId) {
        self.list_id = list_id;
    }

    /// Number of addressable bits.
    pub fn capacity_bits(&self) -> usize {
        self.bits.len() * 8
    }

    /// Number of indices not handed out yet.
    pub const fn free(&self) -> usize {
        self.free
    }

    /// Number of indices already handed out.
    pub fn allocated(&self) -> usize {
        self.capacity_bits() - self.free
    }

    pub fn is_fully_allocated(&self) -> bool {
        self.free == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bits
    }

    /// Hands out the next unused index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FullyAllocated`] once every index has been issued.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), fields(list_id = self.list_id)))]
    pub fn allocate_next_free_index(&mut self) -> Result<usize> {
        if self.free == 0 {
            return Err(Error::FullyAllocated);
        }
        let index = self.capacity_bits() - self.free;
        self.free -= 1;
        Ok(index)
    }

    /// Sets the bit at `index`, marking the credential as revoked.
    ///
    /// Revoking an already revoked index is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index` is not inside the list.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), fields(list_id = self.list_id)))]
    pub fn revoke_at_index(&mut self, index: usize) -> Result<()> {
        let (byte, mask) = self.locate(index)?;
        self.bits[byte] |= mask;
        Ok(())
    }

    /// Returns whether the bit at `index` is set.
    ///
    /// An empty list answers `false` for every index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if the list is non-empty and `index`
    /// is not inside it.
    pub fn check_bit_at_index(&self, index: usize) -> Result<bool> {
        if self.bits.is_empty() {
            return Ok(false);
        }
        let (byte, mask) = self.locate(index)?;
        Ok(self.bits[byte] & mask != 0)
    }

    fn locate(&self, index: usize) -> Result<(usize, u8)> {
        let capacity = self.capacity_bits();
        if index >= capacity {
            return Err(Error::IndexOutOfRange { index, capacity });
        }
        Ok(bit_position(index))
    }
}

/// Splits a logical bit index into its byte offset and in-byte mask.
#[inline]
const fn bit_position(index: usize) -> (usize, u8) {
    (index / 8, 1 << (index % 8))
}
