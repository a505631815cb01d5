//! Wire encoding of status lists.
//!
//! A list travels as the unpadded standard-alphabet base64 text of its gzip
//! compressed bytes. This is the form carried in `encodedList` of a
//! StatusList2021 credential and in the `lst` claim of a status list token.
//! Decoding accepts both padded and unpadded input since issuers differ.

use crate::Result;
use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use core::fmt;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use std::io::{Read, Write};

const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Reasons an encoded list can be rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DecodeError {
    /// The text is not valid base64.
    Base64(String),
    /// The decoded bytes are not a valid gzip stream.
    Gzip(String),
    /// The decompressed list is longer than the caller accepts.
    TooLarge {
        /// Largest accepted length in bytes.
        limit: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Base64(reason) => write!(f, "invalid base64: {reason}"),
            Self::Gzip(reason) => write!(f, "invalid gzip stream: {reason}"),
            Self::TooLarge { limit } => write!(f, "decoded list exceeds {limit} bytes"),
        }
    }
}

impl core::error::Error for DecodeError {}

/// Compresses and encodes raw list bytes.
///
/// # Example
///
/// ```
/// use statuslist::{decode_list, encode_list};
///
/// let bits = vec![0b0000_1000, 0, 0, 0];
/// let text = encode_list(&bits);
/// assert!(!text.ends_with('='));
/// assert_eq!(decode_list(&text).unwrap(), bits);
/// ```
pub fn encode_list(bits: &[u8]) -> String {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bits.len() / 8 + 32), Compression::default());
    // Writing into a Vec cannot fail.
    let compressed = encoder
        .write_all(bits)
        .and_then(|()| encoder.finish())
        .unwrap_or_default();
    ENGINE.encode(compressed)
}

/// Decodes and decompresses an encoded list of any length.
///
/// Only use this on trusted input; see [`decode_list_bounded`].
///
/// # Errors
///
/// Returns [`crate::Error::Decode`] if the text is not base64 or the payload
/// is not gzip.
pub fn decode_list(encoded: &str) -> Result<Vec<u8>> {
    decode_list_bounded(encoded, usize::MAX)
}

/// Decodes and decompresses an encoded list, giving up once the output
/// passes `max_len` bytes.
///
/// Decompression stops at `max_len + 1` bytes, so a small gzip bomb costs at
/// most that much memory.
///
/// # Errors
///
/// Returns [`crate::Error::Decode`] if the text is not base64, the payload is
/// not gzip, or it inflates to more than `max_len` bytes
/// ([`DecodeError::TooLarge`]).
pub fn decode_list_bounded(encoded: &str, max_len: usize) -> Result<Vec<u8>> {
    let compressed = ENGINE
        .decode(encoded.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    let cap = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
    let mut bits = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .take(cap)
        .read_to_end(&mut bits)
        .map_err(|e| DecodeError::Gzip(e.to_string()))?;
    if bits.len() > max_len {
        return Err(DecodeError::TooLarge { limit: max_len }.into());
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BitList, Error};
    use base64::Engine as _;

    #[test]
    fn decodes_own_encoding_of_revoked_list() {
        let mut list = BitList::new(1024);
        list.revoke_at_index(3).unwrap();
        list.revoke_at_index(8000).unwrap();

        let decoded = BitList::from_bytes(decode_list(&encode_list(list.as_bytes())).unwrap());
        assert_eq!(decoded.check_bit_at_index(3), Ok(true));
        assert_eq!(decoded.check_bit_at_index(8000), Ok(true));
        assert_eq!(decoded.check_bit_at_index(4), Ok(false));
    }

    #[test]
    fn sparse_lists_compress_well() {
        let text = encode_list(&[0; 16 * 1024]);
        assert!(text.len() < 200, "encoded length {}", text.len());
    }

    #[test]
    fn accepts_padded_input() {
        let padded = base64::engine::general_purpose::STANDARD.encode({
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&[1, 2, 3]).unwrap();
            encoder.finish().unwrap()
        });
        assert_eq!(decode_list(&padded).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn bounded_decode_stops_at_the_limit() {
        // 4 MiB of zeros encode to a few KiB.
        let text = encode_list(&vec![0; 4 << 20]);
        assert!(text.len() < 16 * 1024, "encoded length {}", text.len());

        assert_eq!(
            decode_list_bounded(&text, 1 << 20),
            Err(Error::Decode(DecodeError::TooLarge { limit: 1 << 20 }))
        );
        assert_eq!(decode_list_bounded(&text, 4 << 20).map(|b| b.len()), Ok(4 << 20));
        assert_eq!(
            decode_list_bounded(&text, (4 << 20) - 1),
            Err(Error::Decode(DecodeError::TooLarge { limit: (4 << 20) - 1 }))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode_list("not base64!"),
            Err(Error::Decode(DecodeError::Base64(_)))
        ));
        assert!(matches!(
            decode_list(&ENGINE.encode(b"plain bytes")),
            Err(Error::Decode(DecodeError::Gzip(_)))
        ));
    }
}
