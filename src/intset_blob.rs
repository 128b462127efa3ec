//! Blob codec for [`IntSet`].
//!
//! Layout: `u32` encoding tag (2, 4 or 8), `u32` element count, then
//! `count * encoding` bytes of signed integers in ascending order. Every
//! field is little-endian regardless of host byte order.

use crate::error::IntSetError;
use crate::intset::{read_at, Encoding, IntSet};

pub(crate) const HEADER_LEN: usize = 8;

impl IntSet {
    /// Serialize into the blob layout.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.blob_len());
        self.write_blob(&mut out);
        out
    }

    /// Append the blob layout to `out`.
    pub fn write_blob(&self, out: &mut Vec<u8>) {
        // len never exceeds u32::MAX; `add` refuses to grow past it.
        out.extend_from_slice(&(self.encoding().width() as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        out.extend_from_slice(self.raw_contents());
    }

    /// Decode a blob, rejecting anything the encoder could not have produced:
    /// unknown tags, truncated or oversized payloads, unordered or duplicate
    /// elements, and encodings wider than the values need.
    pub fn from_blob(bytes: &[u8]) -> Result<IntSet, IntSetError> {
        if bytes.len() < HEADER_LEN {
            return Err(IntSetError::CorruptHeader(bytes.len()));
        }
        let tag = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let encoding = Encoding::from_tag(tag).ok_or(IntSetError::CorruptEncoding(tag))?;

        let expected = count
            .checked_mul(encoding.width())
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or(IntSetError::CorruptLength {
                expected: usize::MAX,
                actual: bytes.len(),
            })?;
        if expected != bytes.len() {
            return Err(IntSetError::CorruptLength {
                expected,
                actual: bytes.len(),
            });
        }

        let payload = &bytes[HEADER_LEN..];
        for pos in 1..count {
            if read_at(payload, pos - 1, encoding) >= read_at(payload, pos, encoding) {
                return Err(IntSetError::NotAscending { pos });
            }
        }

        // Sorted, so the extremes decide the minimal encoding.
        let required = match count {
            0 => Encoding::Int16,
            n => Encoding::of(read_at(payload, 0, encoding))
                .max(Encoding::of(read_at(payload, n - 1, encoding))),
        };
        if required != encoding {
            return Err(IntSetError::NotMinimal {
                encoding: encoding.width(),
            });
        }

        Ok(IntSet::from_raw_parts(encoding, count, payload.to_vec()))
    }
}
