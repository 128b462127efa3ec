//! IntSet: sorted integer array stored at the narrowest uniform width.
//!
//! Elements live in one `Vec<u8>` as little-endian signed integers of 2, 4
//! or 8 bytes. The width (the [`Encoding`]) is the smallest one able to hold
//! every member: adding a value outside the current range rewrites the whole
//! buffer at the wider width, and removing the value that forced the width
//! narrows it again.
//!
//! Byte order is fixed to little-endian in the buffer itself, so the blob
//! codec in `intset_blob` can copy the payload verbatim.

use crate::error::IntSetError;
use core::fmt;
use rand::Rng;

/// Element width of an [`IntSet`], in bytes.
///
/// Variants are ordered: `Int16 < Int32 < Int64`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Encoding {
    Int16 = 2,
    Int32 = 4,
    Int64 = 8,
}

impl Encoding {
    /// Narrowest encoding able to represent `v`.
    #[inline]
    pub fn of(v: i64) -> Encoding {
        if v < i32::MIN as i64 || v > i32::MAX as i64 {
            Encoding::Int64
        } else if v < i16::MIN as i64 || v > i16::MAX as i64 {
            Encoding::Int32
        } else {
            Encoding::Int16
        }
    }

    /// Width of one element in bytes.
    #[inline]
    pub const fn width(self) -> usize {
        self as usize
    }

    pub(crate) fn from_tag(tag: u32) -> Option<Encoding> {
        match tag {
            2 => Some(Encoding::Int16),
            4 => Some(Encoding::Int32),
            8 => Some(Encoding::Int64),
            _ => None,
        }
    }
}

// One accessor pair per encoding; every width-dependent read or write of
// the buffer goes through `read_at`/`write_at`.

#[inline]
fn read_i16(buf: &[u8], pos: usize) -> i64 {
    let o = pos * 2;
    i16::from_le_bytes([buf[o], buf[o + 1]]) as i64
}

#[inline]
fn read_i32(buf: &[u8], pos: usize) -> i64 {
    let o = pos * 4;
    i32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]) as i64
}

#[inline]
fn read_i64(buf: &[u8], pos: usize) -> i64 {
    let o = pos * 8;
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[o..o + 8]);
    i64::from_le_bytes(b)
}

#[inline]
fn write_i16(buf: &mut [u8], pos: usize, v: i64) {
    let o = pos * 2;
    buf[o..o + 2].copy_from_slice(&(v as i16).to_le_bytes());
}

#[inline]
fn write_i32(buf: &mut [u8], pos: usize, v: i64) {
    let o = pos * 4;
    buf[o..o + 4].copy_from_slice(&(v as i32).to_le_bytes());
}

#[inline]
fn write_i64(buf: &mut [u8], pos: usize, v: i64) {
    let o = pos * 8;
    buf[o..o + 8].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn read_at(buf: &[u8], pos: usize, enc: Encoding) -> i64 {
    match enc {
        Encoding::Int16 => read_i16(buf, pos),
        Encoding::Int32 => read_i32(buf, pos),
        Encoding::Int64 => read_i64(buf, pos),
    }
}

#[inline]
fn write_at(buf: &mut [u8], pos: usize, enc: Encoding, v: i64) {
    debug_assert!(Encoding::of(v) <= enc);
    match enc {
        Encoding::Int16 => write_i16(buf, pos, v),
        Encoding::Int32 => write_i32(buf, pos, v),
        Encoding::Int64 => write_i64(buf, pos, v),
    }
}

/// Memory-dense sorted set of `i64`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IntSet {
    encoding: Encoding,
    len: usize,
    // Always exactly `len * encoding.width()` bytes.
    contents: Vec<u8>,
}

impl IntSet {
    /// Empty set using the 16-bit encoding.
    pub fn new() -> Self {
        Self {
            encoding: Encoding::Int16,
            len: 0,
            contents: Vec::new(),
        }
    }

    /// Rebuild a set from parts already validated by the blob decoder.
    pub(crate) fn from_raw_parts(encoding: Encoding, len: usize, contents: Vec<u8>) -> Self {
        debug_assert_eq!(contents.len(), len * encoding.width());
        Self {
            encoding,
            len,
            contents,
        }
    }

    pub(crate) fn raw_contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Bytes occupied by the serialized form (header plus payload).
    pub fn blob_len(&self) -> usize {
        crate::intset_blob::HEADER_LEN + self.contents.len()
    }

    #[inline]
    fn value_at(&self, pos: usize) -> i64 {
        read_at(&self.contents, pos, self.encoding)
    }

    /// Binary search over the closed interval `[0, len - 1]`.
    ///
    /// `Ok(pos)` when found; `Err(pos)` with the insertion index otherwise.
    fn search(&self, value: i64) -> Result<usize, usize> {
        if self.len == 0 {
            return Err(0);
        }
        // Outside the stored range: the insertion point is known without probing.
        if value > self.value_at(self.len - 1) {
            return Err(self.len);
        }
        if value < self.value_at(0) {
            return Err(0);
        }

        let mut min = 0usize;
        let mut max = self.len - 1;
        while min <= max {
            let mid = min + (max - min) / 2;
            let cur = self.value_at(mid);
            if value > cur {
                min = mid + 1;
            } else if value < cur {
                // value >= contents[0], so mid == 0 cannot compare below.
                if mid == 0 {
                    break;
                }
                max = mid - 1;
            } else {
                return Ok(mid);
            }
        }
        Err(min)
    }

    /// Insert `value`. Returns `Ok(false)` when it was already present.
    ///
    /// On `Err` the set is unchanged.
    pub fn add(&mut self, value: i64) -> Result<bool, IntSetError> {
        if self.len >= u32::MAX as usize {
            return Err(IntSetError::CapacityOverflow);
        }
        let valenc = Encoding::of(value);
        if valenc > self.encoding {
            self.upgrade_and_add(value, valenc)?;
            return Ok(true);
        }

        let pos = match self.search(value) {
            Ok(_) => return Ok(false),
            Err(pos) => pos,
        };

        let w = self.encoding.width();
        self.contents
            .try_reserve_exact(w)
            .map_err(|_| IntSetError::CapacityOverflow)?;
        let old_bytes = self.contents.len();
        self.contents.resize(old_bytes + w, 0);
        if pos < self.len {
            self.move_tail(pos, pos + 1);
        }
        write_at(&mut self.contents, pos, self.encoding, value);
        self.len += 1;
        Ok(true)
    }

    /// Rewrite every element at `newenc` and place `value` at the end it
    /// belongs to. A value needing a wider encoding lies outside the range
    /// of every member, so it is either the new minimum or the new maximum.
    fn upgrade_and_add(&mut self, value: i64, newenc: Encoding) -> Result<(), IntSetError> {
        let curenc = self.encoding;
        let prepend = usize::from(value < 0);

        let mut upgraded = Vec::new();
        upgraded
            .try_reserve_exact((self.len + 1) * newenc.width())
            .map_err(|_| IntSetError::CapacityOverflow)?;
        upgraded.resize((self.len + 1) * newenc.width(), 0);

        for i in 0..self.len {
            let v = read_at(&self.contents, i, curenc);
            write_at(&mut upgraded, i + prepend, newenc, v);
        }
        let slot = if prepend == 1 { 0 } else { self.len };
        write_at(&mut upgraded, slot, newenc, value);

        log::trace!(
            "intset encoding upgrade {:?} -> {:?} at {} elements",
            curenc,
            newenc,
            self.len
        );
        self.contents = upgraded;
        self.encoding = newenc;
        self.len += 1;
        Ok(())
    }

    /// Shift the elements in `from..len` so they start at `to`.
    fn move_tail(&mut self, from: usize, to: usize) {
        let w = self.encoding.width();
        let src = from * w..self.len * w;
        self.contents.copy_within(src, to * w);
    }

    /// Remove `value`. Returns `false` when it was not a member.
    pub fn remove(&mut self, value: i64) -> bool {
        if Encoding::of(value) > self.encoding {
            return false;
        }
        let pos = match self.search(value) {
            Ok(pos) => pos,
            Err(_) => return false,
        };

        if pos + 1 < self.len {
            self.move_tail(pos + 1, pos);
        }
        self.len -= 1;
        self.contents.truncate(self.len * self.encoding.width());

        // Only removing an extreme element can lower the required width.
        if Encoding::of(value) == self.encoding && (pos == 0 || pos == self.len) {
            self.narrow_if_possible();
        }
        self.contents.shrink_to_fit();
        true
    }

    fn narrow_if_possible(&mut self) {
        let required = match self.len {
            0 => Encoding::Int16,
            n => Encoding::of(self.value_at(0)).max(Encoding::of(self.value_at(n - 1))),
        };
        if required >= self.encoding {
            return;
        }
        // Narrowing never needs more memory than is already held.
        let mut narrowed = vec![0u8; self.len * required.width()];
        for i in 0..self.len {
            write_at(&mut narrowed, i, required, self.value_at(i));
        }
        log::trace!(
            "intset encoding narrowed {:?} -> {:?} at {} elements",
            self.encoding,
            required,
            self.len
        );
        self.contents = narrowed;
        self.encoding = required;
    }

    /// Membership test. Values wider than the current encoding are never members.
    pub fn find(&self, value: i64) -> bool {
        Encoding::of(value) <= self.encoding && self.search(value).is_ok()
    }

    /// Element at ordinal position `pos`, or `None` when out of range.
    pub fn get(&self, pos: usize) -> Option<i64> {
        if pos < self.len {
            Some(self.value_at(pos))
        } else {
            None
        }
    }

    /// Uniformly chosen member, or `None` for an empty set.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<i64> {
        if self.len == 0 {
            return None;
        }
        Some(self.value_at(rng.gen_range(0..self.len)))
    }

    /// Members in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { set: self, pos: 0 }
    }
}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IntSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Ascending iterator over an [`IntSet`].
pub struct Iter<'a> {
    set: &'a IntSet,
    pos: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = i64;

    #[inline]
    fn next(&mut self) -> Option<i64> {
        let v = self.set.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.set.len - self.pos;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a IntSet {
    type Item = i64;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_consistent(s: &IntSet) {
        let v: Vec<i64> = s.iter().collect();
        assert!(v.windows(2).all(|w| w[0] < w[1]), "not ascending: {:?}", v);
        let required = v
            .iter()
            .map(|&x| Encoding::of(x))
            .max()
            .unwrap_or(Encoding::Int16);
        assert_eq!(s.encoding(), required, "encoding not minimal for {:?}", v);
        assert_eq!(s.raw_contents().len(), s.len() * s.encoding().width());
    }

    /// Encoding boundaries match the signed range of each width.
    #[test]
    fn value_encodings() {
        assert_eq!(Encoding::of(-32768), Encoding::Int16);
        assert_eq!(Encoding::of(32767), Encoding::Int16);
        assert_eq!(Encoding::of(-32769), Encoding::Int32);
        assert_eq!(Encoding::of(32768), Encoding::Int32);
        assert_eq!(Encoding::of(-2147483648), Encoding::Int32);
        assert_eq!(Encoding::of(2147483647), Encoding::Int32);
        assert_eq!(Encoding::of(-2147483649), Encoding::Int64);
        assert_eq!(Encoding::of(2147483648), Encoding::Int64);
        assert_eq!(Encoding::of(i64::MIN), Encoding::Int64);
        assert_eq!(Encoding::of(i64::MAX), Encoding::Int64);
    }

    #[test]
    fn basic_adding() {
        let mut s = IntSet::new();
        assert_eq!(s.add(5), Ok(true));
        assert_eq!(s.add(6), Ok(true));
        assert_eq!(s.add(4), Ok(true));
        assert_eq!(s.add(4), Ok(false));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![4, 5, 6]);
        assert_eq!(s.encoding(), Encoding::Int16);
    }

    /// The search reports the insertion index on a miss, including both ends.
    #[test]
    fn search_yields_insertion_point() {
        let mut s = IntSet::new();
        for v in [10, 20, 30, 40] {
            s.add(v).unwrap();
        }
        assert_eq!(s.search(5), Err(0));
        assert_eq!(s.search(10), Ok(0));
        assert_eq!(s.search(25), Err(2));
        assert_eq!(s.search(40), Ok(3));
        assert_eq!(s.search(45), Err(4));
        assert_eq!(IntSet::new().search(1), Err(0));
    }

    #[test]
    fn many_random_adds_stay_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut s = IntSet::new();
        let mut inserts = 0;
        for _ in 0..1024 {
            if s.add(rng.gen_range(0..0x800)).unwrap() {
                inserts += 1;
            }
        }
        assert_eq!(s.len(), inserts);
        assert_consistent(&s);
    }

    #[test]
    fn upgrade_16_to_64_both_directions() {
        let mut s = IntSet::new();
        s.add(32).unwrap();
        s.add(4294967295).unwrap();
        assert_eq!(s.encoding(), Encoding::Int64);
        assert!(s.find(32) && s.find(4294967295));
        assert_consistent(&s);

        let mut s = IntSet::new();
        s.add(32).unwrap();
        s.add(-4294967295).unwrap();
        assert_eq!(s.encoding(), Encoding::Int64);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![-4294967295, 32]);
        assert_consistent(&s);
    }

    #[test]
    fn upgrade_32_to_64() {
        let mut s = IntSet::new();
        s.add(65535).unwrap();
        assert_eq!(s.encoding(), Encoding::Int32);
        s.add(-4294967295).unwrap();
        assert_eq!(s.encoding(), Encoding::Int64);
        assert!(s.find(65535));
        assert!(s.find(-4294967295));
        assert_consistent(&s);
    }

    /// A value wider than the current encoding is never found and never removed.
    #[test]
    fn wide_values_are_absent_from_narrow_sets() {
        let mut s = IntSet::new();
        s.add(1).unwrap();
        assert!(!s.find(1 << 40));
        assert!(!s.remove(1 << 40));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn remove_shifts_tail_and_reports_absence() {
        let mut s = IntSet::new();
        for v in [1, 2, 3, 4] {
            s.add(v).unwrap();
        }
        assert!(s.remove(2));
        assert!(!s.remove(2));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert!(s.remove(4));
        assert!(s.remove(1));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![3]);
        assert_consistent(&s);
    }

    /// Removing the member that forced a wide encoding narrows the set again.
    #[test]
    fn removing_extreme_member_narrows_encoding() {
        let mut s = IntSet::new();
        s.add(32).unwrap();
        s.add(65535).unwrap();
        assert_eq!(s.encoding(), Encoding::Int32);
        assert!(s.remove(65535));
        assert_eq!(s.encoding(), Encoding::Int16);
        assert_eq!(s.get(0), Some(32));

        s.add(-(1 << 40)).unwrap();
        s.add(1 << 20).unwrap();
        assert_eq!(s.encoding(), Encoding::Int64);
        assert!(s.remove(-(1 << 40)));
        assert_eq!(s.encoding(), Encoding::Int32);
        assert!(s.remove(1 << 20));
        assert!(s.remove(32));
        assert!(s.is_empty());
        assert_eq!(s.encoding(), Encoding::Int16);
    }

    #[test]
    fn get_out_of_range_is_none() {
        let mut s = IntSet::new();
        s.add(9).unwrap();
        assert_eq!(s.get(0), Some(9));
        assert_eq!(s.get(1), None);
    }

    #[test]
    fn random_returns_members_only() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut s = IntSet::new();
        assert_eq!(s.random(&mut rng), None);
        for v in [-3, 8, 100_000] {
            s.add(v).unwrap();
        }
        for _ in 0..100 {
            let v = s.random(&mut rng).unwrap();
            assert!(s.find(v));
        }
    }

    #[test]
    fn stress_add_and_delete() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut s = IntSet::new();
        for _ in 0..0xffff {
            let v1 = rng.gen_range(0..0xfff);
            s.add(v1).unwrap();
            assert!(s.find(v1));
            let v2 = rng.gen_range(0..0xfff);
            s.remove(v2);
            assert!(!s.find(v2));
        }
        assert_consistent(&s);
    }

    #[test]
    fn blob_len_counts_header_and_payload() {
        let mut s = IntSet::new();
        assert_eq!(s.blob_len(), 8);
        s.add(1).unwrap();
        s.add(2).unwrap();
        assert_eq!(s.blob_len(), 8 + 2 * 2);
        s.add(1 << 33).unwrap();
        assert_eq!(s.blob_len(), 8 + 3 * 8);
    }
}
