//! Iteration over a [`Dict`]: a borrowing iterator, detached safe/unsafe
//! iterators and the stateless `scan` cursor.

use crate::dict::{Dict, Table};
use crate::dict_type::DictType;
use crate::entry::{DictEntry, EntryId};
use crate::fingerprint::DebugFingerprint;
use crate::tokens::PauseToken;
use core::fmt;
use slotmap::SlotMap;
use smallvec::SmallVec;

/// Borrowing iterator over every entry, in bucket order.
pub struct Iter<'a, K, V> {
    tables: &'a [Table; 2],
    entries: &'a SlotMap<EntryId, DictEntry<K, V>>,
    table: usize,
    bucket: usize,
    cur: Option<EntryId>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a DictEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries;
        loop {
            if let Some(id) = self.cur {
                let e = &entries[id];
                self.cur = e.next;
                self.remaining -= 1;
                return Some(e);
            }
            let t = &self.tables[self.table];
            if self.bucket >= t.size() {
                if self.table == 0 {
                    self.table = 1;
                    self.bucket = 0;
                    continue;
                }
                return None;
            }
            self.cur = t.buckets[self.bucket];
            self.bucket += 1;
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}

/// Detached iterator created by [`Dict::iterator`] or [`Dict::safe_iterator`].
///
/// It does not borrow the dictionary between calls; each [`next`] takes the
/// dictionary as an argument, and the iterator must be handed back through
/// [`Dict::release_iterator`].
///
/// A *safe* iterator pauses rehashing until it is released, so the table may
/// be modified (including deleting the entry just returned) while iterating.
/// Dropping a safe iterator without releasing it panics.
///
/// An *unsafe* iterator allows no modification between its first `next` and
/// its release. Debug builds verify this on release by comparing a checksum
/// of the table layout.
///
/// [`next`]: DictIterator::next
pub struct DictIterator {
    table: usize,
    // Last bucket visited in `table`; None before the first call.
    index: Option<usize>,
    // Chain of the current bucket, captured on entry, in pop order.
    pending: SmallVec<[EntryId; 4]>,
    pause: Option<PauseToken>,
    fingerprint: Option<DebugFingerprint>,
    safe: bool,
}

impl DictIterator {
    fn new(pause: Option<PauseToken>) -> Self {
        DictIterator {
            table: 0,
            index: None,
            pending: SmallVec::new(),
            safe: pause.is_some(),
            pause,
            fingerprint: None,
        }
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// Next entry of `dict`, or `None` once every bucket was visited.
    ///
    /// Entries deleted after their bucket was reached are skipped.
    pub fn next<'d, K, V, T>(
        &mut self,
        dict: &'d Dict<K, V, T>,
    ) -> Option<&'d DictEntry<K, V>>
    where
        K: Eq,
        T: DictType<K, V>,
    {
        loop {
            if let Some(id) = self.pending.pop() {
                if let Some(e) = dict.entries.get(id) {
                    return Some(e);
                }
                continue;
            }
            if self.table == 0 && self.index.is_none() && !self.safe {
                self.fingerprint = Some(dict.fingerprint());
            }
            let next = self.index.map_or(0, |i| i + 1);
            let t = &dict.ht[self.table];
            if next >= t.size() {
                if self.table == 0 && dict.is_rehashing() {
                    self.table = 1;
                    self.index = None;
                    continue;
                }
                self.index = Some(t.size());
                return None;
            }
            self.index = Some(next);
            let mut cur = t.buckets[next];
            while let Some(id) = cur {
                self.pending.push(id);
                cur = dict.entries.get(id).and_then(|e| e.next);
            }
            self.pending.reverse();
        }
    }
}

impl fmt::Debug for DictIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictIterator")
            .field("table", &self.table)
            .field("index", &self.index)
            .field("safe", &self.safe)
            .finish()
    }
}

impl<K, V, T> Dict<K, V, T>
where
    K: Eq,
    T: DictType<K, V>,
{
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tables: &self.ht,
            entries: &self.entries,
            table: 0,
            bucket: 0,
            cur: None,
            remaining: self.len(),
        }
    }

    /// Unsafe iterator: the table must not change until it is released.
    pub fn iterator(&self) -> DictIterator {
        DictIterator::new(None)
    }

    /// Safe iterator: rehashing pauses until it is released.
    pub fn safe_iterator(&mut self) -> DictIterator {
        DictIterator::new(Some(self.pauses.pause()))
    }

    /// Finish with an iterator. For an unsafe iterator that was started,
    /// debug builds panic if the table layout changed in the meantime.
    pub fn release_iterator(&mut self, mut it: DictIterator) {
        if let Some(token) = it.pause.take() {
            self.pauses.resume(token);
        } else if let Some(fp) = it.fingerprint {
            fp.verify(self.fingerprint());
        }
    }

    /// Visit the entries of one bucket step and return the next cursor.
    ///
    /// Start with cursor 0 and call again with the returned cursor until it
    /// is 0. Every entry present for the whole traversal is visited at least
    /// once, even if the table grows or shrinks in between; some entries may
    /// be visited more than once. The cursor counts up with its bits
    /// reversed, so a bucket index stays meaningful across power-of-two
    /// resizes. While rehashing, the small table's bucket is visited together
    /// with every bucket of the large table that it expands into.
    pub fn scan<F>(&self, cursor: u64, mut f: F) -> u64
    where
        F: FnMut(&DictEntry<K, V>),
    {
        if self.is_empty() {
            return 0;
        }
        let mut v = cursor;
        if !self.is_rehashing() {
            let t0 = &self.ht[0];
            let m0 = t0.mask() as u64;
            self.scan_bucket(t0, (v & m0) as usize, &mut f);
            v = next_cursor(v, m0);
        } else {
            let (small, large) = if self.ht[0].size() <= self.ht[1].size() {
                (&self.ht[0], &self.ht[1])
            } else {
                (&self.ht[1], &self.ht[0])
            };
            let m0 = small.mask() as u64;
            let m1 = large.mask() as u64;
            self.scan_bucket(small, (v & m0) as usize, &mut f);
            // Expansions of the small bucket in the large table.
            loop {
                self.scan_bucket(large, (v & m1) as usize, &mut f);
                v = next_cursor(v, m1);
                if v & (m0 ^ m1) == 0 {
                    break;
                }
            }
        }
        v
    }

    fn scan_bucket<F>(&self, table: &Table, index: usize, f: &mut F)
    where
        F: FnMut(&DictEntry<K, V>),
    {
        let mut cur = table.buckets[index];
        while let Some(id) = cur {
            let e = &self.entries[id];
            cur = e.next;
            f(e);
        }
    }
}

/// Increment the bits of `v` covered by `mask`, counting from the high end.
#[inline]
fn next_cursor(v: u64, mask: u64) -> u64 {
    (v | !mask).reverse_bits().wrapping_add(1).reverse_bits()
}

impl<'a, K, V, T> IntoIterator for &'a Dict<K, V, T>
where
    K: Eq,
    T: DictType<K, V>,
{
    type Item = &'a DictEntry<K, V>;
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, T> fmt::Debug for Dict<K, V, T>
where
    K: Eq + fmt::Debug,
    V: fmt::Debug,
    T: DictType<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|e| (e.key(), e.value())))
            .finish()
    }
}
