//! Dict: chained hash table with incremental rehashing.
//!
//! Entries live in a generational `SlotMap`; the two bucket arrays hold only
//! `EntryId` chain heads, and each entry links to the next one in its chain.
//! Growing a table never moves everything at once: `expand` allocates the
//! incoming array and every subsequent operation migrates one bucket, so the
//! cost of a resize is spread across the operations that follow it.

use crate::config::DictConfig;
use crate::dict_type::{DefaultType, DictType};
use crate::entry::{DictEntry, EntryId, EntryValue};
use crate::error::DictError;
use crate::fingerprint::DebugFingerprint;
use crate::tokens::PauseCount;
use core::hash::Hash;
use core::mem;
use core::time::Duration;
use hashbrown::HashSet;
use rand::Rng;
use slotmap::SlotMap;

/// Chain-head callback interval of `clear_with`, in buckets.
const CLEAR_CALLBACK_INTERVAL: usize = 65_536;

/// Buckets moved per batch by `rehash_for_milliseconds`.
const REHASH_BATCH: usize = 100;

/// One bucket array.
#[derive(Debug, Default)]
pub(crate) struct Table {
    pub(crate) buckets: Vec<Option<EntryId>>,
    pub(crate) used: usize,
}

impl Table {
    pub(crate) const fn empty() -> Self {
        Table {
            buckets: Vec::new(),
            used: 0,
        }
    }

    fn with_size(size: usize) -> Result<Self, DictError> {
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(size)
            .map_err(|_| DictError::AllocFailed { buckets: size })?;
        buckets.resize(size, None);
        Ok(Table { buckets, used: 0 })
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.size().saturating_sub(1)
    }

    #[inline]
    fn slot(&self, hash: u64) -> usize {
        (hash as usize) & self.mask()
    }

    fn addr(&self) -> u64 {
        self.buckets.as_ptr() as usize as u64
    }
}

/// Outcome of [`Dict::add_raw`].
#[derive(Debug)]
pub enum AddRaw<'a, K, V> {
    /// A new entry holding `EntryValue::Empty`, for the caller to fill in.
    Added(&'a mut DictEntry<K, V>),
    /// The key was already present; nothing was inserted.
    Existing(&'a mut DictEntry<K, V>),
}

enum Inserted {
    New(EntryId),
    Existing(EntryId),
}

/// Hash table with incremental rehashing.
///
/// Behaviour that differs between logical containers (hashing, comparison,
/// key/value copy and destruction) comes from the type descriptor `T`.
pub struct Dict<K, V, T = DefaultType>
where
    K: Eq,
    T: DictType<K, V>,
{
    ty: T,
    pub(crate) entries: SlotMap<EntryId, DictEntry<K, V>>,
    pub(crate) ht: [Table; 2],
    // Next bucket of ht[0] to migrate; None when not rehashing.
    rehash_idx: Option<usize>,
    pub(crate) pauses: PauseCount,
    config: DictConfig,
}

impl<K, V> Dict<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_type(DefaultType::new())
    }
}

impl<K, V> Default for Dict<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, T> Dict<K, V, T>
where
    K: Eq,
    T: DictType<K, V>,
{
    pub fn with_type(ty: T) -> Self {
        Self::with_config(ty, DictConfig::default())
    }

    /// Bucket arrays are allocated lazily on the first insertion.
    pub fn with_config(ty: T, config: DictConfig) -> Self {
        Self {
            ty,
            entries: SlotMap::with_key(),
            ht: [Table::empty(), Table::empty()],
            rehash_idx: None,
            pauses: PauseCount::new(),
            config,
        }
    }

    pub fn type_descriptor(&self) -> &T {
        &self.ty
    }

    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.ht[0].used + self.ht[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bucket count across both tables.
    pub fn slots(&self) -> usize {
        self.ht[0].size() + self.ht[1].size()
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    /// Next bucket of the old table to migrate, while rehashing.
    pub fn rehash_index(&self) -> Option<usize> {
        self.rehash_idx
    }

    pub fn enable_resize(&self) {
        self.config.resize_gate.enable();
    }

    pub fn disable_resize(&self) {
        self.config.resize_gate.disable();
    }

    pub fn get_hash(&self, key: &K) -> u64 {
        self.ty.hash(key)
    }

    /// True when the table is filled below 10% and larger than the minimum
    /// size, the point at which a caller should `resize` to reclaim memory.
    pub fn needs_resize(&self) -> bool {
        let size = self.ht[0].size();
        let used = self.ht[0].used;
        size > self.config.initial_size && used * 100 / size < 10
    }

    fn next_power(&self, size: usize) -> usize {
        size.max(self.config.initial_size)
            .checked_next_power_of_two()
            .unwrap_or(1 << (usize::BITS - 1))
    }

    /// Allocate a table of at least `size` buckets.
    ///
    /// The first allocation becomes the main table. Later allocations become
    /// the incoming table and start an incremental rehash into it.
    pub fn expand(&mut self, size: usize) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Err(DictError::Rehashing);
        }
        let used = self.ht[0].used;
        if used > size {
            return Err(DictError::SizeTooSmall {
                requested: size,
                used,
            });
        }
        let real = self.next_power(size);
        if real == self.ht[0].size() {
            return Err(DictError::SameSize(real));
        }
        let table = Table::with_size(real).map_err(|e| {
            log::warn!("dict expand to {} buckets failed: {}", real, e);
            e
        })?;
        if self.ht[0].size() == 0 {
            self.ht[0] = table;
            return Ok(());
        }
        log::debug!(
            "dict rehash started: {} -> {} buckets, {} entries",
            self.ht[0].size(),
            real,
            used
        );
        self.ht[1] = table;
        self.rehash_idx = Some(0);
        Ok(())
    }

    /// Resize to the smallest power of two holding every entry.
    pub fn resize(&mut self) -> Result<(), DictError> {
        if !self.config.resize_gate.is_enabled() {
            return Err(DictError::ResizeDisabled);
        }
        if self.is_rehashing() {
            return Err(DictError::Rehashing);
        }
        let minimal = self.ht[0].used.max(self.config.initial_size);
        self.expand(minimal)
    }

    fn expand_if_needed(&mut self) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Ok(());
        }
        let size = self.ht[0].size();
        if size == 0 {
            return self.expand(self.config.initial_size);
        }
        let used = self.ht[0].used;
        if used >= size
            && (self.config.resize_gate.is_enabled()
                || used / size > self.config.force_resize_ratio)
        {
            return self.expand(used.saturating_mul(2));
        }
        Ok(())
    }

    /// Migrate up to `n` non-empty buckets from the old table.
    ///
    /// At most `n * empty_visits_per_step` empty buckets are skipped per
    /// call. Returns true once no rehash is in progress. Does nothing while a
    /// safe iterator is live.
    pub fn rehash(&mut self, n: usize) -> bool {
        let Some(mut idx) = self.rehash_idx else {
            return true;
        };
        if self.pauses.is_paused() {
            return false;
        }
        let mut empty_visits = n.saturating_mul(self.config.empty_visits_per_step);
        let mut n = n;
        while n > 0 && self.ht[0].used != 0 {
            n -= 1;
            // Buckets below idx are already drained, so a non-empty one lies ahead.
            while self.ht[0].buckets[idx].is_none() {
                idx += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    self.rehash_idx = Some(idx);
                    return false;
                }
            }
            let mut cur = self.ht[0].buckets[idx].take();
            while let Some(id) = cur {
                let e = &mut self.entries[id];
                cur = e.next;
                let slot = self.ht[1].slot(e.hash);
                e.next = self.ht[1].buckets[slot];
                self.ht[1].buckets[slot] = Some(id);
                self.ht[0].used -= 1;
                self.ht[1].used += 1;
            }
            idx += 1;
        }
        if self.ht[0].used == 0 {
            self.finish_rehash();
            return true;
        }
        self.rehash_idx = Some(idx);
        false
    }

    fn finish_rehash(&mut self) {
        self.ht[0] = mem::replace(&mut self.ht[1], Table::empty());
        self.rehash_idx = None;
        log::debug!(
            "dict rehash finished: {} buckets, {} entries",
            self.ht[0].size(),
            self.ht[0].used
        );
    }

    #[inline]
    fn rehash_step(&mut self) {
        if self.is_rehashing() && !self.pauses.is_paused() {
            self.rehash(1);
        }
    }

    /// Rehash in batches of 100 buckets until done or `ms` milliseconds pass.
    ///
    /// Returns the number of bucket steps requested, which is zero while a
    /// safe iterator is live.
    pub fn rehash_for_milliseconds(&mut self, ms: u64) -> usize {
        if self.pauses.is_paused() {
            return 0;
        }
        let budget = Duration::from_millis(ms);
        let start = self.config.clock.now();
        let mut rehashes = 0;
        while !self.rehash(REHASH_BATCH) {
            rehashes += REHASH_BATCH;
            if self.config.clock.now().duration_since(start) > budget {
                break;
            }
        }
        log::trace!(
            "rehash_for_milliseconds({}): {} steps, rehashing={}",
            ms,
            rehashes,
            self.is_rehashing()
        );
        rehashes
    }

    pub(crate) fn lookup(&self, key: &K, hash: u64) -> Option<EntryId> {
        if self.is_empty() {
            return None;
        }
        for table in &self.ht {
            if table.size() != 0 {
                let mut cur = table.buckets[table.slot(hash)];
                while let Some(id) = cur {
                    let e = &self.entries[id];
                    if e.hash == hash && self.ty.key_compare(&e.key, key) {
                        return Some(id);
                    }
                    cur = e.next;
                }
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Look up `key`, performing one rehash step first.
    pub fn find(&mut self, key: &K) -> Option<&DictEntry<K, V>> {
        if self.is_empty() {
            return None;
        }
        self.rehash_step();
        let id = self.lookup(key, self.ty.hash(key))?;
        self.entries.get(id)
    }

    pub fn find_mut(&mut self, key: &K) -> Option<&mut DictEntry<K, V>> {
        if self.is_empty() {
            return None;
        }
        self.rehash_step();
        let id = self.lookup(key, self.ty.hash(key))?;
        self.entries.get_mut(id)
    }

    /// Owned value stored under `key`, if any.
    pub fn fetch_value(&mut self, key: &K) -> Option<&V> {
        self.find(key).and_then(DictEntry::val)
    }

    /// Read-only lookup; never advances a rehash.
    pub fn get(&self, key: &K) -> Option<&DictEntry<K, V>> {
        let id = self.lookup(key, self.ty.hash(key))?;
        self.entries.get(id)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.lookup(key, self.ty.hash(key)).is_some()
    }

    fn insert_key(&mut self, key: K) -> Result<Inserted, DictError> {
        self.rehash_step();
        let hash = self.ty.hash(&key);
        if let Some(id) = self.lookup(&key, hash) {
            return Ok(Inserted::Existing(id));
        }
        self.expand_if_needed()?;
        // New entries go to the incoming table while rehashing.
        let t = usize::from(self.is_rehashing());
        let key = self.ty.key_dup(key);
        let table = &mut self.ht[t];
        let slot = table.slot(hash);
        let id = self.entries.insert(DictEntry {
            key,
            value: EntryValue::Empty,
            hash,
            next: table.buckets[slot],
        });
        table.buckets[slot] = Some(id);
        table.used += 1;
        Ok(Inserted::New(id))
    }

    /// Insert `key` with `val`. Fails with `DuplicateKey` if the key exists.
    pub fn add(&mut self, key: K, val: V) -> Result<(), DictError> {
        match self.insert_key(key)? {
            Inserted::Existing(_) => Err(DictError::DuplicateKey),
            Inserted::New(id) => {
                let val = self.ty.val_dup(val);
                self.entries[id].value = EntryValue::Val(val);
                Ok(())
            }
        }
    }

    /// Insert `key` without a value, or report the entry already holding it.
    pub fn add_raw(&mut self, key: K) -> Result<AddRaw<'_, K, V>, DictError> {
        Ok(match self.insert_key(key)? {
            Inserted::New(id) => AddRaw::Added(&mut self.entries[id]),
            Inserted::Existing(id) => AddRaw::Existing(&mut self.entries[id]),
        })
    }

    /// Existing entry for `key`, or a new empty one.
    pub fn add_or_find(&mut self, key: K) -> Result<&mut DictEntry<K, V>, DictError> {
        Ok(match self.add_raw(key)? {
            AddRaw::Added(e) | AddRaw::Existing(e) => e,
        })
    }

    /// Insert or overwrite. Returns true if `key` was newly added.
    ///
    /// On overwrite the new value is stored before the old one reaches
    /// `val_destructor`, so a value replacing itself stays alive.
    pub fn replace(&mut self, key: K, val: V) -> Result<bool, DictError> {
        let (id, added) = match self.insert_key(key)? {
            Inserted::New(id) => (id, true),
            Inserted::Existing(id) => (id, false),
        };
        let val = self.ty.val_dup(val);
        let old = mem::replace(&mut self.entries[id].value, EntryValue::Val(val));
        if let EntryValue::Val(old) = old {
            self.ty.val_destructor(old);
        }
        Ok(added)
    }

    /// Remove `key` from the table and hand the entry to the caller.
    ///
    /// The descriptor's destructors do not run; pass the entry to
    /// [`free_unlinked_entry`](Self::free_unlinked_entry) when done with it.
    pub fn unlink(&mut self, key: &K) -> Option<DictEntry<K, V>> {
        if self.is_empty() {
            return None;
        }
        self.rehash_step();
        let hash = self.ty.hash(key);
        let rehashing = self.is_rehashing();
        for table in &mut self.ht {
            if table.size() != 0 {
                let slot = table.slot(hash);
                let mut prev: Option<EntryId> = None;
                let mut cur = table.buckets[slot];
                while let Some(id) = cur {
                    let e = &self.entries[id];
                    let next = e.next;
                    if e.hash == hash && self.ty.key_compare(&e.key, key) {
                        match prev {
                            Some(p) => self.entries[p].next = next,
                            None => table.buckets[slot] = next,
                        }
                        table.used -= 1;
                        let mut entry = self.entries.remove(id)?;
                        entry.next = None;
                        return Some(entry);
                    }
                    prev = cur;
                    cur = next;
                }
            }
            if !rehashing {
                break;
            }
        }
        None
    }

    /// Run the descriptor's destructors on an entry returned by `unlink`.
    pub fn free_unlinked_entry(&self, entry: DictEntry<K, V>) {
        let (key, value) = entry.into_parts();
        self.ty.key_destructor(key);
        if let EntryValue::Val(val) = value {
            self.ty.val_destructor(val);
        }
    }

    /// Remove and destroy `key`. Returns false if it was absent.
    pub fn delete(&mut self, key: &K) -> bool {
        match self.unlink(key) {
            Some(entry) => {
                self.free_unlinked_entry(entry);
                true
            }
            None => false,
        }
    }

    /// A random entry.
    ///
    /// Picks a random non-empty bucket, then a random position in its chain,
    /// so entries in short chains are more likely than entries in long ones.
    pub fn random_key<R: Rng>(&mut self, rng: &mut R) -> Option<&DictEntry<K, V>> {
        if self.is_empty() {
            return None;
        }
        self.rehash_step();
        let head = match self.rehash_idx {
            Some(idx) => {
                // ht[0] buckets below idx are empty; skip them.
                let s0 = self.ht[0].size();
                let s1 = self.ht[1].size();
                loop {
                    let h = idx + rng.gen_range(0..s0 + s1 - idx);
                    let bucket = if h >= s0 {
                        self.ht[1].buckets[h - s0]
                    } else {
                        self.ht[0].buckets[h]
                    };
                    if let Some(id) = bucket {
                        break id;
                    }
                }
            }
            None => {
                let t = &self.ht[0];
                loop {
                    if let Some(id) = t.buckets[rng.gen::<usize>() & t.mask()] {
                        break id;
                    }
                }
            }
        };

        let mut chain_len: usize = 0;
        let mut cur = Some(head);
        while let Some(id) = cur {
            chain_len += 1;
            cur = self.entries[id].next;
        }
        let mut id = head;
        for _ in 0..rng.gen_range(0..chain_len) {
            id = self.entries[id].next?;
        }
        self.entries.get(id)
    }

    /// Sample up to `count` distinct entries, best effort.
    ///
    /// Walks consecutive buckets from a random start, jumping elsewhere
    /// after a long run of empty buckets, and gives up after `count * 10`
    /// steps. Fewer than `count` entries may come back, and the sample is
    /// not uniform.
    pub fn get_some_keys<R: Rng>(
        &mut self,
        count: usize,
        rng: &mut R,
    ) -> Vec<&DictEntry<K, V>> {
        let count = count.min(self.len());
        if count == 0 {
            return Vec::new();
        }
        let mut maxsteps = count.saturating_mul(10);

        // Pay for the sample with some rehash progress.
        for _ in 0..count {
            if !self.is_rehashing() {
                break;
            }
            self.rehash_step();
        }

        let tables = if self.is_rehashing() { 2 } else { 1 };
        let rehash_idx = self.rehash_idx.unwrap_or(0);
        let mut maxsizemask = self.ht[0].mask();
        if tables > 1 {
            maxsizemask = maxsizemask.max(self.ht[1].mask());
        }

        let mut picked: Vec<EntryId> = Vec::with_capacity(count);
        let mut seen: HashSet<EntryId> = HashSet::with_capacity(count);
        let mut i = rng.gen::<usize>() & maxsizemask;
        let mut emptylen = 0;
        'walk: while picked.len() < count && maxsteps > 0 {
            maxsteps -= 1;
            for j in 0..tables {
                if tables == 2 && j == 0 && i < rehash_idx {
                    // Already migrated; jump past the drained prefix once the
                    // index is beyond the incoming table too.
                    if i >= self.ht[1].size() {
                        i = rehash_idx;
                    } else {
                        continue;
                    }
                }
                if i >= self.ht[j].size() {
                    continue;
                }
                let mut cur = self.ht[j].buckets[i];
                if cur.is_none() {
                    emptylen += 1;
                    if emptylen >= 5 && emptylen > count {
                        i = rng.gen::<usize>() & maxsizemask;
                        emptylen = 0;
                    }
                    continue;
                }
                emptylen = 0;
                while let Some(id) = cur {
                    if seen.insert(id) {
                        picked.push(id);
                        if picked.len() == count {
                            break 'walk;
                        }
                    }
                    cur = self.entries[id].next;
                }
            }
            i = (i + 1) & maxsizemask;
        }

        picked
            .into_iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    /// Destroy every entry and release both tables.
    pub fn clear(&mut self) {
        self.clear_with(|| {});
    }

    /// Like [`clear`](Self::clear), calling `callback` every 65536 buckets
    /// so a caller can keep serving while a huge table is torn down.
    pub fn clear_with<F: FnMut()>(&mut self, mut callback: F) {
        for t in 0..self.ht.len() {
            let table = mem::replace(&mut self.ht[t], Table::empty());
            for (i, head) in table.buckets.into_iter().enumerate() {
                if i % CLEAR_CALLBACK_INTERVAL == 0 {
                    callback();
                }
                let mut cur = head;
                while let Some(id) = cur {
                    let Some(entry) = self.entries.remove(id) else {
                        break;
                    };
                    cur = entry.next;
                    self.free_unlinked_entry(entry);
                }
            }
        }
        self.rehash_idx = None;
    }

    /// Layout checksum checked by unsafe iterators.
    pub(crate) fn fingerprint(&self) -> DebugFingerprint {
        DebugFingerprint::capture(|| {
            let [a, b] = &self.ht;
            [
                a.addr(),
                a.size() as u64,
                a.used as u64,
                b.addr(),
                b.size() as u64,
                b.used as u64,
            ]
        })
    }
}

impl<K, V, T> Drop for Dict<K, V, T>
where
    K: Eq,
    T: DictType<K, V>,
{
    fn drop(&mut self) {
        self.clear();
    }
}
