//! Type descriptors: the behaviour a [`Dict`][crate::Dict] delegates to.
//!
//! One dictionary implementation backs many logical containers (plain maps,
//! membership sets, case-insensitive indices). What differs between them is
//! how keys hash and compare and what happens to keys and values as they
//! enter and leave the table. A descriptor is any value implementing
//! [`DictType`]; its own fields play the role of per-table user data and are
//! available to every slot through `&self`.
//!
//! Every slot except `hash` has an identity default: no copy on insert,
//! `==` for comparison, a plain drop on destruction.

use core::hash::{BuildHasher, Hash, Hasher};
use hashbrown::hash_map::DefaultHashBuilder;

pub trait DictType<K: Eq, V> {
    /// Hash of `key`. Keys that compare equal must hash equally.
    fn hash(&self, key: &K) -> u64;

    /// Transform a key as it is stored.
    #[inline]
    fn key_dup(&self, key: K) -> K {
        key
    }

    /// Transform a value as it is stored.
    #[inline]
    fn val_dup(&self, val: V) -> V {
        val
    }

    #[inline]
    fn key_compare(&self, a: &K, b: &K) -> bool {
        a == b
    }

    /// Called with every key the table destroys.
    #[inline]
    fn key_destructor(&self, key: K) {
        drop(key);
    }

    /// Called with every owned value the table destroys. Numeric payloads
    /// (`EntryValue::Signed` and friends) are not routed here.
    #[inline]
    fn val_destructor(&self, val: V) {
        drop(val);
    }
}

/// Descriptor for any `Hash + Eq` key, hashing through a `BuildHasher`.
#[derive(Clone, Debug, Default)]
pub struct DefaultType<S = DefaultHashBuilder> {
    hasher: S,
}

impl DefaultType {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> DefaultType<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

impl<K, V, S> DictType<K, V> for DefaultType<S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }
}

/// Descriptor for string keys that hash and compare ignoring ASCII case.
#[derive(Clone, Debug, Default)]
pub struct CaseInsensitiveType<S = DefaultHashBuilder> {
    hasher: S,
}

impl CaseInsensitiveType {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> CaseInsensitiveType<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

impl<K, V, S> DictType<K, V> for CaseInsensitiveType<S>
where
    K: AsRef<str> + Eq,
    S: BuildHasher,
{
    fn hash(&self, key: &K) -> u64 {
        let mut h = self.hasher.build_hasher();
        for b in key.as_ref().bytes() {
            h.write_u8(b.to_ascii_lowercase());
        }
        h.finish()
    }

    fn key_compare(&self, a: &K, b: &K) -> bool {
        a.as_ref().eq_ignore_ascii_case(b.as_ref())
    }
}
