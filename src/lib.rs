//! kvindex: the two in-memory containers at the bottom of a key-value
//! store: a chained hash table that rehashes incrementally, and a compact
//! sorted set of integers.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep every operation on the serving path bounded. A table that
//!   outgrows its bucket array must not stall the caller while it moves all
//!   of its entries.
//! - Pieces:
//!   - Dict<K, V, T>: two bucket arrays. Growth allocates the second one
//!     and each later add/find/delete/sample migrates one bucket until the
//!     first array is drained, at which point the arrays swap.
//!   - DictType<K, V>: the type descriptor. Hashing, comparison, key/value
//!     copy on insert and destruction on removal are delegated to it, so one
//!     table implementation backs differently-behaving containers.
//!   - DictIterator: detached safe and unsafe iterators, plus `scan`, a
//!     stateless cursor that survives resizes between calls.
//!   - IntSet: strictly ascending integers packed at the narrowest width
//!     (2, 4 or 8 bytes) holding every member, with a fixed little-endian
//!     blob layout for persistence.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (the resize gate is an `Rc`).
//! - Entries live in a generational slot map; chains link entry ids, not
//!   pointers, and ids of deleted entries never resolve again.
//! - Each entry caches the hash computed at insertion; migration never
//!   calls back into the descriptor.
//! - Bucket counts are powers of two, at least the configured minimum (4).
//!
//! Iterator discipline
//! - A safe iterator pauses rehashing until it is handed back through
//!   `Dict::release_iterator`. The table may be modified meanwhile; entries
//!   deleted before the iterator reaches them are skipped. The pause is a
//!   linear token: dropping an unreleased safe iterator panics.
//! - An unsafe iterator promises no modification between its first `next`
//!   and its release. Debug builds verify this with a checksum of both
//!   tables' layout.
//!
//! Resizing
//! - Growth is checked on insertion. A table grows once it holds as many
//!   entries as buckets, or, while the `ResizeGate` is closed, once the load
//!   factor exceeds `force_resize_ratio`. The gate can be shared by many
//!   tables to defer resizing globally.
//! - Shrinking is the caller's decision: `needs_resize` reports a sparse
//!   table and `resize` starts the rehash.
//!
//! Notes and non-goals
//! - `random_key` and `get_some_keys` favour entries in short chains and
//!   are not uniform.
//! - Upgrading an IntSet into a general hash set belongs to the caller.

mod config;
mod dict;
mod dict_iter;
mod dict_proptest;
mod dict_type;
mod entry;
mod error;
mod fingerprint;
mod intset;
mod intset_blob;
mod intset_proptest;
mod stats;
mod tokens;

// Public surface
pub use config::{
    DictConfig, ResizeGate, DEFAULT_EMPTY_VISITS_PER_STEP, DEFAULT_FORCE_RESIZE_RATIO,
    DEFAULT_INITIAL_SIZE,
};
pub use dict::{AddRaw, Dict};
pub use dict_iter::{DictIterator, Iter};
pub use dict_type::{CaseInsensitiveType, DefaultType, DictType};
pub use entry::{DictEntry, EntryValue};
pub use error::{DictError, IntSetError};
pub use intset::{Encoding, IntSet, Iter as IntSetIter};
pub use stats::{DictStats, TableStats, CHAIN_HISTOGRAM_SLOTS};
