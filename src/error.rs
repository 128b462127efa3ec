//! Error types shared by the dictionary and the integer set.

/// The error type for [`Dict`][crate::Dict] insertion and resize operations.
///
/// Logical no-ops that callers routinely expect (deleting an absent key,
/// failing to shrink a table that is already minimal) are reported through
/// `bool` returns instead; this enum carries the conditions a caller has to
/// decide about.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DictError {
    /// The key is already present; the table was left untouched.
    #[error("key already exists")]
    DuplicateKey,

    /// A resize was requested while an incremental rehash is still running.
    #[error("table is rehashing; finish the current rehash before resizing")]
    Rehashing,

    /// The requested bucket count cannot hold the live entries.
    #[error("requested {requested} buckets but the table holds {used} entries")]
    SizeTooSmall { requested: usize, used: usize },

    /// The requested bucket count equals the current one.
    #[error("table already has {0} buckets")]
    SameSize(usize),

    /// Resizing is switched off through the table's resize gate.
    #[error("resizing is disabled")]
    ResizeDisabled,

    /// The bucket array could not be allocated. The table is unchanged.
    #[error("failed to allocate a table of {buckets} buckets")]
    AllocFailed { buckets: usize },
}

/// The error type for [`IntSet`][crate::IntSet] growth and blob decoding.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IntSetError {
    /// The backing buffer could not grow. The set is unchanged.
    #[error("integer set capacity exceeded")]
    CapacityOverflow,

    /// The blob is shorter than its fixed header.
    #[error("blob of {0} bytes is shorter than the 8-byte header")]
    CorruptHeader(usize),

    /// The encoding tag is not one of 2, 4 or 8.
    #[error("unknown encoding tag {0}")]
    CorruptEncoding(u32),

    /// The payload length does not match `count * encoding`.
    #[error("blob should be {expected} bytes but is {actual}")]
    CorruptLength { expected: usize, actual: usize },

    /// Elements are not strictly ascending at `pos`.
    #[error("element {pos} is not greater than its predecessor")]
    NotAscending { pos: usize },

    /// The blob uses a wider encoding than its values require.
    #[error("encoding of {encoding} bytes is wider than the values require")]
    NotMinimal { encoding: usize },
}
