//! Dictionary entries and their tagged value payload.

slotmap::new_key_type! {
    /// Generational id of an entry inside a dictionary's entry store.
    pub(crate) struct EntryId;
}

/// Value half of an entry.
///
/// Callers that only need a number store it inline instead of allocating a
/// payload. `Empty` marks an entry created by `add_raw`/`add_or_find` that
/// the caller has not populated yet.
#[derive(Clone, Debug, PartialEq)]
pub enum EntryValue<V> {
    Empty,
    Val(V),
    Signed(i64),
    Unsigned(u64),
    Double(f64),
}

impl<V> Default for EntryValue<V> {
    fn default() -> Self {
        EntryValue::Empty
    }
}

impl<V> EntryValue<V> {
    pub fn is_empty(&self) -> bool {
        matches!(self, EntryValue::Empty)
    }

    pub fn as_val(&self) -> Option<&V> {
        match self {
            EntryValue::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_val_mut(&mut self) -> Option<&mut V> {
        match self {
            EntryValue::Val(v) => Some(v),
            _ => None,
        }
    }
}

/// One key/value pair owned by a dictionary.
///
/// The hash is computed once on insert and reused when the entry migrates
/// between bucket arrays, so rehashing never calls back into the descriptor.
#[derive(Debug)]
pub struct DictEntry<K, V> {
    pub(crate) key: K,
    pub(crate) value: EntryValue<V>,
    pub(crate) hash: u64,
    // Next entry in the same bucket chain.
    pub(crate) next: Option<EntryId>,
}

impl<K, V> DictEntry<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &EntryValue<V> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut EntryValue<V> {
        &mut self.value
    }

    pub fn val(&self) -> Option<&V> {
        self.value.as_val()
    }

    pub fn val_mut(&mut self) -> Option<&mut V> {
        self.value.as_val_mut()
    }

    pub fn signed_integer_val(&self) -> Option<i64> {
        match self.value {
            EntryValue::Signed(v) => Some(v),
            _ => None,
        }
    }

    pub fn unsigned_integer_val(&self) -> Option<u64> {
        match self.value {
            EntryValue::Unsigned(v) => Some(v),
            _ => None,
        }
    }

    pub fn double_val(&self) -> Option<f64> {
        match self.value {
            EntryValue::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Store an owned value directly, returning the previous payload.
    ///
    /// This bypasses the descriptor's `val_dup`/`val_destructor`; use
    /// `Dict::replace` when those must run.
    pub fn set_val(&mut self, val: V) -> EntryValue<V> {
        core::mem::replace(&mut self.value, EntryValue::Val(val))
    }

    pub fn set_signed_integer_val(&mut self, v: i64) -> EntryValue<V> {
        core::mem::replace(&mut self.value, EntryValue::Signed(v))
    }

    pub fn set_unsigned_integer_val(&mut self, v: u64) -> EntryValue<V> {
        core::mem::replace(&mut self.value, EntryValue::Unsigned(v))
    }

    pub fn set_double_val(&mut self, v: f64) -> EntryValue<V> {
        core::mem::replace(&mut self.value, EntryValue::Double(v))
    }

    /// Hash cached at insertion.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn into_parts(self) -> (K, EntryValue<V>) {
        (self.key, self.value)
    }
}
