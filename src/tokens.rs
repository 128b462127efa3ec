//! Linear pause tokens held by safe iterators.
//!
//! While a safe iterator is live the dictionary must not move entries
//! between bucket arrays. Each safe iterator carries a zero-sized
//! [`PauseToken`] minted by the dictionary's [`PauseCount`]; rehash steps
//! are skipped while any token is outstanding. Dropping a token panics: the
//! only valid way to dispose of it is to hand the iterator back through
//! `Dict::release_iterator`, which returns the token via
//! [`PauseCount::resume`].

use core::marker::PhantomData;

/// Zero-sized, linear proof that one rehash pause is outstanding.
pub(crate) struct PauseToken {
    // Keep !Send + !Sync in line with the single-threaded dictionary.
    _nosend: PhantomData<*mut ()>,
}

impl PauseToken {
    #[inline]
    fn new() -> Self {
        Self {
            _nosend: PhantomData,
        }
    }
}

impl Drop for PauseToken {
    fn drop(&mut self) {
        // Fail fast on a leaked safe iterator; stay quiet while already unwinding.
        if !std::thread::panicking() {
            panic!("safe iterator dropped without Dict::release_iterator");
        }
    }
}

/// Count of outstanding pause tokens for one dictionary.
#[derive(Debug, Default)]
pub(crate) struct PauseCount {
    count: usize,
}

impl PauseCount {
    pub(crate) fn new() -> Self {
        Self { count: 0 }
    }

    /// Acquire one pause.
    #[inline]
    pub(crate) fn pause(&mut self) -> PauseToken {
        self.count = self
            .count
            .checked_add(1)
            .unwrap_or_else(|| std::process::abort());
        PauseToken::new()
    }

    /// Return a pause. Returns true if no pause remains.
    #[inline]
    pub(crate) fn resume(&mut self, t: PauseToken) -> bool {
        assert!(self.count > 0, "PauseCount underflow");
        self.count -= 1;
        core::mem::forget(t);
        self.count == 0
    }

    #[inline]
    pub(crate) fn is_paused(&self) -> bool {
        self.count > 0
    }
}
