//! Debug-only structural fingerprint.
//!
//! An unsafe iterator promises that nothing mutates the dictionary between
//! its creation and its release. Instead of locking, the iterator records a
//! checksum of the table layout (bucket array addresses, sizes and live
//! counts of both tables) and compares it on release. In debug builds a
//! mismatch panics; in release builds this compiles to a zero-sized no-op.

#[cfg(debug_assertions)]
use core::marker::PhantomData;

/// Layout snapshot taken by an unsafe iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DebugFingerprint {
    #[cfg(debug_assertions)]
    value: u64,
    #[cfg(debug_assertions)]
    _nosend: PhantomData<*mut ()>,
}

/// Thomas Wang's 64-bit integer mix.
#[cfg(debug_assertions)]
#[inline]
fn mix(mut h: u64) -> u64 {
    h = (!h).wrapping_add(h << 21);
    h ^= h >> 24;
    h = h.wrapping_add(h << 3).wrapping_add(h << 8);
    h ^= h >> 14;
    h = h.wrapping_add(h << 2).wrapping_add(h << 4);
    h ^= h >> 28;
    h.wrapping_add(h << 31)
}

impl DebugFingerprint {
    /// Fold the layout words into one checksum. `parts` only runs in debug builds.
    #[inline]
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub(crate) fn capture<F>(parts: F) -> Self
    where
        F: FnOnce() -> [u64; 6],
    {
        #[cfg(debug_assertions)]
        {
            // Order matters: swapping the tables must change the result.
            let value = parts()
                .iter()
                .fold(0u64, |h, &w| mix(h.wrapping_add(w)));
            Self {
                value,
                _nosend: PhantomData,
            }
        }

        #[cfg(not(debug_assertions))]
        {
            Self {}
        }
    }

    /// Assert that the layout did not change since `self` was captured.
    #[inline]
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub(crate) fn verify(&self, now: DebugFingerprint) {
        #[cfg(debug_assertions)]
        assert!(
            self.value == now.value,
            "unsafe iterator fingerprint mismatch: dictionary mutated during unsafe iteration"
        );
    }
}
