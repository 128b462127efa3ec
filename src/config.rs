//! Dictionary configuration and the shared resize switch.

use core::cell::Cell;
use core::fmt;
use std::rc::Rc;

/// Smallest bucket array a table allocates.
pub const DEFAULT_INITIAL_SIZE: usize = 4;

/// Load factor above which a table grows even while resizing is disabled.
pub const DEFAULT_FORCE_RESIZE_RATIO: usize = 5;

/// Empty buckets a single rehash step may skip per bucket it was asked to move.
pub const DEFAULT_EMPTY_VISITS_PER_STEP: usize = 10;

/// Switch that allows or defers table resizing.
///
/// Clones share the same switch, so one gate handed to many tables acts as a
/// process-wide toggle, e.g. around a copy-on-write snapshot where moving
/// entries between pages is expensive. Single-threaded: `!Send`/`!Sync`.
#[derive(Clone)]
pub struct ResizeGate(Rc<Cell<bool>>);

impl ResizeGate {
    /// A new, enabled gate.
    pub fn new() -> Self {
        ResizeGate(Rc::new(Cell::new(true)))
    }

    pub fn enable(&self) {
        self.0.set(true);
    }

    pub fn disable(&self) {
        self.0.set(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.get()
    }
}

impl Default for ResizeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResizeGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResizeGate").field(&self.is_enabled()).finish()
    }
}

/// Tunables for a [`Dict`][crate::Dict].
///
/// ```
/// use kvindex::{DictConfig, ResizeGate};
///
/// let gate = ResizeGate::new();
/// let config = DictConfig::default()
///     .initial_size(16)
///     .resize_gate(gate.clone());
/// assert_eq!(config.get_initial_size(), 16);
/// ```
#[derive(Clone)]
pub struct DictConfig {
    pub(crate) initial_size: usize,
    pub(crate) force_resize_ratio: usize,
    pub(crate) empty_visits_per_step: usize,
    pub(crate) resize_gate: ResizeGate,
    pub(crate) clock: quanta::Clock,
}

impl DictConfig {
    /// Minimum bucket count, rounded up to a power of two.
    pub fn initial_size(mut self, size: usize) -> Self {
        self.initial_size = size
            .max(1)
            .checked_next_power_of_two()
            .unwrap_or(DEFAULT_INITIAL_SIZE);
        self
    }

    /// Load factor that forces growth while the resize gate is closed.
    pub fn force_resize_ratio(mut self, ratio: usize) -> Self {
        self.force_resize_ratio = ratio.max(1);
        self
    }

    /// Empty buckets a rehash step may skip per bucket requested.
    pub fn empty_visits_per_step(mut self, visits: usize) -> Self {
        self.empty_visits_per_step = visits.max(1);
        self
    }

    pub fn resize_gate(mut self, gate: ResizeGate) -> Self {
        self.resize_gate = gate;
        self
    }

    /// Clock used to bound `Dict::rehash_for_milliseconds`.
    pub fn clock(mut self, clock: quanta::Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn get_initial_size(&self) -> usize {
        self.initial_size
    }

    pub fn get_force_resize_ratio(&self) -> usize {
        self.force_resize_ratio
    }

    pub fn get_resize_gate(&self) -> &ResizeGate {
        &self.resize_gate
    }
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_INITIAL_SIZE,
            force_resize_ratio: DEFAULT_FORCE_RESIZE_RATIO,
            empty_visits_per_step: DEFAULT_EMPTY_VISITS_PER_STEP,
            resize_gate: ResizeGate::new(),
            clock: quanta::Clock::new(),
        }
    }
}

impl fmt::Debug for DictConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictConfig")
            .field("initial_size", &self.initial_size)
            .field("force_resize_ratio", &self.force_resize_ratio)
            .field("empty_visits_per_step", &self.empty_visits_per_step)
            .field("resize_gate", &self.resize_gate)
            .finish()
    }
}
