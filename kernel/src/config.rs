//! Kernel configuration.
//!
//! On hardware these values are patched into the kernel image at build
//! time; here they are fixed when the kernel is constructed and never
//! change afterwards. Everything downstream (arena size, futex hash
//! sizing, interrupt table width) is derived from this one record.

use static_assertions::const_assert;

use crate::abi::Word;

/// Default build: a small single-core image, enough for the test universe.
pub const DEFAULT_MAX_TCBS: usize = 64;
pub const DEFAULT_NUM_INTERRUPTS: usize = 32;
pub const DEFAULT_NUM_PRIORITIES: usize = 32;

const_assert!(DEFAULT_MAX_TCBS > 0);
const_assert!(DEFAULT_NUM_PRIORITIES >= 2);
const_assert!(DEFAULT_NUM_INTERRUPTS <= Word::BITS as usize);

/// Build-time kernel parameters.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Total user-creatable TCBs. Per-core idle threads live outside this
    /// budget.
    pub max_tcbs: usize,

    /// Platform IRQ count.
    pub num_interrupts: usize,

    /// Priority levels; valid priorities are `0..num_priorities`, higher
    /// number means higher priority.
    pub num_priorities: usize,

    /// Number of cores.
    pub num_execution_units: usize,
}

impl Config {
    pub const fn new(max_tcbs: usize) -> Self {
        Self {
            max_tcbs,
            num_interrupts: DEFAULT_NUM_INTERRUPTS,
            num_priorities: DEFAULT_NUM_PRIORITIES,
            num_execution_units: 1,
        }
    }

    /// Highest valid thread priority.
    pub const fn max_priority(&self) -> u8 {
        (self.num_priorities - 1) as u8
    }

    /// Futex hash table size: next power of two at or above 1.5x the TCB
    /// count, so chains stay short even with every thread asleep.
    pub const fn futex_hash_slots(&self) -> usize {
        (self.max_tcbs + self.max_tcbs / 2).next_power_of_two()
    }

    pub const fn futex_hash_slots_lg2(&self) -> u32 {
        self.futex_hash_slots().trailing_zeros()
    }

    /// Boot-time sanity. A bad configuration is a build system defect, not a
    /// runtime condition, so this panics.
    pub(crate) fn validate(&self) {
        assert!(self.max_tcbs > 0, "config: max_tcbs must be non-zero");
        assert!(
            self.num_priorities >= 1 && self.num_priorities <= 256,
            "config: num_priorities out of range"
        );
        assert!(
            self.num_execution_units >= 1,
            "config: need at least one execution unit"
        );
        assert!(
            self.num_interrupts <= Word::BITS as usize,
            "config: interrupt bitmask must fit in a word"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TCBS)
    }
}
