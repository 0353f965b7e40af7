//! Active configuration holder
//!
//! Double-buffered slot for the last successfully parsed configuration.
//!
//! ```text
//!            active ──┐
//!                     ▼
//!   ┌────────────┬────────────┐
//!   │  slot 0    │  slot 1    │
//!   │ Arc<T> v4  │ Arc<T> v5  │
//!   └────────────┴────────────┘
//! ```
//!
//! `swap` fills the slot that is not active, then publishes it by storing the
//! new index with release ordering. `current` loads the index with acquire
//! ordering, clones the `Arc` from that slot and re-checks the index, so a
//! reader only ever sees a value that was published. Readers keep their `Arc`
//! for as long as they like; later swaps never invalidate it.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

const SLOTS: usize = 2;

/// Two-slot ring of parsed snapshots
pub struct ActiveConfig<T> {
    slots: [RwLock<Option<Arc<T>>>; SLOTS],

    /// Index of the slot readers should use
    active: AtomicUsize,

    /// Number of completed swaps
    generation: AtomicU64,

    /// Serializes writers
    writer: Mutex<()>,
}

impl<T> ActiveConfig<T> {
    /// Create an empty holder
    pub fn new() -> Self {
        Self {
            slots: [RwLock::new(None), RwLock::new(None)],
            active: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    /// Create a holder already publishing `initial`
    pub fn with_value(initial: T) -> Self {
        let holder = Self::new();
        holder.swap(initial);
        holder
    }

    /// Publish `parsed` as the current configuration
    pub fn swap(&self, parsed: T) -> Arc<T> {
        let value = Arc::new(parsed);
        let _writer = self.writer.lock();
        self.publish(Arc::clone(&value));
        value
    }

    /// Fill the inactive slot and flip the index. Caller holds `writer`.
    fn publish(&self, value: Arc<T>) {
        let next = (self.active.load(Ordering::Relaxed) + 1) % SLOTS;
        *self.slots[next].write() = Some(value);
        self.active.store(next, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Publish `parsed` only if no swap happened since `generation` was read.
    /// Returns `None` (dropping `parsed`) if another swap won.
    pub fn swap_if_generation(&self, generation: u64, parsed: T) -> Option<Arc<T>> {
        let _writer = self.writer.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            return None;
        }

        let value = Arc::new(parsed);
        self.publish(Arc::clone(&value));
        Some(value)
    }

    /// The most recently published configuration, if any
    pub fn current(&self) -> Option<Arc<T>> {
        loop {
            let idx = self.active.load(Ordering::Acquire);
            let value = self.slots[idx].read().clone();
            // A writer may have refilled this slot after the load; retry
            // unless it is still the active one
            if self.active.load(Ordering::Acquire) == idx {
                return value;
            }
        }
    }

    /// The configuration published before the current one, if any
    pub fn previous(&self) -> Option<Arc<T>> {
        let _writer = self.writer.lock();
        let idx = (self.active.load(Ordering::Acquire) + 1) % SLOTS;
        self.slots[idx].read().clone()
    }

    /// Number of swaps performed so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl<T> Default for ActiveConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}
