//! Observability sink
//!
//! Background work (watch loops, cache write-through) never fails the caller,
//! so every dropped event and swallowed failure is reported here instead.
//! The engine holds one `Arc<dyn EventSink>`; the default [`TracingSink`]
//! logs through `tracing` and keeps counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Watch stage at which an event was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropStage {
    /// Metadata payload could not be decoded (or the record was deleted)
    Decode,
    /// Content fetch failed
    Resolve,
}

/// Receives reports of best-effort failures
pub trait EventSink: Send + Sync {
    /// A watch event was dropped; `key` is the subscribed metadata key
    fn event_dropped(&self, key: &str, stage: DropStage, reason: &str);

    /// A change was not for this consumer
    fn event_filtered(&self, key: &str);

    /// A change was handed to the callback
    fn event_delivered(&self, key: &str, version: i64);

    /// The change callback returned an error
    fn callback_failed(&self, key: &str, reason: &str);

    /// Writing through to the local cache failed
    fn cache_write_failed(&self, group: &str, name: &str, reason: &str);
}

/// Snapshot of [`TracingSink`] counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkCounters {
    pub delivered: u64,
    pub filtered: u64,
    pub decode_dropped: u64,
    pub resolve_dropped: u64,
    pub callback_failed: u64,
    pub cache_write_failed: u64,
}

/// Default sink: `tracing` events plus atomic counters
#[derive(Debug, Default)]
pub struct TracingSink {
    delivered: AtomicU64,
    filtered: AtomicU64,
    decode_dropped: AtomicU64,
    resolve_dropped: AtomicU64,
    callback_failed: AtomicU64,
    cache_write_failed: AtomicU64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values
    pub fn counters(&self) -> SinkCounters {
        SinkCounters {
            delivered: self.delivered.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            decode_dropped: self.decode_dropped.load(Ordering::Relaxed),
            resolve_dropped: self.resolve_dropped.load(Ordering::Relaxed),
            callback_failed: self.callback_failed.load(Ordering::Relaxed),
            cache_write_failed: self.cache_write_failed.load(Ordering::Relaxed),
        }
    }
}

impl EventSink for TracingSink {
    fn event_dropped(&self, key: &str, stage: DropStage, reason: &str) {
        let counter = match stage {
            DropStage::Decode => &self.decode_dropped,
            DropStage::Resolve => &self.resolve_dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(key, ?stage, reason, "Dropped watch event");
    }

    fn event_filtered(&self, key: &str) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, "Change not targeted at this consumer");
    }

    fn event_delivered(&self, key: &str, version: i64) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, version, "Delivered change");
    }

    fn callback_failed(&self, key: &str, reason: &str) {
        self.callback_failed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(key, reason, "Change callback failed");
    }

    fn cache_write_failed(&self, group: &str, name: &str, reason: &str) {
        self.cache_write_failed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(group, name, reason, "Local cache write failed");
    }
}
