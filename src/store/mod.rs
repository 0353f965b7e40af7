//! Store Module
//!
//! Thin synchronous facade over the backing key-value store.
//!
//! ## Contract
//! - `get`:    most recent value and its version, or `NotFound`
//! - `put`:    unconditional upsert, returns the new version
//! - `delete`: idempotent; deleting an absent key is not an error
//! - `subscribe`: live, ordered stream of mutations to one exact key.
//!   No replay: events that happen before the subscription is opened, or
//!   while no subscription exists, are never delivered.
//!
//! Transport errors surface synchronously from every call. Implementations
//! do not retry; a subscription that cannot be kept alive is closed, and the
//! consumer sees end-of-stream.
//!
//! ## Versions
//! Every key carries a version counter that starts at 1 on creation and
//! increases by one on each put. A delete resets it. Separately, every
//! mutation in the store gets a globally increasing revision.

mod memory;

pub use memory::MemStore;

use bytes::Bytes;
use crossbeam::channel::Receiver;

use crate::error::Result;

/// A key together with its current value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Bytes,

    /// Per-key version (1 on creation)
    pub version: i64,

    /// Store revision of the last mutation to this key
    pub revision: u64,
}

/// Kind of mutation carried by a watch event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Put,
    Delete,
}

/// A single mutation to a subscribed key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub key: String,

    /// New value; empty for deletes
    pub value: Bytes,
    pub kind: EventKind,

    /// Per-key version after the mutation (0 for deletes)
    pub version: i64,
    pub revision: u64,
}

/// Ordered stream of events for one key.
///
/// Dropping the subscription releases it; the store stops delivering to it.
#[derive(Debug)]
pub struct Subscription {
    key: String,
    events: Receiver<WatchEvent>,
}

impl Subscription {
    /// Wrap the receiving end of a store's event channel
    pub fn new(key: impl Into<String>, events: Receiver<WatchEvent>) -> Self {
        Self {
            key: key.into(),
            events,
        }
    }

    /// Subscribed key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Channel to select on. Disconnection means the stream has ended.
    pub fn events(&self) -> &Receiver<WatchEvent> {
        &self.events
    }
}

/// Backing key-value store
pub trait Store: Send + Sync {
    /// Fetch the current value of `key`
    fn get(&self, key: &str) -> Result<KeyValue>;

    /// Write `value` under `key`, returning the new version
    fn put(&self, key: &str, value: Bytes) -> Result<i64>;

    /// Write `value` only if the key's current version equals `expected`
    /// (0 = the key must not exist). Fails with `Conflict` otherwise.
    fn put_if_version(&self, key: &str, value: Bytes, expected: i64) -> Result<i64>;

    /// Remove `key`. Absent keys are not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Open a subscription on `key`
    fn subscribe(&self, key: &str) -> Result<Subscription>;
}
