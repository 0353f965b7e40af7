//! In-process store
//!
//! BTreeMap-based store with per-key versions and live subscriptions.
//!
//! ## Concurrency
//! - `state`: one RwLock over entries, revision counter and watchers
//!   - Reads take the read lock
//!   - Mutations take the write lock and dispatch events before releasing it,
//!     so every subscriber sees mutations to a key in store order
//! - Subscriber channels are unbounded; dispatch never blocks on a slow reader

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use crossbeam::channel::{self, Sender};
use parking_lot::RwLock;

use crate::error::{Result, XconfError};

use super::{EventKind, KeyValue, Store, Subscription, WatchEvent};

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    version: i64,
    revision: u64,
}

#[derive(Default)]
struct State {
    entries: BTreeMap<String, Entry>,

    /// Revision of the most recent mutation (0 = none yet)
    revision: u64,

    /// Subscribers by exact key
    watchers: HashMap<String, Vec<Sender<WatchEvent>>>,

    closed: bool,
}

/// Linearizable in-memory store satisfying the [`Store`] contract
#[derive(Default)]
pub struct MemStore {
    state: RwLock<State>,
}

impl MemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the store: every open subscription ends and later calls fail
    /// with a transport error.
    pub fn close(&self) {
        let mut state = self.state.write();
        state.closed = true;
        state.watchers.clear();
        tracing::debug!("MemStore closed at revision {}", state.revision);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// True if no keys are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Revision of the most recent mutation
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Number of open subscriptions on `key` (stale ones are pruned lazily)
    pub fn watcher_count(&self, key: &str) -> usize {
        self.state
            .read()
            .watchers
            .get(key)
            .map_or(0, |senders| senders.len())
    }

    /// Keys starting with `prefix`, in order
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state
            .read()
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_open(state: &State) -> Result<()> {
        if state.closed {
            return Err(XconfError::Transport("store is closed".to_string()));
        }
        Ok(())
    }

    /// Apply a put with the write lock held
    fn put_locked(state: &mut State, key: &str, value: Bytes) -> i64 {
        state.revision += 1;
        let revision = state.revision;
        let version = state.entries.get(key).map_or(1, |e| e.version + 1);

        state.entries.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                version,
                revision,
            },
        );

        Self::dispatch(
            state,
            WatchEvent {
                key: key.to_string(),
                value,
                kind: EventKind::Put,
                version,
                revision,
            },
        );
        version
    }

    /// Send an event to the key's subscribers, dropping the disconnected ones
    fn dispatch(state: &mut State, event: WatchEvent) {
        let Some(senders) = state.watchers.get_mut(&event.key) else {
            return;
        };

        senders.retain(|tx| tx.send(event.clone()).is_ok());
        if senders.is_empty() {
            state.watchers.remove(&event.key);
        }
    }
}

impl Store for MemStore {
    fn get(&self, key: &str) -> Result<KeyValue> {
        let state = self.state.read();
        Self::ensure_open(&state)?;

        let entry = state.entries.get(key).ok_or(XconfError::NotFound)?;
        Ok(KeyValue {
            key: key.to_string(),
            value: entry.value.clone(),
            version: entry.version,
            revision: entry.revision,
        })
    }

    fn put(&self, key: &str, value: Bytes) -> Result<i64> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;
        Ok(Self::put_locked(&mut state, key, value))
    }

    fn put_if_version(&self, key: &str, value: Bytes, expected: i64) -> Result<i64> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;

        let actual = state.entries.get(key).map_or(0, |e| e.version);
        if actual != expected {
            return Err(XconfError::Conflict {
                key: key.to_string(),
                expected,
                actual,
            });
        }
        Ok(Self::put_locked(&mut state, key, value))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;

        if state.entries.remove(key).is_none() {
            return Ok(());
        }

        state.revision += 1;
        let revision = state.revision;
        Self::dispatch(
            &mut state,
            WatchEvent {
                key: key.to_string(),
                value: Bytes::new(),
                kind: EventKind::Delete,
                version: 0,
                revision,
            },
        );
        Ok(())
    }

    fn subscribe(&self, key: &str) -> Result<Subscription> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;

        let (tx, rx) = channel::unbounded();
        state.watchers.entry(key.to_string()).or_default().push(tx);
        tracing::trace!("Subscribed to {} at revision {}", key, state.revision);

        Ok(Subscription::new(key, rx))
    }
}
