//! Shared test helpers

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};
use tempfile::TempDir;
use xconf::store::{KeyValue, Subscription};
use xconf::{Config, ConfigEngine, File, MemStore, Store, XconfError};

/// How long to wait for a delivery that should happen
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding a delivery did not happen
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Store wrapper that counts calls and can fail reads on demand
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemStore,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub fail_gets: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }
}

impl Store for CountingStore {
    fn get(&self, key: &str) -> xconf::Result<KeyValue> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(XconfError::Transport("injected failure".to_string()));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: Bytes) -> xconf::Result<i64> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value)
    }

    fn put_if_version(&self, key: &str, value: Bytes, expected: i64) -> xconf::Result<i64> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put_if_version(key, value, expected)
    }

    fn delete(&self, key: &str) -> xconf::Result<()> {
        self.inner.delete(key)
    }

    fn subscribe(&self, key: &str) -> xconf::Result<Subscription> {
        self.inner.subscribe(key)
    }
}

/// Open an engine with identity `id` and its own cache directory under `temp`
pub fn open_engine(temp: &TempDir, store: Arc<dyn Store>, id: &str) -> ConfigEngine {
    let config = Config::builder()
        .id(id)
        .namespace("test")
        .cache_dir(temp.path().join(id))
        .build();
    ConfigEngine::open(config, store).unwrap()
}

/// Callback that forwards delivered files into a channel
pub fn forwarder() -> (
    impl FnMut(&File) -> xconf::CallbackResult + Send + 'static,
    Receiver<File>,
) {
    let (tx, rx): (Sender<File>, Receiver<File>) = channel::unbounded();
    let callback = move |file: &File| {
        let _ = tx.send(file.clone());
        Ok(())
    };
    (callback, rx)
}

pub fn json_file(group: &str, name: &str, json: &str) -> File {
    File::new(group, name, Bytes::copy_from_slice(json.as_bytes()))
}
