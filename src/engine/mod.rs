//! Engine Module
//!
//! The configuration engine that coordinates all components.
//!
//! ## Responsibilities
//! - Serve reads from the local cache, falling back to the store
//! - Write content and metadata records for create/update/delete
//! - Run watch loops that turn metadata changes into targeted deliveries
//!
//! ## Write Ordering
//! Content is written first and the metadata record last. The two writes are
//! not transactional: a crash in between leaves new content with old
//! metadata. Watchers only subscribe to the metadata key, so such a write is
//! simply not announced until the next complete update.

mod watch;

pub use watch::{CloseReason, WatchHandle, WatchSummary};

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::cache::LocalCache;
use crate::config::Config;
use crate::error::{CallbackResult, Result, XconfError};
use crate::holder::ActiveConfig;
use crate::keys::KeyNamer;
use crate::metadata::{unix_now, File, Metadata};
use crate::observe::{EventSink, TracingSink};
use crate::rollout::should_apply;
use crate::scope::CancelScope;
use crate::store::Store;

/// State shared between the engine and its watch loops
pub(crate) struct Inner {
    identity: String,
    keys: KeyNamer,
    cache: LocalCache,
    store: Arc<dyn Store>,
    sink: Arc<dyn EventSink>,
}

impl Inner {
    /// Best-effort cache write; failures go to the sink
    fn cache_write(&self, group: &str, name: &str, content: &[u8]) {
        if let Err(e) = self.cache.write(group, name, content) {
            self.sink.cache_write_failed(group, name, &e.to_string());
        }
    }
}

/// Client-side configuration engine
///
/// Cheap to clone; clones share the cache, store handle and sink.
#[derive(Clone)]
pub struct ConfigEngine {
    inner: Arc<Inner>,
}

impl ConfigEngine {
    /// Open an engine over `store` with the default tracing sink
    pub fn open(config: Config, store: Arc<dyn Store>) -> Result<Self> {
        Self::open_with_sink(config, store, Arc::new(TracingSink::new()))
    }

    /// Open an engine reporting background failures to `sink`
    pub fn open_with_sink(
        config: Config,
        store: Arc<dyn Store>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let config = config.with_defaults();
        config.validate()?;

        let identity = config.identity();
        let keys = KeyNamer::new(&config.namespace);
        let cache = LocalCache::new(&config.cache_dir, &config.namespace);

        tracing::debug!(
            identity = %identity,
            namespace = %config.namespace,
            endpoints = ?config.endpoints,
            cache = %cache.root().display(),
            "Config engine opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                identity,
                keys,
                cache,
                store,
                sink,
            }),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a file's content
    ///
    /// Search order:
    /// 1. Local cache (returned without contacting the store)
    /// 2. Store, writing the result through to the cache
    pub fn get_config(&self, group: &str, name: &str) -> Result<Bytes> {
        match self.inner.cache.read(group, name) {
            Ok(data) => return Ok(Bytes::from(data)),
            Err(XconfError::CacheMiss) => {}
            Err(e) => tracing::debug!("Cache read for {}/{} failed, using store: {}", group, name, e),
        }

        let kv = self.inner.store.get(&self.inner.keys.content_key(group, name))?;
        self.inner.cache_write(group, name, &kv.value);
        Ok(kv.value)
    }

    /// Get a file's content from the store, bypassing the cache entirely
    pub fn fetch_config(&self, group: &str, name: &str) -> Result<Bytes> {
        let kv = self.inner.store.get(&self.inner.keys.content_key(group, name))?;
        Ok(kv.value)
    }

    /// Get a file's metadata record from the store
    pub fn get_metadata(&self, group: &str, name: &str) -> Result<Metadata> {
        let kv = self.inner.store.get(&self.inner.keys.metadata_key(group, name))?;
        Metadata::decode(&kv.value)
    }

    /// Get a file's content, version and metadata from the store.
    ///
    /// A file whose metadata record is missing gets default metadata.
    pub fn get_file(&self, group: &str, name: &str) -> Result<File> {
        let kv = self.inner.store.get(&self.inner.keys.content_key(group, name))?;
        let meta = match self.get_metadata(group, name) {
            Ok(meta) => meta,
            Err(XconfError::NotFound) => Metadata::default(),
            Err(e) => return Err(e),
        };

        Ok(File {
            group: group.to_string(),
            name: name.to_string(),
            content: kv.value,
            version: kv.version,
            meta,
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create a file. Sets `create_time` if unset; fills in `file.version`.
    pub fn create_file(&self, file: &mut File) -> Result<i64> {
        self.write_file(file, None)
    }

    /// Update a file unconditionally; fills in `file.version`.
    pub fn update_file(&self, file: &mut File) -> Result<i64> {
        self.write_file(file, None)
    }

    /// Update a file only if its content is still at `file.version`.
    ///
    /// Fails with `Conflict` when another writer got there first; nothing is
    /// written in that case.
    pub fn update_file_checked(&self, file: &mut File) -> Result<i64> {
        let expected = file.version;
        self.write_file(file, Some(expected))
    }

    /// Delete a file's content and metadata.
    ///
    /// Both deletes are attempted; the first error is returned and neither is
    /// rolled back. The local cache entry is removed best-effort.
    pub fn delete_file(&self, group: &str, name: &str) -> Result<()> {
        let content_key = self.inner.keys.content_key(group, name);
        let metadata_key = KeyNamer::metadata_key_for(&content_key);

        let content = self.inner.store.delete(&content_key);
        let metadata = self.inner.store.delete(&metadata_key);

        if let Err(e) = self.inner.cache.remove(group, name) {
            tracing::warn!("Failed to drop cache entry {}/{}: {}", group, name, e);
        }

        content.and(metadata)
    }

    /// Steps:
    /// 1. Carry over the stored creation time, then stamp timestamps
    /// 2. Write content (conditionally if `expected` is set)
    /// 3. Record the store-assigned version and write metadata last
    /// 4. Refresh the local cache if this consumer would see the change
    fn write_file(&self, file: &mut File, expected: Option<i64>) -> Result<i64> {
        let content_key = self.inner.keys.content_key(&file.group, &file.name);
        let metadata_key = KeyNamer::metadata_key_for(&content_key);

        let store = &self.inner.store;

        let mut meta = file.meta.clone();
        if meta.create_time == 0 {
            meta.create_time = self.stored_create_time(&metadata_key)?;
        }
        meta.touch(unix_now());

        let version = match expected {
            Some(expected) => store.put_if_version(&content_key, file.content.clone(), expected)?,
            None => store.put(&content_key, file.content.clone())?,
        };

        meta.version = version;
        store.put(&metadata_key, Bytes::from(meta.encode()?))?;

        file.version = version;
        file.meta = meta;

        if should_apply(&self.inner.identity, &file.meta.gray) {
            self.inner.cache_write(&file.group, &file.name, &file.content);
        }

        tracing::debug!("Wrote {} at version {}", content_key, version);
        Ok(version)
    }

    /// Creation time recorded for an existing file, or 0 if there is none.
    /// An unreadable record counts as none.
    fn stored_create_time(&self, metadata_key: &str) -> Result<i64> {
        match self.inner.store.get(metadata_key) {
            Ok(kv) => match Metadata::decode(&kv.value) {
                Ok(meta) => Ok(meta.create_time),
                Err(e) => {
                    tracing::warn!("Replacing unreadable metadata at {}: {}", metadata_key, e);
                    Ok(0)
                }
            },
            Err(XconfError::NotFound) => Ok(0),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Watches
    // =========================================================================

    /// Watch a file for changes.
    ///
    /// The metadata subscription is opened before returning; failing to open
    /// it is returned here. Changes are then delivered to `on_change` on a
    /// dedicated thread, in store order, until `scope` is cancelled, the
    /// handle is cancelled, or the store ends the stream.
    pub fn watch<F>(
        &self,
        group: &str,
        name: &str,
        scope: &CancelScope,
        on_change: F,
    ) -> Result<WatchHandle>
    where
        F: FnMut(&File) -> CallbackResult + Send + 'static,
    {
        watch::spawn(Arc::clone(&self.inner), group, name, scope.clone(), on_change)
    }

    /// Keep `holder` loaded with the JSON-decoded content of a file.
    ///
    /// Registers a watch that parses each delivered revision and swaps it in
    /// (a revision that fails to parse leaves the previous value in place),
    /// then loads the initial value through [`get_config`](Self::get_config).
    /// The initial value is not swapped in if a delivery already did so.
    pub fn bind_json<T>(
        &self,
        group: &str,
        name: &str,
        holder: Arc<ActiveConfig<T>>,
        scope: &CancelScope,
    ) -> Result<WatchHandle>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let generation = holder.generation();

        let target = Arc::clone(&holder);
        let handle = self.watch(group, name, scope, move |file: &File| {
            let parsed: T = serde_json::from_slice(&file.content)?;
            target.swap(parsed);
            Ok(())
        })?;

        let initial = self
            .get_config(group, name)
            .and_then(|content| Ok(serde_json::from_slice::<T>(&content)?));

        match initial {
            Ok(parsed) => {
                if holder.swap_if_generation(generation, parsed).is_none() {
                    tracing::debug!("{}/{} already refreshed by watch", group, name);
                }
                Ok(handle)
            }
            Err(e) => {
                handle.cancel();
                Err(e)
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Consumer identity matched against gray lists
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    /// Key namer for this engine's namespace
    pub fn keys(&self) -> &KeyNamer {
        &self.inner.keys
    }

    /// The local cache
    pub fn cache(&self) -> &LocalCache {
        &self.inner.cache
    }
}
