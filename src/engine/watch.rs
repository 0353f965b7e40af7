//! Watch loop
//!
//! Turns metadata-key events into targeted change deliveries.
//!
//! ## States
//! ```text
//! Subscribing ─► Listening ─► Filtering ─► Resolving ─► Delivering ─┐
//!                   ▲  │          │            │                    │
//!                   │  │          └── drop ────┴── drop             │
//!                   └──┼────────────────────────────────────────────┘
//!                      └─► Closed (stream ended / cancelled)
//! ```
//!
//! - Subscribing happens on the caller's thread; failure is returned.
//! - Per-event failures (undecodable metadata, failed content fetch) drop
//!   that event only. Events are never retried or redelivered; the next
//!   metadata write triggers a fresh fetch.
//! - Callback errors are reported and the loop keeps going.
//! - Closed is final. Callers that need resilience register a new watch.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{CallbackResult, Result};
use crate::keys::KeyNamer;
use crate::metadata::{File, Metadata};
use crate::observe::DropStage;
use crate::rollout::should_apply;
use crate::scope::CancelScope;
use crate::store::{EventKind, Subscription, WatchEvent};

use super::Inner;

/// Why a watch loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The caller's scope or the handle was cancelled
    Cancelled,
    /// The store closed the subscription
    StreamEnded,
    /// The callback panicked
    Panicked,
}

/// Counts reported when a watch loop finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSummary {
    /// Callback invocations, including failed ones
    pub delivered: u64,
    /// Changes gray-targeted at other consumers
    pub filtered: u64,
    /// Events dropped while decoding or resolving
    pub dropped: u64,
    pub callback_failures: u64,
    pub closed_by: CloseReason,
}

impl WatchSummary {
    fn new() -> Self {
        Self {
            delivered: 0,
            filtered: 0,
            dropped: 0,
            callback_failures: 0,
            closed_by: CloseReason::Cancelled,
        }
    }
}

/// Handle to a running watch.
///
/// Dropping the handle detaches the loop; it keeps running until its scope
/// is cancelled or the stream ends.
pub struct WatchHandle {
    key: String,
    stop: CancelScope,
    thread: JoinHandle<WatchSummary>,
}

impl WatchHandle {
    /// Subscribed metadata key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stop this watch only; the caller's scope is left alone
    pub fn cancel(&self) {
        self.stop.cancel();
    }

    /// True once the loop has exited
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to exit
    pub fn join(self) -> WatchSummary {
        self.thread.join().unwrap_or_else(|_| {
            tracing::error!("Watch on {} panicked", self.key);
            WatchSummary {
                closed_by: CloseReason::Panicked,
                ..WatchSummary::new()
            }
        })
    }

    /// Cancel and wait. A callback already running completes first.
    pub fn stop(self) -> WatchSummary {
        self.cancel();
        self.join()
    }
}

/// Open the subscription and start the loop thread
pub(super) fn spawn<F>(
    inner: Arc<Inner>,
    group: &str,
    name: &str,
    scope: CancelScope,
    on_change: F,
) -> Result<WatchHandle>
where
    F: FnMut(&File) -> CallbackResult + Send + 'static,
{
    let content_key = inner.keys.content_key(group, name);
    let metadata_key = KeyNamer::metadata_key_for(&content_key);

    // Subscribing
    let subscription = inner.store.subscribe(&metadata_key)?;

    let stop = CancelScope::new();
    let watch = WatchLoop {
        inner,
        group: group.to_string(),
        name: name.to_string(),
        content_key,
        metadata_key: metadata_key.clone(),
    };

    let loop_stop = stop.clone();
    let thread = thread::Builder::new()
        .name(format!("xconf-watch:{}/{}", group, name))
        .spawn(move || watch.run(subscription, scope, loop_stop, on_change))?;

    tracing::info!("Watching {}", metadata_key);
    Ok(WatchHandle {
        key: metadata_key,
        stop,
        thread,
    })
}

struct WatchLoop {
    inner: Arc<Inner>,
    group: String,
    name: String,
    content_key: String,
    metadata_key: String,
}

impl WatchLoop {
    fn run<F>(
        self,
        subscription: Subscription,
        scope: CancelScope,
        stop: CancelScope,
        mut on_change: F,
    ) -> WatchSummary
    where
        F: FnMut(&File) -> CallbackResult,
    {
        let mut summary = WatchSummary::new();

        summary.closed_by = loop {
            // select! picks among ready arms at random; check first so queued
            // events don't outrun a cancellation
            if scope.is_cancelled() || stop.is_cancelled() {
                break CloseReason::Cancelled;
            }

            // Listening
            crossbeam::select! {
                recv(subscription.events()) -> event => match event {
                    Ok(event) => self.on_event(event, &mut on_change, &mut summary),
                    Err(_) => break CloseReason::StreamEnded,
                },
                recv(scope.done()) -> _ => break CloseReason::Cancelled,
                recv(stop.done()) -> _ => break CloseReason::Cancelled,
            }
        };

        // Release the subscription before reporting
        drop(subscription);
        tracing::info!(
            "Watch on {} closed ({:?}): {} delivered, {} filtered, {} dropped",
            self.metadata_key,
            summary.closed_by,
            summary.delivered,
            summary.filtered,
            summary.dropped
        );
        summary
    }

    fn on_event<F>(&self, event: WatchEvent, on_change: &mut F, summary: &mut WatchSummary)
    where
        F: FnMut(&File) -> CallbackResult,
    {
        let sink = &self.inner.sink;

        // Filtering
        if event.kind == EventKind::Delete {
            summary.dropped += 1;
            sink.event_dropped(&self.metadata_key, DropStage::Decode, "metadata record deleted");
            return;
        }

        let meta = match Metadata::decode(&event.value) {
            Ok(meta) => meta,
            Err(e) => {
                summary.dropped += 1;
                sink.event_dropped(&self.metadata_key, DropStage::Decode, &e.to_string());
                return;
            }
        };

        if !should_apply(&self.inner.identity, &meta.gray) {
            summary.filtered += 1;
            sink.event_filtered(&self.metadata_key);
            return;
        }

        // Resolving
        let kv = match self.inner.store.get(&self.content_key) {
            Ok(kv) => kv,
            Err(e) => {
                summary.dropped += 1;
                sink.event_dropped(&self.metadata_key, DropStage::Resolve, &e.to_string());
                return;
            }
        };

        // Delivering
        self.inner.cache_write(&self.group, &self.name, &kv.value);

        let file = File {
            group: self.group.clone(),
            name: self.name.clone(),
            content: kv.value,
            version: kv.version,
            meta,
        };

        summary.delivered += 1;
        sink.event_delivered(&self.metadata_key, file.version);

        if let Err(e) = on_change(&file) {
            summary.callback_failures += 1;
            sink.callback_failed(&self.metadata_key, &e.to_string());
        }
    }
}
