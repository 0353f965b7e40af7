//! Cancellation scope
//!
//! A cloneable token bounding the lifetime of background watch loops.
//! Cancelling drops the scope's only sender, which wakes every receiver
//! blocked in `crossbeam::select!` on [`CancelScope::done`].

use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

/// Cancellation token shared between a caller and its watch loops
#[derive(Debug, Clone)]
pub struct CancelScope {
    /// Dropped on cancel; never used to send
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    done: Receiver<()>,
}

impl CancelScope {
    /// Create a live scope
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            done: rx,
        }
    }

    /// Cancel the scope and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.trigger.lock().take();
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone
    pub fn is_cancelled(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready (disconnected) when the scope is cancelled
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}
