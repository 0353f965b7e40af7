//! # xconf
//!
//! Versioned configuration distribution over a strongly-consistent
//! key-value store, with:
//! - Local disk cache as a cold-start / offline fallback
//! - Metadata records as the single change signal
//! - Gray rollout: deliver a change to named consumers before everyone
//! - Double-buffered holder for the parsed, currently active configuration
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ConfigEngine                            │
//! │   get_config · create/update/delete_file · watch · bind     │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//! ┌─────────────┐        ┌─────────────┐        ┌─────────────┐
//! │ LocalCache  │        │    Store    │        │ Watch loop  │
//! │ (fallback)  │        │ (get/put/   │──────► │ filter by   │
//! └─────────────┘        │  del/watch) │ events │ gray list   │
//!                        └─────────────┘        └──────┬──────┘
//!                                                      │ on_change
//!                                                      ▼
//!                                               ┌─────────────┐
//!                                               │ActiveConfig │
//!                                               │ (2 slots)   │
//!                                               └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use xconf::{CancelScope, Config, ConfigEngine, File, MemStore};
//!
//! # fn main() -> xconf::Result<()> {
//! let store = Arc::new(MemStore::new());
//! let engine = ConfigEngine::open(Config::builder().id("host-a").build(), store)?;
//!
//! let mut file = File::new("g1", "f1.json", &b"{\"name\":\"Cake\"}"[..]);
//! engine.create_file(&mut file)?;
//!
//! let scope = CancelScope::new();
//! let _watch = engine.watch("g1", "f1.json", &scope, |file| {
//!     println!("new revision {}", file.version);
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod keys;
pub mod metadata;
pub mod rollout;
pub mod scope;
pub mod observe;
pub mod cache;
pub mod store;
pub mod holder;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CallbackResult, Result, XconfError};
pub use config::Config;
pub use engine::{CloseReason, ConfigEngine, WatchHandle, WatchSummary};
pub use holder::ActiveConfig;
pub use metadata::{File, Metadata};
pub use scope::CancelScope;
pub use store::{MemStore, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of xconf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
