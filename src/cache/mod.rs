//! Local Cache Module
//!
//! Best-effort on-disk mirror of configuration content, used as a cold-start
//! and offline fallback. Never consulted as a tie-breaker against the store.
//!
//! ## Layout
//! ```text
//! {cache_dir}/
//!   └── xconf/
//!       └── {namespace}/
//!           └── {group}/
//!               └── {name}
//! ```
//!
//! ## Write Path
//! Content is written to a temporary file in the entry's directory and then
//! renamed over the entry, so readers see either the old or the new bytes.
//! Writes to the same entry are serialized; different entries are independent.
//!
//! There is no TTL and no eviction.

mod local;

pub use local::LocalCache;
