//! Tests for MemStore
//!
//! These tests verify:
//! - get/put/delete semantics and per-key versions
//! - Conditional puts
//! - Subscriptions: exact key, order, no replay, closure

use std::time::Duration;

use xconf::store::{EventKind, MemStore, Store};
use xconf::XconfError;

const TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_get_missing_key() {
    let store = MemStore::new();
    assert!(matches!(store.get("/a"), Err(XconfError::NotFound)));
    assert!(store.is_empty());
}

#[test]
fn test_put_get() {
    let store = MemStore::new();

    assert_eq!(store.put("/a", "one".into()).unwrap(), 1);
    let kv = store.get("/a").unwrap();
    assert_eq!(kv.key, "/a");
    assert_eq!(&kv.value[..], b"one");
    assert_eq!(kv.version, 1);
    assert_eq!(kv.revision, 1);
}

#[test]
fn test_versions_increase_per_key() {
    let store = MemStore::new();

    assert_eq!(store.put("/a", "1".into()).unwrap(), 1);
    assert_eq!(store.put("/a", "2".into()).unwrap(), 2);
    assert_eq!(store.put("/b", "1".into()).unwrap(), 1);
    assert_eq!(store.put("/a", "3".into()).unwrap(), 3);

    assert_eq!(store.get("/a").unwrap().revision, 4);
    assert_eq!(store.revision(), 4);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_delete_is_idempotent_and_resets_version() {
    let store = MemStore::new();

    store.put("/a", "1".into()).unwrap();
    store.put("/a", "2".into()).unwrap();
    store.delete("/a").unwrap();
    store.delete("/a").unwrap();
    store.delete("/never").unwrap();

    assert!(matches!(store.get("/a"), Err(XconfError::NotFound)));
    assert_eq!(store.put("/a", "again".into()).unwrap(), 1);
    // Only the real delete consumed a revision
    assert_eq!(store.revision(), 4);
}

#[test]
fn test_keys_with_prefix() {
    let store = MemStore::new();
    for key in ["/x/a", "/x/b", "/y/a", "/x"] {
        store.put(key, "v".into()).unwrap();
    }
    assert_eq!(store.keys_with_prefix("/x/"), vec!["/x/a", "/x/b"]);
}

// =============================================================================
// Conditional Put Tests
// =============================================================================

#[test]
fn test_put_if_version() {
    let store = MemStore::new();

    assert_eq!(store.put_if_version("/a", "1".into(), 0).unwrap(), 1);
    assert_eq!(store.put_if_version("/a", "2".into(), 1).unwrap(), 2);

    let err = store.put_if_version("/a", "stale".into(), 1).unwrap_err();
    assert!(matches!(
        err,
        XconfError::Conflict { ref key, expected: 1, actual: 2 } if key == "/a"
    ));
    assert_eq!(&store.get("/a").unwrap().value[..], b"2");
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[test]
fn test_subscription_receives_ordered_events() {
    let store = MemStore::new();
    let sub = store.subscribe("/a").unwrap();
    assert_eq!(sub.key(), "/a");

    store.put("/a", "1".into()).unwrap();
    store.put("/a", "2".into()).unwrap();
    store.delete("/a").unwrap();

    let events: Vec<_> = (0..3)
        .map(|_| sub.events().recv_timeout(TIMEOUT).unwrap())
        .collect();

    assert_eq!(events[0].kind, EventKind::Put);
    assert_eq!(&events[0].value[..], b"1");
    assert_eq!(events[1].version, 2);
    assert_eq!(events[2].kind, EventKind::Delete);
    assert!(events[2].value.is_empty());
    assert!(events.windows(2).all(|w| w[0].revision < w[1].revision));
}

#[test]
fn test_subscription_is_exact_key() {
    let store = MemStore::new();
    let sub = store.subscribe("/a").unwrap();

    store.put("/a.metadata", "x".into()).unwrap();
    store.put("/ab", "x".into()).unwrap();
    store.put("/a", "mine".into()).unwrap();

    let event = sub.events().recv_timeout(TIMEOUT).unwrap();
    assert_eq!(&event.value[..], b"mine");
    assert!(sub.events().try_recv().is_err());
}

#[test]
fn test_subscription_does_not_replay() {
    let store = MemStore::new();
    store.put("/a", "before".into()).unwrap();

    let sub = store.subscribe("/a").unwrap();
    assert!(sub.events().try_recv().is_err());

    store.put("/a", "after".into()).unwrap();
    assert_eq!(&sub.events().recv_timeout(TIMEOUT).unwrap().value[..], b"after");
}

#[test]
fn test_concurrent_writers_deliver_in_store_order() {
    let store = std::sync::Arc::new(MemStore::new());
    let sub = store.subscribe("/a").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..50 {
                    store.put("/a", format!("{}-{}", t, i).into()).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let versions: Vec<i64> = (0..200)
        .map(|_| sub.events().recv_timeout(TIMEOUT).unwrap().version)
        .collect();
    assert_eq!(versions, (1..=200).collect::<Vec<i64>>());
}

#[test]
fn test_dropped_subscription_is_pruned() {
    let store = MemStore::new();
    let sub = store.subscribe("/a").unwrap();
    let _other = store.subscribe("/a").unwrap();
    assert_eq!(store.watcher_count("/a"), 2);

    drop(sub);
    store.put("/a", "x".into()).unwrap();
    assert_eq!(store.watcher_count("/a"), 1);
}

#[test]
fn test_close_ends_streams_and_fails_calls() {
    let store = MemStore::new();
    let sub = store.subscribe("/a").unwrap();
    store.put("/a", "last".into()).unwrap();

    store.close();

    // Buffered events drain, then the stream reports disconnection
    assert_eq!(&sub.events().recv_timeout(TIMEOUT).unwrap().value[..], b"last");
    assert!(sub.events().recv_timeout(TIMEOUT).is_err());

    assert!(matches!(store.get("/a"), Err(XconfError::Transport(_))));
    assert!(matches!(store.put("/a", "x".into()), Err(XconfError::Transport(_))));
    assert!(matches!(store.delete("/a"), Err(XconfError::Transport(_))));
    assert!(matches!(store.subscribe("/a"), Err(XconfError::Transport(_))));
}
