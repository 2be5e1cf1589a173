//! Per-key async mutual exclusion.
//!
//! Holders of different keys never wait on each other; holders of the same
//! key are queued in FIFO order (tokio mutexes are fair). Slots are created
//! on demand and removed once the last holder or waiter lets go, including
//! a waiter whose `lock` future is dropped before it got the lock.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

struct Slot {
    mutex: Arc<Mutex<()>>,
    // Holders plus waiters registered on this key.
    claims: usize,
}

type Slots<K> = Arc<DashMap<K, Slot>>;

/// A set of async mutexes addressed by key.
pub struct KeyedLock<K: Eq + Hash> {
    slots: Slots<K>,
}

/// One registered holder or waiter. Unregisters on drop.
struct Claim<K: Eq + Hash> {
    key: K,
    slots: Slots<K>,
}

impl<K: Eq + Hash> Drop for Claim<K> {
    fn drop(&mut self) {
        self.slots.remove_if_mut(&self.key, |_, slot| {
            slot.claims -= 1;
            slot.claims == 0
        });
    }
}

/// Exclusive access to one key. Released on drop.
pub struct KeyedGuard<K: Eq + Hash> {
    // Field order matters: the mutex is released before the claim goes away.
    _guard: OwnedMutexGuard<()>,
    _claim: Claim<K>,
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let mutex = {
            let mut slot = self.slots.entry(key.clone()).or_insert_with(|| Slot {
                mutex: Arc::new(Mutex::new(())),
                claims: 0,
            });
            slot.claims += 1;
            slot.mutex.clone()
        };
        let claim = Claim {
            key,
            slots: self.slots.clone(),
        };
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            _guard: guard,
            _claim: claim,
        }
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.slots.len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}
