use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per key, created on first use
///
/// The map itself sits behind a synchronous lock that is only held while
/// looking up the entry, never across an `.await`. Holders of different keys
/// never wait on each other.
pub(crate) struct KeyedLocks<K> {
    locks: parking_lot::Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Wait for our turn on `key`. Waiters are served in FIFO order.
    pub(crate) async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = self.locks.lock().entry(key).or_default().clone();
        lock.lock_owned().await
    }
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
