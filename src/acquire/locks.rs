//! Named, refcounted locks: one mutex per key (e.g. per analysis file path),
//! created on first use and dropped once nobody still holds a reference,
//! so concurrent fetches of the same file serialize rather than race.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A registry of named async mutexes.
#[derive(Default)]
pub struct NamedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NamedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it if this is the first request.
    /// The returned guard, once dropped, releases the mutex; the map entry
    /// itself persists (cheap, and avoids a lock-creation race), which is
    /// fine since these locks key on a bounded set of file paths.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
