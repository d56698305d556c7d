//! The active-request deduplicator: collapses concurrent resolution
//! requests for the same asset into one in-flight resolve.
//!
//! This is deliberately *not* a cache -- once a request completes, its entry
//! is retired and the next request starts fresh. Caching the result is the
//! hot cache's and the LRU's job.

use std::future::Future;
use std::hash::Hash;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::model::{AssetKind, DataRef};

/// The key identifying one in-flight resolution: which asset, for which
/// track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActiveRequestKey {
    pub track_ref: DataRef,
    pub asset: AssetKind,
}

impl ActiveRequestKey {
    pub fn new(track_ref: DataRef, asset: AssetKind) -> Self {
        Self { track_ref, asset }
    }
}

/// Collapses concurrent calls sharing a key into a single underlying future.
pub struct Deduplicator<K, V> {
    inflight: DashMap<K, Shared<BoxFuture<'static, V>>>,
}

impl<K, V> Default for Deduplicator<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

impl<K, V> Deduplicator<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` for `key`, unless another caller is already resolving
    /// the same key, in which case await its result instead.
    pub async fn get_or_run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let shared = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| make().boxed().shared())
            .clone();
        let result = shared.await;
        // Best-effort: a fresh request for the same key may have raced in
        // between await and here, in which case this removes that newer
        // entry instead of ours. Harmless -- it just means one fewer
        // request got deduplicated, not an incorrect result.
        self.inflight.remove(&key);
        result
    }

    /// Number of resolutions currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Slot, SlotRef};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_requests_for_the_same_key_share_one_execution() {
        let dedup = Arc::new(Deduplicator::<ActiveRequestKey, u32>::new());
        let calls = Arc::new(AtomicU32::new(0));
        let key = ActiveRequestKey::new(
            DataRef::new(SlotRef::new(1, Slot::Usb), 1),
            AssetKind::Metadata,
        );

        let mut handles = vec![];
        for _ in 0..10 {
            let dedup = dedup.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                dedup
                    .get_or_run(key, || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            7u32
                        }
                    })
                    .await
            }));
        }
        let results: Vec<u32> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert!(results.iter().all(|&v| v == 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_each_run_independently() {
        let dedup = Deduplicator::<ActiveRequestKey, u32>::new();
        let key_a = ActiveRequestKey::new(
            DataRef::new(SlotRef::new(1, Slot::Usb), 1),
            AssetKind::Metadata,
        );
        let key_b = ActiveRequestKey::new(
            DataRef::new(SlotRef::new(1, Slot::Usb), 2),
            AssetKind::Metadata,
        );
        let a = dedup.get_or_run(key_a, || async { 1u32 }).await;
        let b = dedup.get_or_run(key_b, || async { 2u32 }).await;
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn entry_is_retired_after_completion() {
        let dedup = Deduplicator::<ActiveRequestKey, u32>::new();
        let key = ActiveRequestKey::new(
            DataRef::new(SlotRef::new(1, Slot::Usb), 1),
            AssetKind::Metadata,
        );
        dedup.get_or_run(key, || async { 1u32 }).await;
        assert_eq!(dedup.in_flight_count(), 0);
    }
}
