//! A generic per-asset-kind finder: cue lists, beat grids, album art, and
//! both waveform variants all follow the same shape, so they share one
//! implementation parameterized over the asset type and how to resolve and
//! install it.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::cache::{ActiveRequestKey, Deduplicator, HotCache};
use crate::model::{AssetKind, DataRef, DeckRef};
use crate::providers::ResolveError;

use super::queue::EventBus;
use super::state::FinderState;

type ResolveFn<T> =
    Arc<dyn Fn(DataRef, String) -> BoxFuture<'static, Result<T, ResolveError>> + Send + Sync>;
type InstallFn<T> = Arc<dyn Fn(&HotCache, DeckRef, Arc<T>) + Send + Sync>;

/// A finder for one asset kind, generic over the resolved type `T`.
pub struct SimpleAssetFinder<T: Send + Sync + 'static> {
    kind: AssetKind,
    hot: Arc<HotCache>,
    dedup: Arc<Deduplicator<ActiveRequestKey, Result<Arc<T>, ResolveError>>>,
    states: DashMap<DeckRef, FinderState>,
    resolve: ResolveFn<T>,
    install: InstallFn<T>,
    /// Publishes one event per `clear_deck`, so a caller can tell a listener
    /// that deck's asset was evicted, the same notification
    /// `MetadataFinder::clear_player` gives for metadata.
    evictions: EventBus<DeckRef>,
}

impl<T: Send + Sync + 'static> SimpleAssetFinder<T> {
    pub fn new(
        kind: AssetKind,
        hot: Arc<HotCache>,
        resolve: ResolveFn<T>,
        install: InstallFn<T>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            kind,
            hot,
            dedup: Arc::new(Deduplicator::new()),
            states: DashMap::new(),
            resolve,
            install,
            evictions: EventBus::new(queue_capacity),
        }
    }

    /// Subscribe to deck-eviction notifications this finder publishes from
    /// `clear_deck`.
    pub fn subscribe_evictions(&self) -> crossbeam_channel::Receiver<DeckRef> {
        self.evictions.subscribe()
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn state(&self, deck: DeckRef) -> FinderState {
        self.states.get(&deck).map(|s| *s).unwrap_or(FinderState::Empty)
    }

    /// Resolve this finder's asset for `deck`'s newly-loaded `track_ref`,
    /// deduplicating against any other in-flight request for the same
    /// track/asset pair, and installing the result in the hot cache.
    ///
    /// Never regresses a deck already marked `Cached` back to `Resolving`
    /// for a duplicate request: callers that observe `Cached` should skip
    /// calling this at all, but this guards the case of a stale duplicate
    /// event slipping through anyway.
    pub async fn resolve_for_deck(
        &self,
        deck: DeckRef,
        track_ref: DataRef,
        media_hash: String,
    ) -> Result<Arc<T>, ResolveError>
    where
        T: Clone,
    {
        if self.state(deck) == FinderState::Cached {
            return Err(ResolveError::Exhausted {
                asset: self.kind,
                data_ref: track_ref,
            });
        }
        self.states.insert(deck, FinderState::Resolving);

        let key = ActiveRequestKey::new(track_ref, self.kind);
        let resolve = self.resolve.clone();
        let result = self
            .dedup
            .get_or_run(key, move || async move {
                resolve(track_ref, media_hash).await.map(Arc::new)
            })
            .await;

        match &result {
            Ok(asset) => {
                (self.install)(&self.hot, deck, asset.clone());
                self.states.insert(deck, FinderState::Cached);
            }
            Err(_) => {
                self.states.insert(deck, FinderState::Empty);
            }
        }
        result
    }

    /// Clear tracked state for a deck (track unloaded or player disconnected),
    /// notifying any eviction subscriber regardless of whether this deck
    /// actually had a cached entry.
    pub fn clear_deck(&self, deck: DeckRef) {
        self.states.remove(&deck);
        self.evictions.publish(deck);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Slot, SlotRef};
    use futures::FutureExt;

    fn data_ref() -> DataRef {
        DataRef::new(SlotRef::new(1, Slot::Usb), 1)
    }

    #[tokio::test]
    async fn successful_resolve_installs_and_marks_cached() {
        let hot = Arc::new(HotCache::new());
        let finder: SimpleAssetFinder<u32> = SimpleAssetFinder::new(
            AssetKind::BeatGrid,
            hot.clone(),
            Arc::new(|_dr, _mh| async move { Ok(7u32) }.boxed()),
            Arc::new(|_hot, _deck, _v| {}),
            16,
        );
        let deck = DeckRef::active(1);
        let result = finder
            .resolve_for_deck(deck, data_ref(), "media".into())
            .await
            .unwrap();
        assert_eq!(*result, 7);
        assert_eq!(finder.state(deck), FinderState::Cached);
    }

    #[tokio::test]
    async fn failed_resolve_resets_to_empty() {
        let hot = Arc::new(HotCache::new());
        let finder: SimpleAssetFinder<u32> = SimpleAssetFinder::new(
            AssetKind::BeatGrid,
            hot,
            Arc::new(|dr, _mh| {
                async move {
                    Err(ResolveError::Exhausted {
                        asset: AssetKind::BeatGrid,
                        data_ref: dr,
                    })
                }
                .boxed()
            }),
            Arc::new(|_hot, _deck, _v| {}),
            16,
        );
        let deck = DeckRef::active(1);
        let result = finder
            .resolve_for_deck(deck, data_ref(), "media".into())
            .await;
        assert!(result.is_err());
        assert_eq!(finder.state(deck), FinderState::Empty);
    }

    #[tokio::test]
    async fn already_cached_deck_is_not_re_resolved() {
        let hot = Arc::new(HotCache::new());
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let calls_clone = calls.clone();
        let finder: SimpleAssetFinder<u32> = SimpleAssetFinder::new(
            AssetKind::BeatGrid,
            hot,
            Arc::new(move |_dr, _mh| {
                calls_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move { Ok(1u32) }.boxed()
            }),
            Arc::new(|_hot, _deck, _v| {}),
            16,
        );
        let deck = DeckRef::active(1);
        finder
            .resolve_for_deck(deck, data_ref(), "media".into())
            .await
            .unwrap();
        let second = finder.resolve_for_deck(deck, data_ref(), "media".into()).await;
        assert!(second.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_deck_publishes_an_eviction_event() {
        let hot = Arc::new(HotCache::new());
        let finder: SimpleAssetFinder<u32> = SimpleAssetFinder::new(
            AssetKind::BeatGrid,
            hot,
            Arc::new(|_dr, _mh| async move { Ok(1u32) }.boxed()),
            Arc::new(|_hot, _deck, _v| {}),
            4,
        );
        let rx = finder.subscribe_evictions();
        let deck = DeckRef::active(1);
        finder
            .resolve_for_deck(deck, data_ref(), "media".into())
            .await
            .unwrap();
        finder.clear_deck(deck);
        assert_eq!(rx.try_recv().unwrap(), deck);
        assert_eq!(finder.state(deck), FinderState::Empty);
    }
}
