//! The metadata finder: the first stage of every asset pipeline. Watches
//! raw device-status updates and resolves `TrackMetadata` for whatever's
//! newly loaded, publishing the result for every other finder to consume.

use std::sync::Arc;

use dashmap::DashMap;

use crate::cache::{ActiveRequestKey, Deduplicator, HotCache};
use crate::model::{
    AssetKind, DataRef, DeckRef, DeviceStatusUpdate, PlayerId, SlotRef, TrackMetadata,
    TrackMetadataUpdate, TrackType,
};
use crate::providers::{ResolveError, Resolver};

use super::state::FinderState;
use super::queue::EventBus;

/// Looks up the stable media hash key for a mounted slot. Backed by
/// whatever component tracks `MediaDetails` as slots mount and unmount;
/// `None` means the slot isn't currently known to be mounted.
pub type MediaHashLookup = Arc<dyn Fn(SlotRef) -> Option<String> + Send + Sync>;

pub struct MetadataFinder {
    hot: Arc<HotCache>,
    resolver: Arc<Resolver>,
    dedup: Arc<Deduplicator<ActiveRequestKey, Result<Arc<TrackMetadata>, ResolveError>>>,
    out: EventBus<TrackMetadataUpdate>,
    media_hash_for: MediaHashLookup,
    states: DashMap<PlayerId, FinderState>,
}

impl MetadataFinder {
    pub fn new(hot: Arc<HotCache>, resolver: Arc<Resolver>, media_hash_for: MediaHashLookup, queue_capacity: usize) -> Self {
        Self {
            hot,
            resolver,
            dedup: Arc::new(Deduplicator::new()),
            out: EventBus::new(queue_capacity),
            media_hash_for,
            states: DashMap::new(),
        }
    }

    /// Subscribe to `TrackMetadataUpdate` events this finder publishes.
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<TrackMetadataUpdate> {
        self.out.subscribe()
    }

    pub fn state(&self, player: PlayerId) -> FinderState {
        self.states.get(&player).map(|s| *s).unwrap_or(FinderState::Empty)
    }

    /// Process one raw status observation.
    pub async fn handle_status(&self, status: DeviceStatusUpdate) {
        let Some(loaded) = status.loaded else {
            self.clear_player(status.player);
            return;
        };

        let track_type: TrackType = loaded.track_type.into();
        if !track_type.is_rekordbox() {
            // A slot reporting a non-rekordbox (or otherwise unrecognized)
            // track type clears the deck rather than attempting resolution.
            self.clear_player(status.player);
            return;
        }

        let slot_ref = SlotRef::new(status.player, loaded.slot);
        let data_ref = DataRef::new(slot_ref, loaded.rekordbox_id);
        let Some(media_hash) = (self.media_hash_for)(slot_ref) else {
            tracing::debug!(
                target: "finders::metadata",
                player = status.player,
                "no media mounted for slot, skipping resolution"
            );
            self.clear_player(status.player);
            return;
        };

        self.states.insert(status.player, FinderState::Resolving);

        let key = ActiveRequestKey::new(data_ref, AssetKind::Metadata);
        let resolver = self.resolver.clone();
        let result = self
            .dedup
            .get_or_run(key, move || async move {
                resolver
                    .resolve_metadata(data_ref, &media_hash)
                    .await
                    .map(Arc::new)
            })
            .await;

        match result {
            Ok(metadata) => {
                self.hot
                    .set_metadata(DeckRef::active(status.player), metadata.clone());
                self.states.insert(status.player, FinderState::Cached);
                self.out.publish(TrackMetadataUpdate {
                    player: status.player,
                    metadata: Some((*metadata).clone()),
                });
            }
            Err(e) => {
                tracing::warn!(
                    target: "finders::metadata",
                    player = status.player,
                    error = %e,
                    "failed to resolve track metadata"
                );
                self.states.insert(status.player, FinderState::Empty);
                self.out.publish(TrackMetadataUpdate {
                    player: status.player,
                    metadata: None,
                });
            }
        }
    }

    fn clear_player(&self, player: PlayerId) {
        self.hot.clear_player(player);
        self.states.insert(player, FinderState::Empty);
        self.out.publish(TrackMetadataUpdate {
            player,
            metadata: None,
        });
    }
}
