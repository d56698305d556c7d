//! The hot cache: the small, bounded, per-deck set of assets the active
//! finders currently believe are correct for whatever's loaded on that deck.
//!
//! Unlike the second-level LRU, this cache is never evicted by capacity —
//! only by a deck being cleared (track unloaded) or its media being
//! unmounted. One entry exists per [`DeckRef`], independent of hot-cue
//! number, so hot-cue previews get their own cached state.

use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{AlbumArt, BeatGrid, CueList, DataRef, DeckRef, PlayerId, SlotRef, TrackMetadata, Waveform};

/// Everything the hot cache currently knows about one deck's loaded track.
/// Every field starts `None` and is filled in as each finder resolves.
#[derive(Debug, Clone, Default)]
pub struct HotCacheEntry {
    pub metadata: Option<Arc<TrackMetadata>>,
    pub cue_list: Option<Arc<CueList>>,
    pub beat_grid: Option<Arc<BeatGrid>>,
    pub album_art: Option<Arc<AlbumArt>>,
    pub waveform_preview: Option<Arc<Waveform>>,
    pub waveform_detail: Option<Arc<Waveform>>,
}

/// Per-deck hot cache, concurrently readable and writable without a global
/// lock -- finders run independently and must not serialize on each
/// other's cache writes.
#[derive(Default)]
pub struct HotCache {
    decks: DashMap<DeckRef, HotCacheEntry>,
}

impl HotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of `deck`'s current entry (empty if nothing cached yet).
    pub fn entry(&self, deck: DeckRef) -> HotCacheEntry {
        self.decks.get(&deck).map(|e| e.clone()).unwrap_or_default()
    }

    pub fn set_metadata(&self, deck: DeckRef, metadata: Arc<TrackMetadata>) {
        self.decks.entry(deck).or_default().metadata = Some(metadata);
    }

    pub fn set_cue_list(&self, deck: DeckRef, cue_list: Arc<CueList>) {
        self.decks.entry(deck).or_default().cue_list = Some(cue_list);
    }

    pub fn set_beat_grid(&self, deck: DeckRef, beat_grid: Arc<BeatGrid>) {
        self.decks.entry(deck).or_default().beat_grid = Some(beat_grid);
    }

    pub fn set_album_art(&self, deck: DeckRef, album_art: Arc<AlbumArt>) {
        self.decks.entry(deck).or_default().album_art = Some(album_art);
    }

    pub fn set_waveform_preview(&self, deck: DeckRef, waveform: Arc<Waveform>) {
        self.decks.entry(deck).or_default().waveform_preview = Some(waveform);
    }

    pub fn set_waveform_detail(&self, deck: DeckRef, waveform: Arc<Waveform>) {
        self.decks.entry(deck).or_default().waveform_detail = Some(waveform);
    }

    /// Clear one deck, e.g. because its track was unloaded.
    pub fn clear_deck(&self, deck: DeckRef) {
        self.decks.remove(&deck);
    }

    /// Clear every deck belonging to `player` (device-lost), returning the
    /// decks that were actually cleared so a caller can fan eviction
    /// notifications out to them.
    pub fn clear_player(&self, player: PlayerId) -> Vec<DeckRef> {
        let mut cleared = Vec::new();
        self.decks.retain(|deck, _| {
            if deck.player == player {
                cleared.push(*deck);
                false
            } else {
                true
            }
        });
        cleared
    }

    /// Clear every deck whose loaded track came from `slot` (media
    /// unmounted). A deck with no metadata yet is left alone rather than
    /// guessed at. Returns the decks that were cleared.
    pub fn clear_slot(&self, slot: SlotRef) -> Vec<DeckRef> {
        let mut cleared = Vec::new();
        self.decks.retain(|deck, entry| {
            let belongs_to_slot = entry.metadata.as_ref().map(|m| m.track_ref.slot == slot).unwrap_or(false);
            if belongs_to_slot {
                cleared.push(*deck);
                false
            } else {
                true
            }
        });
        cleared
    }

    /// Every deck currently tracked, regardless of slot or player.
    pub fn all_decks(&self) -> Vec<DeckRef> {
        self.decks.iter().map(|e| *e.key()).collect()
    }

    /// Every active-deck (not hot-cue) entry that currently has metadata,
    /// e.g. to replay already-loaded tracks through the finder pipeline on
    /// startup.
    pub fn loaded_decks(&self) -> Vec<(DeckRef, Arc<TrackMetadata>)> {
        self.decks
            .iter()
            .filter(|e| e.key().hot_cue == 0)
            .filter_map(|e| e.value().metadata.clone().map(|m| (*e.key(), m)))
            .collect()
    }

    /// Find album art already cached under some other deck for the same
    /// `art_ref`, so a newly-loaded track sharing artwork with an
    /// already-resolved one can be served without a provider call or an
    /// LRU round-trip.
    pub fn find_album_art_by_ref(&self, art_ref: DataRef) -> Option<Arc<AlbumArt>> {
        self.decks.iter().find_map(|e| {
            e.value()
                .album_art
                .as_ref()
                .filter(|a| a.art_ref() == art_ref)
                .cloned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataRef, Slot, SlotRef, TrackType};

    fn sample_metadata() -> Arc<TrackMetadata> {
        Arc::new(TrackMetadata {
            track_ref: DataRef::new(SlotRef::new(1, Slot::Usb), 1),
            track_type: TrackType::Rekordbox,
            title: "Track".into(),
            artist: None,
            album: None,
            duration_ms: None,
            artwork_id: None,
            cue_list: None,
        })
    }

    #[test]
    fn set_and_read_roundtrip_per_deck() {
        let cache = HotCache::new();
        let deck = DeckRef::active(1);
        cache.set_metadata(deck, sample_metadata());
        let entry = cache.entry(deck);
        assert!(entry.metadata.is_some());
        assert!(entry.album_art.is_none());
    }

    #[test]
    fn hot_cue_decks_are_independent_of_active_deck() {
        let cache = HotCache::new();
        cache.set_metadata(DeckRef::active(1), sample_metadata());
        let hot_cue_entry = cache.entry(DeckRef::hot_cue(1, 1));
        assert!(hot_cue_entry.metadata.is_none());
    }

    #[test]
    fn clear_player_removes_every_deck_for_that_player() {
        let cache = HotCache::new();
        cache.set_metadata(DeckRef::active(1), sample_metadata());
        cache.set_metadata(DeckRef::hot_cue(1, 1), sample_metadata());
        cache.set_metadata(DeckRef::active(2), sample_metadata());
        cache.clear_player(1);
        assert!(cache.entry(DeckRef::active(1)).metadata.is_none());
        assert!(cache.entry(DeckRef::hot_cue(1, 1)).metadata.is_none());
        assert!(cache.entry(DeckRef::active(2)).metadata.is_some());
    }

    #[test]
    fn clear_slot_only_drops_decks_loaded_from_that_slot() {
        let cache = HotCache::new();
        let usb_meta = sample_metadata();
        let mut sd_meta = (*sample_metadata()).clone();
        sd_meta.track_ref = DataRef::new(SlotRef::new(1, Slot::Sd), 1);
        cache.set_metadata(DeckRef::active(1), usb_meta);
        cache.set_metadata(DeckRef::active(2), Arc::new(sd_meta));

        cache.clear_slot(SlotRef::new(1, Slot::Sd));
        assert!(cache.entry(DeckRef::active(1)).metadata.is_some());
        assert!(cache.entry(DeckRef::active(2)).metadata.is_none());
    }

    #[test]
    fn find_album_art_by_ref_matches_across_decks() {
        let cache = HotCache::new();
        let art_ref = DataRef::new(SlotRef::new(1, Slot::Usb), 9);
        let art = Arc::new(AlbumArt::new(art_ref, vec![1, 2, 3]));
        cache.set_album_art(DeckRef::active(1), art.clone());
        let found = cache
            .find_album_art_by_ref(art_ref)
            .expect("art should be found under a different deck");
        assert_eq!(found.bytes(), art.bytes());
        assert!(cache.find_album_art_by_ref(DataRef::new(SlotRef::new(1, Slot::Usb), 42)).is_none());
    }
}
