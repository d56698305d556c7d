//! Media descriptors, track metadata, and the update events that flow
//! between the device-status source and the asset finders.

use std::fmt;

use sha2::{Digest, Sha256};

use super::cue_list::CueList;
use super::refs::{DataRef, PlayerId, Slot, SlotRef};

/// Whether a loaded track is a rekordbox track (has assets we can resolve)
/// or something else (CD audio, an unanalyzed file) we should treat as
/// having no resolvable assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Rekordbox,
    CdDigitalAudio,
    Unanalyzed,
}

impl TrackType {
    /// Whether this track type participates in asset resolution at all.
    pub fn is_rekordbox(self) -> bool {
        matches!(self, TrackType::Rekordbox)
    }
}

/// A stable descriptor for a mounted piece of media, carrying a hash key
/// used to scope providers and to identify the media a `DataRef` belongs
/// to for eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDetails {
    pub slot: SlotRef,
    /// Raw descriptor bytes as reported by the device (volume name, serial
    /// number, creation date, ...); opaque to this crate.
    pub descriptor: Vec<u8>,
}

impl MediaDetails {
    pub fn new(slot: SlotRef, descriptor: Vec<u8>) -> Self {
        Self { slot, descriptor }
    }

    /// A stable hash key for this media, used to scope providers. Two
    /// `MediaDetails` with identical descriptor bytes hash identically
    /// regardless of which slot currently reports them, matching the
    /// upstream contract that a provider registered for a piece of media
    /// should keep working if it's remounted in a different slot.
    pub fn hash_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.descriptor);
        let digest = hasher.finalize();
        hex_lower(&digest)
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Metadata resolved for a track: the fields a `MetadataProvider` or the
/// live dbserver query can supply.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub track_ref: DataRef,
    pub track_type: TrackType,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Track duration in milliseconds, if known.
    pub duration_ms: Option<u32>,
    pub artwork_id: Option<u32>,
    /// Hot-cue fan-out source: the positions carried by this track's cue
    /// list, used to populate hot-cache entries beyond the active deck.
    pub cue_list: Option<CueList>,
}

impl TrackMetadata {
    /// Hot-cue numbers (excluding the memory-point entries) this track's
    /// cue list carries, for hot-cache fan-out.
    pub fn hot_cue_numbers(&self) -> Vec<u8> {
        self.cue_list
            .as_ref()
            .map(|cl| {
                cl.entries()
                    .iter()
                    .filter_map(|e| (e.hot_cue_number != 0).then_some(e.hot_cue_number))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for TrackMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.title, self.track_ref)
    }
}

/// A raw status observation for a player: what track (if any) is loaded
/// and where. This is the input the metadata finder subscribes to; the
/// raw UDP decoder that produces these is an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatusUpdate {
    pub player: PlayerId,
    /// `None` means no track is loaded (deck should be cleared).
    pub loaded: Option<LoadedTrackRef>,
}

/// A loaded-track reference as reported by a status packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedTrackRef {
    pub slot: Slot,
    pub rekordbox_id: u32,
    pub track_type: TrackTypeTag,
}

/// Track-type tag as reported on the wire; deliberately separate from
/// [`TrackType`] so unrecognized-track-type handling can be expressed
/// without inventing new rekordbox semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTypeTag {
    Rekordbox,
    CdDigitalAudio,
    Unanalyzed,
}

impl From<TrackTypeTag> for TrackType {
    fn from(tag: TrackTypeTag) -> Self {
        match tag {
            TrackTypeTag::Rekordbox => TrackType::Rekordbox,
            TrackTypeTag::CdDigitalAudio => TrackType::CdDigitalAudio,
            TrackTypeTag::Unanalyzed => TrackType::Unanalyzed,
        }
    }
}

/// Published by the metadata finder once it resolves (or fails to resolve)
/// metadata for a player's newly-loaded track. Every other asset finder
/// subscribes to this.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadataUpdate {
    pub player: PlayerId,
    pub metadata: Option<TrackMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_is_stable_for_identical_descriptors() {
        let a = MediaDetails::new(SlotRef::new(1, Slot::Usb), vec![1, 2, 3]);
        let b = MediaDetails::new(SlotRef::new(2, Slot::Usb), vec![1, 2, 3]);
        assert_eq!(a.hash_key(), b.hash_key());
    }

    #[test]
    fn hash_key_differs_for_different_descriptors() {
        let a = MediaDetails::new(SlotRef::new(1, Slot::Usb), vec![1, 2, 3]);
        let b = MediaDetails::new(SlotRef::new(1, Slot::Usb), vec![4, 5, 6]);
        assert_ne!(a.hash_key(), b.hash_key());
    }

    #[test]
    fn hot_cue_numbers_excludes_memory_points() {
        use super::super::cue_list::{CueEntry, CueList};
        let cl = CueList::new(vec![
            CueEntry::memory_point(0, 0),
            CueEntry::hot_cue(1, 1000, 1000),
        ])
        .unwrap();
        let meta = TrackMetadata {
            track_ref: DataRef::new(SlotRef::new(1, Slot::Usb), 1),
            track_type: TrackType::Rekordbox,
            title: "Test".into(),
            artist: None,
            album: None,
            duration_ms: None,
            artwork_id: None,
            cue_list: Some(cl),
        };
        assert_eq!(meta.hot_cue_numbers(), vec![1]);
    }
}
