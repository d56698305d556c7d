//! The data model shared across every component: references, metadata, and
//! the binary asset types resolved for them.

pub mod album_art;
pub mod beat_grid;
pub mod cue_list;
pub mod media;
pub mod position;
pub mod refs;
pub mod tagged_section;
pub mod waveform;

pub use album_art::AlbumArt;
pub use beat_grid::{BeatGrid, BeatGridError};
pub use cue_list::{CueEntry, CueList, CueListError, Rgb};
pub use media::{
    DeviceStatusUpdate, LoadedTrackRef, MediaDetails, TrackMetadata, TrackMetadataUpdate,
    TrackType, TrackTypeTag,
};
pub use position::{BeatPacket, StatusPacket, TrackPositionUpdate};
pub use refs::{DataRef, DeckRef, PlayerId, Slot, SlotRef};
pub use tagged_section::{FourCc, FourCcError, TaggedSection};
pub use waveform::{Waveform, WaveformError, WaveformPreference, WaveformVariant};

/// The kind of asset a finder tracks, used to key the hot cache, the
/// provider registry, and event-queue subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum AssetKind {
    Metadata,
    CueList,
    BeatGrid,
    AlbumArt,
    WaveformPreview,
    WaveformDetail,
}

impl AssetKind {
    pub const ALL: [AssetKind; 6] = [
        AssetKind::Metadata,
        AssetKind::CueList,
        AssetKind::BeatGrid,
        AssetKind::AlbumArt,
        AssetKind::WaveformPreview,
        AssetKind::WaveformDetail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Metadata => "metadata",
            AssetKind::CueList => "cue_list",
            AssetKind::BeatGrid => "beat_grid",
            AssetKind::AlbumArt => "album_art",
            AssetKind::WaveformPreview => "waveform_preview",
            AssetKind::WaveformDetail => "waveform_detail",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
