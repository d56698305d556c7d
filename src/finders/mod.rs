//! Asset finders: the uniform per-asset state machines that turn resolved
//! data into hot-cache entries, plus the event queues that feed them.

pub mod analysis;
pub mod asset;
pub mod metadata;
pub mod queue;
pub mod state;

pub use analysis::{AnalysisTagExtractors, AnalysisTagFinder};
pub use asset::SimpleAssetFinder;
pub use metadata::{MediaHashLookup, MetadataFinder};
pub use queue::EventBus;
pub use state::FinderState;

use crate::model::{AlbumArt, BeatGrid, CueList, Waveform};

/// A cue-list finder: `SimpleAssetFinder` specialized to [`CueList`].
pub type CueListFinder = SimpleAssetFinder<CueList>;
/// A beat-grid finder: `SimpleAssetFinder` specialized to [`BeatGrid`].
pub type BeatGridFinder = SimpleAssetFinder<BeatGrid>;
/// An album-art finder: `SimpleAssetFinder` specialized to [`AlbumArt`]. Its
/// resolve closure, assembled in [`crate::TrackLinkCore::new`], implements
/// the high-resolution-art fallback sequencing (prefer a direct file fetch,
/// fall back to the standard dbserver-resolution path).
pub type AlbumArtFinder = SimpleAssetFinder<AlbumArt>;
/// A waveform-preview finder: `SimpleAssetFinder` specialized to [`Waveform`].
pub type WaveformPreviewFinder = SimpleAssetFinder<Waveform>;
/// A waveform-detail finder: `SimpleAssetFinder` specialized to [`Waveform`].
pub type WaveformDetailFinder = SimpleAssetFinder<Waveform>;
