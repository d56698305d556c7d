//! The transport seams (`DbServerClient`, `FileFetcher`) that keep the
//! actual network code out of this crate.
//!
//! Encoding a dbserver request and decoding its response is a collaborator
//! the resolver depends on through [`DbServerClient`], never built here.

use async_trait::async_trait;

use crate::model::{AlbumArt, CueList, DataRef, TrackMetadata, Waveform};
use crate::providers::ResolveError;

/// The mount path a player exposes a slot's files under: `/B/` for the SD
/// slot, `/C/` for the USB slot. Returns `None` for slots that aren't
/// file-fetchable (`CD`, `COLLECTION`).
pub fn mount_path_for(slot: crate::model::Slot) -> Option<&'static str> {
    slot.mount_path()
}

/// A live menu-protocol connection to a player's dbserver, consulted after
/// the provider chain is exhausted. The real socket protocol is an external
/// collaborator; this crate only shapes the requests.
#[async_trait]
pub trait DbServerClient: Send + Sync {
    async fn track_metadata(&self, data_ref: DataRef) -> Result<Option<TrackMetadata>, ResolveError>;
    async fn cue_list(&self, data_ref: DataRef) -> Result<Option<CueList>, ResolveError>;
    async fn album_art(&self, data_ref: DataRef) -> Result<Option<AlbumArt>, ResolveError>;
    async fn waveform_preview(&self, data_ref: DataRef) -> Result<Option<Waveform>, ResolveError>;
    async fn waveform_detail(&self, data_ref: DataRef) -> Result<Option<Waveform>, ResolveError>;
}

/// A file-transfer collaborator for the NFS-like mount a player exposes over
/// its slots. Implementing the transport itself is out of scope here.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch the bytes at `remote_path` (e.g. `/B/PIONEER/rekordbox/export.pdb`)
    /// from `player`, retrying per the caller's retry policy.
    async fn fetch(
        &self,
        player: crate::model::PlayerId,
        remote_path: &str,
    ) -> Result<Vec<u8>, std::io::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_path_matches_slot_contract() {
        assert_eq!(mount_path_for(crate::model::Slot::Sd), Some("/B/"));
        assert_eq!(mount_path_for(crate::model::Slot::Collection), None);
    }
}
