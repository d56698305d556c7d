//! The resolver: walks a media's provider chain, then falls back to a live
//! dbserver query, gated by passive mode.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{AlbumArt, AssetKind, CueList, DataRef, Slot, TrackMetadata, Waveform};

use super::transport::DbServerClient;
use super::{ProviderRegistry, ResolveError};

/// Resolves assets for a `DataRef` by trying every registered provider for
/// its media, then a live query, unless passive mode suppresses it.
pub struct Resolver {
    registry: Arc<ProviderRegistry>,
    live: Option<Arc<dyn DbServerClient>>,
    /// Suppresses the live-query fallback for any slot but `COLLECTION`:
    /// rekordbox's own network collection is always queryable, real players
    /// are not, while passive.
    passive: RwLock<bool>,
}

impl Resolver {
    pub fn new(registry: Arc<ProviderRegistry>, live: Option<Arc<dyn DbServerClient>>, passive: bool) -> Self {
        Self {
            registry,
            live,
            passive: RwLock::new(passive),
        }
    }

    pub fn set_passive(&self, passive: bool) {
        *self.passive.write() = passive;
    }

    pub fn is_passive(&self) -> bool {
        *self.passive.read()
    }

    fn live_query_allowed(&self, data_ref: DataRef) -> bool {
        !self.is_passive() || data_ref.slot.slot == Slot::Collection
    }

    pub async fn resolve_metadata(
        &self,
        data_ref: DataRef,
        media_hash: &str,
    ) -> Result<TrackMetadata, ResolveError> {
        for provider in self.registry.chain_for(media_hash) {
            if let Some(metadata) = provider.track_metadata(data_ref).await? {
                return Ok(metadata);
            }
        }
        if self.live_query_allowed(data_ref) {
            if let Some(live) = &self.live {
                if let Some(metadata) = live.track_metadata(data_ref).await? {
                    return Ok(metadata);
                }
            }
        } else {
            return Err(ResolveError::PassiveModeSuppressed {
                asset: AssetKind::Metadata,
                data_ref,
            });
        }
        Err(ResolveError::Exhausted {
            asset: AssetKind::Metadata,
            data_ref,
        })
    }

    pub async fn resolve_cue_list(
        &self,
        data_ref: DataRef,
        media_hash: &str,
    ) -> Result<CueList, ResolveError> {
        for provider in self.registry.chain_for(media_hash) {
            if let Some(cue_list) = provider.cue_list(data_ref).await? {
                return Ok(cue_list);
            }
        }
        if self.live_query_allowed(data_ref) {
            if let Some(live) = &self.live {
                if let Some(cue_list) = live.cue_list(data_ref).await? {
                    return Ok(cue_list);
                }
            }
        } else {
            return Err(ResolveError::PassiveModeSuppressed {
                asset: AssetKind::CueList,
                data_ref,
            });
        }
        Err(ResolveError::Exhausted {
            asset: AssetKind::CueList,
            data_ref,
        })
    }

    pub async fn resolve_album_art(
        &self,
        data_ref: DataRef,
        media_hash: &str,
    ) -> Result<AlbumArt, ResolveError> {
        for provider in self.registry.chain_for(media_hash) {
            if let Some(art) = provider.album_art(data_ref).await? {
                return Ok(art);
            }
        }
        if self.live_query_allowed(data_ref) {
            if let Some(live) = &self.live {
                if let Some(art) = live.album_art(data_ref).await? {
                    return Ok(art);
                }
            }
        } else {
            return Err(ResolveError::PassiveModeSuppressed {
                asset: AssetKind::AlbumArt,
                data_ref,
            });
        }
        Err(ResolveError::Exhausted {
            asset: AssetKind::AlbumArt,
            data_ref,
        })
    }

    pub async fn resolve_waveform_preview(
        &self,
        data_ref: DataRef,
        media_hash: &str,
    ) -> Result<Waveform, ResolveError> {
        for provider in self.registry.chain_for(media_hash) {
            if let Some(w) = provider.waveform_preview(data_ref).await? {
                return Ok(w);
            }
        }
        if self.live_query_allowed(data_ref) {
            if let Some(live) = &self.live {
                if let Some(w) = live.waveform_preview(data_ref).await? {
                    return Ok(w);
                }
            }
        } else {
            return Err(ResolveError::PassiveModeSuppressed {
                asset: AssetKind::WaveformPreview,
                data_ref,
            });
        }
        Err(ResolveError::Exhausted {
            asset: AssetKind::WaveformPreview,
            data_ref,
        })
    }

    pub async fn resolve_waveform_detail(
        &self,
        data_ref: DataRef,
        media_hash: &str,
    ) -> Result<Waveform, ResolveError> {
        for provider in self.registry.chain_for(media_hash) {
            if let Some(w) = provider.waveform_detail(data_ref).await? {
                return Ok(w);
            }
        }
        if self.live_query_allowed(data_ref) {
            if let Some(live) = &self.live {
                if let Some(w) = live.waveform_detail(data_ref).await? {
                    return Ok(w);
                }
            }
        } else {
            return Err(ResolveError::PassiveModeSuppressed {
                asset: AssetKind::WaveformDetail,
                data_ref,
            });
        }
        Err(ResolveError::Exhausted {
            asset: AssetKind::WaveformDetail,
            data_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Slot, SlotRef, TrackMetadata, TrackType};
    use crate::providers::mocks::FixedMetadataProvider;

    fn metadata(title: &str) -> TrackMetadata {
        TrackMetadata {
            track_ref: DataRef::new(SlotRef::new(1, Slot::Usb), 1),
            track_type: TrackType::Rekordbox,
            title: title.to_string(),
            artist: None,
            album: None,
            duration_ms: None,
            artwork_id: None,
            cue_list: None,
        }
    }

    #[tokio::test]
    async fn first_provider_that_answers_wins_and_later_ones_are_not_called() {
        let registry = Arc::new(ProviderRegistry::new());
        let first = Arc::new(FixedMetadataProvider::new("first", Some(metadata("Found It"))));
        let second = Arc::new(FixedMetadataProvider::new("second", Some(metadata("Never"))));
        registry.register_for_media("media-1", first.clone());
        registry.register_for_media("media-1", second.clone());

        let resolver = Resolver::new(registry, None, false);
        let data_ref = DataRef::new(SlotRef::new(1, Slot::Usb), 1);
        let result = resolver.resolve_metadata(data_ref, "media-1").await.unwrap();

        assert_eq!(result.title, "Found It");
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn exhausted_chain_with_no_live_client_errors() {
        let registry = Arc::new(ProviderRegistry::new());
        let resolver = Resolver::new(registry, None, false);
        let data_ref = DataRef::new(SlotRef::new(1, Slot::Usb), 1);
        let err = resolver
            .resolve_metadata(data_ref, "unknown-media")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::Exhausted {
                asset: AssetKind::Metadata,
                data_ref
            }
        );
    }

    #[tokio::test]
    async fn passive_mode_suppresses_live_query_for_non_collection_slot() {
        let registry = Arc::new(ProviderRegistry::new());
        let resolver = Resolver::new(registry, None, true);
        let data_ref = DataRef::new(SlotRef::new(1, Slot::Usb), 1);
        let err = resolver
            .resolve_metadata(data_ref, "unknown-media")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::PassiveModeSuppressed {
                asset: AssetKind::Metadata,
                data_ref
            }
        );
    }

    #[tokio::test]
    async fn passive_mode_still_allows_collection_slot_queries() {
        let registry = Arc::new(ProviderRegistry::new());
        let resolver = Resolver::new(registry, None, true);
        let data_ref = DataRef::new(SlotRef::new(1, Slot::Collection), 1);
        // No live client registered, so it still exhausts -- but via the
        // "exhausted" path, not the passive-suppressed one.
        let err = resolver
            .resolve_metadata(data_ref, "unknown-media")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::Exhausted {
                asset: AssetKind::Metadata,
                data_ref
            }
        );
    }
}
