//! `tracklink_core`: coordinates track-asset lookups (metadata, cue lists,
//! beat grids, album art, waveforms) for whatever is loaded on a LAN of
//! Pioneer/rekordbox players, without decoding the underlying wire
//! protocols or file formats itself.
//!
//! The crate is organized around a small number of collaborating
//! components, each owning one piece of the coordination problem:
//!
//! - [`model`]: the shared data types (refs, metadata, cue lists, ...)
//! - [`cache`]: the hot cache, the second-level album-art LRU, and the
//!   active-request deduplicator
//! - [`providers`]: the pluggable provider chain and resolver
//! - [`acquire`]: database/analysis file acquisition with retry and
//!   scratch-directory cleanup
//! - [`finders`]: the per-asset state machines tying resolution to the
//!   hot cache
//! - [`position`]: the track-position extrapolator
//!
//! [`TrackLinkCore`] assembles all of these into the public surface this
//! crate exposes.

pub mod acquire;
pub mod cache;
pub mod config;
pub mod error;
pub mod finders;
pub mod model;
pub mod position;
pub mod providers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;

use cache::{AlbumArtLru, HotCache, HotCacheEntry};
use config::Config;
use finders::{
    AlbumArtFinder, AnalysisTagExtractors, AnalysisTagFinder, BeatGridFinder, CueListFinder,
    MetadataFinder, SimpleAssetFinder, WaveformDetailFinder, WaveformPreviewFinder,
};
use model::{
    AssetKind, BeatPacket, DataRef, DeckRef, DeviceStatusUpdate, MediaDetails, PlayerId, SlotRef,
    StatusPacket, TrackMetadataUpdate, TrackPositionUpdate,
};
use position::PositionExtrapolator;
use providers::transport::FileFetcher;
use providers::{ProviderRegistry, ResolveError, Resolver};

/// How long the dispatcher's blocking receive waits before re-checking
/// whether the core is still running -- bounds how long `shutdown` can take
/// to actually stop the dispatcher task.
const DISPATCHER_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub use error::{Error, Result};

/// External collaborators the core needs but does not implement itself:
/// the raw network/file transports and the binary parsers for rekordbox's
/// proprietary formats.
pub struct CoreDependencies {
    pub file_fetcher: Arc<dyn FileFetcher>,
    pub db_client: Option<Arc<dyn providers::transport::DbServerClient>>,
    pub analysis_extractors: AnalysisTagExtractors,
    pub anlz_parser: acquire::analysis::AnlzParser,
}

/// A hot-cache read paired with the generation counter it was taken under,
/// so a caller polling a deck across several calls can tell whether
/// anything changed without diffing the whole entry itself (supplemented
/// versioned-read feature).
#[derive(Debug, Clone)]
pub struct VersionedSnapshot {
    pub generation: u64,
    pub entry: HotCacheEntry,
}

/// The assembled track-asset coordination core.
pub struct TrackLinkCore {
    config: Config,
    hot: Arc<HotCache>,
    lru: Arc<AlbumArtLru>,
    registry: Arc<ProviderRegistry>,
    resolver: Arc<Resolver>,
    position: Arc<PositionExtrapolator>,
    media: Arc<DashMap<SlotRef, MediaDetails>>,
    metadata_finder: Arc<MetadataFinder>,
    cue_list_finder: Arc<CueListFinder>,
    beat_grid_finder: Arc<BeatGridFinder>,
    album_art_finder: Arc<AlbumArtFinder>,
    waveform_preview_finder: Arc<WaveformPreviewFinder>,
    waveform_detail_finder: Arc<WaveformDetailFinder>,
    analysis_finder: Arc<AnalysisTagFinder>,
    generation: AtomicU64,
    running: AtomicBool,
}

impl TrackLinkCore {
    /// Build a core from configuration and its external collaborators.
    /// Does not start any background work; call [`TrackLinkCore::start`]
    /// for that.
    pub fn new(config: Config, deps: CoreDependencies) -> Result<Arc<Self>> {
        config.network.validate()?;

        let hot = Arc::new(HotCache::new());
        let lru = Arc::new(AlbumArtLru::new(config.cache.album_art_lru_capacity));
        let registry = Arc::new(ProviderRegistry::new());
        let resolver = Arc::new(Resolver::new(
            registry.clone(),
            deps.db_client.clone(),
            config.network.passive,
        ));
        let position = Arc::new(PositionExtrapolator::new());
        let media: Arc<DashMap<SlotRef, MediaDetails>> = Arc::new(DashMap::new());

        let metadata_finder = Arc::new(MetadataFinder::new(
            hot.clone(),
            resolver.clone(),
            {
                let media = media.clone();
                Arc::new(move |slot: SlotRef| media.get(&slot).map(|m| m.hash_key()))
            },
            config.cache.event_queue_capacity,
        ));

        let cue_list_finder = Arc::new(CueListFinder::new(
            AssetKind::CueList,
            hot.clone(),
            {
                let resolver = resolver.clone();
                Arc::new(move |data_ref: DataRef, media_hash: String| {
                    let resolver = resolver.clone();
                    async move { resolver.resolve_cue_list(data_ref, &media_hash).await }.boxed()
                })
            },
            Arc::new(|hot: &HotCache, deck, cue_list| hot.set_cue_list(deck, cue_list)),
            config.cache.event_queue_capacity,
        ));

        // No provider or live-query path produces beat grids -- they only
        // ever arrive via the analysis-tag finder's `.DAT`/`.EXT` parse --
        // so this finder's resolve path always exhausts. It still exists so
        // a beat-grid deck participates in the same state-machine shape as
        // every other asset kind.
        let beat_grid_finder = Arc::new(BeatGridFinder::new(
            AssetKind::BeatGrid,
            hot.clone(),
            Arc::new(move |data_ref: DataRef, _media_hash: String| {
                async move {
                    Err(ResolveError::Exhausted {
                        asset: AssetKind::BeatGrid,
                        data_ref,
                    })
                }
                .boxed()
            }),
            Arc::new(|hot: &HotCache, deck, grid| hot.set_beat_grid(deck, grid)),
            config.cache.event_queue_capacity,
        ));

        let high_res = config.network.high_resolution_art;
        let album_art_finder = Arc::new(AlbumArtFinder::new(
            AssetKind::AlbumArt,
            hot.clone(),
            {
                let resolver = resolver.clone();
                let file_fetcher = deps.file_fetcher.clone();
                Arc::new(move |data_ref: DataRef, media_hash: String| {
                    let resolver = resolver.clone();
                    let file_fetcher = file_fetcher.clone();
                    async move {
                        if high_res {
                            if let Some(mount) = data_ref.slot.slot.mount_path() {
                                let remote =
                                    format!("{mount}PIONEER/Artwork/{:08}.jpg", data_ref.rekordbox_id);
                                if let Ok(bytes) =
                                    file_fetcher.fetch(data_ref.slot.player, &remote).await
                                {
                                    return Ok(model::AlbumArt::new(data_ref, bytes));
                                }
                            }
                        }
                        resolver.resolve_album_art(data_ref, &media_hash).await
                    }
                    .boxed()
                })
            },
            Arc::new(|hot: &HotCache, deck, art| hot.set_album_art(deck, art)),
            config.cache.event_queue_capacity,
        ));

        let waveform_preview_finder = Arc::new(WaveformPreviewFinder::new(
            AssetKind::WaveformPreview,
            hot.clone(),
            {
                let resolver = resolver.clone();
                Arc::new(move |data_ref: DataRef, media_hash: String| {
                    let resolver = resolver.clone();
                    async move { resolver.resolve_waveform_preview(data_ref, &media_hash).await }
                        .boxed()
                })
            },
            Arc::new(|hot: &HotCache, deck, w| hot.set_waveform_preview(deck, w)),
            config.cache.event_queue_capacity,
        ));

        let waveform_detail_finder = Arc::new(WaveformDetailFinder::new(
            AssetKind::WaveformDetail,
            hot.clone(),
            {
                let resolver = resolver.clone();
                Arc::new(move |data_ref: DataRef, media_hash: String| {
                    let resolver = resolver.clone();
                    async move { resolver.resolve_waveform_detail(data_ref, &media_hash).await }
                        .boxed()
                })
            },
            Arc::new(|hot: &HotCache, deck, w| hot.set_waveform_detail(deck, w)),
            config.cache.event_queue_capacity,
        ));

        let analysis_cache = Arc::new(acquire::AnalysisFileCache::new(
            deps.file_fetcher.clone(),
            deps.anlz_parser.clone(),
            config.network.retry_limit,
        ));
        let analysis_finder = Arc::new(AnalysisTagFinder::new(
            analysis_cache,
            hot.clone(),
            deps.analysis_extractors,
        ));

        Ok(Arc::new(Self {
            config,
            hot,
            lru,
            registry,
            resolver,
            position,
            media,
            metadata_finder,
            cue_list_finder,
            beat_grid_finder,
            album_art_finder,
            waveform_preview_finder,
            waveform_detail_finder,
            analysis_finder,
            generation: AtomicU64::new(0),
            running: AtomicBool::new(false),
        }))
    }

    /// Start the dispatcher that drives every other finder off metadata
    /// arrivals, then replay whatever is already loaded so the hot cache
    /// gets primed without waiting for the next device-status change.
    /// Idempotent: a second call on an already-running core is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(target: "core", "starting tracklink core");
        self.run_dispatcher();
        self.replay_loaded_tracks();
        tracing::info!(target: "core", "tracklink core started");
    }

    /// Stop accepting new work and tear down: notify every listener that
    /// every active-deck and hot-cue entry is gone, then clear them, before
    /// the dispatcher itself stops reacting to further metadata arrivals.
    /// Idempotent: a second call on an already-stopped core is a no-op.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!(target: "core", "tracklink core shutting down");
        let all_decks = self.hot.all_decks();
        self.notify_evicted(&all_decks);
        for deck in &all_decks {
            self.hot.clear_deck(*deck);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::info!(target: "core", "tracklink core shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Record that a piece of media mounted, scoping future provider lookups
    /// and live queries to its stable hash key.
    pub fn media_mounted(&self, details: MediaDetails) {
        self.media.insert(details.slot, details);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Record that a piece of media unmounted, invalidating every asset
    /// sourced from it: evicts every hot-cache and LRU entry whose slot
    /// equals the unmounted one, not the whole player -- a player may have
    /// other slots still mounted.
    pub fn media_unmounted(&self, slot: SlotRef) {
        if let Some((_, details)) = self.media.remove(&slot) {
            self.registry.unregister_media(&details.hash_key());
        }
        self.lru.remove_slot(slot);
        let cleared = self.hot.clear_slot(slot);
        self.notify_evicted(&cleared);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Record that `player` has left the network entirely, invalidating
    /// every entry associated with it regardless of slot.
    pub fn device_lost(&self, player: PlayerId) {
        let doomed_slots: Vec<SlotRef> = self
            .media
            .iter()
            .filter(|e| e.key().player == player)
            .map(|e| *e.key())
            .collect();
        for slot in doomed_slots {
            if let Some((_, details)) = self.media.remove(&slot) {
                self.registry.unregister_media(&details.hash_key());
            }
        }
        self.lru.remove_player(player);
        let cleared = self.hot.clear_player(player);
        self.notify_evicted(&cleared);
        self.position.clear(player);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Every piece of media currently known to be mounted.
    pub fn supported_media(&self) -> Vec<MediaDetails> {
        self.media.iter().map(|e| e.value().clone()).collect()
    }

    /// Feed a raw device-status observation into the metadata finder. The
    /// resulting metadata arrival (or clear) is published on the metadata
    /// finder's own bus; when the dispatcher is running (see
    /// [`TrackLinkCore::start`]) it picks that up and drives every other
    /// finder from it. This method itself only drives metadata.
    pub async fn handle_device_status(&self, update: DeviceStatusUpdate) {
        self.metadata_finder.handle_status(update).await;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a beat-synchronized status packet for `player`'s position.
    pub fn handle_position_status(&self, player: PlayerId, status: StatusPacket) {
        self.position.on_status(player, status);
    }

    /// Record a beat packet for `player`'s position.
    pub fn handle_position_beat(&self, player: PlayerId, beat: BeatPacket) {
        self.position.on_beat(player, beat);
    }

    fn media_hash_for(&self, slot: SlotRef) -> Option<String> {
        self.media.get(&slot).map(|m| m.hash_key())
    }

    /// Resolve one asset kind for `deck`'s newly-loaded track and fan the
    /// result out to every hot-cue deck derived from its cue list, the same
    /// pattern [`TrackLinkCore::resolve_album_art`] already follows for art.
    /// A resolve failure (including "already cached") is silently dropped:
    /// the finder's own state machine already logged or accounted for it.
    async fn resolve_and_fan_out<T, F>(
        &self,
        finder: &SimpleAssetFinder<T>,
        deck: DeckRef,
        hot_cue_decks: &[DeckRef],
        track_ref: DataRef,
        media_hash: String,
        install: F,
    ) where
        T: Send + Sync + Clone + 'static,
        F: Fn(&HotCache, DeckRef, Arc<T>),
    {
        if let Ok(asset) = finder.resolve_for_deck(deck, track_ref, media_hash).await {
            for hot_cue_deck in hot_cue_decks {
                install(&self.hot, *hot_cue_deck, asset.clone());
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// The dispatcher's reaction to one metadata arrival: drives every other
    /// finder off it, fanning each result out to the track's hot-cue decks.
    /// A `None` metadata (track unloaded, or resolution failed) instead
    /// notifies every finder that the active deck's entries are gone.
    async fn dispatch_metadata_update(&self, update: TrackMetadataUpdate) {
        let deck = DeckRef::active(update.player);
        let Some(metadata) = update.metadata else {
            self.notify_evicted(&[deck]);
            return;
        };

        let hot_cue_decks: Vec<DeckRef> = metadata
            .hot_cue_numbers()
            .into_iter()
            .map(|n| DeckRef::hot_cue(update.player, n))
            .collect();

        let Some(media_hash) = self.media_hash_for(metadata.track_ref.slot) else {
            return;
        };

        self.resolve_and_fan_out(
            &self.cue_list_finder,
            deck,
            &hot_cue_decks,
            metadata.track_ref,
            media_hash.clone(),
            |hot, d, v| hot.set_cue_list(d, v),
        )
        .await;
        self.resolve_and_fan_out(
            &self.beat_grid_finder,
            deck,
            &hot_cue_decks,
            metadata.track_ref,
            media_hash.clone(),
            |hot, d, v| hot.set_beat_grid(d, v),
        )
        .await;
        self.resolve_and_fan_out(
            &self.waveform_preview_finder,
            deck,
            &hot_cue_decks,
            metadata.track_ref,
            media_hash.clone(),
            |hot, d, v| hot.set_waveform_preview(d, v),
        )
        .await;
        self.resolve_and_fan_out(
            &self.waveform_detail_finder,
            deck,
            &hot_cue_decks,
            metadata.track_ref,
            media_hash.clone(),
            |hot, d, v| hot.set_waveform_detail(d, v),
        )
        .await;
        let _ = self.resolve_album_art(deck, &metadata, media_hash).await;
    }

    /// Tell every finder that `decks` lost whatever they had cached, e.g. on
    /// unmount, device loss, or shutdown.
    fn notify_evicted(&self, decks: &[DeckRef]) {
        for deck in decks {
            self.cue_list_finder.clear_deck(*deck);
            self.beat_grid_finder.clear_deck(*deck);
            self.album_art_finder.clear_deck(*deck);
            self.waveform_preview_finder.clear_deck(*deck);
            self.waveform_detail_finder.clear_deck(*deck);
            self.analysis_finder.clear_deck(*deck);
        }
    }

    /// Spawn the background task that drives every other finder off the
    /// metadata finder's event bus. The subscriber side is a plain
    /// `crossbeam_channel` receiver, so the blocking receive runs on a
    /// blocking-pool thread rather than tying up an async worker.
    fn run_dispatcher(self: &Arc<Self>) {
        let core = self.clone();
        let rx = self.metadata_finder.subscribe();
        tokio::task::spawn_blocking(move || {
            loop {
                if !core.running.load(Ordering::SeqCst) {
                    break;
                }
                match rx.recv_timeout(DISPATCHER_POLL_INTERVAL) {
                    Ok(update) => {
                        tokio::runtime::Handle::current().block_on(core.dispatch_metadata_update(update));
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
        });
    }

    /// Replay every already-loaded active deck through the dispatcher, so a
    /// core started against a cache that already has metadata (e.g.
    /// recovering from a restart) primes cue lists, beat grids, art, and
    /// waveforms without waiting for the next device-status change.
    fn replay_loaded_tracks(self: &Arc<Self>) {
        for (deck, metadata) in self.hot.loaded_decks() {
            let core = self.clone();
            tokio::spawn(async move {
                core.dispatch_metadata_update(TrackMetadataUpdate {
                    player: deck.player,
                    metadata: Some((*metadata).clone()),
                })
                .await;
            });
        }
    }

    /// Resolve album art for `deck`'s newly-loaded track, honoring the
    /// hot-cache-reuse and second-level-LRU tiers ahead of the provider
    /// chain, and fanning the result out to every hot-cue deck the track's
    /// cue list reports.
    pub async fn resolve_album_art(
        &self,
        deck: DeckRef,
        metadata: &model::TrackMetadata,
        media_hash: String,
    ) -> std::result::Result<Arc<model::AlbumArt>, ResolveError> {
        let Some(artwork_id) = metadata.artwork_id else {
            return Err(ResolveError::Exhausted {
                asset: AssetKind::AlbumArt,
                data_ref: metadata.track_ref,
            });
        };
        let art_ref = DataRef::new(metadata.track_ref.slot, artwork_id);
        let hot_cue_decks: Vec<DeckRef> = metadata
            .hot_cue_numbers()
            .into_iter()
            .map(|n| DeckRef::hot_cue(deck.player, n))
            .collect();

        if let Some(existing) = self.hot.find_album_art_by_ref(art_ref) {
            self.install_album_art(deck, &hot_cue_decks, existing.clone());
            return Ok(existing);
        }
        if let Some(cached) = self.lru.get(art_ref) {
            let art = Arc::new(cached);
            self.install_album_art(deck, &hot_cue_decks, art.clone());
            return Ok(art);
        }

        let art = self
            .album_art_finder
            .resolve_for_deck(deck, art_ref, media_hash)
            .await?;
        self.lru.put(art_ref, (*art).clone());
        for hot_cue_deck in &hot_cue_decks {
            self.hot.set_album_art(*hot_cue_deck, art.clone());
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(art)
    }

    fn install_album_art(&self, deck: DeckRef, hot_cue_decks: &[DeckRef], art: Arc<model::AlbumArt>) {
        self.hot.set_album_art(deck, art.clone());
        for hot_cue_deck in hot_cue_decks {
            self.hot.set_album_art(*hot_cue_deck, art.clone());
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a player's position observation.
    pub fn handle_position_update(&self, player: PlayerId, update: TrackPositionUpdate) {
        self.position.update(player, update);
    }

    /// Extrapolated position for `player` as of `at_ns`.
    pub fn position_at(&self, player: PlayerId, at_ns: u64) -> Option<i64> {
        self.position.position_at(player, at_ns)
    }

    /// Current generation counter, bumped on every mutation observable
    /// through the hot cache, so a poller can cheaply tell whether anything
    /// changed since it last looked (supplemented versioned-read feature).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// A versioned read of `deck`'s hot-cache entry.
    pub fn snapshot(&self, deck: DeckRef) -> VersionedSnapshot {
        VersionedSnapshot {
            generation: self.generation(),
            entry: self.hot.entry(deck),
        }
    }

    pub fn hot_cache(&self) -> &HotCache {
        &self.hot
    }

    pub fn album_art_lru(&self) -> &AlbumArtLru {
        &self.lru
    }

    pub fn provider_registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn metadata_finder(&self) -> &MetadataFinder {
        &self.metadata_finder
    }

    pub fn cue_list_finder(&self) -> &CueListFinder {
        &self.cue_list_finder
    }

    pub fn beat_grid_finder(&self) -> &BeatGridFinder {
        &self.beat_grid_finder
    }

    pub fn album_art_finder(&self) -> &AlbumArtFinder {
        &self.album_art_finder
    }

    pub fn waveform_preview_finder(&self) -> &WaveformPreviewFinder {
        &self.waveform_preview_finder
    }

    pub fn waveform_detail_finder(&self) -> &WaveformDetailFinder {
        &self.waveform_detail_finder
    }

    pub fn analysis_finder(&self) -> &AnalysisTagFinder {
        &self.analysis_finder
    }
}
