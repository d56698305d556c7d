//! Acquiring and caching per-track analysis files (`.DAT`, `.EXT`, `.2EX`),
//! the sources of beat grids, waveforms, and the extended cue-list encoding.
//!
//! Decoding the tagged-section binary layout is out of scope; [`AnlzFile`]
//! is just the parsed-to-the-section-level view handed in by a caller's
//! parser. This crate only owns fetching, retrying, and caching the bytes.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::AcquireConfig;
use crate::model::{DataRef, FourCc, TaggedSection};

use super::locks::NamedLocks;
use super::scratch::ScratchDir;
use super::{AcquireError, RetryPolicy};

use super::super::providers::transport::FileFetcher;

/// An analysis file's tagged sections, already parsed to the section level.
#[derive(Debug, Clone)]
pub struct AnlzFile {
    pub track_ref: DataRef,
    pub sections: Vec<TaggedSection>,
}

impl AnlzFile {
    /// Find the first section with the given four-character type tag.
    pub fn section(&self, tag: FourCc) -> Option<&TaggedSection> {
        self.sections.iter().find(|s| s.type_tag == tag)
    }
}

/// A function that turns raw analysis-file bytes into tagged sections. The
/// binary format itself is out of scope for this crate; callers supply the
/// parser.
pub type AnlzParser = Arc<dyn Fn(&[u8]) -> Vec<TaggedSection> + Send + Sync>;

/// Fetches, parses (via an injected parser), and caches analysis files per
/// track, one fetch in flight per track regardless of how many finders ask
/// for it concurrently.
pub struct AnalysisFileCache {
    fetcher: Arc<dyn FileFetcher>,
    parser: AnlzParser,
    locks: NamedLocks,
    cache: DashMap<(DataRef, &'static str), Arc<AnlzFile>>,
    retry: RetryPolicy,
}

impl AnalysisFileCache {
    pub fn new(fetcher: Arc<dyn FileFetcher>, parser: AnlzParser, retry_limit: u8) -> Self {
        Self {
            fetcher,
            parser,
            locks: NamedLocks::new(),
            cache: DashMap::new(),
            retry: RetryPolicy::new(retry_limit),
        }
    }

    pub fn cached(&self, track_ref: DataRef, extension: &'static str) -> Option<Arc<AnlzFile>> {
        self.cache.get(&(track_ref, extension)).map(|e| e.clone())
    }

    /// Fetch `remote_path` (e.g. `.../ANLZ0001.DAT`) for `track_ref` with
    /// extension `extension` (one of `"DAT"`, `"EXT"`, `"2EX"`), caching the
    /// parsed result.
    pub async fn acquire(
        &self,
        track_ref: DataRef,
        extension: &'static str,
        remote_path: &str,
        scratch_config: &AcquireConfig,
    ) -> Result<Arc<AnlzFile>, AcquireError> {
        if let Some(anlz) = self.cached(track_ref, extension) {
            return Ok(anlz);
        }

        let lock_key = format!("anlz:{:?}:{extension}", track_ref);
        let _guard = self.locks.lock(&lock_key).await;

        if let Some(anlz) = self.cached(track_ref, extension) {
            return Ok(anlz);
        }

        let _scratch =
            ScratchDir::create(scratch_config, track_ref.slot.player, track_ref.slot.slot)?;

        let fetcher = self.fetcher.clone();
        let player = track_ref.slot.player;
        let path = remote_path.to_string();
        let bytes = self
            .retry
            .run(|_attempt| {
                let fetcher = fetcher.clone();
                let path = path.clone();
                async move { fetcher.fetch(player, &path).await }
            })
            .await
            .map_err(|source| AcquireError::FetchFailed {
                slot: track_ref.slot,
                remote_path: remote_path.to_string(),
                attempts: self.retry.limit,
                source,
            })?;

        let sections = (self.parser)(&bytes);
        let anlz = Arc::new(AnlzFile { track_ref, sections });
        self.cache.insert((track_ref, extension), anlz.clone());
        Ok(anlz)
    }

    /// Evict every cached analysis file for `track_ref`'s slot (its media
    /// was unmounted).
    pub fn evict_slot(&self, slot: crate::model::SlotRef) {
        self.cache.retain(|(track_ref, _), _| track_ref.slot != slot);
    }
}
