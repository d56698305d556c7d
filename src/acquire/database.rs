//! Acquiring (and caching) a rekordbox database export per slot, with HFS+
//! path-casing fallback and retry.
//!
//! The export itself (`export.pdb`) is a black box to this crate: parsing
//! its row-oriented binary format is out of scope. [`Database`] is just the
//! bytes, handed to whatever parser a caller brings.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::AcquireConfig;
use crate::model::{PlayerId, Slot, SlotRef};

use super::locks::NamedLocks;
use super::scratch::ScratchDir;
use super::{AcquireError, RetryPolicy};

use super::super::providers::transport::FileFetcher;

/// The standard export path, and the hidden-folder fallback some players
/// expose the same file under on an HFS+-formatted slot.
const STANDARD_EXPORT_PATH: &str = "PIONEER/rekordbox/export.pdb";
const HFS_FALLBACK_EXPORT_PATH: &str = ".PIONEER/rekordbox/export.pdb";

/// Whether `err` is the specific "PIONEER lookup returned status ..." error
/// a player's file-transfer protocol reports when it can't find the export
/// under the standard (non-hidden) path -- the one case that should trigger
/// the HFS+ fallback rather than being treated as an ordinary fetch failure.
fn is_pioneer_lookup_status_error(err: &std::io::Error) -> bool {
    err.to_string().contains("PIONEER lookup returned status")
}

/// Opaque database export bytes for one slot.
#[derive(Debug, Clone)]
pub struct Database {
    pub slot: SlotRef,
    pub bytes: Arc<[u8]>,
}

/// Fetches and caches one [`Database`] per slot, serializing concurrent
/// fetches of the same slot through a named lock and retrying failed
/// fetches per the configured policy.
pub struct DatabaseAcquirer {
    fetcher: Arc<dyn FileFetcher>,
    locks: NamedLocks,
    cache: DashMap<SlotRef, Arc<Database>>,
    retry: RetryPolicy,
    /// The export-path prefix that won for a slot, so later reads for the
    /// same slot (e.g. per-track analysis-file fetches) can go straight to
    /// the path that's already known to work instead of probing again.
    winning_prefix: DashMap<SlotRef, &'static str>,
}

impl DatabaseAcquirer {
    pub fn new(fetcher: Arc<dyn FileFetcher>, retry_limit: u8) -> Self {
        Self {
            fetcher,
            locks: NamedLocks::new(),
            cache: DashMap::new(),
            retry: RetryPolicy::new(retry_limit),
            winning_prefix: DashMap::new(),
        }
    }

    /// The export-path prefix that won the last acquisition for `slot`, if
    /// any. A caller building a per-track analysis-file remote path can
    /// prepend this same prefix rather than re-probing the standard path.
    pub fn winning_prefix(&self, slot: SlotRef) -> Option<&'static str> {
        self.winning_prefix.get(&slot).map(|p| *p)
    }

    /// Return the cached database for `slot`, if one has already been
    /// acquired.
    pub fn cached(&self, slot: SlotRef) -> Option<Arc<Database>> {
        self.cache.get(&slot).map(|entry| entry.clone())
    }

    /// Acquire the database export for `slot`, using the cache if present.
    /// Concurrent callers for the same slot share one fetch.
    pub async fn acquire(
        &self,
        slot: SlotRef,
        scratch_config: &AcquireConfig,
    ) -> Result<Arc<Database>, AcquireError> {
        if let Some(db) = self.cached(slot) {
            return Ok(db);
        }

        let lock_key = format!("db:{}:{:?}", slot.player, slot.slot);
        let _guard = self.locks.lock(&lock_key).await;

        // Another task may have populated the cache while we waited on the lock.
        if let Some(db) = self.cached(slot) {
            return Ok(db);
        }

        let _scratch = ScratchDir::create(scratch_config, slot.player, slot.slot)?;
        let bytes = self.fetch_with_fallback(slot).await?;
        let db = Arc::new(Database { slot, bytes: bytes.into() });
        self.cache.insert(slot, db.clone());
        Ok(db)
    }

    async fn fetch_with_fallback(&self, slot: SlotRef) -> Result<Vec<u8>, AcquireError> {
        let Some(mount) = slot.slot.mount_path() else {
            return Err(AcquireError::NoDatabaseFound(slot));
        };

        if let Some(prefix) = self.winning_prefix(slot) {
            let path = format!("{mount}{prefix}");
            return self.fetch_retrying(slot, &path).await;
        }

        let standard = format!("{mount}{STANDARD_EXPORT_PATH}");
        match self.fetch_retrying(slot, &standard).await {
            Ok(bytes) => {
                self.winning_prefix.insert(slot, STANDARD_EXPORT_PATH);
                return Ok(bytes);
            }
            Err(AcquireError::FetchFailed { ref source, .. }) if is_pioneer_lookup_status_error(source) => {
                tracing::debug!(
                    target: "acquire::database",
                    player = slot.player,
                    "standard export path reported a PIONEER lookup-status failure, trying HFS+ fallback path"
                );
            }
            Err(other) => return Err(other),
        }

        let fallback = format!("{mount}{HFS_FALLBACK_EXPORT_PATH}");
        let bytes = self.fetch_once(slot, &fallback).await?;
        self.winning_prefix.insert(slot, HFS_FALLBACK_EXPORT_PATH);
        Ok(bytes)
    }

    async fn fetch_retrying(&self, slot: SlotRef, remote_path: &str) -> Result<Vec<u8>, AcquireError> {
        let fetcher = self.fetcher.clone();
        let path = remote_path.to_string();
        let player = slot.player;
        self.retry
            .run(|_attempt| {
                let fetcher = fetcher.clone();
                let path = path.clone();
                async move { fetcher.fetch(player, &path).await }
            })
            .await
            .map_err(|source| AcquireError::FetchFailed {
                slot,
                remote_path: remote_path.to_string(),
                attempts: self.retry.limit,
                source,
            })
    }

    /// A single attempt, no retry budget: used for the HFS+ fallback path,
    /// which is itself already a one-shot reaction to a specific standard-
    /// path failure rather than a fetch that should be retried on its own.
    async fn fetch_once(&self, slot: SlotRef, remote_path: &str) -> Result<Vec<u8>, AcquireError> {
        self.fetcher
            .fetch(slot.player, remote_path)
            .await
            .map_err(|source| AcquireError::FetchFailed {
                slot,
                remote_path: remote_path.to_string(),
                attempts: 1,
                source,
            })
    }

    /// Evict the cached database for a slot that has been unmounted,
    /// invalidating every asset sourced from that media. Also forgets which
    /// export path won, since a freshly-mounted slot may be a different
    /// piece of media with a different filesystem.
    pub fn evict(&self, slot: SlotRef) {
        self.cache.remove(&slot);
        self.winning_prefix.remove(&slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// The standard path reports the specific lookup-status failure a
    /// player gives when the export isn't at the non-hidden path; the
    /// dotted HFS+ fallback path always succeeds.
    struct LookupStatusFetcher;

    #[async_trait]
    impl FileFetcher for LookupStatusFetcher {
        async fn fetch(&self, _player: PlayerId, remote_path: &str) -> std::io::Result<Vec<u8>> {
            if remote_path.contains(".PIONEER") {
                Ok(b"pdb-bytes".to_vec())
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "PIONEER lookup returned status 0x02",
                ))
            }
        }
    }

    #[tokio::test]
    async fn falls_back_to_hfs_path_on_lookup_status_error_and_remembers_the_winner() {
        let base = TempDir::new().unwrap();
        let config = AcquireConfig {
            scratch_base: Some(base.path().to_path_buf()),
        };
        let acquirer = DatabaseAcquirer::new(Arc::new(LookupStatusFetcher), 3);
        let slot = SlotRef::new(1, Slot::Usb);
        let db = acquirer.acquire(slot, &config).await.unwrap();
        assert_eq!(&*db.bytes, b"pdb-bytes");
        assert!(acquirer.cached(slot).is_some());
        assert_eq!(acquirer.winning_prefix(slot), Some(HFS_FALLBACK_EXPORT_PATH));
    }

    #[tokio::test]
    async fn an_unrelated_fetch_error_does_not_trigger_the_fallback() {
        struct AlwaysConnectionReset;

        #[async_trait]
        impl FileFetcher for AlwaysConnectionReset {
            async fn fetch(&self, _player: PlayerId, _remote_path: &str) -> std::io::Result<Vec<u8>> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "connection reset"))
            }
        }

        let base = TempDir::new().unwrap();
        let config = AcquireConfig {
            scratch_base: Some(base.path().to_path_buf()),
        };
        let acquirer = DatabaseAcquirer::new(Arc::new(AlwaysConnectionReset), 1);
        let slot = SlotRef::new(1, Slot::Usb);
        let err = acquirer.acquire(slot, &config).await.unwrap_err();
        match err {
            AcquireError::FetchFailed { remote_path, .. } => {
                assert!(remote_path.contains(STANDARD_EXPORT_PATH));
                assert!(!remote_path.contains(".PIONEER"));
            }
            other => panic!("expected FetchFailed, got {other:?}"),
        }
        assert!(acquirer.winning_prefix(slot).is_none());
    }

    #[tokio::test]
    async fn evict_clears_the_cache_entry() {
        let base = TempDir::new().unwrap();
        let config = AcquireConfig {
            scratch_base: Some(base.path().to_path_buf()),
        };
        let acquirer = DatabaseAcquirer::new(Arc::new(LookupStatusFetcher), 3);
        let slot = SlotRef::new(1, Slot::Usb);
        acquirer.acquire(slot, &config).await.unwrap();
        acquirer.evict(slot);
        assert!(acquirer.cached(slot).is_none());
        assert!(acquirer.winning_prefix(slot).is_none());
    }
}
