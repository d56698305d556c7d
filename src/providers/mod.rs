//! The provider chain: pluggable asset sources tried in priority order before
//! falling back to a live query against a player.

pub mod registry;
pub mod resolver;
pub mod transport;

pub use registry::ProviderRegistry;
pub use resolver::Resolver;
pub use transport::{DbServerClient, FileFetcher};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{AlbumArt, AssetKind, CueList, DataRef, TrackMetadata, Waveform};

/// The resolver chain could not produce an asset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Every registered provider and the live query path declined or failed
    /// to produce this asset.
    #[error("no source produced {asset} for {data_ref:?}")]
    Exhausted { asset: AssetKind, data_ref: DataRef },

    /// The live query path was needed but the core is running passively and
    /// `data_ref` is not on the network collection, so the query was never
    /// attempted.
    #[error("passive mode suppressed a live query for {asset} on {data_ref:?}")]
    PassiveModeSuppressed { asset: AssetKind, data_ref: DataRef },
}

/// A pluggable source of track assets, tried before a live player query.
///
/// Implementations answer "no" (`Ok(None)`) for anything they don't have an
/// opinion about; the resolver moves on to the next provider. Returning
/// `Err` aborts the whole chain for that request (used for sources that know
/// they are authoritative and hit an unexpected failure, rather than simply
/// not having the data).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// A short, stable name for logging and registry bookkeeping.
    fn name(&self) -> &str;

    async fn track_metadata(
        &self,
        data_ref: DataRef,
    ) -> Result<Option<TrackMetadata>, ResolveError>;

    async fn cue_list(&self, data_ref: DataRef) -> Result<Option<CueList>, ResolveError>;

    async fn album_art(&self, data_ref: DataRef) -> Result<Option<AlbumArt>, ResolveError>;

    async fn waveform_preview(&self, data_ref: DataRef) -> Result<Option<Waveform>, ResolveError>;

    async fn waveform_detail(&self, data_ref: DataRef) -> Result<Option<Waveform>, ResolveError>;
}
