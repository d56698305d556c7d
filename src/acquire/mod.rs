//! Acquiring rekordbox database and analysis files from a player's media,
//! with retry, HFS+ fallback naming, and scratch-directory cleanup.

pub mod analysis;
pub mod backoff;
pub mod database;
pub mod locks;
pub mod scratch;

pub use analysis::{AnalysisFileCache, AnlzFile};
pub use backoff::RetryPolicy;
pub use database::DatabaseAcquirer;
pub use locks::NamedLocks;
pub use scratch::ScratchDir;

use thiserror::Error;

use crate::model::SlotRef;

/// Failures specific to the database/analysis acquisition path.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("fetching {remote_path} from {slot:?} failed after {attempts} attempts: {source}")]
    FetchFailed {
        slot: SlotRef,
        remote_path: String,
        attempts: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("no readable database export found on {0:?} (tried both HFS+ and standard paths)")]
    NoDatabaseFound(SlotRef),

    #[error("scratch directory error: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("lock for {0} was poisoned by a panicking holder")]
    LockPoisoned(String),
}
