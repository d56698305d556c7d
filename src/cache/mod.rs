//! The two-tier asset cache: a small per-deck hot cache, a bounded
//! second-level LRU for album art, and an active-request deduplicator that
//! sits in front of both.

pub mod dedup;
pub mod hot;
pub mod lru;

pub use dedup::{ActiveRequestKey, Deduplicator};
pub use hot::{HotCache, HotCacheEntry};
pub use lru::AlbumArtLru;
