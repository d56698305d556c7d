//! Registry of providers, scoped either to a specific piece of media (by its
//! stable [`MediaDetails::hash_key`](crate::model::MediaDetails::hash_key))
//! or registered globally (tried for any media).

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::MetadataProvider;

/// Holds the providers registered for the running core, keyed by media hash
/// so a provider someone wired up for a specific USB stick keeps working if
/// that stick is remounted in a different slot.
#[derive(Default)]
pub struct ProviderRegistry {
    scoped: DashMap<String, Vec<Arc<dyn MetadataProvider>>>,
    global: RwLock<Vec<Arc<dyn MetadataProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a specific media hash key. Tried in
    /// registration order, before any global provider.
    pub fn register_for_media(&self, media_hash: impl Into<String>, provider: Arc<dyn MetadataProvider>) {
        self.scoped.entry(media_hash.into()).or_default().push(provider);
    }

    /// Register a provider tried for every piece of media, after any
    /// media-scoped providers.
    pub fn register_global(&self, provider: Arc<dyn MetadataProvider>) {
        self.global.write().push(provider);
    }

    /// Drop every provider registered for `media_hash`, so providers scoped
    /// to unmounted media stop being consulted.
    pub fn unregister_media(&self, media_hash: &str) {
        self.scoped.remove(media_hash);
    }

    /// The provider chain for a piece of media, in traversal order:
    /// media-scoped providers first, then global ones.
    pub fn chain_for(&self, media_hash: &str) -> Vec<Arc<dyn MetadataProvider>> {
        let mut chain = self
            .scoped
            .get(media_hash)
            .map(|entry| entry.clone())
            .unwrap_or_default();
        chain.extend(self.global.read().iter().cloned());
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mocks::EmptyProvider;

    #[test]
    fn scoped_providers_precede_global_ones() {
        let reg = ProviderRegistry::new();
        reg.register_global(Arc::new(EmptyProvider { name: "global".into() }));
        reg.register_for_media("media-1", Arc::new(EmptyProvider { name: "scoped".into() }));

        let chain = reg.chain_for("media-1");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].name(), "scoped");
        assert_eq!(chain[1].name(), "global");
    }

    #[test]
    fn unscoped_media_only_sees_global_providers() {
        let reg = ProviderRegistry::new();
        reg.register_global(Arc::new(EmptyProvider { name: "global".into() }));

        let chain = reg.chain_for("unknown-media");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name(), "global");
    }

    #[test]
    fn unregister_media_drops_its_scoped_providers() {
        let reg = ProviderRegistry::new();
        reg.register_for_media("media-1", Arc::new(EmptyProvider { name: "scoped".into() }));
        reg.unregister_media("media-1");
        assert!(reg.chain_for("media-1").is_empty());
    }
}
