//! Shared handler state: `Arc` handles onto the daemon's already-running
//! components. `relay-daemon` builds one of these once at startup and
//! mounts [`crate::routes::dashboard_routes`] with it.

use std::sync::Arc;

use relay_consensus::ConsensusEngine;
use relay_router::Router;
use relay_spawner::Spawner;
use relay_storage::{DeadLetterStore, MessageStore, StoreBackend};
use relay_sync::SyncQueue;

/// Generic over the storage backend so the dashboard works the same way
/// whether the daemon opened an [`relay_storage::InMemoryBackend`] or a
/// [`relay_storage::RocksDbBackend`] (or, in `relay-daemon`, the `Backend`
/// enum that dispatches between the two at runtime).
pub struct DashboardState<B: StoreBackend> {
    pub router: Arc<Router>,
    pub store: Arc<MessageStore<B>>,
    pub dlq: Arc<DeadLetterStore<B>>,
    pub spawner: Arc<Spawner>,
    pub consensus: Arc<ConsensusEngine>,
    pub sync: Option<Arc<SyncQueue>>,
}

impl<B: StoreBackend> Clone for DashboardState<B> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            store: self.store.clone(),
            dlq: self.dlq.clone(),
            spawner: self.spawner.clone(),
            consensus: self.consensus.clone(),
            sync: self.sync.clone(),
        }
    }
}

impl<B: StoreBackend> DashboardState<B> {
    pub fn new(
        router: Arc<Router>,
        store: Arc<MessageStore<B>>,
        dlq: Arc<DeadLetterStore<B>>,
        spawner: Arc<Spawner>,
        consensus: Arc<ConsensusEngine>,
        sync: Option<Arc<SyncQueue>>,
    ) -> Self {
        Self {
            router,
            store,
            dlq,
            spawner,
            consensus,
            sync,
        }
    }
}
