pub mod hub;
pub mod locks;
pub mod queue;
pub mod sessions;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{
        models::SongId,
        room_store::{MemoryRoomStore, RoomStore},
        vote_cache::{MemoryVoteCache, VoteCache},
    },
    services::{
        metadata::{LinkOnlyResolver, MetadataResolver},
        queue_manager::QueueManager,
        vote_cache_sync::VoteCacheSync,
        vote_coordinator::VoteCoordinator,
        vote_ledger::VoteLedger,
    },
};

pub use self::hub::RoomHub;
pub use self::sessions::SessionRegistry;
use self::locks::KeyedLocks;

pub type SharedState = Arc<AppState>;

/// Central application state wiring the storage collaborators to the vote engine.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn RoomStore>,
    ledger: VoteLedger,
    vote_cache: VoteCacheSync,
    hub: Arc<RoomHub>,
    sessions: SessionRegistry,
    queue: Arc<QueueManager>,
    votes: Arc<VoteCoordinator>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RoomStore>,
        cache: Arc<dyn VoteCache>,
        resolver: Arc<dyn MetadataResolver>,
    ) -> SharedState {
        let ledger = VoteLedger::new(cache, config.vote_cache_ttl());
        let hub = Arc::new(RoomHub::new(config.event_channel_capacity));
        let song_locks: Arc<KeyedLocks<SongId>> = Arc::new(KeyedLocks::new());
        let vote_cache =
            VoteCacheSync::new(store.clone(), ledger.clone(), song_locks.clone(), &config);

        let queue = Arc::new(QueueManager::new(
            store.clone(),
            vote_cache.clone(),
            hub.clone(),
            resolver,
            song_locks.clone(),
            &config,
        ));
        let votes = Arc::new(VoteCoordinator::new(
            store.clone(),
            ledger.clone(),
            vote_cache.clone(),
            song_locks,
            queue.clone(),
            &config,
        ));

        Arc::new(Self {
            config,
            store,
            ledger,
            vote_cache,
            hub,
            sessions: SessionRegistry::new(),
            queue,
            votes,
        })
    }

    /// State backed by the in-process store and cache, resolving links without network calls.
    pub fn in_memory(config: AppConfig) -> SharedState {
        Self::new(
            config,
            Arc::new(MemoryRoomStore::new()),
            Arc::new(MemoryVoteCache::new()),
            Arc::new(LinkOnlyResolver),
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Durable store for rooms, songs and votes.
    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    /// Typed access to the vote cache.
    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    /// Clears, warm-ups and repairs of the vote cache.
    pub fn vote_cache(&self) -> &VoteCacheSync {
        &self.vote_cache
    }

    /// Per-room event channels.
    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    /// Live sessions per room.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn queue(&self) -> &Arc<QueueManager> {
        &self.queue
    }

    pub fn votes(&self) -> &Arc<VoteCoordinator> {
        &self.votes
    }
}
