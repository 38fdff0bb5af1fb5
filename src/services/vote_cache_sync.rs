//! Keeps the vote cache entries of a song in line with the durable store.
//!
//! Shared by the queue manager, the vote coordinator and room teardown so
//! that every clear, warm-up and repair of the cache goes through one place.

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    dao::{
        models::{SongId, UserId},
        room_store::RoomStore,
        storage::CacheResult,
    },
    error::ServiceError,
    services::vote_ledger::VoteLedger,
    state::locks::KeyedLocks,
};

#[derive(Clone)]
pub struct VoteCacheSync {
    store: Arc<dyn RoomStore>,
    ledger: VoteLedger,
    song_locks: Arc<KeyedLocks<SongId>>,
    lock_timeout: Duration,
}

impl VoteCacheSync {
    pub fn new(
        store: Arc<dyn RoomStore>,
        ledger: VoteLedger,
        song_locks: Arc<KeyedLocks<SongId>>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            song_locks,
            lock_timeout: config.vote_timeout(),
        }
    }

    /// Purge the cached counter and voter set of a song. Clearing twice is fine.
    ///
    /// A failure only leaves stale entries behind, which reconciliation
    /// overwrites later.
    pub async fn clear_vote_cache(&self, song_id: SongId) {
        match self.ledger.clear(song_id).await {
            Ok(()) => debug!(song_id = %song_id, "vote cache cleared"),
            Err(err) => warn!(song_id = %song_id, error = %err, "failed to clear vote cache"),
        }
    }

    /// Seed the cache entries of a song from the store, under the song lock.
    pub async fn warm_vote_cache(&self, song_id: SongId) -> Result<(), ServiceError> {
        let _guard = timeout(self.lock_timeout, self.song_locks.lock(song_id))
            .await
            .map_err(|_| ServiceError::Timeout)?;
        let count = self.store.count_votes(song_id).await?;
        let voters = self.store.list_voters(song_id).await?;
        self.ledger
            .overwrite(song_id, count, &voters)
            .await
            .map_err(|err| {
                warn!(song_id = %song_id, error = %err, "failed to warm vote cache");
                ServiceError::Degraded
            })
    }

    /// Overwrite the cache entries when they differ from `count` and `voters`.
    /// Returns whether anything was rewritten. Caller holds the song lock.
    pub(crate) async fn repair(
        &self,
        song_id: SongId,
        count: u64,
        voters: &[UserId],
    ) -> CacheResult<bool> {
        let cached_count = self.ledger.count(song_id).await?;
        let cached_voters = self.ledger.voters(song_id).await?;
        let durable_voters: HashSet<String> = voters.iter().map(ToString::to_string).collect();

        if cached_count.unwrap_or(0) == count as i64 && cached_voters == durable_voters {
            return Ok(false);
        }

        debug!(
            song_id = %song_id,
            cached = ?cached_count,
            cached_voters = cached_voters.len(),
            actual = count,
            "vote cache drifted; overwriting from store"
        );
        self.ledger.overwrite(song_id, count, voters).await?;
        Ok(true)
    }
}
