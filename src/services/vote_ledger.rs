use std::{collections::HashSet, sync::Arc, time::Duration};

use crate::dao::{
    models::{SongId, UserId},
    storage::CacheResult,
    vote_cache::VoteCache,
};

const COUNT_KEY_PREFIX: &str = "song:votes:count:";
const VOTERS_KEY_PREFIX: &str = "song:votes:users:";

/// Typed view over the vote cache: one counter and one voter set per song.
#[derive(Clone)]
pub struct VoteLedger {
    cache: Arc<dyn VoteCache>,
    ttl: Duration,
}

impl VoteLedger {
    pub fn new(cache: Arc<dyn VoteCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn count_key(song_id: SongId) -> String {
        format!("{COUNT_KEY_PREFIX}{song_id}")
    }

    pub fn voters_key(song_id: SongId) -> String {
        format!("{VOTERS_KEY_PREFIX}{song_id}")
    }

    /// Record `user_id` as a voter; `false` means the cache already had it.
    pub async fn claim(&self, song_id: SongId, user_id: UserId) -> CacheResult<bool> {
        self.cache
            .set_add(Self::voters_key(song_id), user_id.to_string(), self.ttl)
            .await
    }

    /// Undo a [`claim`](Self::claim) whose durable write did not happen.
    pub async fn release(&self, song_id: SongId, user_id: UserId) -> CacheResult<bool> {
        self.cache
            .set_remove(Self::voters_key(song_id), user_id.to_string())
            .await
    }

    pub async fn has_voter(&self, song_id: SongId, user_id: UserId) -> CacheResult<bool> {
        self.cache
            .set_is_member(Self::voters_key(song_id), user_id.to_string())
            .await
    }

    /// Cached voter set of the song, as stored member strings.
    pub async fn voters(&self, song_id: SongId) -> CacheResult<HashSet<String>> {
        let members = self.cache.set_members(Self::voters_key(song_id)).await?;
        Ok(members.into_iter().collect())
    }

    pub async fn count(&self, song_id: SongId) -> CacheResult<Option<i64>> {
        self.cache.get_counter(Self::count_key(song_id)).await
    }

    pub async fn set_count(&self, song_id: SongId, value: u64) -> CacheResult<()> {
        self.cache
            .set_counter(Self::count_key(song_id), value as i64, self.ttl)
            .await
    }

    /// Add one vote to the cached counter and return the cache's new value.
    pub async fn bump_count(&self, song_id: SongId) -> CacheResult<i64> {
        self.cache.incr_counter(Self::count_key(song_id), self.ttl).await
    }

    /// Replace both cache entries of the song with the given durable state.
    pub async fn overwrite(&self, song_id: SongId, count: u64, voters: &[UserId]) -> CacheResult<()> {
        let members = voters.iter().map(UserId::to_string).collect();
        self.cache
            .set_replace(Self::voters_key(song_id), members, self.ttl)
            .await?;
        self.set_count(song_id, count).await
    }

    /// Drop both cache entries of the song. Clearing absent keys is fine.
    pub async fn clear(&self, song_id: SongId) -> CacheResult<()> {
        self.cache.delete(Self::count_key(song_id)).await?;
        self.cache.delete(Self::voters_key(song_id)).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> CacheResult<()> {
        self.cache.health_check().await
    }
}
