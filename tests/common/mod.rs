#![allow(dead_code)]

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use jukebox_back::{
    config::{AppConfig, RetryConfig},
    dao::{
        models::{RoomEntity, RoomId, SongEntity, SongId, SongWrite, UserId, VoteEntity},
        room_store::{MemoryRoomStore, RoomStore},
        storage::{CacheError, CacheResult, StorageError, StorageResult},
        vote_cache::{MemoryVoteCache, VoteCache},
    },
    services::{metadata::LinkOnlyResolver, room_service},
    state::{AppState, SharedState},
};
use uuid::Uuid;

/// Configuration with short backoffs so retry paths stay fast.
pub fn test_config() -> AppConfig {
    AppConfig {
        vote_retry: RetryConfig {
            max_attempts: 4,
            initial_backoff_ms: 1,
            multiplier: 2,
            max_backoff_ms: 5,
        },
        vote_timeout_ms: 2_000,
        ..AppConfig::default()
    }
}

pub fn memory_state() -> SharedState {
    AppState::in_memory(test_config())
}

pub fn state_with(store: Arc<dyn RoomStore>, cache: Arc<dyn VoteCache>) -> SharedState {
    AppState::new(test_config(), store, cache, Arc::new(LinkOnlyResolver))
}

/// A room created by a fresh user, joined by `guests` more users.
pub struct Fixture {
    pub room: RoomEntity,
    pub creator: UserId,
    pub guests: Vec<UserId>,
}

pub async fn room_with_guests(state: &SharedState, guests: usize) -> Fixture {
    let creator = Uuid::new_v4();
    let room = room_service::create_room(state, "listening room".into(), creator)
        .await
        .unwrap();
    let token = room_service::generate_shareable_link(state, room.id, creator)
        .await
        .unwrap();

    let mut joined = Vec::with_capacity(guests);
    for _ in 0..guests {
        let guest = Uuid::new_v4();
        room_service::join_room(state, &token, guest).await.unwrap();
        joined.push(guest);
    }

    Fixture {
        room,
        creator,
        guests: joined,
    }
}

pub async fn add_song(state: &SharedState, room_id: RoomId, user_id: UserId, video: &str) -> SongId {
    state
        .queue()
        .add_song(room_id, user_id, format!("https://youtu.be/{video}"))
        .await
        .unwrap()
        .id
}

pub async fn song(state: &SharedState, song_id: SongId) -> SongEntity {
    state.store().find_song(song_id).await.unwrap().unwrap()
}

/// Non-current positions of the room, sorted.
pub async fn queued_positions(state: &SharedState, room_id: RoomId) -> Vec<u32> {
    let mut positions: Vec<u32> = state
        .store()
        .list_songs(room_id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|song| song.queue_position)
        .collect();
    positions.sort_unstable();
    positions
}

pub async fn current_count(state: &SharedState, room_id: RoomId) -> usize {
    state
        .store()
        .list_songs(room_id)
        .await
        .unwrap()
        .iter()
        .filter(|song| song.is_current)
        .count()
}

/// Cache whose every call fails, as if the cache server were unreachable.
pub struct FailingCache;

fn cache_down<T: Send + 'static>() -> BoxFuture<'static, CacheResult<T>> {
    Box::pin(async { Err(CacheError::unavailable("cache is down")) })
}

impl VoteCache for FailingCache {
    fn get_counter(&self, _key: String) -> BoxFuture<'static, CacheResult<Option<i64>>> {
        cache_down()
    }
    fn set_counter(&self, _key: String, _value: i64, _ttl: Duration) -> BoxFuture<'static, CacheResult<()>> {
        cache_down()
    }
    fn incr_counter(&self, _key: String, _ttl: Duration) -> BoxFuture<'static, CacheResult<i64>> {
        cache_down()
    }
    fn delete(&self, _key: String) -> BoxFuture<'static, CacheResult<bool>> {
        cache_down()
    }
    fn set_add(&self, _key: String, _member: String, _ttl: Duration) -> BoxFuture<'static, CacheResult<bool>> {
        cache_down()
    }
    fn set_remove(&self, _key: String, _member: String) -> BoxFuture<'static, CacheResult<bool>> {
        cache_down()
    }
    fn set_is_member(&self, _key: String, _member: String) -> BoxFuture<'static, CacheResult<bool>> {
        cache_down()
    }
    fn set_members(&self, _key: String) -> BoxFuture<'static, CacheResult<Vec<String>>> {
        cache_down()
    }
    fn set_replace(
        &self,
        _key: String,
        _members: Vec<String>,
        _ttl: Duration,
    ) -> BoxFuture<'static, CacheResult<()>> {
        cache_down()
    }
    fn health_check(&self) -> BoxFuture<'static, CacheResult<()>> {
        cache_down()
    }
}

/// In-memory store with switches to inject vote write failures.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryRoomStore,
    /// Number of upcoming `commit_vote` calls that fail with a version conflict.
    pub vote_conflicts: Arc<AtomicU32>,
    /// While set, vote reads and writes fail as unavailable.
    pub votes_down: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn outage() -> StorageError {
        StorageError::unavailable(
            "vote table unreachable".into(),
            io::Error::new(io::ErrorKind::ConnectionRefused, "injected"),
        )
    }
}

impl RoomStore for FlakyStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_room(room)
    }
    fn find_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.inner.find_room(id)
    }
    fn find_room_by_link(&self, link: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.inner.find_room_by_link(link)
    }
    fn list_rooms_for_user(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        self.inner.list_rooms_for_user(user_id)
    }
    fn add_member(&self, room_id: RoomId, user_id: UserId) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.add_member(room_id, user_id)
    }
    fn set_shareable_link(&self, room_id: RoomId, link: String) -> BoxFuture<'static, StorageResult<String>> {
        self.inner.set_shareable_link(room_id, link)
    }
    fn delete_room(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<SongId>>> {
        self.inner.delete_room(room_id)
    }
    fn insert_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<SongEntity>> {
        self.inner.insert_song(song)
    }
    fn find_song(&self, id: SongId) -> BoxFuture<'static, StorageResult<Option<SongEntity>>> {
        self.inner.find_song(id)
    }
    fn list_songs(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>> {
        self.inner.list_songs(room_id)
    }
    fn list_song_ids(&self) -> BoxFuture<'static, StorageResult<Vec<SongId>>> {
        self.inner.list_song_ids()
    }
    fn commit_song_writes(
        &self,
        room_id: RoomId,
        writes: Vec<SongWrite>,
    ) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>> {
        self.inner.commit_song_writes(room_id, writes)
    }
    fn commit_vote(&self, vote: VoteEntity, expected_version: u64) -> BoxFuture<'static, StorageResult<SongEntity>> {
        if self.votes_down.load(Ordering::SeqCst) {
            return Box::pin(async { Err(Self::outage()) });
        }
        let injected = self
            .vote_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            let song_id = vote.song_id;
            return Box::pin(async move {
                Err(StorageError::Conflict {
                    resource: "song",
                    id: song_id,
                    expected: expected_version,
                    actual: expected_version + 1,
                })
            });
        }
        self.inner.commit_vote(vote, expected_version)
    }
    fn has_vote(&self, song_id: SongId, user_id: UserId) -> BoxFuture<'static, StorageResult<bool>> {
        if self.votes_down.load(Ordering::SeqCst) {
            return Box::pin(async { Err(Self::outage()) });
        }
        self.inner.has_vote(song_id, user_id)
    }
    fn count_votes(&self, song_id: SongId) -> BoxFuture<'static, StorageResult<u64>> {
        self.inner.count_votes(song_id)
    }
    fn list_voters(&self, song_id: SongId) -> BoxFuture<'static, StorageResult<Vec<UserId>>> {
        self.inner.list_voters(song_id)
    }
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }
}

pub fn memory_cache() -> Arc<MemoryVoteCache> {
    Arc::new(MemoryVoteCache::new())
}
