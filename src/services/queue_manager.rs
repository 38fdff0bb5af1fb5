//! Queue ordering and current-song transitions for every room.
//!
//! Each transition runs under the room lock, plans against a fresh snapshot
//! of the room's songs, then commits the planned rows atomically while holding
//! the song locks of every row it writes. Votes only ever hold a song lock, so
//! a vote and a transition touching the same song are strictly ordered, and
//! the version check on commit catches anything read before the locks were
//! taken. A conflicting commit is re-planned from scratch.

use std::{sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dao::{
        models::{RoomEntity, RoomId, SongEntity, SongId, SongWrite, UserId},
        room_store::RoomStore,
    },
    dto::song::SongEndedResponse,
    error::ServiceError,
    services::{
        metadata::MetadataResolver, retry::RetryPolicy, room_events,
        vote_cache_sync::VoteCacheSync,
    },
    state::{
        hub::Broadcaster,
        locks::{KeyedGuard, KeyedLocks},
        queue::{self, QueueEvent, QueuePlan},
    },
};

pub struct QueueManager {
    store: Arc<dyn RoomStore>,
    vote_cache: VoteCacheSync,
    hub: Arc<dyn Broadcaster>,
    resolver: Arc<dyn MetadataResolver>,
    room_locks: KeyedLocks<RoomId>,
    song_locks: Arc<KeyedLocks<SongId>>,
    retry: RetryPolicy,
    lock_timeout: Duration,
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn RoomStore>,
        vote_cache: VoteCacheSync,
        hub: Arc<dyn Broadcaster>,
        resolver: Arc<dyn MetadataResolver>,
        song_locks: Arc<KeyedLocks<SongId>>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            vote_cache,
            hub,
            resolver,
            room_locks: KeyedLocks::new(),
            song_locks,
            retry: config.vote_retry.into(),
            lock_timeout: config.vote_timeout(),
        }
    }

    /// Queue `external_link` at the tail of the room after resolving its metadata.
    pub async fn add_song(
        &self,
        room_id: RoomId,
        user_id: UserId,
        external_link: String,
    ) -> Result<SongEntity, ServiceError> {
        let room = self.require_room(room_id).await?;
        if !room.is_member(user_id) {
            return Err(ServiceError::NotAMember);
        }

        // Resolved before taking the room lock: the provider may be slow.
        let metadata = self.resolver.resolve(external_link.clone()).await?;
        if !metadata.available {
            return Err(ServiceError::InvalidInput(format!(
                "video `{}` is not available",
                metadata.video_id
            )));
        }

        let _room_guard = self.lock_room(room_id).await?;
        let songs = self.store.list_songs(room_id).await?;
        if songs.iter().any(|song| song.external_link == external_link) {
            return Err(ServiceError::InvalidState(
                "a song with the same link already exists in this room".into(),
            ));
        }

        let enqueued_seq = songs.iter().map(|song| song.enqueued_seq).max().unwrap_or(0) + 1;
        let queue_position = songs.iter().filter(|song| !song.is_current).count() as u32;
        let song = self
            .store
            .insert_song(SongEntity::queued(
                room_id,
                user_id,
                external_link,
                metadata.video_id,
                metadata.title,
                queue_position,
                enqueued_seq,
            ))
            .await?;
        info!(room_id = %room_id, song_id = %song.id, title = %song.title, "song added");

        // Votes can reach the song from here on; warming waits for its lock.
        if let Err(err) = self.vote_cache.warm_vote_cache(song.id).await {
            warn!(song_id = %song.id, error = %err, "vote cache left cold for new song");
        }

        let plan = self
            .retry
            .run("add_song", |_| self.apply(room_id, QueueEvent::Rerank))
            .await?;
        self.publish(room_id, &plan);

        Ok(plan
            .ordered
            .iter()
            .find(|queued| queued.id == song.id)
            .cloned()
            .unwrap_or(song))
    }

    /// Recompute queue positions from the current vote counts and broadcast the order.
    pub async fn rerank(&self, room_id: RoomId) -> Result<Vec<SongEntity>, ServiceError> {
        let plan = self.transition(room_id, QueueEvent::Rerank).await?;
        Ok(plan.ordered)
    }

    /// Recycle the finished song and promote the most voted queued song.
    pub async fn song_ended(
        &self,
        room_id: RoomId,
        song_id: SongId,
    ) -> Result<SongEndedResponse, ServiceError> {
        self.require_room(room_id).await?;
        let plan = self.transition(room_id, QueueEvent::SongEnded(song_id)).await?;
        info!(
            room_id = %room_id,
            ended = %song_id,
            next = ?plan.current_after,
            "song ended"
        );
        Ok(room_events::broadcast_song_ended(
            self.hub.as_ref(),
            room_id,
            song_id,
            &plan.ordered,
        ))
    }

    /// Force `song_id` to play now. Creator only.
    pub async fn play_now(
        &self,
        song_id: SongId,
        requester: UserId,
    ) -> Result<SongEntity, ServiceError> {
        let (_, room) = self.require_creator(song_id, requester).await?;
        let plan = self.transition(room.id, QueueEvent::PlayNow(song_id)).await?;
        current_of(plan)
    }

    /// Pick the next song by hand, keeping vote counts. Creator only.
    pub async fn set_current(
        &self,
        song_id: SongId,
        requester: UserId,
    ) -> Result<SongEntity, ServiceError> {
        let (_, room) = self.require_creator(song_id, requester).await?;
        let plan = self.transition(room.id, QueueEvent::SetCurrent(song_id)).await?;
        current_of(plan)
    }

    /// Delete a queued song and its votes. Creator only.
    pub async fn remove_song(&self, song_id: SongId, requester: UserId) -> Result<(), ServiceError> {
        let (_, room) = self.require_creator(song_id, requester).await?;
        self.transition(room.id, QueueEvent::Remove(song_id)).await?;
        info!(room_id = %room.id, song_id = %song_id, "song removed");
        Ok(())
    }

    /// Drop every vote of the room and re-rank by entry order.
    pub async fn reset_votes(&self, room_id: RoomId) -> Result<Vec<SongEntity>, ServiceError> {
        let plan = self.transition(room_id, QueueEvent::ResetVotes).await?;
        info!(room_id = %room_id, songs = plan.ordered.len(), "room votes reset");
        Ok(plan.ordered)
    }

    /// Room songs in display order: current song first, then the ranked queue.
    pub async fn ordered_songs(&self, room_id: RoomId) -> Result<Vec<SongEntity>, ServiceError> {
        self.require_room(room_id).await?;
        let songs = self.store.list_songs(room_id).await?;
        Ok(queue::plan(&songs, QueueEvent::Rerank)?.ordered)
    }

    async fn transition(&self, room_id: RoomId, event: QueueEvent) -> Result<QueuePlan, ServiceError> {
        let _room_guard = self.lock_room(room_id).await?;
        let plan = self
            .retry
            .run(label(event), |_| self.apply(room_id, event))
            .await?;
        self.publish(room_id, &plan);
        Ok(plan)
    }

    /// One planning and commit attempt. Caller holds the room lock.
    async fn apply(&self, room_id: RoomId, event: QueueEvent) -> Result<QueuePlan, ServiceError> {
        let songs = self.store.list_songs(room_id).await?;
        let plan = queue::plan(&songs, event)?;
        if plan.is_noop() {
            return Ok(plan);
        }

        let touched: Vec<SongId> = plan.writes.iter().map(SongWrite::song_id).collect();
        let _song_guards = timeout(self.lock_timeout, self.song_locks.lock_many(touched))
            .await
            .map_err(|_| ServiceError::Timeout)?;

        let committed = self
            .store
            .commit_song_writes(room_id, plan.writes.clone())
            .await?;
        for song_id in &plan.cleared {
            self.vote_cache.clear_vote_cache(*song_id).await;
        }
        debug!(room_id = %room_id, ?event, writes = committed.len(), "queue transition committed");
        Ok(plan.with_committed(committed))
    }

    fn publish(&self, room_id: RoomId, plan: &QueuePlan) {
        room_events::broadcast_songs(self.hub.as_ref(), room_id, &plan.ordered);
        if plan.current_changed() {
            room_events::broadcast_current_song(self.hub.as_ref(), room_id, plan.current());
        }
    }

    async fn lock_room(&self, room_id: RoomId) -> Result<KeyedGuard<RoomId>, ServiceError> {
        timeout(self.lock_timeout, self.room_locks.lock(room_id))
            .await
            .map_err(|_| ServiceError::Timeout)
    }

    async fn require_room(&self, room_id: RoomId) -> Result<RoomEntity, ServiceError> {
        self.store
            .find_room(room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}`")))
    }

    async fn require_creator(
        &self,
        song_id: SongId,
        requester: UserId,
    ) -> Result<(SongEntity, RoomEntity), ServiceError> {
        let song = self
            .store
            .find_song(song_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("song `{song_id}`")))?;
        let room = self.require_room(song.room_id).await?;
        if !room.is_creator(requester) {
            return Err(ServiceError::Forbidden(
                "only the room creator can change what is playing".into(),
            ));
        }
        Ok((song, room))
    }
}

fn current_of(plan: QueuePlan) -> Result<SongEntity, ServiceError> {
    plan.current()
        .cloned()
        .ok_or_else(|| ServiceError::InvalidState("no song is playing".into()))
}

fn label(event: QueueEvent) -> &'static str {
    match event {
        QueueEvent::Rerank => "rerank",
        QueueEvent::SongEnded(_) => "song_ended",
        QueueEvent::PlayNow(_) => "play_now",
        QueueEvent::SetCurrent(_) => "set_current",
        QueueEvent::Remove(_) => "remove_song",
        QueueEvent::ResetVotes => "reset_votes",
    }
}
