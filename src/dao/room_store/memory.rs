//! In-process implementation of [`RoomStore`] backed by maps guarded by a single lock.
//!
//! Each trait call takes the lock once, so every call is a transaction. Unique
//! constraints mirror what a relational schema would declare: one shareable
//! link per room, one link per room's songs, one vote per (user, song) and at
//! most one current song per room.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::dao::{
    models::{RoomEntity, RoomId, SongEntity, SongId, SongWrite, UserId, VoteEntity},
    room_store::RoomStore,
    storage::{StorageError, StorageResult},
};

/// Durable store kept in process memory. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, RoomEntity>,
    links: HashMap<String, RoomId>,
    songs: IndexMap<SongId, SongEntity>,
    votes: HashMap<SongId, IndexMap<UserId, VoteEntity>>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn room(&self, id: RoomId) -> StorageResult<&RoomEntity> {
        self.rooms.get(&id).ok_or(StorageError::NotFound {
            resource: "room",
            id,
        })
    }

    fn song(&self, id: SongId) -> StorageResult<&SongEntity> {
        self.songs.get(&id).ok_or(StorageError::NotFound {
            resource: "song",
            id,
        })
    }

    fn check_version(song: &SongEntity, expected: u64) -> StorageResult<()> {
        if song.version != expected {
            return Err(StorageError::Conflict {
                resource: "song",
                id: song.id,
                expected,
                actual: song.version,
            });
        }
        Ok(())
    }

    fn add_member(&mut self, room_id: RoomId, user_id: UserId) -> StorageResult<bool> {
        let room = self.rooms.get_mut(&room_id).ok_or(StorageError::NotFound {
            resource: "room",
            id: room_id,
        })?;
        Ok(room.members.insert(user_id))
    }

    fn set_shareable_link(&mut self, room_id: RoomId, link: String) -> StorageResult<String> {
        if let Some(existing) = self.room(room_id)?.shareable_link.clone() {
            return Ok(existing);
        }
        if self.links.contains_key(&link) {
            return Err(StorageError::Duplicate {
                resource: "room",
                field: "shareable_link",
                value: link,
            });
        }

        self.links.insert(link.clone(), room_id);
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.shareable_link = Some(link.clone());
        }
        Ok(link)
    }

    fn delete_room(&mut self, room_id: RoomId) -> StorageResult<Vec<SongId>> {
        let room = self.rooms.remove(&room_id).ok_or(StorageError::NotFound {
            resource: "room",
            id: room_id,
        })?;
        if let Some(link) = room.shareable_link {
            self.links.remove(&link);
        }

        let song_ids: Vec<SongId> = self
            .songs
            .values()
            .filter(|song| song.room_id == room_id)
            .map(|song| song.id)
            .collect();
        for id in &song_ids {
            self.songs.shift_remove(id);
            self.votes.remove(id);
        }
        Ok(song_ids)
    }

    fn insert_song(&mut self, mut song: SongEntity) -> StorageResult<SongEntity> {
        self.room(song.room_id)?;
        let duplicate = self
            .songs
            .values()
            .any(|other| other.room_id == song.room_id && other.external_link == song.external_link);
        if duplicate {
            return Err(StorageError::Duplicate {
                resource: "song",
                field: "external_link",
                value: song.external_link,
            });
        }
        if song.is_current && self.current_song(song.room_id).is_some() {
            return Err(StorageError::Duplicate {
                resource: "current song",
                field: "room_id",
                value: song.room_id.to_string(),
            });
        }

        song.version = 0;
        self.songs.insert(song.id, song.clone());
        Ok(song)
    }

    fn current_song(&self, room_id: RoomId) -> Option<&SongEntity> {
        self.songs
            .values()
            .find(|song| song.room_id == room_id && song.is_current)
    }

    fn list_songs(&self, room_id: RoomId) -> Vec<SongEntity> {
        self.songs
            .values()
            .filter(|song| song.room_id == room_id)
            .cloned()
            .collect()
    }

    fn commit_song_writes(
        &mut self,
        room_id: RoomId,
        writes: Vec<SongWrite>,
    ) -> StorageResult<Vec<SongEntity>> {
        self.room(room_id)?;

        // Validate the whole batch before touching anything.
        for write in &writes {
            let (id, version) = match write {
                SongWrite::Update { song, .. } => (song.id, song.version),
                SongWrite::Delete { id, version } => (*id, *version),
            };
            let stored = self.song(id)?;
            if stored.room_id != room_id {
                return Err(StorageError::NotFound {
                    resource: "song",
                    id,
                });
            }
            Self::check_version(stored, version)?;
        }

        let mut current_after: Vec<SongId> = self
            .songs
            .values()
            .filter(|song| song.room_id == room_id && song.is_current)
            .map(|song| song.id)
            .collect();
        for write in &writes {
            current_after.retain(|id| *id != write.song_id());
            if let SongWrite::Update { song, .. } = write {
                if song.is_current {
                    current_after.push(song.id);
                }
            }
        }
        if current_after.len() > 1 {
            return Err(StorageError::Duplicate {
                resource: "current song",
                field: "room_id",
                value: room_id.to_string(),
            });
        }

        let mut updated = Vec::with_capacity(writes.len());
        for write in writes {
            match write {
                SongWrite::Update {
                    mut song,
                    clear_votes,
                } => {
                    song.version += 1;
                    if clear_votes {
                        self.votes.remove(&song.id);
                    }
                    self.songs.insert(song.id, song.clone());
                    updated.push(song);
                }
                SongWrite::Delete { id, .. } => {
                    self.songs.shift_remove(&id);
                    self.votes.remove(&id);
                }
            }
        }
        Ok(updated)
    }

    fn commit_vote(&mut self, vote: VoteEntity, expected_version: u64) -> StorageResult<SongEntity> {
        let song = self.song(vote.song_id)?;
        self.room(song.room_id)?;
        Self::check_version(song, expected_version)?;

        let voters = self.votes.entry(vote.song_id).or_default();
        if voters.contains_key(&vote.user_id) {
            return Err(StorageError::Duplicate {
                resource: "vote",
                field: "user_id",
                value: vote.user_id.to_string(),
            });
        }

        let upvote = vote.upvote;
        let song_id = vote.song_id;
        voters.insert(vote.user_id, vote);

        let song = self
            .songs
            .get_mut(&song_id)
            .ok_or(StorageError::NotFound {
                resource: "song",
                id: song_id,
            })?;
        if upvote {
            song.upvotes += 1;
        }
        song.version += 1;
        Ok(song.clone())
    }

    fn count_votes(&self, song_id: SongId) -> u64 {
        self.votes
            .get(&song_id)
            .map(|voters| voters.values().filter(|vote| vote.upvote).count() as u64)
            .unwrap_or(0)
    }
}

impl RoomStore for MemoryRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.write().await;
            if let Some(link) = room.shareable_link.as_ref() {
                if tables.links.contains_key(link) {
                    return Err(StorageError::Duplicate {
                        resource: "room",
                        field: "shareable_link",
                        value: link.clone(),
                    });
                }
                tables.links.insert(link.clone(), room.id);
            }
            tables.rooms.insert(room.id, room);
            Ok(())
        })
    }

    fn find_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.rooms.get(&id).cloned()) })
    }

    fn find_room_by_link(
        &self,
        link: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.read().await;
            Ok(tables
                .links
                .get(&link)
                .and_then(|id| tables.rooms.get(id))
                .cloned())
        })
    }

    fn list_rooms_for_user(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.read().await;
            let mut rooms: Vec<RoomEntity> = tables
                .rooms
                .values()
                .filter(|room| room.is_member(user_id))
                .cloned()
                .collect();
            rooms.sort_by_key(|room| room.created_at);
            Ok(rooms)
        })
    }

    fn add_member(&self, room_id: RoomId, user_id: UserId) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.write().await.add_member(room_id, user_id) })
    }

    fn set_shareable_link(
        &self,
        room_id: RoomId,
        link: String,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.write().await.set_shareable_link(room_id, link) })
    }

    fn delete_room(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<SongId>>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.write().await.delete_room(room_id) })
    }

    fn insert_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<SongEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.write().await.insert_song(song) })
    }

    fn find_song(&self, id: SongId) -> BoxFuture<'static, StorageResult<Option<SongEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.songs.get(&id).cloned()) })
    }

    fn list_songs(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.list_songs(room_id)) })
    }

    fn list_song_ids(&self) -> BoxFuture<'static, StorageResult<Vec<SongId>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.songs.keys().copied().collect()) })
    }

    fn commit_song_writes(
        &self,
        room_id: RoomId,
        writes: Vec<SongWrite>,
    ) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.write().await.commit_song_writes(room_id, writes) })
    }

    fn commit_vote(
        &self,
        vote: VoteEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<SongEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.write().await.commit_vote(vote, expected_version) })
    }

    fn has_vote(&self, song_id: SongId, user_id: UserId) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .votes
                .get(&song_id)
                .is_some_and(|voters| voters.contains_key(&user_id)))
        })
    }

    fn count_votes(&self, song_id: SongId) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.count_votes(song_id)) })
    }

    fn list_voters(&self, song_id: SongId) -> BoxFuture<'static, StorageResult<Vec<UserId>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .votes
                .get(&song_id)
                .map(|voters| voters.keys().copied().collect())
                .unwrap_or_default())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn seeded() -> (MemoryRoomStore, RoomEntity, SongEntity) {
        let store = MemoryRoomStore::new();
        let room = RoomEntity::new("lounge".into(), Uuid::new_v4());
        store.insert_room(room.clone()).await.unwrap();
        let song = store
            .insert_song(SongEntity::queued(
                room.id,
                room.creator_id,
                "https://youtu.be/abc".into(),
                "abc".into(),
                "Song".into(),
                0,
                1,
            ))
            .await
            .unwrap();
        (store, room, song)
    }

    #[tokio::test]
    async fn duplicate_link_in_room_is_rejected() {
        let (store, room, song) = seeded().await;
        let err = store
            .insert_song(SongEntity::queued(
                room.id,
                room.creator_id,
                song.external_link.clone(),
                "abc".into(),
                "Again".into(),
                1,
                2,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { field: "external_link", .. }));
    }

    #[tokio::test]
    async fn commit_vote_is_unique_per_user_and_bumps_version() {
        let (store, _room, song) = seeded().await;
        let user = Uuid::new_v4();

        let updated = store
            .commit_vote(VoteEntity::upvote(song.id, user), song.version)
            .await
            .unwrap();
        assert_eq!(updated.upvotes, 1);
        assert_eq!(updated.version, song.version + 1);

        let err = store
            .commit_vote(VoteEntity::upvote(song.id, user), updated.version)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { resource: "vote", .. }));
        assert_eq!(store.count_votes(song.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn non_upvote_records_hold_the_voter_slot_without_counting() {
        let (store, _room, song) = seeded().await;
        let user = Uuid::new_v4();
        let vote = VoteEntity {
            upvote: false,
            ..VoteEntity::upvote(song.id, user)
        };

        let updated = store.commit_vote(vote, song.version).await.unwrap();
        assert_eq!(updated.upvotes, 0);
        assert_eq!(store.count_votes(song.id).await.unwrap(), 0);
        assert!(store.has_vote(song.id, user).await.unwrap());
        assert_eq!(store.list_voters(song.id).await.unwrap(), vec![user]);

        let err = store
            .commit_vote(VoteEntity::upvote(song.id, user), updated.version)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { resource: "vote", .. }));
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let (store, _room, song) = seeded().await;
        store
            .commit_vote(VoteEntity::upvote(song.id, Uuid::new_v4()), song.version)
            .await
            .unwrap();

        let err = store
            .commit_vote(VoteEntity::upvote(song.id, Uuid::new_v4()), song.version)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let (store, room, song) = seeded().await;
        let other = store
            .insert_song(SongEntity::queued(
                room.id,
                room.creator_id,
                "https://youtu.be/def".into(),
                "def".into(),
                "Other".into(),
                1,
                2,
            ))
            .await
            .unwrap();

        let mut first = song.clone();
        first.title = "renamed".into();
        let mut stale = other.clone();
        stale.version += 7;

        let err = store
            .commit_song_writes(
                room.id,
                vec![
                    SongWrite::Update {
                        song: first,
                        clear_votes: false,
                    },
                    SongWrite::Update {
                        song: stale,
                        clear_votes: false,
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        let untouched = store.find_song(song.id).await.unwrap().unwrap();
        assert_eq!(untouched.title, "Song");
    }

    #[tokio::test]
    async fn two_current_songs_are_rejected() {
        let (store, room, song) = seeded().await;
        let other = store
            .insert_song(SongEntity::queued(
                room.id,
                room.creator_id,
                "https://youtu.be/def".into(),
                "def".into(),
                "Other".into(),
                1,
                2,
            ))
            .await
            .unwrap();

        let promote = |mut s: SongEntity| {
            s.is_current = true;
            s.queue_position = None;
            SongWrite::Update {
                song: s,
                clear_votes: false,
            }
        };
        let err = store
            .commit_song_writes(room.id, vec![promote(song), promote(other)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { resource: "current song", .. }));
    }

    #[tokio::test]
    async fn deleting_room_cascades() {
        let (store, room, song) = seeded().await;
        store
            .commit_vote(VoteEntity::upvote(song.id, room.creator_id), song.version)
            .await
            .unwrap();
        let link = store
            .set_shareable_link(room.id, "token".into())
            .await
            .unwrap();

        let deleted = store.delete_room(room.id).await.unwrap();
        assert_eq!(deleted, vec![song.id]);
        assert!(store.find_song(song.id).await.unwrap().is_none());
        assert_eq!(store.count_votes(song.id).await.unwrap(), 0);
        assert!(store.find_room_by_link(link).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn shareable_link_is_stable_once_set() {
        let (store, room, _song) = seeded().await;
        let first = store
            .set_shareable_link(room.id, "first".into())
            .await
            .unwrap();
        let second = store
            .set_shareable_link(room.id, "second".into())
            .await
            .unwrap();
        assert_eq!(first, "first");
        assert_eq!(second, "first");
    }
}
