pub mod memory;

use crate::dao::models::{RoomEntity, RoomId, SongEntity, SongId, SongWrite, UserId, VoteEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

pub use memory::MemoryRoomStore;

/// Authoritative, transactional persistence for rooms, songs and votes.
///
/// Every method is atomic on its own. Song writes carry the version the
/// caller read and fail with [`StorageError::Conflict`] when it moved.
///
/// [`StorageError::Conflict`]: crate::dao::storage::StorageError::Conflict
pub trait RoomStore: Send + Sync {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    fn find_room_by_link(
        &self,
        link: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    fn list_rooms_for_user(&self, user_id: UserId)
    -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>>;
    /// Add `user_id` to the room members, returning whether it was newly added.
    fn add_member(&self, room_id: RoomId, user_id: UserId) -> BoxFuture<'static, StorageResult<bool>>;
    /// Store `link` unless the room already has one; returns the link now in effect.
    fn set_shareable_link(
        &self,
        room_id: RoomId,
        link: String,
    ) -> BoxFuture<'static, StorageResult<String>>;
    /// Delete the room with its songs, votes and memberships, returning the deleted song ids.
    fn delete_room(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<SongId>>>;

    /// Insert a new song; rejects a link already present in the same room.
    fn insert_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<SongEntity>>;
    fn find_song(&self, id: SongId) -> BoxFuture<'static, StorageResult<Option<SongEntity>>>;
    fn list_songs(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>>;
    fn list_song_ids(&self) -> BoxFuture<'static, StorageResult<Vec<SongId>>>;
    /// Apply every write of the batch or none of them.
    fn commit_song_writes(
        &self,
        room_id: RoomId,
        writes: Vec<SongWrite>,
    ) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>>;

    /// Record `vote` and increment the song counter in one transaction.
    ///
    /// Fails with `Conflict` when the song version is not `expected_version` and
    /// with `Duplicate` when the user already holds a vote on the song.
    fn commit_vote(
        &self,
        vote: VoteEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<SongEntity>>;
    fn has_vote(&self, song_id: SongId, user_id: UserId) -> BoxFuture<'static, StorageResult<bool>>;
    fn count_votes(&self, song_id: SongId) -> BoxFuture<'static, StorageResult<u64>>;
    fn list_voters(&self, song_id: SongId) -> BoxFuture<'static, StorageResult<Vec<UserId>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
