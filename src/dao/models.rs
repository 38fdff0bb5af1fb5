use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Identifier of a room.
pub type RoomId = Uuid;
/// Identifier of a song queued in a room.
pub type SongId = Uuid;
/// Identifier of a user, issued by the authentication layer.
pub type UserId = Uuid;
/// Identifier of a single vote record.
pub type VoteId = Uuid;

/// Listening room persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: RoomId,
    /// Display name chosen by the creator.
    pub name: String,
    /// User who created (and owns) the room.
    pub creator_id: UserId,
    /// Users who joined the room, in join order. The creator is always first.
    pub members: IndexSet<UserId>,
    /// Token used to join the room. Once set it never changes.
    pub shareable_link: Option<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl RoomEntity {
    /// Build a fresh room with its creator already joined.
    pub fn new(name: String, creator_id: UserId) -> Self {
        let mut members = IndexSet::new();
        members.insert(creator_id);
        Self {
            id: Uuid::new_v4(),
            name,
            creator_id,
            members,
            shareable_link: None,
            created_at: SystemTime::now(),
        }
    }

    /// Whether `user_id` joined the room.
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Whether `user_id` created the room.
    pub fn is_creator(&self, user_id: UserId) -> bool {
        self.creator_id == user_id
    }
}

/// Song queued in a room.
///
/// `queue_position` is `None` exactly when `is_current` is set. `version` is
/// bumped by the store on every write and is checked on the next one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongEntity {
    /// Primary key of the song.
    pub id: SongId,
    /// Room owning the song.
    pub room_id: RoomId,
    /// User who added the song.
    pub added_by: UserId,
    /// Link as submitted by the user; unique per room.
    pub external_link: String,
    /// Identifier extracted from the link by the metadata resolver.
    pub video_id: String,
    /// Title resolved from the metadata provider.
    pub title: String,
    /// Denormalized number of committed votes.
    pub upvotes: u32,
    /// Whether the song is the one currently playing.
    pub is_current: bool,
    /// Dense rank among non-current songs of the room.
    pub queue_position: Option<u32>,
    /// Room-local sequence number of the last time the song entered the queue.
    pub enqueued_seq: u64,
    /// Optimistic concurrency token.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl SongEntity {
    /// Build a song entering the queue of `room_id` with no votes.
    pub fn queued(
        room_id: RoomId,
        added_by: UserId,
        external_link: String,
        video_id: String,
        title: String,
        queue_position: u32,
        enqueued_seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            added_by,
            external_link,
            video_id,
            title,
            upvotes: 0,
            is_current: false,
            queue_position: Some(queue_position),
            enqueued_seq,
            version: 0,
            created_at: SystemTime::now(),
        }
    }
}

/// A single user's vote on a song.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Primary key of the vote.
    pub id: VoteId,
    /// Voting user.
    pub user_id: UserId,
    /// Song voted for.
    pub song_id: SongId,
    /// Polarity of the vote. Only upvotes move the counter; any record,
    /// whatever its polarity, uses up the user's single vote on the song.
    /// Rooms only cast upvotes today.
    pub upvote: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl VoteEntity {
    /// Build an upvote from `user_id` on `song_id`.
    pub fn upvote(song_id: SongId, user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            song_id,
            upvote: true,
            created_at: SystemTime::now(),
        }
    }
}

/// One write inside an atomic batch applied to the songs of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongWrite {
    /// Replace the stored row with `song`. `song.version` must match the stored
    /// version; when `clear_votes` is set the song's vote records are deleted too.
    Update { song: SongEntity, clear_votes: bool },
    /// Delete the song and its votes, provided its stored version is `version`.
    Delete { id: SongId, version: u64 },
}

impl SongWrite {
    /// Identifier of the song touched by this write.
    pub fn song_id(&self) -> SongId {
        match self {
            SongWrite::Update { song, .. } => song.id,
            SongWrite::Delete { id, .. } => *id,
        }
    }
}
