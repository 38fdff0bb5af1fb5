use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::SongEntity;
use crate::dto::format_system_time;

/// Song as shown to room members.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct SongSummary {
    pub id: Uuid,
    pub room_id: Uuid,
    pub added_by: Uuid,
    pub external_link: String,
    pub video_id: String,
    pub title: String,
    pub upvotes: u32,
    pub is_current: bool,
    /// Rank in the queue; absent for the current song.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<SongEntity> for SongSummary {
    fn from(song: SongEntity) -> Self {
        Self {
            id: song.id,
            room_id: song.room_id,
            added_by: song.added_by,
            external_link: song.external_link,
            video_id: song.video_id,
            title: song.title,
            upvotes: song.upvotes,
            is_current: song.is_current,
            queue_position: song.queue_position,
            created_at: format_system_time(song.created_at),
        }
    }
}

/// Payload used to queue a new song in a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddSongRequest {
    #[validate(url)]
    pub external_link: String,
}

/// Result of a successful vote.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    pub song_id: Uuid,
    pub upvotes: u32,
}

/// Whether the caller already voted for a song.
#[derive(Debug, Serialize, ToSchema)]
pub struct HasVotedResponse {
    pub song_id: Uuid,
    pub has_voted: bool,
}

/// Outcome of a song finishing, with the room's new order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SongEndedResponse {
    pub ended_song_id: Uuid,
    /// Song ids, current song first.
    pub new_song_order: Vec<Uuid>,
}
