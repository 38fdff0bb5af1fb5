//! Payloads published on room topics.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::song::SongSummary;

/// Full ordered song list of a room, current song first.
#[derive(Debug, Serialize, ToSchema)]
pub struct SongListEvent {
    pub songs: Vec<SongSummary>,
}

/// Song now playing; `song` is absent when the queue ran dry.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentSongEvent {
    pub song: Option<SongSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveUsersEvent {
    pub active_users: usize,
}

/// Room lifecycle notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    CreatorLeft,
    Closed,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusEvent {
    pub status: RoomStatus,
}

/// Playback position relayed from the room creator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, Validate)]
pub struct TimeSyncPayload {
    /// Position in seconds.
    #[validate(range(min = 0.0))]
    pub current_time: f64,
    pub is_playing: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncRequestEvent {
    pub requested_by: Uuid,
}
