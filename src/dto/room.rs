use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::RoomEntity;
use crate::dto::format_system_time;

/// Room details returned to members.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    pub creator_id: Uuid,
    /// Joined users, creator first.
    pub members: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shareable_link: Option<String>,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<RoomEntity> for RoomSummary {
    fn from(room: RoomEntity) -> Self {
        Self {
            id: room.id,
            name: room.name,
            creator_id: room.creator_id,
            members: room.members.into_iter().collect(),
            shareable_link: room.shareable_link,
            created_at: format_system_time(room.created_at),
        }
    }
}

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShareableLinkResponse {
    pub shareable_link: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IsCreatorResponse {
    pub is_creator: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveUsersResponse {
    pub room_id: Uuid,
    pub active_users: usize,
}
