use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::events::TimeSyncPayload;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from room WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomInboundMessage {
    /// Creator's playback position.
    TimeSync(TimeSyncPayload),
    /// Ask the creator to resend its playback position.
    SyncRequest,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent once the session is registered in the room.
pub struct SessionAck {
    pub session_id: String,
    pub room_id: Uuid,
    pub active_users: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Room event forwarded to a WebSocket client; `data` is the topic payload.
pub struct RoomOutboundMessage {
    pub topic: String,
    pub data: serde_json::Value,
}
