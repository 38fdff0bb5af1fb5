use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{RoomEntity, RoomId, UserId},
    dto::events::RoomStatus,
    error::ServiceError,
    services::room_events,
    state::SharedState,
};

/// Create a room owned by `creator`, who joins it immediately.
pub async fn create_room(
    state: &SharedState,
    name: String,
    creator: UserId,
) -> Result<RoomEntity, ServiceError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("room name cannot be empty".into()));
    }

    let room = RoomEntity::new(name, creator);
    state.store().insert_room(room.clone()).await?;
    info!(room_id = %room.id, creator = %creator, "room created");
    Ok(room)
}

/// Return the room's join token, generating it on first use. Creator only.
pub async fn generate_shareable_link(
    state: &SharedState,
    room_id: RoomId,
    requester: UserId,
) -> Result<String, ServiceError> {
    let room = require_creator(state, room_id, requester).await?;
    if let Some(link) = room.shareable_link {
        return Ok(link);
    }

    let token = Uuid::new_v4().simple().to_string();
    // The store keeps whichever link was set first.
    let link = state.store().set_shareable_link(room_id, token).await?;
    info!(room_id = %room_id, "shareable link issued");
    Ok(link)
}

/// Add `user_id` to the members of the room behind `token`. Joining twice is harmless.
pub async fn join_room(
    state: &SharedState,
    token: &str,
    user_id: UserId,
) -> Result<RoomEntity, ServiceError> {
    let mut room = room_by_shareable_link(state, token).await?;
    if state.store().add_member(room.id, user_id).await? {
        room.members.insert(user_id);
        info!(room_id = %room.id, user_id = %user_id, "user joined room");
    }
    Ok(room)
}

pub async fn room_by_shareable_link(
    state: &SharedState,
    token: &str,
) -> Result<RoomEntity, ServiceError> {
    state
        .store()
        .find_room_by_link(token.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound("no room for this link".into()))
}

pub async fn get_room(state: &SharedState, room_id: RoomId) -> Result<RoomEntity, ServiceError> {
    state
        .store()
        .find_room(room_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}`")))
}

/// Rooms `user_id` has joined, oldest first.
pub async fn rooms_for_user(
    state: &SharedState,
    user_id: UserId,
) -> Result<Vec<RoomEntity>, ServiceError> {
    Ok(state.store().list_rooms_for_user(user_id).await?)
}

pub async fn is_creator(
    state: &SharedState,
    room_id: RoomId,
    user_id: UserId,
) -> Result<bool, ServiceError> {
    Ok(get_room(state, room_id).await?.is_creator(user_id))
}

/// Load the room and check `requester` created it.
pub async fn require_creator(
    state: &SharedState,
    room_id: RoomId,
    requester: UserId,
) -> Result<RoomEntity, ServiceError> {
    let room = get_room(state, room_id).await?;
    if !room.is_creator(requester) {
        return Err(ServiceError::Forbidden(
            "only the room creator can do this".into(),
        ));
    }
    Ok(room)
}

/// Load the room and check `user_id` joined it.
pub async fn require_member(
    state: &SharedState,
    room_id: RoomId,
    user_id: UserId,
) -> Result<RoomEntity, ServiceError> {
    let room = get_room(state, room_id).await?;
    if !room.is_member(user_id) {
        return Err(ServiceError::NotAMember);
    }
    Ok(room)
}

/// Delete the room with everything it owns and disconnect its listeners. Creator only.
pub async fn close_room(
    state: &SharedState,
    room_id: RoomId,
    requester: UserId,
) -> Result<(), ServiceError> {
    require_creator(state, room_id, requester).await?;

    let song_ids = state.store().delete_room(room_id).await?;
    for song_id in &song_ids {
        state.vote_cache().clear_vote_cache(*song_id).await;
    }

    let dropped = state.sessions().clear_room(room_id);
    room_events::broadcast_status(state.hub(), room_id, RoomStatus::Closed);
    state.hub().remove_room(room_id);
    info!(
        room_id = %room_id,
        songs = song_ids.len(),
        sessions = dropped,
        "room closed"
    );
    Ok(())
}
