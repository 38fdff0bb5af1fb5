//! Live listener tracking and playback synchronisation relays.

use tracing::{info, warn};

use crate::{
    config::CreatorDeparturePolicy,
    dao::models::{RoomId, UserId},
    dto::events::{RoomStatus, TimeSyncPayload},
    error::ServiceError,
    services::{room_events, room_service},
    state::{
        SharedState,
        sessions::{SessionId, SessionInfo, SessionRemoval},
    },
};

/// Register a live session of `user_id` in the room and return the listener count.
pub async fn connect(
    state: &SharedState,
    room_id: RoomId,
    session_id: SessionId,
    user_id: UserId,
) -> Result<usize, ServiceError> {
    let room = room_service::require_member(state, room_id, user_id).await?;
    let info = SessionInfo {
        user_id,
        is_creator: room.is_creator(user_id),
    };
    let active_users = state.sessions().add_session(room_id, session_id.clone(), info);
    info!(
        room_id = %room_id,
        session_id = %session_id,
        user_id = %user_id,
        active_users,
        "session connected"
    );
    room_events::broadcast_active_users(state.hub(), room_id, active_users);
    Ok(active_users)
}

/// Drop a session from the room. Disconnecting an unknown session is a no-op.
pub async fn disconnect(state: &SharedState, room_id: RoomId, session_id: &str) -> SessionRemoval {
    let removal = state.sessions().remove_session(room_id, session_id);
    after_removal(state, session_id, removal).await;
    removal
}

/// Drop a session from every room it joined, for transports that lost track of the room.
pub async fn disconnect_everywhere(state: &SharedState, session_id: &str) -> Vec<SessionRemoval> {
    let removals = state.sessions().remove_session_everywhere(session_id);
    for removal in &removals {
        after_removal(state, session_id, *removal).await;
    }
    removals
}

pub fn active_users(state: &SharedState, room_id: RoomId) -> usize {
    state.sessions().active_count(room_id)
}

/// Relay the creator's playback position to the room. Creator only.
pub async fn time_sync(
    state: &SharedState,
    room_id: RoomId,
    user_id: UserId,
    payload: TimeSyncPayload,
) -> Result<(), ServiceError> {
    room_service::require_creator(state, room_id, user_id).await?;
    room_events::broadcast_time_sync(state.hub(), room_id, payload);
    Ok(())
}

/// Ask the creator's client to publish its playback position.
pub async fn request_sync(
    state: &SharedState,
    room_id: RoomId,
    user_id: UserId,
) -> Result<(), ServiceError> {
    room_service::require_member(state, room_id, user_id).await?;
    room_events::broadcast_sync_request(state.hub(), room_id, user_id);
    Ok(())
}

async fn after_removal(state: &SharedState, session_id: &str, removal: SessionRemoval) {
    if !removal.removed {
        return;
    }
    let room_id = removal.room_id;
    info!(
        room_id = %room_id,
        session_id = %session_id,
        active_users = removal.remaining,
        "session disconnected"
    );
    room_events::broadcast_active_users(state.hub(), room_id, removal.remaining);

    if !removal.creator_presence_lost {
        return;
    }
    room_events::broadcast_status(state.hub(), room_id, RoomStatus::CreatorLeft);
    match state.config().creator_departure {
        CreatorDeparturePolicy::KeepVotes => {}
        CreatorDeparturePolicy::ResetVotes => {
            if let Err(err) = state.queue().reset_votes(room_id).await {
                warn!(room_id = %room_id, error = %err, "failed to reset votes after creator left");
            }
        }
    }
}
