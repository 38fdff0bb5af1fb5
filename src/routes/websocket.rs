use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{routes::ActingUser, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/ws",
    tag = "sessions",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a live listener session of the room.
pub async fn ws_handler(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(room_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, room_id, user_id))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{room_id}/ws", get(ws_handler))
}
