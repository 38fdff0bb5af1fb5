use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, routes::ActingUser, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/events",
    tag = "sse",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room event stream", content_type = "text/event-stream", body = String),
        (status = 403, description = "Caller has not joined the room")
    )
)]
/// Stream every event published in the room, one SSE event per topic message.
pub async fn room_stream(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(room_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let receiver = sse_service::subscribe_room(&state, room_id, user_id).await?;
    info!(room_id = %room_id, user_id = %user_id, "new room SSE connection");
    Ok(sse_service::to_sse_stream(receiver, room_id))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{room_id}/events", get(room_stream))
}
