use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        room::{
            ActiveUsersResponse, CreateRoomRequest, IsCreatorResponse, RoomSummary,
            ShareableLinkResponse,
        },
        song::SongSummary,
    },
    error::AppError,
    routes::ActingUser,
    services::{presence_service, room_service},
    state::SharedState,
};

/// Routes handling room membership and lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room).get(list_my_rooms))
        .route("/rooms/{room_id}", get(get_room).delete(close_room))
        .route("/rooms/{room_id}/link", post(generate_link))
        .route("/rooms/{room_id}/is-creator", get(is_creator))
        .route("/rooms/{room_id}/active-users", get(active_users))
        .route("/rooms/{room_id}/votes/reset", post(reset_votes))
        .route("/rooms/link/{token}", get(room_by_link))
        .route("/rooms/join/{token}", post(join_room))
}

/// Open a new room owned by the caller.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomSummary),
        (status = 400, description = "Invalid room name")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<RoomSummary>, AppError> {
    payload.validate()?;
    let room = room_service::create_room(&state, payload.name, user_id).await?;
    Ok(Json(room.into()))
}

/// Rooms the caller has joined.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Joined rooms", body = [RoomSummary]))
)]
pub async fn list_my_rooms(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
) -> Result<Json<Vec<RoomSummary>>, AppError> {
    let rooms = room_service::rooms_for_user(&state, user_id).await?;
    Ok(Json(rooms.into_iter().map(RoomSummary::from).collect()))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room details", body = RoomSummary),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomSummary>, AppError> {
    let room = room_service::get_room(&state, room_id).await?;
    Ok(Json(room.into()))
}

/// Close the room, deleting its songs and votes. Creator only.
#[utoipa::path(
    delete,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 204, description = "Room closed"),
        (status = 403, description = "Caller is not the creator")
    )
)]
pub async fn close_room(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    room_service::close_room(&state, room_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return the room's join token, creating it on first call. Creator only.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/link",
    tag = "rooms",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Join token", body = ShareableLinkResponse))
)]
pub async fn generate_link(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(room_id): Path<Uuid>,
) -> Result<Json<ShareableLinkResponse>, AppError> {
    let shareable_link = room_service::generate_shareable_link(&state, room_id, user_id).await?;
    Ok(Json(ShareableLinkResponse { shareable_link }))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/is-creator",
    tag = "rooms",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Whether the caller created the room", body = IsCreatorResponse))
)]
pub async fn is_creator(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(room_id): Path<Uuid>,
) -> Result<Json<IsCreatorResponse>, AppError> {
    let is_creator = room_service::is_creator(&state, room_id, user_id).await?;
    Ok(Json(IsCreatorResponse { is_creator }))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/active-users",
    tag = "rooms",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Live session count", body = ActiveUsersResponse))
)]
pub async fn active_users(
    State(state): State<SharedState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<ActiveUsersResponse>, AppError> {
    room_service::get_room(&state, room_id).await?;
    Ok(Json(ActiveUsersResponse {
        room_id,
        active_users: presence_service::active_users(&state, room_id),
    }))
}

/// Drop every vote in the room. Creator only.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/votes/reset",
    tag = "rooms",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Songs re-ranked without votes", body = [SongSummary]))
)]
pub async fn reset_votes(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<SongSummary>>, AppError> {
    room_service::require_creator(&state, room_id, user_id).await?;
    let songs = state.queue().reset_votes(room_id).await?;
    Ok(Json(songs.into_iter().map(SongSummary::from).collect()))
}

#[utoipa::path(
    get,
    path = "/rooms/link/{token}",
    tag = "rooms",
    params(("token" = String, Path, description = "Shareable join token")),
    responses(
        (status = 200, description = "Room behind the token", body = RoomSummary),
        (status = 404, description = "Unknown token")
    )
)]
pub async fn room_by_link(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> Result<Json<RoomSummary>, AppError> {
    let room = room_service::room_by_shareable_link(&state, &token).await?;
    Ok(Json(room.into()))
}

/// Join the room behind a shareable token.
#[utoipa::path(
    post,
    path = "/rooms/join/{token}",
    tag = "rooms",
    params(("token" = String, Path, description = "Shareable join token")),
    responses((status = 200, description = "Joined room", body = RoomSummary))
)]
pub async fn join_room(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(token): Path<String>,
) -> Result<Json<RoomSummary>, AppError> {
    let room = room_service::join_room(&state, &token, user_id).await?;
    Ok(Json(room.into()))
}
