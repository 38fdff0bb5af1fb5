use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::song::{AddSongRequest, HasVotedResponse, SongEndedResponse, SongSummary, VoteResponse},
    error::AppError,
    routes::ActingUser,
    services::room_service,
    state::SharedState,
};

/// Routes handling the song queue and voting.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room_id}/songs", get(list_songs).post(add_song))
        .route("/rooms/{room_id}/songs/{song_id}/ended", post(song_ended))
        .route("/songs/{song_id}", delete(remove_song))
        .route("/songs/{song_id}/votes", post(cast_vote))
        .route("/songs/{song_id}/votes/me", get(has_voted))
        .route("/songs/{song_id}/play-now", post(play_now))
        .route("/songs/{song_id}/current", post(set_current))
}

/// Room songs in play order: current song first, then the ranked queue.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/songs",
    tag = "songs",
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Ordered songs", body = [SongSummary]))
)]
pub async fn list_songs(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<SongSummary>>, AppError> {
    room_service::require_member(&state, room_id, user_id).await?;
    let songs = state.queue().ordered_songs(room_id).await?;
    Ok(Json(songs.into_iter().map(SongSummary::from).collect()))
}

/// Queue a video at the tail of the room.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/songs",
    tag = "songs",
    request_body = AddSongRequest,
    params(("room_id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Song queued", body = SongSummary),
        (status = 400, description = "Invalid or unavailable link"),
        (status = 409, description = "Link already queued in this room"),
        (status = 502, description = "Metadata provider unreachable")
    )
)]
pub async fn add_song(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(room_id): Path<Uuid>,
    Json(payload): Json<AddSongRequest>,
) -> Result<Json<SongSummary>, AppError> {
    payload.validate()?;
    let song = state
        .queue()
        .add_song(room_id, user_id, payload.external_link)
        .await?;
    Ok(Json(song.into()))
}

/// Report that the current song finished playing. Creator only.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/songs/{song_id}/ended",
    tag = "songs",
    params(
        ("room_id" = Uuid, Path, description = "Room identifier"),
        ("song_id" = Uuid, Path, description = "Song that finished")
    ),
    responses(
        (status = 200, description = "Song recycled, next song promoted", body = SongEndedResponse),
        (status = 409, description = "Song is not playing")
    )
)]
pub async fn song_ended(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path((room_id, song_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SongEndedResponse>, AppError> {
    room_service::require_creator(&state, room_id, user_id).await?;
    Ok(Json(state.queue().song_ended(room_id, song_id).await?))
}

/// Delete a queued song and its votes. Creator only.
#[utoipa::path(
    delete,
    path = "/songs/{song_id}",
    tag = "songs",
    params(("song_id" = Uuid, Path, description = "Song identifier")),
    responses(
        (status = 204, description = "Song removed"),
        (status = 409, description = "Song is playing")
    )
)]
pub async fn remove_song(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(song_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.queue().remove_song(song_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upvote a queued song.
#[utoipa::path(
    post,
    path = "/songs/{song_id}/votes",
    tag = "songs",
    params(("song_id" = Uuid, Path, description = "Song identifier")),
    responses(
        (status = 200, description = "Vote recorded", body = VoteResponse),
        (status = 403, description = "Caller has not joined the room"),
        (status = 409, description = "Already voted, or the song is playing"),
        (status = 503, description = "Vote could not be applied right now")
    )
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(song_id): Path<Uuid>,
) -> Result<Json<VoteResponse>, AppError> {
    let receipt = state.votes().cast_vote(song_id, user_id).await?;
    Ok(Json(VoteResponse {
        song_id: receipt.song_id,
        upvotes: receipt.upvotes,
    }))
}

#[utoipa::path(
    get,
    path = "/songs/{song_id}/votes/me",
    tag = "songs",
    params(("song_id" = Uuid, Path, description = "Song identifier")),
    responses((status = 200, description = "Whether the caller voted", body = HasVotedResponse))
)]
pub async fn has_voted(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(song_id): Path<Uuid>,
) -> Result<Json<HasVotedResponse>, AppError> {
    let has_voted = state.votes().has_voted(song_id, user_id).await?;
    Ok(Json(HasVotedResponse { song_id, has_voted }))
}

/// Force a song to play immediately, discarding its votes. Creator only.
#[utoipa::path(
    post,
    path = "/songs/{song_id}/play-now",
    tag = "songs",
    params(("song_id" = Uuid, Path, description = "Song identifier")),
    responses((status = 200, description = "Song now playing", body = SongSummary))
)]
pub async fn play_now(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(song_id): Path<Uuid>,
) -> Result<Json<SongSummary>, AppError> {
    let song = state.queue().play_now(song_id, user_id).await?;
    Ok(Json(song.into()))
}

/// Pick the song that plays, keeping its votes. Creator only.
#[utoipa::path(
    post,
    path = "/songs/{song_id}/current",
    tag = "songs",
    params(("song_id" = Uuid, Path, description = "Song identifier")),
    responses((status = 200, description = "Song now playing", body = SongSummary))
)]
pub async fn set_current(
    State(state): State<SharedState>,
    ActingUser(user_id): ActingUser,
    Path(song_id): Path<Uuid>,
) -> Result<Json<SongSummary>, AppError> {
    let song = state.queue().set_current(song_id, user_id).await?;
    Ok(Json(song.into()))
}
