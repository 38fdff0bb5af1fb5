use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Jukebox Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::list_my_rooms,
        crate::routes::rooms::get_room,
        crate::routes::rooms::close_room,
        crate::routes::rooms::generate_link,
        crate::routes::rooms::is_creator,
        crate::routes::rooms::active_users,
        crate::routes::rooms::reset_votes,
        crate::routes::rooms::room_by_link,
        crate::routes::rooms::join_room,
        crate::routes::songs::list_songs,
        crate::routes::songs::add_song,
        crate::routes::songs::song_ended,
        crate::routes::songs::remove_song,
        crate::routes::songs::cast_vote,
        crate::routes::songs::has_voted,
        crate::routes::songs::play_now,
        crate::routes::songs::set_current,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomSummary,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::ShareableLinkResponse,
            crate::dto::room::IsCreatorResponse,
            crate::dto::room::ActiveUsersResponse,
            crate::dto::song::SongSummary,
            crate::dto::song::AddSongRequest,
            crate::dto::song::VoteResponse,
            crate::dto::song::HasVotedResponse,
            crate::dto::song::SongEndedResponse,
            crate::dto::events::SongListEvent,
            crate::dto::events::CurrentSongEvent,
            crate::dto::events::ActiveUsersEvent,
            crate::dto::events::RoomStatus,
            crate::dto::events::StatusEvent,
            crate::dto::events::TimeSyncPayload,
            crate::dto::events::SyncRequestEvent,
            crate::dto::ws::RoomInboundMessage,
            crate::dto::ws::SessionAck,
            crate::dto::ws::RoomOutboundMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room lifecycle and membership"),
        (name = "songs", description = "Song queue and voting"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "sessions", description = "WebSocket listener sessions"),
    )
)]
pub struct ApiDoc;
