use axum::{
    Router,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{dao::models::UserId, error::AppError, state::SharedState};

pub mod docs;
pub mod health;
pub mod rooms;
pub mod songs;
pub mod sse;
pub mod websocket;

/// Header carrying the caller identity set by the authentication layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from the `X-User-Id` header.
///
/// Browser transports that cannot set headers (EventSource, WebSocket) may
/// pass it as a `user_id` query parameter instead.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub UserId);

#[derive(Deserialize)]
struct UserQuery {
    user_id: Option<String>,
}

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = match parts.headers.get(USER_ID_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| AppError::Unauthorized("malformed `x-user-id` header".into()))?
                .to_string(),
            None => Query::<UserQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.user_id)
                .ok_or_else(|| AppError::Unauthorized("missing `x-user-id` header".into()))?,
        };

        Uuid::parse_str(raw.trim())
            .map(ActingUser)
            .map_err(|_| AppError::Unauthorized(format!("invalid user id `{raw}`")))
    }
}

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(rooms::router())
        .merge(songs::router())
        .merge(sse::router())
        .merge(websocket::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
