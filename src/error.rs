use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    services::metadata::ResolveError,
    state::queue::TransitionError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Requested room or song does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The user has not joined the room.
    #[error("user is not a member of this room")]
    NotAMember,
    /// Only the room creator may perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The user already holds a vote on the song.
    #[error("user has already voted for this song")]
    AlreadyVoted,
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Optimistic version clash on the durable store. Retried internally.
    #[error("concurrent modification: {0}")]
    ConcurrencyConflict(#[source] StorageError),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Neither the cache nor the store could answer.
    #[error("vote storage unavailable (degraded mode)")]
    Degraded,
    /// Metadata provider failed for a reason other than a bad link.
    #[error("metadata lookup failed")]
    Metadata(#[source] ResolveError),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl ServiceError {
    /// Whether retrying the same operation may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::ConcurrencyConflict(_))
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { .. } => ServiceError::ConcurrencyConflict(err),
            StorageError::NotFound { resource, id } => {
                ServiceError::NotFound(format!("{resource} `{id}`"))
            }
            StorageError::Duplicate { .. } => ServiceError::InvalidState(err.to_string()),
            StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::SongNotInRoom(id) => ServiceError::NotFound(format!("song `{id}`")),
            TransitionError::AlreadyCurrent(_)
            | TransitionError::NotCurrent(_)
            | TransitionError::CurrentNotRemovable(_) => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ResolveError> for ServiceError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidLink(_) | ResolveError::NotFound(_) => {
                ServiceError::InvalidInput(err.to_string())
            }
            ResolveError::Unavailable { .. } => ServiceError::Metadata(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or malformed caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller is known but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Upstream dependency failed.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotFound(_) => AppError::NotFound(message),
            ServiceError::NotAMember | ServiceError::Forbidden(_) => AppError::Forbidden(message),
            ServiceError::AlreadyVoted | ServiceError::InvalidState(_) => {
                AppError::Conflict(message)
            }
            ServiceError::InvalidInput(_) => AppError::BadRequest(message),
            ServiceError::Metadata(_) => AppError::BadGateway(message),
            ServiceError::ConcurrencyConflict(_)
            | ServiceError::Unavailable(_)
            | ServiceError::Degraded
            | ServiceError::Timeout => AppError::ServiceUnavailable(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
