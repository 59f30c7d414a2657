//! Error types for the dashboard's HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors the dashboard's handlers can produce, mapped to an HTTP status
/// and a `{"error": "..."}` JSON body.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WebError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<relay_storage::StorageError> for WebError {
    fn from(err: relay_storage::StorageError) -> Self {
        match err {
            relay_storage::StorageError::NotFound(id) => WebError::NotFound(id),
            other => WebError::Internal(other.to_string()),
        }
    }
}

impl From<relay_spawner::SpawnError> for WebError {
    fn from(err: relay_spawner::SpawnError) -> Self {
        match err {
            relay_spawner::SpawnError::NameCollision(name) => {
                WebError::BadRequest(format!("agent {name} is already live"))
            }
            relay_spawner::SpawnError::ExecutableNotFound(cli) => {
                WebError::BadRequest(format!("no executable found for cli {cli}"))
            }
            other => WebError::Internal(other.to_string()),
        }
    }
}

impl From<relay_consensus::ConsensusError> for WebError {
    fn from(err: relay_consensus::ConsensusError) -> Self {
        use relay_consensus::ConsensusError::*;
        match err {
            NotFound(id) => WebError::NotFound(id),
            NotPending(_) | Expired(_) | NotParticipant { .. } | DuplicateVote { .. }
            | NotProposer { .. } | EmptyParticipants => WebError::BadRequest(err.to_string()),
        }
    }
}

impl From<relay_router::RouterError> for WebError {
    fn from(err: relay_router::RouterError) -> Self {
        WebError::BadRequest(err.to_string())
    }
}

impl From<askama::Error> for WebError {
    fn from(err: askama::Error) -> Self {
        WebError::Internal(err.to_string())
    }
}
