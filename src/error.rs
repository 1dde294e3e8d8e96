//! Error types for the grid
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Grid Error Enum ==
/// Unified error type for the cache grid and its backing store.
///
/// Only [`GridError::StoreUnavailable`] is transient. Everything else is
/// either a rejected input or a condition the caller has to act on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// Payload could not be encoded or decoded as a record
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// The document store could not be reached (retryable)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store holds a newer version of the record
    #[error("Conflict on key {key}: stored version {stored} is newer than {attempted}")]
    Conflict {
        key: String,
        stored: u64,
        attempted: u64,
    },

    /// Not enough replicas acknowledged a write
    #[error("Quorum lost for partition {partition}: {acks}/{required} acknowledgements")]
    QuorumLost {
        partition: u32,
        acks: usize,
        required: usize,
    },

    /// Replica is full of entries that cannot be evicted yet
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// Key not found (HTTP surface only, the core returns `Option`)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Membership operation referenced an unknown member
    #[error("Unknown member: {0}")]
    UnknownMember(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GridError {
    /// Whether the operation may succeed if simply retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GridError::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::MalformedData(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for GridError {
    fn into_response(self) -> Response {
        let status = match &self {
            GridError::MalformedData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GridError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GridError::Conflict { .. } => StatusCode::CONFLICT,
            GridError::QuorumLost { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GridError::CacheFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            GridError::NotFound(_) => StatusCode::NOT_FOUND,
            GridError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GridError::UnknownMember(_) => StatusCode::NOT_FOUND,
            GridError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the grid.
pub type Result<T> = std::result::Result<T, GridError>;
