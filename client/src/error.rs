//! Error types for backend calls and client-side view logic.

use thiserror::Error;
use uuid::Uuid;

use crate::views::connection::ConnectionState;

/// Errors surfaced by the backend collaborators (database, auth, storage).
#[derive(Debug, Error)]
pub enum BackendError {
    /// Single-row fetch with no match
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique pair constraint on `connections`
    #[error("a connection between {requester} and {recipient} already exists")]
    DuplicateConnection { requester: Uuid, recipient: Uuid },

    /// Any other unique-constraint violation
    #[error("{entity} already exists")]
    Conflict { entity: &'static str },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the auth or storage service
    #[error("backend returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for backend calls.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors returned by views to the user-facing layer.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("cannot {action} while the connection is {state}")]
    InvalidTransition {
        action: &'static str,
        state: ConnectionState,
    },

    /// The mutation matched no row; `state` is the re-fetched authoritative state
    #[error("{action} had no effect, the connection is now {state}")]
    Superseded {
        action: &'static str,
        state: ConnectionState,
    },

    #[error("{0}")]
    Validation(String),

    #[error("that is your own profile")]
    OwnProfile,

    #[error("the view has not finished loading")]
    NotLoaded,
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
