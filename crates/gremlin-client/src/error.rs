//! Driver error types.
//!
//! [`GremlinError`] is returned from driver calls. [`QueryError`] is the
//! smaller, cloneable error handed to a query's callback as the terminal
//! [`QueryEvent::Error`](crate::query::QueryEvent::Error).

use gremlin_core::RequestId;
use gremlin_settings::SettingsError;
use thiserror::Error;

/// Errors from driver operations.
#[derive(Debug, Error)]
pub enum GremlinError {
    /// The WebSocket could not be reached or failed mid-stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request or response JSON could not be (de)serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A request could not be framed for the wire.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An inbound frame was not a decodable response envelope.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A send was attempted while the connection was not open.
    #[error("connection is not open")]
    NotConnected,

    /// Another request with the same ID is still in flight.
    #[error("request {0} is already in flight")]
    DuplicateRequestId(RequestId),

    /// The driver task is gone (every handle dropped or runtime shut down).
    #[error("driver has shut down")]
    DriverClosed,

    /// A submitted query finished with an error.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Settings could not be turned into a connection target.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Terminal failure delivered to a query's callback.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The server answered with a non-success, non-partial status.
    #[error("{message} (Error {code})")]
    Server {
        /// Gremlin status code (e.g. 500, 597, 598), as sent.
        code: i64,
        /// Server-supplied status message.
        message: String,
    },

    /// The query's payload could not be produced.
    #[error("could not serialize request: {0}")]
    Serialization(String),

    /// The query's ID collided with a request already in flight.
    #[error("request {0} is already in flight")]
    DuplicateRequestId(RequestId),

    /// The connection closed before a terminal response arrived.
    #[error("connection closed before the request completed")]
    ConnectionClosed,

    /// The query was refused for any other reason.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<GremlinError> for QueryError {
    fn from(err: GremlinError) -> Self {
        match err {
            GremlinError::Query(inner) => inner,
            GremlinError::DuplicateRequestId(id) => QueryError::DuplicateRequestId(id),
            GremlinError::Serialization(e) => QueryError::Serialization(e.to_string()),
            GremlinError::InvalidRequest(msg) => QueryError::Serialization(msg),
            GremlinError::NotConnected | GremlinError::Transport(_) | GremlinError::DriverClosed => {
                QueryError::ConnectionClosed
            }
            other => QueryError::Rejected(other.to_string()),
        }
    }
}

/// Result type alias using [`GremlinError`].
pub type Result<T> = std::result::Result<T, GremlinError>;
