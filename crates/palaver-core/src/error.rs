//! Engine error taxonomy.
//!
//! Every rejection is local to the originating connection: it causes no state
//! change, cancels nothing already committed for other connections, and never
//! crashes the engine. The driver converts these into `error` notices sent
//! back to the initiator only.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, RoomId};

/// Errors from coordination engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Malformed request (empty room name, bad payload). Rejected before any
    /// state change.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Room lookup miss. No state change.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// The connection is not currently joined to the room.
    #[error("not in room: {0}")]
    NotInRoom(RoomId),

    /// The operation requires a bound user and none could be established.
    #[error("not authenticated")]
    Unauthenticated,

    /// The connection already has a bound user. Idempotency guard; not a
    /// user-facing failure in normal flow.
    #[error("connection already bound to a user")]
    AlreadyBound,

    /// The connection is not registered with the engine. Occurs only if the
    /// runtime dispatches events for a connection it never opened.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

impl EngineError {
    /// Wire-facing error code for this rejection.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::RoomNotFound(_) => ErrorCode::RoomNotFound,
            Self::NotInRoom(_) => ErrorCode::NotInRoom,
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::AlreadyBound | Self::UnknownConnection(_) => ErrorCode::Internal,
        }
    }
}

/// Stable error codes carried on `error` notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request.
    InvalidArgument,
    /// Room does not exist.
    RoomNotFound,
    /// Sender is not a member of the room.
    NotInRoom,
    /// No bound user and none could be established.
    Unauthenticated,
    /// Engine-side inconsistency; clients cannot act on this.
    Internal,
}
