//! Wire protocol: newline-delimited JSON frames, tagged by `event`.
//!
//! One JSON object per line. Inbound frames decode into [`ClientFrame`];
//! outbound notices are the engine's `ServerNotice` serialized directly.
//! Malformed lines are answered with an `error` notice to the sender only
//! and never reach the engine.

use palaver_core::{ChatEvent, ConnectionId, Identity, MessageKind, RoomId};
use serde::Deserialize;

use crate::resolver::AuthPayload;

fn default_history_limit() -> usize {
    50
}

/// Inbound client frames.
///
/// `auth` on `room:join`/`room:create` carries credentials for an unbound
/// connection; the runtime resolves them before dispatching to the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event")]
pub enum ClientFrame {
    /// Join a room.
    #[serde(rename = "room:join")]
    RoomJoin {
        /// Target room.
        room_id: RoomId,
        /// Optional credentials for the first bind.
        auth: Option<AuthPayload>,
    },
    /// Leave a room.
    #[serde(rename = "room:leave")]
    RoomLeave {
        /// Target room.
        room_id: RoomId,
    },
    /// Create a room.
    #[serde(rename = "room:create")]
    RoomCreate {
        /// Room name.
        name: String,
        /// Optional description.
        description: Option<String>,
        /// Whether the room is listed only to participants.
        #[serde(default)]
        is_private: bool,
        /// Optional credentials for the first bind.
        auth: Option<AuthPayload>,
    },
    /// Send a message.
    #[serde(rename = "message:send")]
    MessageSend {
        /// Target room.
        room_id: RoomId,
        /// Message body.
        content: String,
        /// Payload kind, `text` if omitted.
        #[serde(default)]
        kind: MessageKind,
    },
    /// Typing indicator on.
    #[serde(rename = "typing:start")]
    TypingStart {
        /// Target room.
        room_id: RoomId,
    },
    /// Typing indicator off.
    #[serde(rename = "typing:stop")]
    TypingStop {
        /// Target room.
        room_id: RoomId,
    },
    /// List visible rooms.
    #[serde(rename = "room:list")]
    RoomList,
    /// List a room's participants.
    #[serde(rename = "room:participants")]
    Participants {
        /// Room to inspect.
        room_id: RoomId,
    },
    /// Paginated message history.
    #[serde(rename = "message:history")]
    MessageHistory {
        /// Room to read.
        room_id: RoomId,
        /// Window size, 50 if omitted.
        #[serde(default = "default_history_limit")]
        limit: usize,
        /// Entries to skip from the most recent backwards.
        #[serde(default)]
        offset: usize,
    },
    /// List online users.
    #[serde(rename = "user:online")]
    OnlineUsers,
    /// Health/stat counters.
    #[serde(rename = "stats")]
    Stats,
}

impl ClientFrame {
    /// Decode one wire line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Credentials attached to this frame, if any.
    ///
    /// The runtime resolves these asynchronously before taking the driver
    /// lock; only join and create can bind an identity.
    pub fn auth(&self) -> Option<&AuthPayload> {
        match self {
            Self::RoomJoin { auth, .. } | Self::RoomCreate { auth, .. } => auth.as_ref(),
            _ => None,
        }
    }

    /// Convert into an engine event for `connection`.
    ///
    /// `identity` is the resolved form of [`Self::auth`], or `None` when no
    /// credentials were supplied or the frame cannot bind one.
    pub fn into_event(self, connection: ConnectionId, identity: Option<Identity>) -> ChatEvent {
        match self {
            Self::RoomJoin { room_id, .. } => ChatEvent::Join { connection, room_id, identity },
            Self::RoomLeave { room_id } => ChatEvent::Leave { connection, room_id },
            Self::RoomCreate { name, description, is_private, .. } => ChatEvent::CreateRoom {
                connection,
                name,
                description,
                is_private,
                identity,
            },
            Self::MessageSend { room_id, content, kind } => {
                ChatEvent::SendMessage { connection, room_id, content, kind }
            },
            Self::TypingStart { room_id } => ChatEvent::TypingStart { connection, room_id },
            Self::TypingStop { room_id } => ChatEvent::TypingStop { connection, room_id },
            Self::RoomList => ChatEvent::ListRooms { connection },
            Self::Participants { room_id } => ChatEvent::ListParticipants { connection, room_id },
            Self::MessageHistory { room_id, limit, offset } => {
                ChatEvent::MessageHistory { connection, room_id, limit, offset }
            },
            Self::OnlineUsers => ChatEvent::OnlineUsers { connection },
            Self::Stats => ChatEvent::Stats { connection },
        }
    }
}
