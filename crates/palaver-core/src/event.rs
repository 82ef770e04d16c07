//! Engine events, outbound notices, and actions.
//!
//! Events are the closed set of inputs the driver processes; the runtime
//! validates wire payloads into these variants before dispatch. Actions are
//! the effects the runtime executes (fan-out); notices are the tagged
//! payloads delivered to clients.

use serde::{Deserialize, Serialize};

use crate::{
    error::ErrorCode,
    types::{ConnectionId, Identity, Message, MessageKind, Room, RoomId, User, UserId},
};

/// Inbound events consumed by the coordination engine.
///
/// Each carries the originating connection. Identity, where present, has
/// already been resolved by the runtime's identity-resolver collaborator;
/// the engine never sees raw credentials.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Transport accepted a new connection.
    ConnectionOpened {
        /// The new connection.
        connection: ConnectionId,
    },
    /// Transport closed a connection (explicit or implicit). Always
    /// succeeds; cleanup is idempotent.
    ConnectionClosed {
        /// The closed connection.
        connection: ConnectionId,
    },
    /// Join a room, binding the connection to a user first if needed.
    Join {
        /// Originating connection.
        connection: ConnectionId,
        /// Room to join.
        room_id: RoomId,
        /// Resolved identity, if credentials were supplied.
        identity: Option<Identity>,
    },
    /// Leave a room.
    Leave {
        /// Originating connection.
        connection: ConnectionId,
        /// Room to leave.
        room_id: RoomId,
    },
    /// Create a room and auto-join the creator.
    CreateRoom {
        /// Originating connection.
        connection: ConnectionId,
        /// Room name.
        name: String,
        /// Optional description.
        description: Option<String>,
        /// Whether the room is private.
        is_private: bool,
        /// Resolved identity, if credentials were supplied.
        identity: Option<Identity>,
    },
    /// Send a message to a joined room.
    SendMessage {
        /// Originating connection.
        connection: ConnectionId,
        /// Target room.
        room_id: RoomId,
        /// Message body.
        content: String,
        /// Payload kind.
        kind: MessageKind,
    },
    /// Typing indicator started. Best-effort; no state change.
    TypingStart {
        /// Originating connection.
        connection: ConnectionId,
        /// Target room.
        room_id: RoomId,
    },
    /// Typing indicator stopped. Best-effort; no state change.
    TypingStop {
        /// Originating connection.
        connection: ConnectionId,
        /// Target room.
        room_id: RoomId,
    },
    /// Query: list rooms visible to the requester.
    ListRooms {
        /// Originating connection.
        connection: ConnectionId,
    },
    /// Query: a room's resolved participant roster.
    ListParticipants {
        /// Originating connection.
        connection: ConnectionId,
        /// Room to inspect.
        room_id: RoomId,
    },
    /// Query: paginated message history.
    MessageHistory {
        /// Originating connection.
        connection: ConnectionId,
        /// Room to read.
        room_id: RoomId,
        /// Window size.
        limit: usize,
        /// Entries to skip, counted from the most recent backwards.
        offset: usize,
    },
    /// Query: users currently online.
    OnlineUsers {
        /// Originating connection.
        connection: ConnectionId,
    },
    /// Query: health/stat snapshot (counts only).
    Stats {
        /// Originating connection.
        connection: ConnectionId,
    },
    /// Periodic janitor sweep over all room ledgers.
    JanitorSweep,
}

/// Effects produced by the engine for the runtime to execute.
///
/// Broadcast targets are resolved against room membership at execution time,
/// while the driver lock is still held, so the fan-out set is the membership
/// at the moment of dispatch.
#[derive(Debug, Clone)]
pub enum ChatAction {
    /// Deliver a notice to one connection.
    SendTo {
        /// Target connection.
        connection: ConnectionId,
        /// Payload.
        notice: ServerNotice,
    },
    /// Deliver a notice to every connection joined to a room.
    BroadcastRoom {
        /// Target room.
        room_id: RoomId,
        /// Payload.
        notice: ServerNotice,
        /// Connection to skip (usually the originator).
        exclude: Option<ConnectionId>,
    },
    /// Deliver a notice to every live connection.
    BroadcastAll {
        /// Payload.
        notice: ServerNotice,
    },
    /// Close a connection.
    CloseConnection {
        /// Connection to close.
        connection: ConnectionId,
        /// Human-readable reason.
        reason: String,
    },
}

/// Outbound notices delivered to clients, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerNotice {
    /// A user joined a room.
    #[serde(rename = "user:joined")]
    UserJoined {
        /// The joining user.
        user: User,
        /// The room joined.
        room: Room,
    },
    /// A user left a room (explicitly or via disconnect).
    #[serde(rename = "user:left")]
    UserLeft {
        /// The departing user.
        user: User,
        /// The room left.
        room: Room,
    },
    /// A room was created.
    #[serde(rename = "room:created")]
    RoomCreated {
        /// The new room.
        room: Room,
    },
    /// A new message was appended. Echoed to the sender as the ack.
    #[serde(rename = "message:new")]
    MessageNew {
        /// The message.
        message: Message,
        /// Its author.
        user: User,
    },
    /// A user started typing.
    #[serde(rename = "typing:start")]
    TypingStarted {
        /// Room where typing happens.
        room_id: RoomId,
        /// Typing user.
        user_id: UserId,
        /// Typing user's display name.
        display_name: String,
    },
    /// A user stopped typing.
    #[serde(rename = "typing:stop")]
    TypingStopped {
        /// Room where typing stopped.
        room_id: RoomId,
        /// User who stopped.
        user_id: UserId,
    },
    /// Reply to `room:list`.
    #[serde(rename = "room:list")]
    RoomList {
        /// Rooms visible to the requester, most recently active first.
        rooms: Vec<Room>,
    },
    /// Reply to `room:participants`.
    #[serde(rename = "room:participants")]
    Participants {
        /// Room inspected.
        room_id: RoomId,
        /// Resolved roster.
        users: Vec<User>,
    },
    /// Reply to `message:history`.
    #[serde(rename = "message:history")]
    History {
        /// Room read.
        room_id: RoomId,
        /// Window, oldest first.
        messages: Vec<Message>,
    },
    /// Reply to `user:online`.
    #[serde(rename = "user:online")]
    OnlineUsers {
        /// Users currently online.
        users: Vec<User>,
    },
    /// Reply to `stats`.
    #[serde(rename = "stats")]
    Stats {
        /// Counts-only snapshot.
        snapshot: StatsSnapshot,
    },
    /// A rejection, delivered to the originating connection only.
    #[serde(rename = "error")]
    Error {
        /// Stable error code.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },
}

/// Counts-only health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Live connections.
    pub connections: usize,
    /// Users ever seen.
    pub users: usize,
    /// Users currently online.
    pub online_users: usize,
    /// Rooms, the default room included.
    pub rooms: usize,
    /// Messages currently retained across all rooms.
    pub messages: usize,
}
