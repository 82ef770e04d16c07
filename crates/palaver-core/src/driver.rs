//! Chat driver.
//!
//! Ties together the session registry (connection ↔ user ↔ room membership),
//! the room directory (metadata + rosters), the user table, and the message
//! ledger, and turns inbound [`ChatEvent`]s into [`ChatAction`]s for the
//! runtime to execute.
//!
//! The driver is Sans-IO: no sockets, no clock, no RNG of its own. It is the
//! single owner of all mutable coordination state; the runtime serializes
//! access to it, so every multi-step transition (check, mutate, fan-out)
//! commits atomically from any observer's point of view.
//!
//! Rejections never surface as panics or poisoned state: a failed
//! precondition becomes an `error` notice addressed to the originating
//! connection, and nothing else changes.

use crate::{
    config::EngineConfig,
    directory::RoomDirectory,
    env::Environment,
    error::EngineError,
    event::{ChatAction, ChatEvent, ServerNotice, StatsSnapshot},
    ledger::MessageLedger,
    registry::{BindError, SessionRegistry},
    types::{ConnectionId, Identity, Message, MessageId, MessageKind, Room, RoomId, User, UserId},
    users::UserTable,
};

/// Action-based coordination engine.
///
/// Single owner of all chat state. Process one event at a time; concurrent
/// connections are serialized by the runtime's lock around this value.
pub struct ChatDriver<E: Environment> {
    /// Connection ↔ user ↔ room membership indexes.
    registry: SessionRegistry,
    /// Rooms, metadata, and rosters.
    directory: RoomDirectory,
    /// Every user ever resolved.
    users: UserTable,
    /// Per-room message logs.
    ledger: MessageLedger,
    /// Time and randomness.
    env: E,
    /// Engine configuration.
    config: EngineConfig,
}

impl<E: Environment> ChatDriver<E> {
    /// Create a driver with the default room already present.
    pub fn new(env: E, config: EngineConfig) -> Self {
        let now = env.now_millis();
        let mut ledger = MessageLedger::new();
        ledger.track_room(RoomId::GENERAL);
        Self {
            registry: SessionRegistry::new(),
            directory: RoomDirectory::new(now),
            users: UserTable::new(),
            ledger,
            env,
            config,
        }
    }

    /// Process one event and return the actions to execute.
    ///
    /// Never fails: engine-level rejections become `error` notices targeted
    /// at the originating connection. One malformed event cannot affect any
    /// other connection's session.
    pub fn process_event(&mut self, event: ChatEvent) -> Vec<ChatAction> {
        match event {
            ChatEvent::ConnectionOpened { connection } => self.handle_connection_opened(connection),
            ChatEvent::ConnectionClosed { connection } => self.handle_connection_closed(connection),
            ChatEvent::Join { connection, room_id, identity } => self
                .handle_join(connection, room_id, identity)
                .unwrap_or_else(|e| reject(connection, &e)),
            ChatEvent::Leave { connection, room_id } => self
                .handle_leave(connection, room_id)
                .unwrap_or_else(|e| reject(connection, &e)),
            ChatEvent::CreateRoom { connection, name, description, is_private, identity } => self
                .handle_create_room(connection, &name, description, is_private, identity)
                .unwrap_or_else(|e| reject(connection, &e)),
            ChatEvent::SendMessage { connection, room_id, content, kind } => self
                .handle_send_message(connection, room_id, content, kind)
                .unwrap_or_else(|e| reject(connection, &e)),
            ChatEvent::TypingStart { connection, room_id } => {
                self.handle_typing(connection, room_id, true)
            },
            ChatEvent::TypingStop { connection, room_id } => {
                self.handle_typing(connection, room_id, false)
            },
            ChatEvent::ListRooms { connection } => self.handle_list_rooms(connection),
            ChatEvent::ListParticipants { connection, room_id } => self
                .handle_list_participants(connection, room_id)
                .unwrap_or_else(|e| reject(connection, &e)),
            ChatEvent::MessageHistory { connection, room_id, limit, offset } => self
                .handle_message_history(connection, room_id, limit, offset)
                .unwrap_or_else(|e| reject(connection, &e)),
            ChatEvent::OnlineUsers { connection } => vec![ChatAction::SendTo {
                connection,
                notice: ServerNotice::OnlineUsers { users: self.users.online() },
            }],
            ChatEvent::Stats { connection } => vec![ChatAction::SendTo {
                connection,
                notice: ServerNotice::Stats { snapshot: self.stats() },
            }],
            ChatEvent::JanitorSweep => self.handle_janitor_sweep(),
        }
    }

    fn handle_connection_opened(&mut self, connection: ConnectionId) -> Vec<ChatAction> {
        if self.registry.connection_count() >= self.config.max_connections {
            tracing::warn!(%connection, "rejecting connection: max connections exceeded");
            return vec![ChatAction::CloseConnection {
                connection,
                reason: "max connections exceeded".to_string(),
            }];
        }

        self.registry.register(connection);
        tracing::debug!(%connection, "connection opened");
        Vec::new()
    }

    /// Establish a bound user for the connection, binding on first use.
    ///
    /// A supplied identity on an already-bound connection is ignored (the
    /// bind is one-shot). `allow_guest` enables the anonymous fallback,
    /// which join permits and create does not.
    fn ensure_bound(
        &mut self,
        connection: ConnectionId,
        identity: Option<Identity>,
        allow_guest: bool,
    ) -> Result<UserId, EngineError> {
        if let Some(user_id) = self.registry.user_of(connection) {
            return Ok(user_id);
        }
        if !self.registry.is_registered(connection) {
            return Err(EngineError::UnknownConnection(connection));
        }

        let identity = match identity {
            Some(identity) => identity,
            None if allow_guest && self.config.allow_anonymous_join => self.guest_identity(),
            None => return Err(EngineError::Unauthenticated),
        };

        let created = self.users.insert_if_absent(User {
            id: identity.user_id,
            display_name: identity.display_name,
            is_online: true,
            joined_at: self.env.now_millis(),
        });
        if created {
            tracing::info!(user = %identity.user_id, "user created");
        }

        self.registry.bind(connection, identity.user_id).map_err(|e| match e {
            BindError::AlreadyBound => EngineError::AlreadyBound,
            BindError::UnknownConnection => EngineError::UnknownConnection(connection),
        })?;

        Ok(identity.user_id)
    }

    /// Ephemeral guest identity for anonymous demo rooms.
    fn guest_identity(&self) -> Identity {
        let user_id = UserId(self.env.random_u64());
        let suffix = self.env.random_u64() & 0xf_ffff;
        Identity { user_id, display_name: format!("User_{suffix:05x}") }
    }

    fn handle_join(
        &mut self,
        connection: ConnectionId,
        room_id: RoomId,
        identity: Option<Identity>,
    ) -> Result<Vec<ChatAction>, EngineError> {
        if !self.directory.contains(room_id) {
            return Err(EngineError::RoomNotFound(room_id));
        }

        let user_id = self.ensure_bound(connection, identity, true)?;

        let newly_joined = self.registry.join(connection, room_id);
        self.directory.add_participant(user_id, room_id);
        self.users.set_online(user_id, true);

        // Repeat joins by the same connection change nothing and announce
        // nothing.
        if !newly_joined {
            return Ok(Vec::new());
        }

        let user = self.user_snapshot(user_id)?;
        let room = self.room_snapshot(room_id)?;
        tracing::info!(user = %user_id, room = %room_id, name = %room.name, "user joined room");

        Ok(vec![ChatAction::BroadcastRoom {
            room_id,
            notice: ServerNotice::UserJoined { user, room },
            exclude: Some(connection),
        }])
    }

    fn handle_leave(
        &mut self,
        connection: ConnectionId,
        room_id: RoomId,
    ) -> Result<Vec<ChatAction>, EngineError> {
        let user_id = self.registry.user_of(connection).ok_or(EngineError::Unauthenticated)?;
        if !self.registry.is_member(connection, room_id) {
            return Err(EngineError::NotInRoom(room_id));
        }

        self.registry.leave(connection, room_id);
        self.directory.remove_participant(user_id, room_id);

        let user = self.user_snapshot(user_id)?;
        let room = self.room_snapshot(room_id)?;
        tracing::info!(user = %user_id, room = %room_id, "user left room");

        // The leaver is already out of the fan-out set; no exclusion needed.
        Ok(vec![ChatAction::BroadcastRoom {
            room_id,
            notice: ServerNotice::UserLeft { user, room },
            exclude: None,
        }])
    }

    fn handle_create_room(
        &mut self,
        connection: ConnectionId,
        name: &str,
        description: Option<String>,
        is_private: bool,
        identity: Option<Identity>,
    ) -> Result<Vec<ChatAction>, EngineError> {
        // Validate before binding: a rejected create must leave no trace,
        // including no user record for a first-time identity.
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidArgument("room name must not be empty".to_string()));
        }

        // No guest fallback here: creation requires an established identity.
        let user_id = self.ensure_bound(connection, identity, false)?;

        let room_id =
            self.directory.create(name, description, user_id, is_private, &self.env)?.id;
        self.ledger.track_room(room_id);

        // Creator auto-joins; nobody else is present, so no join fan-out.
        self.registry.join(connection, room_id);
        self.directory.add_participant(user_id, room_id);

        let room = self.room_snapshot(room_id)?;
        tracing::info!(room = %room_id, name = %room.name, creator = %user_id, "room created");

        let notice = ServerNotice::RoomCreated { room };
        if is_private {
            Ok(vec![ChatAction::SendTo { connection, notice }])
        } else {
            Ok(vec![ChatAction::BroadcastAll { notice }])
        }
    }

    fn handle_send_message(
        &mut self,
        connection: ConnectionId,
        room_id: RoomId,
        content: String,
        kind: MessageKind,
    ) -> Result<Vec<ChatAction>, EngineError> {
        let user_id = self.registry.user_of(connection).ok_or(EngineError::Unauthenticated)?;
        if !self.registry.is_member(connection, room_id) {
            return Err(EngineError::NotInRoom(room_id));
        }

        let user = self.user_snapshot(user_id)?;
        let timestamp = self.env.now_millis();
        let message = Message {
            id: MessageId(self.env.random_u128()),
            content,
            author_id: user_id,
            author_name: user.display_name.clone(),
            room_id,
            timestamp,
            kind,
        };

        self.ledger.append(message.clone());
        self.directory.touch(room_id, timestamp);
        // Sending implies joining: the author is always on the roster.
        self.directory.add_participant(user_id, room_id);

        tracing::debug!(user = %user_id, room = %room_id, id = %message.id, "message appended");

        // The sender is included: the echo doubles as the ack.
        Ok(vec![ChatAction::BroadcastRoom {
            room_id,
            notice: ServerNotice::MessageNew { message, user },
            exclude: None,
        }])
    }

    /// Typing indicators are best-effort: failed preconditions drop the
    /// event silently instead of producing an error notice.
    fn handle_typing(
        &mut self,
        connection: ConnectionId,
        room_id: RoomId,
        started: bool,
    ) -> Vec<ChatAction> {
        let Some(user_id) = self.registry.user_of(connection) else {
            return Vec::new();
        };
        if !self.registry.is_member(connection, room_id) {
            return Vec::new();
        }
        let Some(user) = self.users.get(user_id) else {
            return Vec::new();
        };

        let notice = if started {
            ServerNotice::TypingStarted {
                room_id,
                user_id,
                display_name: user.display_name.clone(),
            }
        } else {
            ServerNotice::TypingStopped { room_id, user_id }
        };

        vec![ChatAction::BroadcastRoom { room_id, notice, exclude: Some(connection) }]
    }

    /// Transport closure: synthesize a leave for every joined room, then
    /// unbind. Idempotent; a second close for the same connection is a no-op.
    fn handle_connection_closed(&mut self, connection: ConnectionId) -> Vec<ChatAction> {
        let Some((bound_user, rooms)) = self.registry.unregister(connection) else {
            return Vec::new();
        };

        let Some(user_id) = bound_user else {
            tracing::debug!(%connection, "connection closed (never bound)");
            return Vec::new();
        };

        // Offline only when the last live connection for the user is gone.
        if self.registry.live_connection_count(user_id) == 0 {
            self.users.set_online(user_id, false);
        }

        let mut rooms: Vec<RoomId> = rooms.into_iter().collect();
        rooms.sort_unstable();

        let mut actions = Vec::new();
        for room_id in rooms {
            self.directory.remove_participant(user_id, room_id);
            let (Ok(user), Ok(room)) =
                (self.user_snapshot(user_id), self.room_snapshot(room_id))
            else {
                continue;
            };
            actions.push(ChatAction::BroadcastRoom {
                room_id,
                notice: ServerNotice::UserLeft { user, room },
                exclude: None,
            });
        }

        tracing::info!(%connection, user = %user_id, rooms = actions.len(), "connection closed");
        actions
    }

    fn handle_list_rooms(&self, connection: ConnectionId) -> Vec<ChatAction> {
        let requester = self.registry.user_of(connection);
        let rooms: Vec<Room> = self
            .directory
            .list()
            .into_iter()
            .filter(|room| {
                !room.is_private
                    || requester.is_some_and(|user_id| room.participants.contains(&user_id))
            })
            .collect();

        vec![ChatAction::SendTo { connection, notice: ServerNotice::RoomList { rooms } }]
    }

    fn handle_list_participants(
        &self,
        connection: ConnectionId,
        room_id: RoomId,
    ) -> Result<Vec<ChatAction>, EngineError> {
        if !self.directory.contains(room_id) {
            return Err(EngineError::RoomNotFound(room_id));
        }
        let users = self.directory.participants(room_id, &self.users);
        Ok(vec![ChatAction::SendTo {
            connection,
            notice: ServerNotice::Participants { room_id, users },
        }])
    }

    fn handle_message_history(
        &self,
        connection: ConnectionId,
        room_id: RoomId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ChatAction>, EngineError> {
        if !self.directory.contains(room_id) {
            return Err(EngineError::RoomNotFound(room_id));
        }
        let messages = self.ledger.recent(room_id, limit, offset);
        Ok(vec![ChatAction::SendTo {
            connection,
            notice: ServerNotice::History { room_id, messages },
        }])
    }

    fn handle_janitor_sweep(&mut self) -> Vec<ChatAction> {
        for (room_id, dropped) in self.ledger.sweep(self.config.retention_limit) {
            tracing::debug!(room = %room_id, dropped, "janitor trimmed room history");
        }
        Vec::new()
    }

    fn user_snapshot(&self, user_id: UserId) -> Result<User, EngineError> {
        self.users.get(user_id).cloned().ok_or(EngineError::Unauthenticated)
    }

    fn room_snapshot(&self, room_id: RoomId) -> Result<Room, EngineError> {
        self.directory.get(room_id).cloned().ok_or(EngineError::RoomNotFound(room_id))
    }

    /// All connections currently joined to a room.
    ///
    /// Used by the runtime to resolve [`ChatAction::BroadcastRoom`] targets
    /// while it still holds the driver lock, so the fan-out set is the
    /// membership at the moment of dispatch.
    pub fn connections_in_room(&self, room_id: RoomId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.registry.connections_in_room(room_id)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    /// Whether a room exists.
    pub fn has_room(&self, room_id: RoomId) -> bool {
        self.directory.contains(room_id)
    }

    /// Resolved roster for a room (read-only query surface).
    pub fn room_participants(&self, room_id: RoomId) -> Vec<User> {
        self.directory.participants(room_id, &self.users)
    }

    /// Counts-only health snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections: self.registry.connection_count(),
            users: self.users.len(),
            online_users: self.users.online_count(),
            rooms: self.directory.len(),
            messages: self.ledger.total_message_count(),
        }
    }
}

impl<E: Environment> std::fmt::Debug for ChatDriver<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatDriver")
            .field("connections", &self.registry.connection_count())
            .field("users", &self.users.len())
            .field("rooms", &self.directory.len())
            .finish()
    }
}

/// Convert a rejection into an `error` notice for the originator only.
fn reject(connection: ConnectionId, error: &EngineError) -> Vec<ChatAction> {
    tracing::warn!(%connection, %error, "event rejected");
    vec![ChatAction::SendTo {
        connection,
        notice: ServerNotice::Error { code: error.code(), message: error.to_string() },
    }]
}
