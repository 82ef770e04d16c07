//! Session registry: connection ↔ user binding and room membership.
//!
//! Maintains bidirectional mappings: room → connections (for fan-out),
//! connection → rooms (for disconnect cleanup), and user → connections (a
//! user may be connected from several devices at once). All lookups are O(1)
//! hash operations.
//!
//! Binding is one-shot: a connection acquires at most one user, on its first
//! successful join or create. Unregistering a connection removes all of its
//! memberships and its user binding.

use std::collections::{HashMap, HashSet};

use crate::types::{ConnectionId, RoomId, UserId};

/// Why a bind was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// The connection already has a bound user.
    #[error("connection already bound")]
    AlreadyBound,
    /// The connection was never registered (or already unregistered).
    #[error("connection not registered")]
    UnknownConnection,
}

/// Registry tracking live connections, their bound users, and their rooms.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Connection → bound user (`None` until first successful join/create).
    bindings: HashMap<ConnectionId, Option<UserId>>,
    /// Room → connections currently joined.
    room_members: HashMap<RoomId, HashSet<ConnectionId>>,
    /// Connection → rooms currently joined.
    connection_rooms: HashMap<ConnectionId, HashSet<RoomId>>,
    /// User → live connections bound to that user.
    user_connections: HashMap<UserId, HashSet<ConnectionId>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with no bound user.
    ///
    /// Returns `false` if the connection is already registered.
    pub fn register(&mut self, connection: ConnectionId) -> bool {
        if self.bindings.contains_key(&connection) {
            return false;
        }
        self.bindings.insert(connection, None);
        self.connection_rooms.insert(connection, HashSet::new());
        true
    }

    /// Check if a connection is registered.
    pub fn is_registered(&self, connection: ConnectionId) -> bool {
        self.bindings.contains_key(&connection)
    }

    /// Bind a connection to a resolved user.
    ///
    /// One-shot: rejects with [`BindError::AlreadyBound`] if the connection
    /// already has a user. Idempotent join attempts must be rejected here,
    /// not silently overwritten.
    pub fn bind(&mut self, connection: ConnectionId, user: UserId) -> Result<(), BindError> {
        let slot = self.bindings.get_mut(&connection).ok_or(BindError::UnknownConnection)?;
        if slot.is_some() {
            return Err(BindError::AlreadyBound);
        }
        *slot = Some(user);
        self.user_connections.entry(user).or_default().insert(connection);
        Ok(())
    }

    /// The user bound to a connection, if any.
    pub fn user_of(&self, connection: ConnectionId) -> Option<UserId> {
        self.bindings.get(&connection).copied().flatten()
    }

    /// All live connections bound to a user.
    ///
    /// Supports multi-device fan-out; empty if the user has no live
    /// connections.
    pub fn connections_of(&self, user: UserId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.user_connections.get(&user).into_iter().flat_map(|c| c.iter().copied())
    }

    /// Number of live connections bound to a user.
    pub fn live_connection_count(&self, user: UserId) -> usize {
        self.user_connections.get(&user).map_or(0, HashSet::len)
    }

    /// Add a connection to a room's membership.
    ///
    /// Returns `false` if the connection is unregistered or was already a
    /// member (no change).
    pub fn join(&mut self, connection: ConnectionId, room_id: RoomId) -> bool {
        let Some(rooms) = self.connection_rooms.get_mut(&connection) else {
            return false;
        };
        let added = rooms.insert(room_id);
        if added {
            self.room_members.entry(room_id).or_default().insert(connection);
        }
        added
    }

    /// Remove a connection from a room's membership.
    ///
    /// Returns `true` if the connection was a member and is no longer.
    pub fn leave(&mut self, connection: ConnectionId, room_id: RoomId) -> bool {
        let removed = self
            .connection_rooms
            .get_mut(&connection)
            .is_some_and(|rooms| rooms.remove(&room_id));

        if let Some(members) = self.room_members.get_mut(&room_id) {
            members.remove(&connection);
            if members.is_empty() {
                self.room_members.remove(&room_id);
            }
        }

        removed
    }

    /// Check if a connection is currently joined to a room.
    pub fn is_member(&self, connection: ConnectionId, room_id: RoomId) -> bool {
        self.room_members.get(&room_id).is_some_and(|m| m.contains(&connection))
    }

    /// All connections currently joined to a room. The fan-out target set.
    pub fn connections_in_room(&self, room_id: RoomId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.room_members.get(&room_id).into_iter().flat_map(|m| m.iter().copied())
    }

    /// All rooms a connection is currently joined to.
    pub fn rooms_of(&self, connection: ConnectionId) -> impl Iterator<Item = RoomId> + '_ {
        self.connection_rooms.get(&connection).into_iter().flat_map(|r| r.iter().copied())
    }

    /// Unregister a connection: removes its user binding and all memberships.
    ///
    /// Returns the bound user (if any) and the set of rooms the connection
    /// was in, so the caller can synthesize per-room departures. Idempotent:
    /// a second unregister returns `None` and changes nothing.
    pub fn unregister(
        &mut self,
        connection: ConnectionId,
    ) -> Option<(Option<UserId>, HashSet<RoomId>)> {
        let user = self.bindings.remove(&connection)?;
        let rooms = self.connection_rooms.remove(&connection).unwrap_or_default();

        if let Some(user_id) = user {
            if let Some(conns) = self.user_connections.get_mut(&user_id) {
                conns.remove(&connection);
                if conns.is_empty() {
                    self.user_connections.remove(&user_id);
                }
            }
        }

        for room_id in &rooms {
            if let Some(members) = self.room_members.get_mut(room_id) {
                members.remove(&connection);
                if members.is_empty() {
                    self.room_members.remove(room_id);
                }
            }
        }

        Some((user, rooms))
    }

    /// Total number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of connections currently joined to a room.
    pub fn room_connection_count(&self, room_id: RoomId) -> usize {
        self.room_members.get(&room_id).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM_A: RoomId = RoomId(0x1111);
    const ROOM_B: RoomId = RoomId(0x2222);

    #[test]
    fn register_and_lookup() {
        let mut registry = SessionRegistry::new();

        assert!(registry.register(ConnectionId(1)));
        assert!(registry.is_registered(ConnectionId(1)));
        assert!(!registry.is_registered(ConnectionId(2)));
        assert_eq!(registry.user_of(ConnectionId(1)), None);
    }

    #[test]
    fn register_duplicate_fails() {
        let mut registry = SessionRegistry::new();

        assert!(registry.register(ConnectionId(1)));
        assert!(!registry.register(ConnectionId(1)));
    }

    #[test]
    fn bind_is_one_shot() {
        let mut registry = SessionRegistry::new();
        registry.register(ConnectionId(1));

        assert_eq!(registry.bind(ConnectionId(1), UserId(42)), Ok(()));
        assert_eq!(registry.user_of(ConnectionId(1)), Some(UserId(42)));

        // Second bind is rejected, not overwritten.
        assert_eq!(registry.bind(ConnectionId(1), UserId(99)), Err(BindError::AlreadyBound));
        assert_eq!(registry.user_of(ConnectionId(1)), Some(UserId(42)));
    }

    #[test]
    fn bind_unregistered_connection_fails() {
        let mut registry = SessionRegistry::new();

        assert_eq!(registry.bind(ConnectionId(9), UserId(1)), Err(BindError::UnknownConnection));
    }

    #[test]
    fn one_user_many_connections() {
        let mut registry = SessionRegistry::new();
        registry.register(ConnectionId(1));
        registry.register(ConnectionId(2));

        registry.bind(ConnectionId(1), UserId(42)).unwrap();
        registry.bind(ConnectionId(2), UserId(42)).unwrap();

        let conns: HashSet<_> = registry.connections_of(UserId(42)).collect();
        assert_eq!(conns.len(), 2);
        assert_eq!(registry.live_connection_count(UserId(42)), 2);

        registry.unregister(ConnectionId(1));
        assert_eq!(registry.live_connection_count(UserId(42)), 1);

        registry.unregister(ConnectionId(2));
        assert_eq!(registry.live_connection_count(UserId(42)), 0);
    }

    #[test]
    fn join_and_fan_out_set() {
        let mut registry = SessionRegistry::new();
        registry.register(ConnectionId(1));
        registry.register(ConnectionId(2));

        assert!(registry.join(ConnectionId(1), ROOM_A));
        assert!(registry.join(ConnectionId(2), ROOM_A));

        let members: HashSet<_> = registry.connections_in_room(ROOM_A).collect();
        assert_eq!(members.len(), 2);
        assert!(registry.is_member(ConnectionId(1), ROOM_A));
    }

    #[test]
    fn join_is_idempotent() {
        let mut registry = SessionRegistry::new();
        registry.register(ConnectionId(1));

        assert!(registry.join(ConnectionId(1), ROOM_A));
        assert!(!registry.join(ConnectionId(1), ROOM_A));
        assert_eq!(registry.room_connection_count(ROOM_A), 1);
    }

    #[test]
    fn join_unregistered_fails() {
        let mut registry = SessionRegistry::new();

        assert!(!registry.join(ConnectionId(9), ROOM_A));
        assert_eq!(registry.room_connection_count(ROOM_A), 0);
    }

    #[test]
    fn leave_removes_from_both_maps() {
        let mut registry = SessionRegistry::new();
        registry.register(ConnectionId(1));
        registry.join(ConnectionId(1), ROOM_A);

        assert!(registry.leave(ConnectionId(1), ROOM_A));
        assert!(!registry.is_member(ConnectionId(1), ROOM_A));
        assert_eq!(registry.rooms_of(ConnectionId(1)).count(), 0);

        // Second leave reports no change.
        assert!(!registry.leave(ConnectionId(1), ROOM_A));
    }

    #[test]
    fn unregister_returns_binding_and_rooms() {
        let mut registry = SessionRegistry::new();
        registry.register(ConnectionId(1));
        registry.bind(ConnectionId(1), UserId(42)).unwrap();
        registry.join(ConnectionId(1), ROOM_A);
        registry.join(ConnectionId(1), ROOM_B);

        let (user, rooms) = registry.unregister(ConnectionId(1)).unwrap();
        assert_eq!(user, Some(UserId(42)));
        assert_eq!(rooms.len(), 2);
        assert!(rooms.contains(&ROOM_A));
        assert!(rooms.contains(&ROOM_B));

        // All traces are gone.
        assert!(!registry.is_registered(ConnectionId(1)));
        assert_eq!(registry.connections_in_room(ROOM_A).count(), 0);
        assert_eq!(registry.live_connection_count(UserId(42)), 0);

        // Idempotent.
        assert!(registry.unregister(ConnectionId(1)).is_none());
    }

    #[test]
    fn unregister_leaves_other_members_in_room() {
        let mut registry = SessionRegistry::new();
        registry.register(ConnectionId(1));
        registry.register(ConnectionId(2));
        registry.join(ConnectionId(1), ROOM_A);
        registry.join(ConnectionId(2), ROOM_A);

        registry.unregister(ConnectionId(1));

        let members: Vec<_> = registry.connections_in_room(ROOM_A).collect();
        assert_eq!(members, vec![ConnectionId(2)]);
    }

    #[test]
    fn connection_count_tracks_lifecycle() {
        let mut registry = SessionRegistry::new();

        assert_eq!(registry.connection_count(), 0);
        registry.register(ConnectionId(1));
        registry.register(ConnectionId(2));
        assert_eq!(registry.connection_count(), 2);
        registry.unregister(ConnectionId(1));
        assert_eq!(registry.connection_count(), 1);
    }
}
