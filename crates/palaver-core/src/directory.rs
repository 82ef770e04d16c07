//! Room directory.
//!
//! Rooms must be explicitly created (no lazy creation). The directory owns
//! room metadata and the user-scoped participant rosters; connection-level
//! membership lives in the [`SessionRegistry`](crate::registry::SessionRegistry).
//!
//! The default room exists from construction and is never removed.

use std::collections::{BTreeSet, HashMap};

use crate::{
    env::Environment,
    error::EngineError,
    types::{Room, RoomId, User, UserId},
    users::UserTable,
};

/// Name of the default room.
pub const GENERAL_ROOM_NAME: &str = "General";

/// The set of rooms, their metadata, and participant rosters.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, Room>,
}

impl RoomDirectory {
    /// Create a directory seeded with the default room.
    ///
    /// `now` is the creation timestamp (unix millis) recorded for it.
    pub fn new(now: u64) -> Self {
        let general = Room {
            id: RoomId::GENERAL,
            name: GENERAL_ROOM_NAME.to_string(),
            description: Some("Default chat room for everyone".to_string()),
            created_by: UserId::SYSTEM,
            created_at: now,
            is_private: false,
            participants: BTreeSet::new(),
            last_activity: now,
        };
        let mut rooms = HashMap::new();
        rooms.insert(general.id, general);
        Self { rooms }
    }

    /// Create a new room with a fresh random id and an empty roster.
    ///
    /// Fails with `InvalidArgument` on an empty (or whitespace-only) name.
    pub fn create<E: Environment>(
        &mut self,
        name: &str,
        description: Option<String>,
        created_by: UserId,
        is_private: bool,
        env: &E,
    ) -> Result<&Room, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidArgument("room name must not be empty".to_string()));
        }

        // 128-bit random ids; retry on the astronomically unlikely collision.
        let mut id = RoomId(env.random_u128());
        while self.rooms.contains_key(&id) {
            id = RoomId(env.random_u128());
        }

        let now = env.now_millis();
        let room = Room {
            id,
            name: name.to_string(),
            description,
            created_by,
            created_at: now,
            is_private,
            participants: BTreeSet::new(),
            last_activity: now,
        };
        Ok(self.rooms.entry(id).or_insert(room))
    }

    /// Look up a room by id.
    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    /// Check if a room exists.
    pub fn contains(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// All rooms ordered by `last_activity` descending, ties by id.
    ///
    /// Recomputed per call; there is no cached ordering, so the most recent
    /// mutation always sorts first.
    pub fn list(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.values().cloned().collect();
        rooms.sort_by(|a, b| b.last_activity.cmp(&a.last_activity).then(a.id.cmp(&b.id)));
        rooms
    }

    /// Add a user to a room's roster.
    ///
    /// Idempotent: returns `true` only when the roster changed. `false` for
    /// unknown rooms.
    pub fn add_participant(&mut self, user_id: UserId, room_id: RoomId) -> bool {
        self.rooms.get_mut(&room_id).is_some_and(|room| room.participants.insert(user_id))
    }

    /// Remove a user from a room's roster. Same idempotence contract.
    pub fn remove_participant(&mut self, user_id: UserId, room_id: RoomId) -> bool {
        self.rooms.get_mut(&room_id).is_some_and(|room| room.participants.remove(&user_id))
    }

    /// Resolve a room's roster against the user table.
    ///
    /// Ids that no longer resolve are silently dropped rather than failing;
    /// the roster and the table can briefly disagree and queries must not
    /// amplify that.
    pub fn participants(&self, room_id: RoomId, users: &UserTable) -> Vec<User> {
        self.rooms.get(&room_id).map_or_else(Vec::new, |room| {
            room.participants.iter().filter_map(|id| users.get(*id)).cloned().collect()
        })
    }

    /// Bump a room's `last_activity`. No-op for unknown rooms.
    pub fn touch(&mut self, room_id: RoomId, at: u64) {
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.last_activity = at;
        }
    }

    /// Total number of rooms, the default room included.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Always `false`; the default room is never removed.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// All room ids. Order is not guaranteed.
    pub fn room_ids(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.rooms.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        fn now_millis(&self) -> u64 {
            1_700_000_000_000
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            use rand::RngCore;
            rand::thread_rng().fill_bytes(buffer);
        }
    }

    #[test]
    fn default_room_exists_from_construction() {
        let directory = RoomDirectory::new(5);

        let general = directory.get(RoomId::GENERAL).unwrap();
        assert_eq!(general.name, GENERAL_ROOM_NAME);
        assert_eq!(general.created_by, UserId::SYSTEM);
        assert!(!general.is_private);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn create_rejects_empty_name() {
        let mut directory = RoomDirectory::new(0);

        let result = directory.create("   ", None, UserId(1), false, &TestEnv);
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn create_initializes_metadata() {
        let mut directory = RoomDirectory::new(0);

        let room =
            directory.create("ops", Some("war room".into()), UserId(7), true, &TestEnv).unwrap();
        assert_eq!(room.name, "ops");
        assert_eq!(room.created_by, UserId(7));
        assert!(room.is_private);
        assert!(room.participants.is_empty());
        assert_eq!(room.created_at, room.last_activity);
    }

    #[test]
    fn roster_adds_are_idempotent() {
        let mut directory = RoomDirectory::new(0);

        assert!(directory.add_participant(UserId(1), RoomId::GENERAL));
        assert!(!directory.add_participant(UserId(1), RoomId::GENERAL));
        assert_eq!(directory.get(RoomId::GENERAL).unwrap().participants.len(), 1);

        assert!(directory.remove_participant(UserId(1), RoomId::GENERAL));
        assert!(!directory.remove_participant(UserId(1), RoomId::GENERAL));
    }

    #[test]
    fn roster_ops_on_unknown_room_report_no_change() {
        let mut directory = RoomDirectory::new(0);

        assert!(!directory.add_participant(UserId(1), RoomId(0xdead)));
        assert!(!directory.remove_participant(UserId(1), RoomId(0xdead)));
    }

    #[test]
    fn list_orders_by_recency() {
        let mut directory = RoomDirectory::new(10);
        let ops = directory.create("ops", None, UserId(1), false, &TestEnv).unwrap().id;

        directory.touch(RoomId::GENERAL, 2_000_000_000_000);
        let listed = directory.list();
        assert_eq!(listed[0].id, RoomId::GENERAL);

        // The ordering is recomputed per call.
        directory.touch(ops, 3_000_000_000_000);
        let listed = directory.list();
        assert_eq!(listed[0].id, ops);
    }

    #[test]
    fn participants_drop_unresolvable_ids() {
        let mut directory = RoomDirectory::new(0);
        let mut users = UserTable::new();
        users.insert_if_absent(crate::types::User {
            id: UserId(1),
            display_name: "ada".into(),
            is_online: true,
            joined_at: 0,
        });

        directory.add_participant(UserId(1), RoomId::GENERAL);
        directory.add_participant(UserId(999), RoomId::GENERAL); // never registered

        let resolved = directory.participants(RoomId::GENERAL, &users);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, UserId(1));
    }
}
