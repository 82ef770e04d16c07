//! User table.
//!
//! Users are created on first successful identity resolution and persist for
//! the process lifetime. There is no hard delete; disconnects only toggle the
//! online flag.

use std::collections::HashMap;

use crate::types::{User, UserId};

/// In-memory table of every user the engine has ever seen.
#[derive(Debug, Default)]
pub struct UserTable {
    users: HashMap<UserId, User>,
}

impl UserTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user record unless one already exists for the id.
    ///
    /// Reconnecting users keep their original record (id is stable, the
    /// display name was captured at creation). Returns `true` if a record
    /// was created.
    pub fn insert_if_absent(&mut self, user: User) -> bool {
        match self.users.entry(user.id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(user);
                true
            },
        }
    }

    /// Look up a user by id.
    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Set a user's online flag. No-op for unknown ids.
    pub fn set_online(&mut self, id: UserId, online: bool) {
        if let Some(user) = self.users.get_mut(&id) {
            user.is_online = online;
        }
    }

    /// All users currently online, ordered by id for determinism.
    pub fn online(&self) -> Vec<User> {
        let mut online: Vec<User> = self.users.values().filter(|u| u.is_online).cloned().collect();
        online.sort_by_key(|u| u.id);
        online
    }

    /// Total number of user records.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Number of users currently online.
    pub fn online_count(&self) -> usize {
        self.users.values().filter(|u| u.is_online).count()
    }
}
