//! Core data model: ids, users, rooms, and messages.
//!
//! Ids are opaque numeric newtypes. Connections and users are `u64` (assigned
//! by the runtime and the identity boundary respectively); rooms and messages
//! are `u128` random tokens generated through the [`Environment`](crate::env::Environment).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle for one live transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable user identity, derived from authentication and never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    /// Reserved id used as the creator of system-owned rooms.
    pub const SYSTEM: UserId = UserId(0);
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier.
///
/// System-generated random token, except [`RoomId::GENERAL`]: the well-known
/// default room that exists before any other operation and is never removed.
///
/// Serialized as a 32-character lowercase hex string; JSON numbers cannot
/// carry 128 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub u128);

impl RoomId {
    /// The default room. Always present.
    pub const GENERAL: RoomId = RoomId(0);
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Message identifier. Same 32-character hex wire form as [`RoomId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u128);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

// Hand-written serde for the 128-bit ids: the wire form is the hex Display
// form, in both directions.
macro_rules! hex_id_serde {
    ($id:ident) => {
        impl Serialize for $id {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $id {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                u128::from_str_radix(&text, 16).map($id).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id_serde!(RoomId);
hex_id_serde!(MessageId);

/// A resolved identity, produced by the authentication boundary.
///
/// The engine never sees raw credentials; the runtime's identity resolver
/// collaborator turns transport-layer credentials into this pair (or
/// rejects them) before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id.
    pub user_id: UserId,
    /// Name shown to other participants.
    pub display_name: String,
}

/// A chat participant.
///
/// Created on first successful identity resolution and never deleted; only
/// the online flag toggles afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable id.
    pub id: UserId,
    /// Name shown to other participants.
    pub display_name: String,
    /// Whether at least one live connection is bound to this user.
    pub is_online: bool,
    /// Unix millis when the user record was created.
    pub joined_at: u64,
}

/// A named channel with a participant roster and message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room id.
    pub id: RoomId,
    /// Display name. Never empty.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// User who created the room ([`UserId::SYSTEM`] for the default room).
    pub created_by: UserId,
    /// Unix millis at creation.
    pub created_at: u64,
    /// Private rooms are announced and listed only to their participants.
    pub is_private: bool,
    /// Participating users. User-scoped: a user stays on the roster no
    /// matter how many live connections they have.
    pub participants: std::collections::BTreeSet<UserId>,
    /// Unix millis of the most recent message or creation.
    pub last_activity: u64,
}

/// Kind of message payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text (the default).
    #[default]
    Text,
    /// Image reference.
    Image,
    /// File reference.
    File,
    /// Server-generated notice.
    System,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id.
    pub id: MessageId,
    /// Message body.
    pub content: String,
    /// Author's user id.
    pub author_id: UserId,
    /// Author's display name, captured at send time and never re-resolved.
    pub author_name: String,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Unix millis at send time. Primary ordering key; ties are broken by
    /// insertion order.
    pub timestamp: u64,
    /// Payload kind.
    pub kind: MessageKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_displays_as_hex() {
        let id = RoomId(0x1234);
        assert_eq!(id.to_string(), "00000000000000000000000000001234");
    }

    #[test]
    fn general_room_id_is_stable() {
        assert_eq!(RoomId::GENERAL, RoomId(0));
    }

    #[test]
    fn room_id_round_trips_through_hex_json() {
        let id = RoomId(u128::MAX - 7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"fffffffffffffffffffffffffffffff8\"");
        assert_eq!(serde_json::from_str::<RoomId>(&json).unwrap(), id);
    }

    #[test]
    fn room_id_rejects_non_hex() {
        assert!(serde_json::from_str::<RoomId>("\"not-hex\"").is_err());
        assert!(serde_json::from_str::<RoomId>("17").is_err());
    }

    #[test]
    fn message_kind_serializes_lowercase() {
        let json = serde_json::to_string(&MessageKind::Image).unwrap();
        assert_eq!(json, "\"image\"");
    }

    #[test]
    fn message_kind_defaults_to_text() {
        assert_eq!(MessageKind::default(), MessageKind::Text);
    }
}
