//! Sans-IO chat room coordination engine.
//!
//! Tracks which participants are connected, which rooms exist, who belongs
//! to which room, and computes the fan-out set for every message, presence,
//! and typing notification, with bounded per-room history retention.
//!
//! # Architecture
//!
//! The engine is pure logic: no sockets, no clock, no RNG. Time and
//! randomness are injected through the [`Environment`] trait, inputs arrive
//! as [`ChatEvent`]s, and effects leave as [`ChatAction`]s for a runtime to
//! execute. A runtime serializes events through one [`ChatDriver`]; see the
//! `palaver-server` crate for the production tokio runtime.
//!
//! # Components
//!
//! - [`ChatDriver`]: the protocol state machine and fan-out computation
//! - [`SessionRegistry`]: connection ↔ user binding and room membership
//! - [`RoomDirectory`]: rooms, metadata, participant rosters
//! - [`MessageLedger`]: per-room message logs with janitor eviction
//! - [`UserTable`]: every user ever resolved, with online flags

mod config;
mod directory;
mod driver;
pub mod env;
mod error;
mod event;
mod ledger;
mod registry;
mod types;
mod users;

pub use config::EngineConfig;
pub use directory::{GENERAL_ROOM_NAME, RoomDirectory};
pub use driver::ChatDriver;
pub use error::{EngineError, ErrorCode};
pub use event::{ChatAction, ChatEvent, ServerNotice, StatsSnapshot};
pub use ledger::MessageLedger;
pub use registry::{BindError, SessionRegistry};
pub use types::{
    ConnectionId, Identity, Message, MessageId, MessageKind, Room, RoomId, User, UserId,
};
pub use users::UserTable;
