//! Message ledger: per-room append-only logs with bounded retention.
//!
//! Appends are ordered by logical time (timestamp, then insertion sequence).
//! The janitor periodically trims each room to the most recent N entries,
//! dropping oldest first and never reordering survivors. Trimming is
//! per-room: one room's outcome never affects another.

use std::collections::{HashMap, HashSet};

use crate::types::{Message, RoomId};

/// One ledger entry: a message plus its insertion sequence number.
///
/// The sequence breaks timestamp ties deterministically.
#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    message: Message,
}

/// Append-only per-room message logs.
#[derive(Debug, Default)]
pub struct MessageLedger {
    logs: HashMap<RoomId, Vec<Entry>>,
    next_seq: u64,
}

impl MessageLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty log for a room.
    ///
    /// Called at room creation. Idempotent.
    pub fn track_room(&mut self, room_id: RoomId) {
        self.logs.entry(room_id).or_default();
    }

    /// Append a message to its room's log.
    ///
    /// Returns the insertion sequence assigned to the entry. The room's log
    /// is created on first append if `track_room` was never called.
    pub fn append(&mut self, message: Message) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.logs.entry(message.room_id).or_default().push(Entry { seq, message });
        seq
    }

    /// Paginated history window, oldest→newest within the window.
    ///
    /// The window is computed by ordering newest-first by
    /// `(timestamp, seq)`, slicing `[offset, offset + limit)`, then
    /// reversing: `offset = 0` yields the most recent `limit` messages in
    /// chronological order.
    pub fn recent(&self, room_id: RoomId, limit: usize, offset: usize) -> Vec<Message> {
        let Some(log) = self.logs.get(&room_id) else {
            return Vec::new();
        };

        let mut newest_first: Vec<&Entry> = log.iter().collect();
        newest_first.sort_by(|a, b| {
            (b.message.timestamp, b.seq).cmp(&(a.message.timestamp, a.seq))
        });

        let mut window: Vec<Message> = newest_first
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|e| e.message.clone())
            .collect();
        window.reverse();
        window
    }

    /// Trim a room's log to the `keep` most recent entries.
    ///
    /// Recency is `(timestamp, seq)`; oldest entries are dropped first and
    /// survivor order is preserved. Returns how many entries were dropped.
    pub fn evict(&mut self, room_id: RoomId, keep: usize) -> usize {
        let Some(log) = self.logs.get_mut(&room_id) else {
            return 0;
        };
        if log.len() <= keep {
            return 0;
        }

        let mut by_recency: Vec<(u64, u64)> =
            log.iter().map(|e| (e.message.timestamp, e.seq)).collect();
        by_recency.sort_unstable();
        let dropped: HashSet<u64> =
            by_recency.iter().take(log.len() - keep).map(|&(_, seq)| seq).collect();

        // Swap in the trimmed copy; survivors keep their original order.
        let trimmed: Vec<Entry> =
            log.iter().filter(|e| !dropped.contains(&e.seq)).cloned().collect();
        let removed = log.len() - trimmed.len();
        *log = trimmed;
        removed
    }

    /// Janitor sweep: evict every room to the retention bound.
    ///
    /// Returns `(room, dropped)` per trimmed room. Rooms are processed
    /// independently, so one room's trim never aborts the sweep.
    pub fn sweep(&mut self, keep: usize) -> Vec<(RoomId, usize)> {
        let rooms: Vec<RoomId> = self.logs.keys().copied().collect();
        rooms
            .into_iter()
            .filter_map(|room_id| {
                let dropped = self.evict(room_id, keep);
                (dropped > 0).then_some((room_id, dropped))
            })
            .collect()
    }

    /// Number of messages currently held for a room.
    pub fn room_message_count(&self, room_id: RoomId) -> usize {
        self.logs.get(&room_id).map_or(0, Vec::len)
    }

    /// Total messages across all rooms.
    pub fn total_message_count(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }
}
