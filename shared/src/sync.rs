//! Client-side helpers for staying consistent with the authority.
//!
//! Every server broadcast carries a strictly increasing per-session
//! `serverTimestamp`. A client keeps a [`SyncCursor`]: after applying a
//! snapshot it ignores any broadcast stamped at or before that snapshot, and
//! it ignores duplicates delivered again after a reconnect.

use crate::{GameSnapshot, ServerMessage};
use skirmish_core::logic::grid::{Facing, GridPos};
use skirmish_core::logic::units::Unit;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCursor {
    last_sync: Option<u64>,
}

impl SyncCursor {
    pub const fn new() -> Self {
        Self { last_sync: None }
    }

    pub const fn last_sync(&self) -> Option<u64> {
        self.last_sync
    }

    /// Moves the cursor to a freshly applied snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &GameSnapshot) {
        self.last_sync = Some(snapshot.server_timestamp);
    }

    /// Returns `true` if a broadcast stamped `timestamp` should be applied,
    /// advancing the cursor when it is.
    pub fn accept(&mut self, timestamp: u64) -> bool {
        match self.last_sync {
            Some(last) if timestamp <= last => false,
            _ => {
                self.last_sync = Some(timestamp);
                true
            }
        }
    }

    /// Filters a whole message. Snapshots always apply and reset the cursor;
    /// messages without a timestamp always apply.
    pub fn accept_message(&mut self, msg: &ServerMessage) -> bool {
        match msg {
            ServerMessage::GameStart(snapshot) | ServerMessage::GameState(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            other => other.server_timestamp().map_or(true, |ts| self.accept(ts)),
        }
    }
}

/// Where to pick up a unit's animation after a snapshot arrives mid-move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumePoint {
    pub from: GridPos,
    pub from_facing: Facing,
    pub to: GridPos,
    pub to_facing: Facing,
    pub remaining_ms: u64,
    pub total_ms: u64,
    /// Share of the move already played, in `[0, 1)`.
    pub progress: f64,
}

/// `None` when the unit has no move or its move has finished by `now`.
pub fn resume_point(unit: &Unit, now: u64) -> Option<ResumePoint> {
    let last = unit.last_move?;
    let remaining_ms = last.remaining_ms(now);
    if remaining_ms == 0 {
        return None;
    }
    Some(ResumePoint {
        from: last.from_position(),
        from_facing: last.from_facing,
        to: unit.position,
        to_facing: unit.facing,
        remaining_ms,
        total_ms: last.total_ms(),
        progress: last.progress(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SessionPhase, UnitDestroyed};
    use skirmish_core::logic::map::MapData;
    use skirmish_core::logic::units::{LastMove, UnitKind};
    use std::collections::BTreeMap;

    fn snapshot_at(ts: u64) -> GameSnapshot {
        GameSnapshot {
            session_id: "s".into(),
            state: SessionPhase::Running,
            players: Vec::new(),
            units: BTreeMap::new(),
            map_data: MapData { size: 32, seed: 1 },
            server_timestamp: ts,
        }
    }

    #[test]
    fn test_cursor_drops_stale_and_duplicate_broadcasts() {
        let mut cursor = SyncCursor::new();
        assert!(cursor.accept_message(&ServerMessage::GameState(Box::new(snapshot_at(100)))));
        assert!(!cursor.accept(90));
        assert!(!cursor.accept(100));
        assert!(cursor.accept(101));
        assert!(!cursor.accept(101));
        let destroyed = ServerMessage::UnitDestroyed(UnitDestroyed {
            unit_id: "u".into(),
            server_timestamp: 102,
        });
        assert!(cursor.accept_message(&destroyed));
        assert!(!cursor.accept_message(&destroyed));
        assert_eq!(cursor.last_sync(), Some(102));
    }

    #[test]
    fn test_resume_point_mid_move() {
        let mut unit = Unit::spawn(UnitKind::Tank, "p", GridPos::new(12, 10), Facing::East);
        unit.last_move = Some(LastMove {
            from_x: 10,
            from_y: 10,
            from_facing: Facing::North,
            timestamp: 1_000,
            duration: 800,
            turn_duration: 300,
        });
        let resume = resume_point(&unit, 1_400).unwrap();
        assert_eq!(resume.remaining_ms, 700);
        assert!(resume.remaining_ms > 0 && resume.remaining_ms < resume.total_ms);
        assert_eq!(resume.from, GridPos::new(10, 10));
        assert_eq!(resume.to, GridPos::new(12, 10));
        assert!(resume_point(&unit, 2_100).is_none());
    }
}
