use crate::logic::grid::{Facing, GridPos};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitKind {
    Tank,
    Infantry,
    Harvester,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    CombatLight,
    CombatHeavy,
    Harvester,
}

impl UnitClass {
    pub const fn is_combat(self) -> bool {
        matches!(self, Self::CombatLight | Self::CombatHeavy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStats {
    pub class: UnitClass,
    pub max_health: u32,
    pub damage: u32,
    /// Attack range in tiles (Euclidean).
    pub range: u32,
    pub ms_per_tile: u32,
    /// Time for one 45 degree turn.
    pub ms_per_turn_step: u32,
}

const TANK: UnitStats = UnitStats {
    class: UnitClass::CombatHeavy,
    max_health: 100,
    damage: 20,
    range: 3,
    ms_per_tile: 400,
    ms_per_turn_step: 150,
};

const INFANTRY: UnitStats = UnitStats {
    class: UnitClass::CombatLight,
    max_health: 50,
    damage: 10,
    range: 2,
    ms_per_tile: 500,
    ms_per_turn_step: 60,
};

const HARVESTER: UnitStats = UnitStats {
    class: UnitClass::Harvester,
    max_health: 75,
    damage: 0,
    range: 0,
    ms_per_tile: 600,
    ms_per_turn_step: 120,
};

impl UnitKind {
    pub const ALL: [Self; 3] = [Self::Tank, Self::Infantry, Self::Harvester];

    pub const fn stats(self) -> &'static UnitStats {
        match self {
            Self::Tank => &TANK,
            Self::Infantry => &INFANTRY,
            Self::Harvester => &HARVESTER,
        }
    }

    pub const fn class(self) -> UnitClass {
        self.stats().class
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Self::Tank => "TANK",
            Self::Infantry => "INFANTRY",
            Self::Harvester => "HARVESTER",
        }
    }

    /// Unit ids are `KIND_owner`; each player gets one unit of each kind.
    pub fn unit_id(self, owner: &str) -> String {
        format!("{}_{owner}", self.tag())
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl UnitStats {
    /// Straight-line travel time, rounded up to whole milliseconds.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn move_duration_ms(&self, from: GridPos, to: GridPos) -> u32 {
        (from.distance(to) * f64::from(self.ms_per_tile)).ceil() as u32
    }

    pub fn turn_duration_ms(&self, from: Facing, to: Facing) -> u32 {
        u32::from(from.steps_to(to)) * self.ms_per_turn_step
    }

    pub fn in_range(&self, from: GridPos, to: GridPos) -> bool {
        let range = i64::from(self.range);
        from.distance_sq(to) <= range * range
    }
}

/// The authority's memo of a unit's most recent move: where it came from and
/// how long clients should take to animate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMove {
    pub from_x: i32,
    pub from_y: i32,
    pub from_facing: Facing,
    /// Authority timestamp (ms since the Unix epoch) at acceptance.
    pub timestamp: u64,
    pub duration: u32,
    pub turn_duration: u32,
}

impl LastMove {
    pub const fn from_position(&self) -> GridPos {
        GridPos::new(self.from_x, self.from_y)
    }

    /// Turn then travel.
    pub const fn total_ms(&self) -> u64 {
        self.duration as u64 + self.turn_duration as u64
    }

    pub const fn ends_at(&self) -> u64 {
        self.timestamp.saturating_add(self.total_ms())
    }

    /// Milliseconds of animation still to play at `now`; zero once elapsed.
    pub const fn remaining_ms(&self, now: u64) -> u64 {
        let end = self.ends_at();
        if now >= end {
            0
        } else if now <= self.timestamp {
            self.total_ms()
        } else {
            end - now
        }
    }

    pub const fn is_in_flight(&self, now: u64) -> bool {
        self.remaining_ms(now) > 0
    }

    /// Fraction of the whole move already played, in `[0, 1]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self, now: u64) -> f64 {
        let total = self.total_ms();
        if total == 0 {
            return 1.0;
        }
        1.0 - self.remaining_ms(now) as f64 / total as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub owner: String,
    pub kind: UnitKind,
    #[serde(flatten)]
    pub position: GridPos,
    pub facing: Facing,
    pub health: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move: Option<LastMove>,
}

impl Unit {
    pub fn spawn(kind: UnitKind, owner: &str, position: GridPos, facing: Facing) -> Self {
        Self {
            id: kind.unit_id(owner),
            owner: owner.to_string(),
            kind,
            position,
            facing,
            health: kind.stats().max_health,
            last_move: None,
        }
    }

    pub const fn stats(&self) -> &'static UnitStats {
        self.kind.stats()
    }

    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }
}
