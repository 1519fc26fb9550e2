//! Order generation for AI-controlled players.
//!
//! The planner only proposes orders; the caller pushes them through the same
//! validation as human commands, so a bad proposal is simply rejected.

use crate::logic::grid::{Facing, GridPos};
use crate::logic::state::{AttackOrder, GameState, MoveOrder};
use crate::logic::units::Unit;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How many random cells a harvester tries before giving up for this tick.
const HARVEST_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotTuning {
    /// Tiles a combat unit advances toward its target per order.
    pub stride: i32,
    /// Random offset added to each axis of a combat step, in `[-jitter, jitter]`.
    pub jitter: i32,
    pub harvest_radius: i32,
    /// Fire at targets already in range instead of closing in.
    pub attack: bool,
}

impl Default for BotTuning {
    fn default() -> Self {
        Self {
            stride: 2,
            jitter: 1,
            harvest_radius: 3,
            attack: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotOrder {
    Move(MoveOrder),
    Attack(AttackOrder),
}

impl BotOrder {
    pub fn unit_id(&self) -> &str {
        match self {
            Self::Move(order) => &order.unit_id,
            Self::Attack(order) => &order.unit_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BotPlanner {
    tuning: BotTuning,
}

impl BotPlanner {
    pub const fn new(tuning: BotTuning) -> Self {
        Self { tuning }
    }

    pub const fn tuning(&self) -> &BotTuning {
        &self.tuning
    }

    /// Proposes one order for `unit`. `same_side(a, b)` tells whether two
    /// owners are allies.
    pub fn plan_unit<R: Rng + ?Sized>(
        &self,
        state: &GameState,
        unit: &Unit,
        same_side: impl Fn(&str, &str) -> bool,
        rng: &mut R,
    ) -> Option<BotOrder> {
        if unit.stats().class.is_combat() {
            Some(self.plan_combat(state, unit, same_side, rng))
        } else {
            self.plan_harvest(state, unit, rng).map(BotOrder::Move)
        }
    }

    fn plan_harvest<R: Rng + ?Sized>(
        &self,
        state: &GameState,
        unit: &Unit,
        rng: &mut R,
    ) -> Option<MoveOrder> {
        let r = self.tuning.harvest_radius.max(1);
        for _ in 0..HARVEST_ATTEMPTS {
            let target = unit
                .position
                .offset(rng.gen_range(-r..=r), rng.gen_range(-r..=r));
            if target == unit.position
                || !state.map().is_passable(target)
                || state.unit_at(target).is_some()
            {
                continue;
            }
            return Some(move_order(unit, target));
        }
        None
    }

    fn plan_combat<R: Rng + ?Sized>(
        &self,
        state: &GameState,
        unit: &Unit,
        same_side: impl Fn(&str, &str) -> bool,
        rng: &mut R,
    ) -> BotOrder {
        let nearest = state
            .units()
            .values()
            .filter(|other| other.owner != unit.owner && !same_side(unit.owner.as_str(), other.owner.as_str()))
            .min_by(|a, b| {
                let da = unit.position.distance_sq(a.position);
                let db = unit.position.distance_sq(b.position);
                da.cmp(&db).then_with(|| a.id.cmp(&b.id))
            });

        let Some(enemy) = nearest else {
            return BotOrder::Move(self.wander(state, unit, rng));
        };

        if self.tuning.attack
            && unit.stats().damage > 0
            && unit.stats().in_range(unit.position, enemy.position)
        {
            return BotOrder::Attack(AttackOrder {
                unit_id: unit.id.clone(),
                target_id: enemy.id.clone(),
            });
        }

        let target = self.step_toward(unit.position, enemy.position, rng);
        let target = target.clamp_to(state.map_size());
        if target == unit.position {
            return BotOrder::Move(self.wander(state, unit, rng));
        }
        BotOrder::Move(move_order(unit, target))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn step_toward<R: Rng + ?Sized>(&self, from: GridPos, to: GridPos, rng: &mut R) -> GridPos {
        let dist = from.distance(to);
        let stride = f64::from(self.tuning.stride);
        let (dx, dy) = if dist <= stride {
            (to.x - from.x, to.y - from.y)
        } else {
            let scale = stride / dist;
            (
                (f64::from(to.x - from.x) * scale).round() as i32,
                (f64::from(to.y - from.y) * scale).round() as i32,
            )
        };
        let j = self.tuning.jitter.max(0);
        from.offset(dx + rng.gen_range(-j..=j), dy + rng.gen_range(-j..=j))
    }

    fn wander<R: Rng + ?Sized>(&self, state: &GameState, unit: &Unit, rng: &mut R) -> MoveOrder {
        let s = self.tuning.stride.max(1);
        let mut target = unit.position;
        while target == unit.position {
            target = unit
                .position
                .offset(rng.gen_range(-s..=s), rng.gen_range(-s..=s))
                .clamp_to(state.map_size());
        }
        move_order(unit, target)
    }
}

/// Move order with durations taken from the unit's stats rather than trusted
/// from a client.
fn move_order(unit: &Unit, target: GridPos) -> MoveOrder {
    let stats = unit.stats();
    let facing = Facing::toward(unit.position, target).unwrap_or(unit.facing);
    MoveOrder {
        unit_id: unit.id.clone(),
        target,
        facing,
        duration: stats.move_duration_ms(unit.position, target),
        turn_duration: stats.turn_duration_ms(unit.facing, facing),
    }
}
