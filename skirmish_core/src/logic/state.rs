//! The authoritative unit state of one session.
//!
//! `GameState` is the only writer of unit position, facing, health and
//! `last_move`. Positions are committed the moment a move is accepted; the
//! move's durations only describe how clients animate it. Occupancy is
//! therefore checked against where units already are, never where they are
//! heading.

use crate::logic::grid::{Facing, GridPos};
use crate::logic::map::TileMap;
use crate::logic::spawn::{starting_formation, SpawnSlot};
use crate::logic::units::{LastMove, Unit};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRejection {
    UnknownUnit,
    NotOwner,
    OutOfBounds,
    Occupied,
    UnknownTarget,
    FriendlyTarget,
    OutOfRange,
    CannotAttack,
}

impl fmt::Display for CommandRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::UnknownUnit => "unit does not exist",
            Self::NotOwner => "sender does not own the unit",
            Self::OutOfBounds => "target outside the map",
            Self::Occupied => "target cell occupied",
            Self::UnknownTarget => "target unit does not exist",
            Self::FriendlyTarget => "target is friendly",
            Self::OutOfRange => "target out of range",
            Self::CannotAttack => "unit has no weapon",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOrder {
    pub unit_id: String,
    pub target: GridPos,
    pub facing: Facing,
    pub duration: u32,
    pub turn_duration: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOrder {
    pub unit_id: String,
    pub target_id: String,
}

/// Result of an accepted attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub damage: u32,
    pub target_health: u32,
    pub destroyed: bool,
}

#[derive(Debug, Clone)]
pub struct GameState {
    map: TileMap,
    units: BTreeMap<String, Unit>,
    occupancy: HashMap<GridPos, String>,
    /// Every id ever handed out, so a destroyed unit's id is never reissued.
    issued_ids: BTreeSet<String>,
}

impl GameState {
    pub fn new(map: TileMap) -> Self {
        Self {
            map,
            units: BTreeMap::new(),
            occupancy: HashMap::new(),
            issued_ids: BTreeSet::new(),
        }
    }

    pub const fn map(&self) -> &TileMap {
        &self.map
    }

    pub const fn map_size(&self) -> u32 {
        self.map.size()
    }

    pub const fn units(&self) -> &BTreeMap<String, Unit> {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn unit_at(&self, pos: GridPos) -> Option<&Unit> {
        self.occupancy.get(&pos).and_then(|id| self.units.get(id))
    }

    pub fn units_owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Unit> + 'a {
        self.units.values().filter(move |u| u.owner == owner)
    }

    /// Owners that still have at least one unit on the map.
    pub fn surviving_owners(&self) -> BTreeSet<&str> {
        self.units.values().map(|u| u.owner.as_str()).collect()
    }

    /// Places a unit. Returns `false` (and changes nothing) if the id was
    /// ever used before or the cell is taken.
    pub fn insert_unit(&mut self, unit: Unit) -> bool {
        if self.issued_ids.contains(&unit.id)
            || !unit.position.in_bounds(self.map.size())
            || self.occupancy.contains_key(&unit.position)
        {
            return false;
        }
        self.issued_ids.insert(unit.id.clone());
        self.occupancy.insert(unit.position, unit.id.clone());
        self.units.insert(unit.id.clone(), unit);
        true
    }

    /// Creates the starting formation for `owner` at `slot`. Returns the ids
    /// of the units that could be placed.
    pub fn spawn_formation(&mut self, owner: &str, slot: SpawnSlot) -> Vec<String> {
        let mut placed = Vec::new();
        for (kind, pos) in starting_formation(slot) {
            let unit = Unit::spawn(kind, owner, pos, slot.facing);
            let id = unit.id.clone();
            if self.insert_unit(unit) {
                placed.push(id);
            } else {
                log::warn!("Could not place {id} at {pos}");
            }
        }
        placed
    }

    fn owned_unit(&self, sender: &str, unit_id: &str) -> Result<&Unit, CommandRejection> {
        let unit = self
            .units
            .get(unit_id)
            .ok_or(CommandRejection::UnknownUnit)?;
        if unit.owner != sender {
            return Err(CommandRejection::NotOwner);
        }
        Ok(unit)
    }

    /// Checks a move without changing anything.
    pub fn validate_move(&self, sender: &str, order: &MoveOrder) -> Result<(), CommandRejection> {
        let unit = self.owned_unit(sender, &order.unit_id)?;
        if !order.target.in_bounds(self.map.size()) {
            return Err(CommandRejection::OutOfBounds);
        }
        match self.occupancy.get(&order.target) {
            Some(occupant) if *occupant != unit.id => Err(CommandRejection::Occupied),
            _ => Ok(()),
        }
    }

    /// Validates and commits a move stamped with the authority's `timestamp`.
    pub fn apply_move(
        &mut self,
        sender: &str,
        order: &MoveOrder,
        timestamp: u64,
    ) -> Result<&Unit, CommandRejection> {
        self.validate_move(sender, order)?;
        let unit = self
            .units
            .get_mut(&order.unit_id)
            .ok_or(CommandRejection::UnknownUnit)?;

        unit.last_move = Some(LastMove {
            from_x: unit.position.x,
            from_y: unit.position.y,
            from_facing: unit.facing,
            timestamp,
            duration: order.duration,
            turn_duration: order.turn_duration,
        });
        let from = unit.position;
        unit.position = order.target;
        unit.facing = order.facing;

        if from != order.target {
            self.occupancy.remove(&from);
            self.occupancy.insert(order.target, order.unit_id.clone());
        }
        Ok(unit)
    }

    /// Checks an attack. `same_side(a, b)` reports whether two owners are
    /// allies; an owner is always its own ally.
    pub fn validate_attack(
        &self,
        sender: &str,
        order: &AttackOrder,
        same_side: impl Fn(&str, &str) -> bool,
    ) -> Result<(), CommandRejection> {
        let attacker = self.owned_unit(sender, &order.unit_id)?;
        let target = self
            .units
            .get(&order.target_id)
            .ok_or(CommandRejection::UnknownTarget)?;
        if target.owner == attacker.owner || same_side(attacker.owner.as_str(), target.owner.as_str()) {
            return Err(CommandRejection::FriendlyTarget);
        }
        let stats = attacker.stats();
        if stats.damage == 0 {
            return Err(CommandRejection::CannotAttack);
        }
        if !stats.in_range(attacker.position, target.position) {
            return Err(CommandRejection::OutOfRange);
        }
        Ok(())
    }

    /// Validates and resolves an attack; a target brought to zero health is
    /// removed from the map.
    pub fn apply_attack(
        &mut self,
        sender: &str,
        order: &AttackOrder,
        same_side: impl Fn(&str, &str) -> bool,
    ) -> Result<AttackOutcome, CommandRejection> {
        self.validate_attack(sender, order, same_side)?;
        let damage = self
            .units
            .get(&order.unit_id)
            .map(|u| u.stats().damage)
            .ok_or(CommandRejection::UnknownUnit)?;
        let target = self
            .units
            .get_mut(&order.target_id)
            .ok_or(CommandRejection::UnknownTarget)?;
        target.health = target.health.saturating_sub(damage);
        let target_health = target.health;
        let destroyed = !target.is_alive();
        if destroyed {
            self.remove_unit(&order.target_id);
        }
        Ok(AttackOutcome {
            damage,
            target_health,
            destroyed,
        })
    }

    pub fn remove_unit(&mut self, id: &str) -> Option<Unit> {
        let unit = self.units.remove(id)?;
        if self.occupancy.get(&unit.position).is_some_and(|o| o == id) {
            self.occupancy.remove(&unit.position);
        }
        Some(unit)
    }

    /// True when no two units share a cell. Cheap enough for tests and
    /// debug assertions, not for the hot path.
    pub fn occupancy_is_consistent(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.units.values().all(|u| seen.insert(u.position))
            && self.occupancy.len() == self.units.len()
            && self
                .occupancy
                .iter()
                .all(|(pos, id)| self.units.get(id).is_some_and(|u| u.position == *pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::spawn::slot_for;
    use crate::logic::units::UnitKind;

    fn two_player_state() -> GameState {
        let mut state = GameState::new(TileMap::generate(64, 5));
        state.spawn_formation("p1", slot_for(0, 64));
        state.spawn_formation("p2", slot_for(1, 64));
        state
    }

    fn step(unit_id: &str, x: i32, y: i32) -> MoveOrder {
        MoveOrder {
            unit_id: unit_id.to_string(),
            target: GridPos::new(x, y),
            facing: Facing::East,
            duration: 400,
            turn_duration: 150,
        }
    }

    #[test]
    fn test_move_commits_immediately_and_records_last_move() {
        let mut state = two_player_state();
        let unit = state
            .apply_move("p1", &step("TANK_p1", 9, 10), 5_000)
            .unwrap();
        assert_eq!(unit.position, GridPos::new(9, 10));
        assert_eq!(unit.facing, Facing::East);
        let last = unit.last_move.unwrap();
        assert_eq!(last.from_position(), GridPos::new(10, 10));
        assert_eq!(last.from_facing, Facing::SouthEast);
        assert_eq!(last.timestamp, 5_000);
        assert_eq!(state.unit_at(GridPos::new(9, 10)).unwrap().id, "TANK_p1");
        assert!(state.unit_at(GridPos::new(10, 10)).is_none());
    }

    #[test]
    fn test_rejections() {
        let mut state = two_player_state();
        assert_eq!(
            state.apply_move("p1", &step("TANK_p2", 50, 50), 1).unwrap_err(),
            CommandRejection::NotOwner
        );
        assert_eq!(
            state.apply_move("p1", &step("NOPE", 5, 5), 1).unwrap_err(),
            CommandRejection::UnknownUnit
        );
        assert_eq!(
            state.apply_move("p1", &step("TANK_p1", 64, 3), 1).unwrap_err(),
            CommandRejection::OutOfBounds
        );
        assert_eq!(
            state.apply_move("p1", &step("TANK_p1", 11, 10), 1).unwrap_err(),
            CommandRejection::Occupied
        );
        assert_eq!(state.unit("TANK_p1").unwrap().position, GridPos::new(10, 10));
    }

    #[test]
    fn test_turning_in_place_is_allowed() {
        let mut state = two_player_state();
        let unit = state.apply_move("p1", &step("TANK_p1", 10, 10), 9).unwrap();
        assert_eq!(unit.facing, Facing::East);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn test_attack_damages_and_destroys() {
        let mut state = two_player_state();
        // Walk the enemy harvester next to our tank.
        state.remove_unit("HARVESTER_p2");
        let harvester = Unit::spawn(UnitKind::Harvester, "p3", GridPos::new(12, 10), Facing::West);
        assert!(state.insert_unit(harvester));

        let order = AttackOrder {
            unit_id: "TANK_p1".into(),
            target_id: "HARVESTER_p3".into(),
        };
        let never = |_: &str, _: &str| false;
        for expected in [55, 35, 15] {
            let outcome = state.apply_attack("p1", &order, never).unwrap();
            assert_eq!(outcome.target_health, expected);
            assert!(!outcome.destroyed);
        }
        let outcome = state.apply_attack("p1", &order, never).unwrap();
        assert!(outcome.destroyed);
        assert!(state.unit("HARVESTER_p3").is_none());
        assert!(state.unit_at(GridPos::new(12, 10)).is_none());
        assert_eq!(
            state.apply_attack("p1", &order, never).unwrap_err(),
            CommandRejection::UnknownTarget
        );
    }

    #[test]
    fn test_attack_rejections() {
        let state = two_player_state();
        let never = |_: &str, _: &str| false;
        let far = AttackOrder {
            unit_id: "TANK_p1".into(),
            target_id: "TANK_p2".into(),
        };
        assert_eq!(
            state.validate_attack("p1", &far, never),
            Err(CommandRejection::OutOfRange)
        );
        let own = AttackOrder {
            unit_id: "TANK_p1".into(),
            target_id: "INFANTRY_p1".into(),
        };
        assert_eq!(
            state.validate_attack("p1", &own, never),
            Err(CommandRejection::FriendlyTarget)
        );
        let allied = |_: &str, _: &str| true;
        assert_eq!(
            state.validate_attack("p1", &far, allied),
            Err(CommandRejection::FriendlyTarget)
        );
        let unarmed = AttackOrder {
            unit_id: "HARVESTER_p1".into(),
            target_id: "TANK_p2".into(),
        };
        assert_eq!(
            state.validate_attack("p1", &unarmed, never),
            Err(CommandRejection::CannotAttack)
        );
    }

    #[test]
    fn test_destroyed_ids_are_not_reissued() {
        let mut state = two_player_state();
        assert!(state.remove_unit("TANK_p1").is_some());
        let again = Unit::spawn(UnitKind::Tank, "p1", GridPos::new(30, 30), Facing::North);
        assert!(!state.insert_unit(again));
        assert_eq!(state.surviving_owners().len(), 2);
    }
}
