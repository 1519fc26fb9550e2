use crate::logic::grid::{Facing, GridPos};
use crate::logic::units::UnitKind;
use serde::{Deserialize, Serialize};

pub const SPAWN_SLOT_COUNT: usize = 6;

/// Distance of the corner slots from the map edge.
const EDGE_INSET: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnSlot {
    pub position: GridPos,
    pub facing: Facing,
}

/// The fixed spawn rotation for a map. Consecutive slots sit in opposite
/// corners and face each other, so a two player game uses slots 0 and 1.
#[allow(clippy::cast_possible_wrap)]
pub fn spawn_slots(map_size: u32) -> [SpawnSlot; SPAWN_SLOT_COUNT] {
    let s = map_size.min(i32::MAX as u32) as i32;
    let near = EDGE_INSET;
    let far = s - EDGE_INSET;
    let mid = s / 2;
    [
        slot(near, near, Facing::SouthEast),
        slot(far, far, Facing::NorthWest),
        slot(far, near, Facing::SouthWest),
        slot(near, far, Facing::NorthEast),
        slot(mid, near, Facing::South),
        slot(mid, far, Facing::North),
    ]
}

const fn slot(x: i32, y: i32, facing: Facing) -> SpawnSlot {
    SpawnSlot {
        position: GridPos::new(x, y),
        facing,
    }
}

/// Slot for the `join_index`-th player, wrapping around the rotation.
pub fn slot_for(join_index: usize, map_size: u32) -> SpawnSlot {
    let slots = spawn_slots(map_size);
    let [first, ..] = slots;
    slots
        .get(join_index % SPAWN_SLOT_COUNT)
        .copied()
        .unwrap_or(first)
}

/// Starting units for one player: tank on the slot, infantry to its east,
/// harvester to its south.
pub const fn starting_formation(slot: SpawnSlot) -> [(UnitKind, GridPos); 3] {
    [
        (UnitKind::Tank, slot.position),
        (UnitKind::Infantry, slot.position.offset(1, 0)),
        (UnitKind::Harvester, slot.position.offset(0, 1)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_two_slots_face_each_other() {
        let slots = spawn_slots(128);
        assert_eq!(slots[0].position, GridPos::new(10, 10));
        assert_eq!(slots[1].position, GridPos::new(118, 118));
        assert_eq!(slots[0].facing.opposite(), slots[1].facing);
        assert_eq!(slots[2].facing.opposite(), slots[3].facing);
        assert_eq!(slots[4].facing.opposite(), slots[5].facing);
    }

    #[test]
    fn test_slot_rotation_wraps() {
        assert_eq!(slot_for(6, 64), slot_for(0, 64));
        assert_eq!(slot_for(7, 64).position, GridPos::new(54, 54));
    }

    #[test]
    fn test_formations_do_not_overlap_across_slots() {
        let mut cells = std::collections::HashSet::new();
        for slot in spawn_slots(32) {
            for (_, pos) in starting_formation(slot) {
                assert!(pos.in_bounds(32));
                assert!(cells.insert(pos), "overlap at {pos}");
            }
        }
    }
}
