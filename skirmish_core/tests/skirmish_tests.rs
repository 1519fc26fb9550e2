#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use skirmish_core::engine::{BotOrder, BotPlanner, BotTuning};
    use skirmish_core::logic::grid::{Facing, GridPos};
    use skirmish_core::logic::map::{MapData, TileKind, TileMap};
    use skirmish_core::logic::spawn::{slot_for, spawn_slots};
    use skirmish_core::logic::state::{GameState, MoveOrder};

    fn skirmish(players: &[&str], size: u32, seed: u64) -> GameState {
        let mut state = GameState::new(TileMap::generate(size, seed));
        for (index, player) in players.iter().enumerate() {
            let placed = state.spawn_formation(player, slot_for(index, size));
            assert_eq!(placed.len(), 3);
        }
        state
    }

    #[test]
    fn test_clients_regenerate_the_same_map() {
        let data = MapData { size: 96, seed: 1234 };
        let server = TileMap::generate(data.size, data.seed);
        let client = data.generate();
        for y in 0..96 {
            for x in 0..96 {
                let pos = GridPos::new(x, y);
                assert_eq!(server.tile(pos), client.tile(pos));
            }
        }
        for slot in spawn_slots(96) {
            assert_ne!(server.tile(slot.position), Some(TileKind::Water));
        }
    }

    #[test]
    fn test_six_players_fit_without_overlap() {
        let players = ["a", "b", "c", "d", "e", "f"];
        let state = skirmish(&players, 32, 5);
        assert_eq!(state.units().len(), 18);
        assert!(state.occupancy_is_consistent());
        assert_eq!(state.surviving_owners().len(), 6);
    }

    #[test]
    fn test_bots_fight_it_out_without_breaking_occupancy() {
        let mut state = skirmish(&["red", "blue"], 48, 11);
        let planner = BotPlanner::new(BotTuning::default());
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let never_allied = |_: &str, _: &str| false;
        let mut accepted = 0;

        for turn in 0..2_000u64 {
            let ids: Vec<String> = state.units().keys().cloned().collect();
            for id in ids {
                let Some(unit) = state.unit(&id) else { continue };
                let owner = unit.owner.clone();
                let Some(order) = planner.plan_unit(&state, unit, never_allied, &mut rng) else {
                    continue;
                };
                let ok = match &order {
                    BotOrder::Move(order) => state.apply_move(&owner, order, turn).is_ok(),
                    BotOrder::Attack(order) => {
                        state.apply_attack(&owner, order, never_allied).is_ok()
                    }
                };
                if ok {
                    accepted += 1;
                }
                assert!(state.occupancy_is_consistent());
                for unit in state.units().values() {
                    assert!(unit.position.in_bounds(48));
                }
            }
            if state.surviving_owners().len() < 2 {
                break;
            }
        }
        assert!(accepted > 0);
    }

    #[test]
    fn test_unit_wire_format() {
        let mut state = skirmish(&["p1"], 64, 2);
        let order = MoveOrder {
            unit_id: "TANK_p1".into(),
            target: GridPos::new(12, 12),
            facing: Facing::South,
            duration: 800,
            turn_duration: 450,
        };
        state.apply_move("p1", &order, 1_700_000_000_000).unwrap();

        let value = serde_json::to_value(state.unit("TANK_p1").unwrap()).unwrap();
        assert_eq!(value["id"], "TANK_p1");
        assert_eq!(value["kind"], "TANK");
        assert_eq!(value["x"], 12);
        assert_eq!(value["y"], 12);
        assert_eq!(value["facing"], 180);
        assert_eq!(value["health"], 100);
        assert_eq!(value["lastMove"]["fromX"], 10);
        assert_eq!(value["lastMove"]["fromFacing"], 135);
        assert_eq!(value["lastMove"]["timestamp"], 1_700_000_000_000u64);
        assert_eq!(value["lastMove"]["turnDuration"], 450);

        let fresh = serde_json::to_value(state.unit("INFANTRY_p1").unwrap()).unwrap();
        assert!(fresh.get("lastMove").is_none());
    }
}
