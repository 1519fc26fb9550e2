//! Seeded tile map generation.
//!
//! The server only ships `{size, seed}` to clients; both sides rebuild the
//! same grid with [`TileMap::generate`]. `ChaCha8Rng` keeps the sequence
//! stable across platforms and releases.

use crate::logic::grid::GridPos;
use crate::logic::spawn::spawn_slots;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Tiles within this Chebyshev radius of a spawn slot are never water.
pub const SPAWN_CLEAR_RADIUS: i32 = 3;

const WATER_CHANCE: f64 = 0.10;
const ORE_CHANCE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TileKind {
    Grass,
    Water,
    Ore,
}

impl TileKind {
    pub const fn is_passable(self) -> bool {
        !matches!(self, Self::Water)
    }
}

/// What a client needs to rebuild the map locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapData {
    pub size: u32,
    pub seed: u64,
}

impl MapData {
    pub fn generate(self) -> TileMap {
        TileMap::generate(self.size, self.seed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMap {
    size: u32,
    seed: u64,
    // Row-major: index = y * size + x
    tiles: Vec<TileKind>,
}

impl TileMap {
    pub fn generate(size: u32, seed: u64) -> Self {
        log::debug!("Generating {size}x{size} map with seed {seed}");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cells = size as usize * size as usize;
        let mut tiles = Vec::with_capacity(cells);
        for _ in 0..cells {
            let roll: f64 = rng.gen();
            let tile = if roll < WATER_CHANCE {
                TileKind::Water
            } else if roll < WATER_CHANCE + ORE_CHANCE {
                TileKind::Ore
            } else {
                TileKind::Grass
            };
            tiles.push(tile);
        }

        let mut map = Self { size, seed, tiles };
        for slot in spawn_slots(size) {
            map.clear_water_around(slot.position, SPAWN_CLEAR_RADIUS);
        }
        map
    }

    pub const fn size(&self) -> u32 {
        self.size
    }

    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub const fn data(&self) -> MapData {
        MapData {
            size: self.size,
            seed: self.seed,
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn index(&self, pos: GridPos) -> Option<usize> {
        if !pos.in_bounds(self.size) {
            return None;
        }
        Some(pos.y as usize * self.size as usize + pos.x as usize)
    }

    /// `None` outside the map.
    pub fn tile(&self, pos: GridPos) -> Option<TileKind> {
        self.index(pos).and_then(|i| self.tiles.get(i).copied())
    }

    pub fn is_passable(&self, pos: GridPos) -> bool {
        self.tile(pos).is_some_and(TileKind::is_passable)
    }

    fn clear_water_around(&mut self, center: GridPos, radius: i32) {
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                let Some(i) = self.index(center.offset(dx, dy)) else {
                    continue;
                };
                if let Some(tile) = self.tiles.get_mut(i) {
                    if *tile == TileKind::Water {
                        *tile = TileKind::Grass;
                    }
                }
            }
        }
    }

    pub fn count(&self, kind: TileKind) -> usize {
        self.tiles.iter().filter(|t| **t == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_map() {
        let a = TileMap::generate(64, 42);
        let b = MapData { size: 64, seed: 42 }.generate();
        assert_eq!(a, b);
        let c = TileMap::generate(64, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn test_spawn_areas_are_dry() {
        let map = TileMap::generate(128, 7);
        for slot in spawn_slots(128) {
            for dx in -SPAWN_CLEAR_RADIUS..=SPAWN_CLEAR_RADIUS {
                for dy in -SPAWN_CLEAR_RADIUS..=SPAWN_CLEAR_RADIUS {
                    let pos = slot.position.offset(dx, dy);
                    assert!(map.is_passable(pos), "water at {pos} near spawn");
                }
            }
        }
    }

    #[test]
    fn test_distribution_is_roughly_as_configured() {
        let map = TileMap::generate(128, 99);
        let total = 128.0 * 128.0;
        #[allow(clippy::cast_precision_loss)]
        let water = map.count(TileKind::Water) as f64 / total;
        #[allow(clippy::cast_precision_loss)]
        let ore = map.count(TileKind::Ore) as f64 / total;
        assert!((0.05..0.12).contains(&water), "water share {water}");
        assert!((0.10..0.20).contains(&ore), "ore share {ore}");
    }

    #[test]
    fn test_outside_tiles_are_impassable() {
        let map = TileMap::generate(32, 1);
        assert_eq!(map.tile(GridPos::new(-1, 0)), None);
        assert!(!map.is_passable(GridPos::new(32, 5)));
    }
}
