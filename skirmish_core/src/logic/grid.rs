use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer cell coordinate. `y` grows downward (south), matching screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub const fn in_bounds(self, size: u32) -> bool {
        let size = size as i64;
        let (x, y) = (self.x as i64, self.y as i64);
        x >= 0 && x < size && y >= 0 && y < size
    }

    /// Squared Euclidean distance, exact in integer space.
    pub const fn distance_sq(self, other: Self) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx * dx + dy * dy
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn distance(self, other: Self) -> f64 {
        (self.distance_sq(other) as f64).sqrt()
    }

    /// Clamps into `[0, size)`; `size` must be non-zero.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn clamp_to(self, size: u32) -> Self {
        let max = size.saturating_sub(1).min(i32::MAX as u32) as i32;
        Self {
            x: self.x.clamp(0, max),
            y: self.y.clamp(0, max),
        }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of eight compass directions in 45 degree steps.
///
/// On the wire a facing is its clockwise angle from north in degrees, so
/// `North` is `0`, `East` is `90` and `SouthEast` is `135`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Facing {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Facing {
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    pub const fn index(self) -> u8 {
        match self {
            Self::North => 0,
            Self::NorthEast => 1,
            Self::East => 2,
            Self::SouthEast => 3,
            Self::South => 4,
            Self::SouthWest => 5,
            Self::West => 6,
            Self::NorthWest => 7,
        }
    }

    pub const fn from_index(index: u8) -> Self {
        match index % 8 {
            0 => Self::North,
            1 => Self::NorthEast,
            2 => Self::East,
            3 => Self::SouthEast,
            4 => Self::South,
            5 => Self::SouthWest,
            6 => Self::West,
            _ => Self::NorthWest,
        }
    }

    pub const fn degrees(self) -> u16 {
        self.index() as u16 * 45
    }

    pub const fn from_degrees(degrees: u16) -> Option<Self> {
        if degrees % 45 != 0 || degrees >= 360 {
            return None;
        }
        Some(Self::from_index((degrees / 45) as u8))
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        Self::from_index(self.index() + 4)
    }

    /// Number of 45 degree steps on the shorter arc between two facings (0..=4).
    pub const fn steps_to(self, other: Self) -> u8 {
        let diff = (other.index() + 8 - self.index()) % 8;
        if diff > 4 {
            8 - diff
        } else {
            diff
        }
    }

    /// Facing that points from `from` toward `to`, snapped to the nearest
    /// octant. Returns `None` when both cells are the same.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn toward(from: GridPos, to: GridPos) -> Option<Self> {
        if from == to {
            return None;
        }
        let dx = f64::from(to.x) - f64::from(from.x);
        let dy = f64::from(to.y) - f64::from(from.y);
        // Clockwise from north with y pointing south.
        let angle = dx.atan2(-dy).to_degrees().rem_euclid(360.0);
        let octant = (angle / 45.0).round() as u8;
        Some(Self::from_index(octant))
    }
}

impl From<Facing> for u16 {
    fn from(facing: Facing) -> Self {
        facing.degrees()
    }
}

impl TryFrom<u16> for Facing {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        Self::from_degrees(degrees)
            .ok_or_else(|| format!("facing must be a multiple of 45 below 360, got {degrees}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_round_trip_for_every_octant() {
        for facing in Facing::ALL {
            assert_eq!(Facing::from_degrees(facing.degrees()), Some(facing));
        }
        assert_eq!(Facing::from_degrees(30), None);
        assert_eq!(Facing::from_degrees(360), None);
    }

    #[test]
    fn test_toward_uses_screen_axes() {
        let origin = GridPos::new(5, 5);
        assert_eq!(Facing::toward(origin, GridPos::new(5, 4)), Some(Facing::North));
        assert_eq!(Facing::toward(origin, GridPos::new(6, 6)), Some(Facing::SouthEast));
        assert_eq!(Facing::toward(origin, GridPos::new(4, 5)), Some(Facing::West));
        assert_eq!(Facing::toward(origin, GridPos::new(4, 4)), Some(Facing::NorthWest));
        assert_eq!(Facing::toward(origin, origin), None);
    }

    #[test]
    fn test_steps_take_the_short_arc() {
        assert_eq!(Facing::North.steps_to(Facing::NorthWest), 1);
        assert_eq!(Facing::North.steps_to(Facing::South), 4);
        assert_eq!(Facing::East.steps_to(Facing::NorthWest), 3);
        assert_eq!(Facing::SouthEast.opposite(), Facing::NorthWest);
    }

    #[test]
    fn test_bounds_and_clamp() {
        assert!(GridPos::new(0, 127).in_bounds(128));
        assert!(!GridPos::new(128, 0).in_bounds(128));
        assert!(!GridPos::new(-1, 3).in_bounds(128));
        assert_eq!(GridPos::new(-4, 200).clamp_to(128), GridPos::new(0, 127));
    }

    #[test]
    fn test_facing_serializes_as_degrees() {
        let json = serde_json::to_string(&Facing::SouthWest).unwrap();
        assert_eq!(json, "225");
        let parsed: Facing = serde_json::from_str("315").unwrap();
        assert_eq!(parsed, Facing::NorthWest);
        assert!(serde_json::from_str::<Facing>("100").is_err());
    }
}
