pub mod grid;
pub mod map;
pub mod spawn;
pub mod state;
pub mod units;
