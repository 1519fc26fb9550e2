//! Game rules for the skirmish session server: the tile grid, unit stats,
//! spawn layout, the authoritative unit state and the bot planner.
//!
//! Nothing in here performs I/O or knows about time sources; callers pass
//! timestamps and random generators in.

pub mod engine;
pub mod logic;
