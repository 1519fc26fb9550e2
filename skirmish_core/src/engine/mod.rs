pub mod bot;

pub use bot::{BotOrder, BotPlanner, BotTuning};
