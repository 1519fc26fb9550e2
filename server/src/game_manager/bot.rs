use crate::config::BotConfig;
use crate::game_manager::actor::SessionActor;
use crate::game_manager::move_handler::GateRejection;
use crate::game_manager::session::same_side;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shared::SessionPhase;
use skirmish_core::engine::{BotOrder, BotPlanner};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Drives the bot players of one session. Owned by the session actor and
/// only ticked while the session is running.
pub struct BotController {
    planner: BotPlanner,
    cooldown: Duration,
    /// Earliest instant each bot unit may be ordered again.
    ready_at: HashMap<String, Instant>,
    rng: ChaCha8Rng,
}

impl BotController {
    pub fn new(config: &BotConfig, seed: u64) -> Self {
        Self {
            planner: BotPlanner::new(config.tuning),
            cooldown: config.cooldown(),
            ready_at: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn is_ready(&self, unit_id: &str, now: Instant) -> bool {
        self.ready_at.get(unit_id).map_or(true, |at| now >= *at)
    }

    /// Never shorter than the order's own animation.
    fn cool_down(&mut self, unit_id: &str, now: Instant, order: &BotOrder) {
        let busy = match order {
            BotOrder::Move(order) => {
                Duration::from_millis(u64::from(order.duration) + u64::from(order.turn_duration))
            }
            BotOrder::Attack(_) => Duration::ZERO,
        };
        self.ready_at
            .insert(unit_id.to_string(), now + self.cooldown.max(busy));
    }
}

impl SessionActor {
    pub(super) fn start_bots(&mut self) {
        if self.bots.is_none() || self.bot_tick.is_some() {
            return;
        }
        let mut interval = time::interval_at(Instant::now() + self.bot_period, self.bot_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.bot_tick = Some(interval);
        tracing::debug!(session_id = %self.session.id, period = ?self.bot_period, "Bot loop started");
    }

    pub(super) fn stop_bots(&mut self) {
        if self.bot_tick.take().is_some() {
            tracing::debug!(session_id = %self.session.id, "Bot loop stopped");
        }
    }

    /// One pass over every bot: each bot gets at most one accepted order per
    /// tick, its units tried in id order until one goes through.
    pub(super) fn run_bot_tick(&mut self) {
        if self.session.phase != SessionPhase::Running {
            self.stop_bots();
            return;
        }
        let now = Instant::now();
        for bot_id in self.session.bot_ids() {
            if self.session.phase != SessionPhase::Running {
                return;
            }
            let unit_ids: Vec<String> = self
                .session
                .state
                .units_owned_by(&bot_id)
                .map(|u| u.id.clone())
                .collect();

            for unit_id in unit_ids {
                let Some(order) = self.plan_bot_order(&unit_id, now) else {
                    continue;
                };
                let result = match &order {
                    BotOrder::Move(order) => self.submit_move(&bot_id, order),
                    BotOrder::Attack(order) => self.submit_attack(&bot_id, order),
                };
                match result {
                    Ok(()) => {
                        if let Some(bots) = self.bots.as_mut() {
                            bots.cool_down(&unit_id, now, &order);
                        }
                        break;
                    }
                    Err(GateRejection::RateLimited | GateRejection::NotRunning) => break,
                    Err(reason) => {
                        tracing::debug!(session_id = %self.session.id, bot_id = %bot_id, unit_id = %unit_id, %reason, "Bot order rejected");
                    }
                }
            }
        }
    }

    fn plan_bot_order(&mut self, unit_id: &str, now: Instant) -> Option<BotOrder> {
        let bots = self.bots.as_mut()?;
        if !bots.is_ready(unit_id, now) {
            return None;
        }
        let unit = self.session.state.unit(unit_id)?;
        let players = &self.session.players;
        bots.planner.plan_unit(
            &self.session.state,
            unit,
            |a, b| same_side(players, a, b),
            &mut bots.rng,
        )
    }
}
