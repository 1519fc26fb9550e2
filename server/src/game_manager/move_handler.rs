use crate::game_manager::actor::SessionActor;
use crate::game_manager::session::same_side;
use crate::game_manager::{AppState, SessionCommand};
use shared::{
    AttackUnitRequest, GameOver, MoveUnitRequest, ServerMessage, SessionPhase, UnitAttacked,
    UnitDestroyed, UnitMoved,
};
use skirmish_core::logic::grid::GridPos;
use skirmish_core::logic::state::{AttackOrder, CommandRejection, MoveOrder};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    NotRunning,
    RateLimited,
    Rejected(CommandRejection),
}

impl From<CommandRejection> for GateRejection {
    fn from(reason: CommandRejection) -> Self {
        Self::Rejected(reason)
    }
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => f.write_str("session is not running"),
            Self::RateLimited => f.write_str("sender is rate limited"),
            Self::Rejected(reason) => write!(f, "{reason}"),
        }
    }
}

/// Per-sender rate limit: a fixed minimum gap between two accepted commands.
/// Only accepted commands count, so a rejected one never blocks the next.
#[derive(Debug, Clone)]
pub struct CommandGate {
    min_interval: Duration,
    last_accepted: HashMap<String, Instant>,
}

impl CommandGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: HashMap::new(),
        }
    }

    pub fn check(&self, sender: &str, now: Instant) -> Result<(), GateRejection> {
        match self.last_accepted.get(sender) {
            Some(last) if now.saturating_duration_since(*last) < self.min_interval => {
                Err(GateRejection::RateLimited)
            }
            _ => Ok(()),
        }
    }

    pub fn record(&mut self, sender: &str, now: Instant) {
        self.last_accepted.insert(sender.to_string(), now);
    }

    pub fn forget(&mut self, sender: &str) {
        self.last_accepted.remove(sender);
    }
}

impl AppState {
    pub fn move_unit(&self, player_id: &str, request: MoveUnitRequest) {
        let Some(handle) = self.session_of(player_id) else {
            tracing::debug!(player_id = %player_id, unit_id = %request.unit_id, "Move ignored: not in a session");
            return;
        };
        handle.send(SessionCommand::Move {
            player_id: player_id.to_string(),
            request,
        });
    }

    pub fn attack_unit(&self, player_id: &str, request: AttackUnitRequest) {
        let Some(handle) = self.session_of(player_id) else {
            tracing::debug!(player_id = %player_id, unit_id = %request.unit_id, "Attack ignored: not in a session");
            return;
        };
        handle.send(SessionCommand::Attack {
            player_id: player_id.to_string(),
            request,
        });
    }
}

impl SessionActor {
    fn ensure_running(&self) -> Result<(), GateRejection> {
        if self.session.phase == SessionPhase::Running {
            Ok(())
        } else {
            Err(GateRejection::NotRunning)
        }
    }

    /// A human move. Durations are stored as the client sent them.
    pub(super) fn process_move(
        &mut self,
        sender: &str,
        request: MoveUnitRequest,
    ) -> Result<(), GateRejection> {
        let order = MoveOrder {
            unit_id: request.unit_id,
            target: GridPos::new(request.x, request.y),
            facing: request.facing,
            duration: request.duration,
            turn_duration: request.turn_duration,
        };
        self.submit_move(sender, &order)
    }

    pub(super) fn process_attack(
        &mut self,
        sender: &str,
        request: AttackUnitRequest,
    ) -> Result<(), GateRejection> {
        let order = AttackOrder {
            unit_id: request.unit_id,
            target_id: request.target_id,
        };
        self.submit_attack(sender, &order)
    }

    /// Gate, validate, commit and broadcast one move.
    pub(super) fn submit_move(&mut self, sender: &str, order: &MoveOrder) -> Result<(), GateRejection> {
        self.ensure_running()?;
        let now = Instant::now();
        self.gate.check(sender, now)?;
        self.session.state.validate_move(sender, order)?;

        let timestamp = self.session.clock.stamp();
        let unit = self.session.state.apply_move(sender, order, timestamp)?;
        let moved = UnitMoved {
            unit_id: unit.id.clone(),
            x: unit.position.x,
            y: unit.position.y,
            facing: unit.facing,
            duration: order.duration,
            turn_duration: order.turn_duration,
            server_timestamp: timestamp,
        };
        self.gate.record(sender, now);
        debug_assert!(self.session.state.occupancy_is_consistent());

        tracing::debug!(
            session_id = %self.session.id,
            player_id = %sender,
            unit_id = %moved.unit_id,
            x = moved.x,
            y = moved.y,
            ts = timestamp,
            "Unit moved"
        );
        self.broadcast(&ServerMessage::UnitMoved(moved));
        Ok(())
    }

    pub(super) fn submit_attack(
        &mut self,
        sender: &str,
        order: &AttackOrder,
    ) -> Result<(), GateRejection> {
        self.ensure_running()?;
        let now = Instant::now();
        self.gate.check(sender, now)?;

        let session = &mut self.session;
        let players = &session.players;
        let outcome = session
            .state
            .apply_attack(sender, order, |a, b| same_side(players, a, b))?;
        self.gate.record(sender, now);

        let timestamp = self.session.clock.stamp();
        tracing::debug!(
            session_id = %self.session.id,
            player_id = %sender,
            attacker = %order.unit_id,
            target = %order.target_id,
            health = outcome.target_health,
            "Unit attacked"
        );
        self.broadcast(&ServerMessage::UnitAttacked(UnitAttacked {
            attacker_id: order.unit_id.clone(),
            target_id: order.target_id.clone(),
            damage: outcome.damage,
            health: outcome.target_health,
            server_timestamp: timestamp,
        }));

        if outcome.destroyed {
            let timestamp = self.session.clock.stamp();
            tracing::info!(session_id = %self.session.id, unit_id = %order.target_id, "Unit destroyed");
            self.broadcast(&ServerMessage::UnitDestroyed(UnitDestroyed {
                unit_id: order.target_id.clone(),
                server_timestamp: timestamp,
            }));
            self.check_victory();
        }
        Ok(())
    }

    /// Ends the session once at most one side still has units.
    fn check_victory(&mut self) {
        let sides: BTreeSet<String> = self
            .session
            .state
            .surviving_owners()
            .into_iter()
            .map(|owner| self.session.side_of(owner))
            .collect();
        if sides.len() > 1 {
            return;
        }

        self.session.phase = SessionPhase::Ended;
        self.stop_bots();
        let winner = sides.into_iter().next();
        let timestamp = self.session.clock.stamp();
        tracing::info!(session_id = %self.session.id, winner = ?winner, "Game over");
        self.broadcast(&ServerMessage::GameOver(GameOver {
            winner,
            server_timestamp: timestamp,
        }));
    }
}
