//! One tokio task per session.
//!
//! Every inbound event for a session is a [`SessionCommand`] on the actor's
//! channel, so lobby changes, validated commands and bot ticks for the same
//! session never interleave. Nothing between validation and broadcast awaits.

use crate::config::ServerConfig;
use crate::game_manager::bot::BotController;
use crate::game_manager::move_handler::CommandGate;
use crate::game_manager::{Connections, GameSession};
use shared::{AttackUnitRequest, GameSnapshot, MoveUnitRequest, ServerMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval};

#[derive(Debug)]
pub enum SessionCommand {
    SetTeam {
        player_id: String,
        team: String,
    },
    SetReady {
        player_id: String,
    },
    Move {
        player_id: String,
        request: MoveUnitRequest,
    },
    Attack {
        player_id: String,
        request: AttackUnitRequest,
    },
    /// Sends a `gameState` snapshot to `to`, member or not.
    SendState {
        to: String,
    },
    /// A member's connection was replaced; bring the new socket up to date.
    Resume {
        player_id: String,
    },
    Snapshot {
        reply: oneshot::Sender<GameSnapshot>,
    },
    Leave {
        player_id: String,
        reply: oneshot::Sender<LeaveOutcome>,
    },
    /// Stops the actor, replying with the human members it still had.
    Close {
        reply: oneshot::Sender<Vec<String>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub removed: bool,
    pub humans_left: usize,
}

#[derive(Debug)]
struct Activity {
    base: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let elapsed = u64::try_from(self.base.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_ms.store(elapsed, Ordering::Relaxed);
    }

    fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
        self.base.elapsed().saturating_sub(last)
    }
}

/// Cheap, cloneable address of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    tx: mpsc::UnboundedSender<SessionCommand>,
    activity: Arc<Activity>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `false` once the actor has stopped.
    pub fn send(&self, cmd: SessionCommand) -> bool {
        self.tx.send(cmd).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn idle_for(&self) -> Duration {
        self.activity.idle_for()
    }

    pub async fn snapshot(&self) -> Option<GameSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(SessionCommand::Snapshot { reply }) {
            return None;
        }
        rx.await.ok()
    }

    pub async fn leave(&self, player_id: &str) -> Option<LeaveOutcome> {
        let (reply, rx) = oneshot::channel();
        if !self.send(SessionCommand::Leave {
            player_id: player_id.to_string(),
            reply,
        }) {
            return None;
        }
        rx.await.ok()
    }

    pub async fn close(&self) -> Option<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        if !self.send(SessionCommand::Close { reply }) {
            return None;
        }
        rx.await.ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct SessionActor {
    pub(super) session: GameSession,
    pub(super) connections: Connections,
    pub(super) gate: CommandGate,
    pub(super) bots: Option<BotController>,
    pub(super) bot_tick: Option<Interval>,
    pub(super) bot_period: Duration,
    rx: mpsc::UnboundedReceiver<SessionCommand>,
    activity: Arc<Activity>,
}

impl SessionActor {
    /// Moves `session` into its own task and returns the address to reach it.
    pub fn spawn(session: GameSession, connections: Connections, config: &ServerConfig) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let activity = Arc::new(Activity::new());
        let bots = session
            .has_bots()
            .then(|| BotController::new(&config.bot, session.state.map().seed()));
        let handle = SessionHandle {
            id: Arc::from(session.id.as_str()),
            tx,
            activity: Arc::clone(&activity),
        };

        let actor = Self {
            session,
            connections,
            gate: CommandGate::new(config.command_interval()),
            bots,
            bot_tick: None,
            bot_period: config.bot.tick(),
            rx,
            activity,
        };
        tokio::spawn(actor.run());
        handle
    }

    async fn run(mut self) {
        tracing::debug!(session_id = %self.session.id, "Session actor started");
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.activity.touch();
                    if self.handle(cmd) == Flow::Stop {
                        break;
                    }
                }
                () = next_tick(&mut self.bot_tick) => self.run_bot_tick(),
            }
        }
        self.stop_bots();
        tracing::debug!(session_id = %self.session.id, "Session actor stopped");
    }

    fn handle(&mut self, cmd: SessionCommand) -> Flow {
        match cmd {
            SessionCommand::SetTeam { player_id, team } => self.set_team(&player_id, &team),
            SessionCommand::SetReady { player_id } => self.set_ready(&player_id),
            SessionCommand::Move { player_id, request } => {
                if let Err(reason) = self.process_move(&player_id, request) {
                    tracing::debug!(session_id = %self.session.id, player_id = %player_id, %reason, "Move rejected");
                }
            }
            SessionCommand::Attack { player_id, request } => {
                if let Err(reason) = self.process_attack(&player_id, request) {
                    tracing::debug!(session_id = %self.session.id, player_id = %player_id, %reason, "Attack rejected");
                }
            }
            SessionCommand::SendState { to } => self.send_state(&to),
            SessionCommand::Resume { player_id } => self.resume(&player_id),
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            SessionCommand::Leave { player_id, reply } => {
                let outcome = self.leave(&player_id);
                let _ = reply.send(outcome);
                if outcome.humans_left == 0 {
                    return Flow::Stop;
                }
            }
            SessionCommand::Close { reply } => {
                let _ = reply.send(self.session.human_ids());
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Sends `msg` to every human member.
    pub(super) fn broadcast(&self, msg: &ServerMessage) {
        let humans = self
            .session
            .players
            .iter()
            .filter(|p| !p.is_bot)
            .map(|p| p.id.as_str());
        self.connections.broadcast(humans, msg);
    }

    pub(super) fn send_to(&self, player_id: &str, msg: ServerMessage) {
        self.connections.send(player_id, msg);
    }
}

async fn next_tick(tick: &mut Option<Interval>) {
    match tick {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
