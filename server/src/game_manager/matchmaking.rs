use crate::game_manager::actor::SessionActor;
use crate::game_manager::{AppState, GameSession};
use shared::{GameCreated, ServerMessage};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    AlreadyQueued,
    /// The queue hit the session size; these players form a session now.
    Form(Vec<String>),
    /// Waiting. `arm` carries the generation of a freshly armed timeout that
    /// still needs its timer task.
    Queued { arm: Option<u64> },
}

#[derive(Debug, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// The timeout was cancelled or superseded after it fired.
    Stale,
    Form(Vec<String>),
    PairWithBot(String),
    /// Nobody, or one player without bots: nothing forms.
    Wait,
}

#[derive(Debug)]
struct PendingTimeout {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// The single global FIFO queue and its one pending timeout.
#[derive(Debug)]
pub struct Matchmaker {
    queue: VecDeque<String>,
    max_players: usize,
    bots_enabled: bool,
    pending: Option<PendingTimeout>,
    generation: u64,
}

impl Matchmaker {
    pub fn new(max_players: usize, bots_enabled: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            max_players: max_players.max(2),
            bots_enabled,
            pending: None,
            generation: 0,
        }
    }

    pub fn enqueue(&mut self, player_id: String) -> EnqueueOutcome {
        if self.is_queued(&player_id) {
            return EnqueueOutcome::AlreadyQueued;
        }
        self.queue.push_back(player_id);

        if self.queue.len() >= self.max_players {
            self.clear_timeout();
            let players = self.queue.drain(..self.max_players).collect();
            return EnqueueOutcome::Form(players);
        }
        EnqueueOutcome::Queued { arm: self.arm() }
    }

    /// Arms the timeout unless one is already pending.
    fn arm(&mut self) -> Option<u64> {
        if self.pending.is_some() {
            return None;
        }
        self.generation += 1;
        self.pending = Some(PendingTimeout {
            generation: self.generation,
            task: None,
        });
        Some(self.generation)
    }

    /// Hands the timer task for `generation` to the matchmaker so it can be
    /// aborted. A task for a timeout that is no longer pending is aborted
    /// straight away.
    pub fn attach_timer(&mut self, generation: u64, task: JoinHandle<()>) {
        match self.pending.as_mut() {
            Some(pending) if pending.generation == generation => pending.task = Some(task),
            _ => task.abort(),
        }
    }

    pub fn cancel(&mut self, player_id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|id| id != player_id);
        let removed = self.queue.len() != before;
        if self.queue.is_empty() {
            self.clear_timeout();
        }
        removed
    }

    /// Called by the timer task once the delay has passed.
    pub fn on_timeout(&mut self, generation: u64) -> TimeoutOutcome {
        match &self.pending {
            Some(pending) if pending.generation == generation => {}
            _ => return TimeoutOutcome::Stale,
        }
        // The caller is the timer task itself, so it must not be aborted here.
        self.pending = None;

        match self.queue.len() {
            0 => TimeoutOutcome::Wait,
            1 if self.bots_enabled => self
                .queue
                .pop_front()
                .map_or(TimeoutOutcome::Wait, TimeoutOutcome::PairWithBot),
            1 => TimeoutOutcome::Wait,
            n => TimeoutOutcome::Form(self.queue.drain(..n.min(self.max_players)).collect()),
        }
    }

    fn clear_timeout(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Some(task) = pending.task {
                task.abort();
            }
        }
    }

    pub const fn has_pending_timeout(&self) -> bool {
        self.pending.is_some()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, player_id: &str) -> bool {
        self.queue.iter().any(|id| id == player_id)
    }
}

impl AppState {
    pub async fn find_match(self: &Arc<Self>, player_id: String) {
        let mut matchmaker = self.matchmaker.lock().await;
        // Checked under the lock: sessions only form while it is held.
        if self.player_to_game.contains_key(&player_id) {
            tracing::warn!(player_id = %player_id, "Player already in a session, ignoring joinMatchmaking");
            return;
        }

        match matchmaker.enqueue(player_id.clone()) {
            EnqueueOutcome::AlreadyQueued => {
                tracing::debug!(player_id = %player_id, "Player already in queue");
            }
            EnqueueOutcome::Form(players) => {
                self.connections
                    .send(&player_id, ServerMessage::MatchmakingStarted);
                tracing::info!(player_id = %player_id, players = players.len(), "Queue full, forming session");
                self.create_session(&players, &[]);
            }
            EnqueueOutcome::Queued { arm } => {
                self.connections
                    .send(&player_id, ServerMessage::MatchmakingStarted);
                tracing::info!(player_id = %player_id, queued = matchmaker.queue_len(), "Player joined matchmaking queue");
                if let Some(generation) = arm {
                    let task = self.spawn_matchmaking_timer(generation);
                    matchmaker.attach_timer(generation, task);
                }
            }
        }
    }

    pub async fn cancel_matchmaking(&self, player_id: &str) -> bool {
        let mut matchmaker = self.matchmaker.lock().await;
        let removed = matchmaker.cancel(player_id);
        if removed {
            tracing::info!(player_id = %player_id, queued = matchmaker.queue_len(), "Player left matchmaking queue");
        }
        removed
    }

    fn spawn_matchmaking_timer(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let state = Arc::clone(self);
        let delay = self.config.matchmaking_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.on_matchmaking_timeout(generation).await;
        })
    }

    async fn on_matchmaking_timeout(&self, generation: u64) {
        let mut matchmaker = self.matchmaker.lock().await;
        match matchmaker.on_timeout(generation) {
            TimeoutOutcome::Stale => {
                tracing::debug!(generation, "Stale matchmaking timeout ignored");
            }
            TimeoutOutcome::Wait => {
                tracing::info!(queued = matchmaker.queue_len(), "Matchmaking timeout: not enough players");
            }
            TimeoutOutcome::Form(players) => {
                tracing::info!(players = players.len(), "Matchmaking timeout: forming session");
                self.create_session(&players, &[]);
            }
            TimeoutOutcome::PairWithBot(player_id) => {
                let bot_id = format!("bot-{}", Uuid::new_v4());
                tracing::info!(player_id = %player_id, bot_id = %bot_id, "Matchmaking timeout: pairing with bot");
                self.create_session(&[player_id], &[bot_id]);
            }
        }
    }

    /// Creates the session with every player's units and tells the humans
    /// about it before the actor takes over. Callers hold the matchmaker lock,
    /// so a player cannot disconnect between leaving the queue and being
    /// indexed as a member.
    pub(super) fn create_session(&self, humans: &[String], bots: &[String]) -> String {
        let session_id = Uuid::new_v4().to_string();
        let seed = self.config.map_seed.unwrap_or_else(rand::random);
        let mut session = GameSession::new(
            session_id.clone(),
            humans,
            bots,
            self.config.map_size,
            seed,
        );
        for player_id in humans {
            self.player_to_game
                .insert(player_id.clone(), session_id.clone());
        }

        tracing::info!(
            session_id = %session_id,
            humans = humans.len(),
            bots = bots.len(),
            seed,
            "Created new game session"
        );
        let created = ServerMessage::GameCreated(GameCreated {
            session_id: session_id.clone(),
            players: session.player_infos(),
        });
        let state = ServerMessage::GameState(Box::new(session.snapshot()));
        let recipients = || humans.iter().map(String::as_str);
        self.connections.broadcast(recipients(), &created);
        self.connections.broadcast(recipients(), &state);

        let handle = SessionActor::spawn(session, self.connections.clone(), &self.config);
        self.sessions.create(handle);
        session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_threshold_forms_and_disarms() {
        let mut mm = Matchmaker::new(3, false);
        assert_eq!(mm.enqueue("a".into()), EnqueueOutcome::Queued { arm: Some(1) });
        assert!(mm.has_pending_timeout());
        assert_eq!(mm.enqueue("b".into()), EnqueueOutcome::Queued { arm: None });
        assert_eq!(mm.enqueue("b".into()), EnqueueOutcome::AlreadyQueued);
        assert_eq!(mm.enqueue("c".into()), EnqueueOutcome::Form(ids(&["a", "b", "c"])));
        assert!(!mm.has_pending_timeout());
        assert_eq!(mm.queue_len(), 0);
        // The fired timer of the drained queue finds nothing to do.
        assert_eq!(mm.on_timeout(1), TimeoutOutcome::Stale);
    }

    #[test]
    fn test_timeout_forms_undersized_session() {
        let mut mm = Matchmaker::new(6, false);
        mm.enqueue("a".into());
        mm.enqueue("b".into());
        assert_eq!(mm.on_timeout(1), TimeoutOutcome::Form(ids(&["a", "b"])));
        assert!(!mm.has_pending_timeout());
    }

    #[test]
    fn test_lone_player_waits_or_gets_a_bot() {
        let mut mm = Matchmaker::new(6, false);
        mm.enqueue("a".into());
        assert_eq!(mm.on_timeout(1), TimeoutOutcome::Wait);
        assert!(mm.is_queued("a"));
        // A later arrival re-arms.
        assert_eq!(mm.enqueue("b".into()), EnqueueOutcome::Queued { arm: Some(2) });

        let mut with_bots = Matchmaker::new(6, true);
        with_bots.enqueue("a".into());
        assert_eq!(with_bots.on_timeout(1), TimeoutOutcome::PairWithBot("a".into()));
        assert_eq!(with_bots.queue_len(), 0);
    }

    #[test]
    fn test_cancel_last_player_disarms() {
        let mut mm = Matchmaker::new(6, false);
        mm.enqueue("a".into());
        mm.enqueue("b".into());
        assert!(mm.cancel("a"));
        assert!(mm.has_pending_timeout());
        assert!(!mm.cancel("a"));
        assert!(mm.cancel("b"));
        assert!(!mm.has_pending_timeout());
        assert_eq!(mm.on_timeout(1), TimeoutOutcome::Stale);
    }
}
