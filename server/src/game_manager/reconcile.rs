use crate::game_manager::actor::SessionActor;
use crate::game_manager::{AppState, SessionCommand};
use shared::{GameCreated, GameError, ServerMessage, SessionPhase};

impl AppState {
    /// Resync request. Unknown sessions answer with `gameError` so the client
    /// can fall back to its menu.
    pub fn request_game_state(&self, requester: &str, session_id: &str) {
        let delivered = self.sessions.get(session_id).is_some_and(|handle| {
            handle.send(SessionCommand::SendState {
                to: requester.to_string(),
            })
        });
        if !delivered {
            tracing::debug!(player_id = %requester, session_id = %session_id, "Game state requested for unknown session");
            self.connections.send(
                requester,
                ServerMessage::GameError(GameError {
                    message: "Game not found".to_string(),
                }),
            );
        }
    }
}

impl SessionActor {
    pub(super) fn send_state(&mut self, to: &str) {
        let snapshot = self.session.snapshot();
        self.send_to(to, ServerMessage::GameState(Box::new(snapshot)));
    }

    /// Brings a replaced connection back to where its peers are: the full
    /// state first, then the phase event the client would otherwise have
    /// missed.
    pub(super) fn resume(&mut self, player_id: &str) {
        if !self.session.is_member(player_id) {
            return;
        }
        tracing::info!(session_id = %self.session.id, player_id = %player_id, phase = ?self.session.phase, "Resuming connection");
        self.send_state(player_id);
        match self.session.phase {
            SessionPhase::Lobby => {
                let created = GameCreated {
                    session_id: self.session.id.clone(),
                    players: self.session.player_infos(),
                };
                self.send_to(player_id, ServerMessage::GameCreated(created));
            }
            SessionPhase::Running => {
                let snapshot = self.session.snapshot();
                self.send_to(player_id, ServerMessage::GameStart(Box::new(snapshot)));
            }
            SessionPhase::Ended => {}
        }
    }
}
