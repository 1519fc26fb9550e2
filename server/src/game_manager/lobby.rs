use crate::game_manager::actor::{LeaveOutcome, SessionActor};
use crate::game_manager::{AppState, SessionCommand};
use shared::{LobbyUpdate, ServerMessage, SessionPhase, SessionRef, SetTeamRequest, Team};

impl AppState {
    pub fn set_team(&self, player_id: &str, request: SetTeamRequest) {
        let Some(handle) = self.sessions.get(&request.session_id) else {
            tracing::debug!(player_id = %player_id, session_id = %request.session_id, "setTeam for unknown session");
            return;
        };
        handle.send(SessionCommand::SetTeam {
            player_id: player_id.to_string(),
            team: request.team,
        });
    }

    pub fn set_ready(&self, player_id: &str, request: &SessionRef) {
        let Some(handle) = self.sessions.get(&request.session_id) else {
            tracing::debug!(player_id = %player_id, session_id = %request.session_id, "setReady for unknown session");
            return;
        };
        handle.send(SessionCommand::SetReady {
            player_id: player_id.to_string(),
        });
    }
}

impl SessionActor {
    fn lobby_update(&self) {
        self.broadcast(&ServerMessage::LobbyUpdate(LobbyUpdate {
            players: self.session.player_infos(),
        }));
    }

    pub(super) fn set_team(&mut self, player_id: &str, team: &str) {
        if self.session.phase != SessionPhase::Lobby {
            tracing::debug!(session_id = %self.session.id, player_id = %player_id, "setTeam ignored outside the lobby");
            return;
        }
        let Ok(team) = team.parse::<Team>() else {
            tracing::debug!(session_id = %self.session.id, player_id = %player_id, team = %team, "Unknown team");
            return;
        };
        let Some(player) = self.session.player_mut(player_id) else {
            tracing::debug!(session_id = %self.session.id, player_id = %player_id, "setTeam from non-member");
            return;
        };
        player.team = Some(team);
        tracing::info!(session_id = %self.session.id, player_id = %player_id, team = %team, "Team picked");
        self.lobby_update();
    }

    pub(super) fn set_ready(&mut self, player_id: &str) {
        if self.session.phase != SessionPhase::Lobby {
            tracing::debug!(session_id = %self.session.id, player_id = %player_id, "setReady ignored outside the lobby");
            return;
        }
        let Some(player) = self.session.player_mut(player_id) else {
            tracing::debug!(session_id = %self.session.id, player_id = %player_id, "setReady from non-member");
            return;
        };
        player.ready = true;
        tracing::info!(session_id = %self.session.id, player_id = %player_id, "Player ready");
        self.lobby_update();
        self.start_if_all_ready();
    }

    /// LOBBY -> RUNNING. Runs inside the actor, so two ready calls can never
    /// both see the last missing flag and start twice.
    fn start_if_all_ready(&mut self) {
        if self.session.phase != SessionPhase::Lobby
            || !self.session.has_humans()
            || !self.session.all_ready()
        {
            return;
        }
        self.session.phase = SessionPhase::Running;
        let snapshot = self.session.snapshot();
        tracing::info!(
            session_id = %self.session.id,
            players = self.session.players.len(),
            units = snapshot.units.len(),
            "Game started"
        );
        self.broadcast(&ServerMessage::GameStart(Box::new(snapshot)));
        if self.session.has_bots() {
            self.start_bots();
        }
    }

    /// Drops a member. Their units stay on the map; the remaining humans get
    /// the new roster.
    pub(super) fn leave(&mut self, player_id: &str) -> LeaveOutcome {
        let removed = self.session.remove_player(player_id);
        self.gate.forget(player_id);
        let humans_left = self.session.human_ids().len();
        if removed {
            tracing::info!(session_id = %self.session.id, player_id = %player_id, humans_left, "Player left session");
        }
        if removed && humans_left > 0 {
            self.lobby_update();
            self.start_if_all_ready();
        }
        LeaveOutcome {
            removed,
            humans_left,
        }
    }
}
