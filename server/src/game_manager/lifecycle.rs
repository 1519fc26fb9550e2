use crate::game_manager::{AppState, SessionCommand, Tx};
use shared::{GameError, ServerMessage, Welcome};
use std::sync::Arc;

impl AppState {
    pub fn add_connection(&self, id: String, tx: Tx) {
        tracing::info!(player_id = %id, "Connection added to AppState");
        let resume_token = uuid::Uuid::new_v4().simple().to_string();
        self.resume_tokens.insert(id.clone(), resume_token.clone());
        let _ = tx.send(ServerMessage::Welcome(Welcome {
            player_id: id.clone(),
            map_size: self.config.map_size,
            resume_token,
        }));
        self.connections.insert(id, tx);
    }

    /// Lets a new socket take over the identity of a live session member.
    /// `token` must be the one that member got in its `Welcome`. Returns
    /// `false`, leaving the current connection in place, when it does not
    /// match or `id` is not in a running session actor.
    pub fn resume_connection(&self, id: &str, token: &str, tx: Tx) -> bool {
        let authorized = self
            .resume_tokens
            .get(id)
            .is_some_and(|expected| expected.value() == token);
        if !authorized {
            tracing::warn!(player_id = %id, "Resume refused: bad token");
            return false;
        }
        let Some(handle) = self.session_of(id).filter(|handle| !handle.is_closed()) else {
            tracing::debug!(player_id = %id, "Resume refused: not in a live session");
            return false;
        };

        let previous = self.connections.insert(id.to_string(), tx.clone());
        let _ = tx.send(ServerMessage::Welcome(Welcome {
            player_id: id.to_string(),
            map_size: self.config.map_size,
            resume_token: token.to_string(),
        }));
        let resumed = handle.send(SessionCommand::Resume {
            player_id: id.to_string(),
        });
        if !resumed {
            tracing::debug!(player_id = %id, session_id = %handle.id(), "Resume refused: session stopped");
            match previous {
                Some(old) => {
                    self.connections.insert(id.to_string(), old);
                }
                None => {
                    self.connections.remove_if_current(id, &tx);
                }
            }
            return false;
        }
        if previous.is_some() {
            tracing::info!(player_id = %id, session_id = %handle.id(), "Connection replaced by a resumed socket");
        }
        true
    }

    /// Socket closed. A socket that was superseded by a resume leaves the
    /// player alone.
    pub async fn remove_connection(&self, id: &str, tx: &Tx) {
        if !self.connections.remove_if_current(id, tx) {
            tracing::debug!(player_id = %id, "Superseded connection closed");
            return;
        }
        self.resume_tokens.remove(id);
        tracing::info!(player_id = %id, "Player disconnected");
        self.leave_game(id).await;
    }

    /// Removes the player from the queue and from their session. The session
    /// is destroyed once no human is left in it.
    pub async fn leave_game(&self, player_id: &str) {
        self.cancel_matchmaking(player_id).await;

        let Some((_, session_id)) = self.player_to_game.remove(player_id) else {
            return;
        };
        let Some(handle) = self.sessions.get(&session_id) else {
            return;
        };
        match handle.leave(player_id).await {
            Some(outcome) if !outcome.removed && outcome.humans_left > 0 => {
                tracing::warn!(player_id = %player_id, session_id = %session_id, "Indexed player was not a session member");
            }
            Some(outcome) if outcome.humans_left > 0 => {
                tracing::info!(player_id = %player_id, session_id = %session_id, humans_left = outcome.humans_left, "Player left game");
            }
            _ => {
                tracing::info!(player_id = %player_id, session_id = %session_id, "Last player left, closing session");
                self.sessions.destroy(&session_id);
            }
        }
    }

    fn has_live_member(&self, session_id: &str) -> bool {
        self.player_to_game.iter().any(|entry| {
            entry.value().as_str() == session_id && self.connections.contains(entry.key())
        })
    }

    /// Reclaims sessions whose actor already stopped, and sessions left idle
    /// past the timeout with no member still connected. Returns how many
    /// were removed.
    pub async fn sweep_idle_sessions(&self) -> usize {
        let idle_after = self.config.idle_session_timeout();
        let stale: Vec<_> = self
            .sessions
            .handles()
            .into_iter()
            .filter(|handle| {
                handle.is_closed()
                    || (handle.idle_for() > idle_after && !self.has_live_member(handle.id()))
            })
            .collect();

        let notice = ServerMessage::GameError(GameError {
            message: "Session closed".to_string(),
        });
        for handle in &stale {
            let _ = handle.close().await;
            let members: Vec<String> = self
                .player_to_game
                .iter()
                .filter(|entry| entry.value().as_str() == handle.id())
                .map(|entry| entry.key().clone())
                .collect();
            tracing::info!(session_id = %handle.id(), members = members.len(), "Cleaning up inactive session");
            for member in &members {
                self.player_to_game.remove(member);
                self.connections.send(member, notice.clone());
            }
            self.sessions.destroy(handle.id());
        }
        stale.len()
    }

    pub fn spawn_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.cleanup_interval());
            loop {
                interval.tick().await;
                let removed = self.sweep_idle_sessions().await;
                if removed > 0 {
                    tracing::info!(removed, remaining = self.sessions.len(), "Idle session sweep finished");
                }
            }
        });
    }
}
