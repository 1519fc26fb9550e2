use crate::config::ServerConfig;
use dashmap::DashMap;
use shared::ServerMessage;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub mod actor;
pub mod bot;
pub mod lifecycle;
pub mod lobby;
pub mod matchmaking;
pub mod move_handler;
pub mod reconcile;
pub mod registry;
pub mod session;

pub use actor::{SessionCommand, SessionHandle};
pub use matchmaking::Matchmaker;
pub use registry::SessionRegistry;
pub use session::GameSession;

pub type Tx = mpsc::UnboundedSender<ServerMessage>;

/// Outbound channels of every live connection, keyed by connection id.
/// Sending never blocks; a closed channel just drops the message.
#[derive(Clone, Default)]
pub struct Connections {
    inner: Arc<DashMap<String, Tx>>,
}

impl Connections {
    /// Returns the channel this one replaced, if any.
    pub fn insert(&self, id: String, tx: Tx) -> Option<Tx> {
        self.inner.insert(id, tx)
    }

    /// Removes `id` only while it is still bound to `tx`, so a socket that
    /// was taken over by a newer one cannot unregister its successor.
    pub fn remove_if_current(&self, id: &str, tx: &Tx) -> bool {
        self.inner
            .remove_if(id, |_, current| current.same_channel(tx))
            .is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn send(&self, id: &str, msg: ServerMessage) -> bool {
        self.inner
            .get(id)
            .is_some_and(|tx| tx.send(msg).is_ok())
    }

    pub fn broadcast<'a>(&self, ids: impl IntoIterator<Item = &'a str>, msg: &ServerMessage) {
        for id in ids {
            if let Some(tx) = self.inner.get(id) {
                let _ = tx.send(msg.clone());
            }
        }
    }
}

pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub connections: Connections,
    pub sessions: SessionRegistry,
    pub player_to_game: DashMap<String, String>,
    /// Secret handed to each connection in `Welcome`, keyed by player id.
    pub resume_tokens: DashMap<String, String>,
    pub matchmaker: Mutex<Matchmaker>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let matchmaker = Matchmaker::new(config.max_players_per_session, config.bot.enabled);
        Self {
            config: Arc::new(config),
            connections: Connections::default(),
            sessions: SessionRegistry::new(),
            player_to_game: DashMap::new(),
            resume_tokens: DashMap::new(),
            matchmaker: Mutex::new(matchmaker),
        }
    }

    pub fn session_id_of(&self, player_id: &str) -> Option<String> {
        self.player_to_game
            .get(player_id)
            .map(|entry| entry.value().clone())
    }

    /// Handle of the session the player currently belongs to.
    pub fn session_of(&self, player_id: &str) -> Option<SessionHandle> {
        self.session_id_of(player_id)
            .and_then(|session_id| self.sessions.get(&session_id))
    }
}
