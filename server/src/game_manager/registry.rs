use crate::game_manager::actor::SessionHandle;
use dashmap::DashMap;

/// All live sessions, keyed by session id. Owns their lifecycle: a session
/// exists from `create` until `destroy`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, handle: SessionHandle) {
        tracing::debug!(session_id = %handle.id(), "Registering session");
        self.sessions.insert(handle.id().to_string(), handle);
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn destroy(&self, id: &str) -> Option<SessionHandle> {
        let removed = self.sessions.remove(id).map(|(_, handle)| handle);
        if removed.is_some() {
            tracing::info!(session_id = %id, "Session destroyed");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }
}
