use shared::{GameSnapshot, PlayerInfo, SessionPhase, Team};
use skirmish_core::logic::map::TileMap;
use skirmish_core::logic::spawn::{slot_for, SpawnSlot};
use skirmish_core::logic::state::GameState;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct SessionPlayer {
    pub id: String,
    pub team: Option<Team>,
    pub ready: bool,
    pub spawn: SpawnSlot,
    pub is_bot: bool,
}

impl SessionPlayer {
    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id.clone(),
            team: self.team,
            ready: self.ready,
            spawn_point: self.spawn.position,
            spawn_facing: self.spawn.facing,
            is_bot: self.is_bot,
        }
    }

    /// Victory is decided per side: the team if one was picked, else the player.
    pub fn side(&self) -> String {
        self.team
            .map_or_else(|| self.id.clone(), |team| format!("team {team}"))
    }
}

/// Two owners are allies when they are the same player or share a picked
/// team. Owners who already left count as their own side.
pub fn same_side(players: &[SessionPlayer], a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let team_of = |id: &str| players.iter().find(|p| p.id == id).and_then(|p| p.team);
    match (team_of(a), team_of(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Wall-clock milliseconds, strictly increasing within one session so every
/// broadcast carries a distinct stamp.
#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    last: u64,
}

impl SessionClock {
    pub fn stamp(&mut self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self.last = wall.max(self.last.saturating_add(1));
        self.last
    }

    pub const fn last(&self) -> u64 {
        self.last
    }
}

pub struct GameSession {
    pub id: String,
    pub phase: SessionPhase,
    /// Join order.
    pub players: Vec<SessionPlayer>,
    pub state: GameState,
    pub clock: SessionClock,
}

impl GameSession {
    /// Builds a session in the lobby with every player's starting units
    /// already on the map. Bots come after the humans in the spawn rotation
    /// and start out ready.
    pub fn new(id: String, humans: &[String], bots: &[String], map_size: u32, seed: u64) -> Self {
        let mut state = GameState::new(TileMap::generate(map_size, seed));
        let mut players = Vec::with_capacity(humans.len() + bots.len());

        let everyone = humans
            .iter()
            .map(|id| (id, false))
            .chain(bots.iter().map(|id| (id, true)));
        for (index, (player_id, is_bot)) in everyone.enumerate() {
            let spawn = slot_for(index, map_size);
            state.spawn_formation(player_id, spawn);
            players.push(SessionPlayer {
                id: player_id.clone(),
                team: None,
                ready: is_bot,
                spawn,
                is_bot,
            });
        }

        Self {
            id,
            phase: SessionPhase::Lobby,
            players,
            state,
            clock: SessionClock::default(),
        }
    }

    pub fn player(&self, id: &str) -> Option<&SessionPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut SessionPlayer> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    pub fn human_ids(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| !p.is_bot)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn bot_ids(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.is_bot)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn has_humans(&self) -> bool {
        self.players.iter().any(|p| !p.is_bot)
    }

    pub fn has_bots(&self) -> bool {
        self.players.iter().any(|p| p.is_bot)
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.ready)
    }

    pub fn player_infos(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(SessionPlayer::info).collect()
    }

    /// Side label of a unit owner, falling back to the owner id for players
    /// who already left.
    pub fn side_of(&self, owner: &str) -> String {
        self.player(owner)
            .map_or_else(|| owner.to_string(), SessionPlayer::side)
    }

    pub fn remove_player(&mut self, id: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    /// Full snapshot stamped with a fresh authority timestamp.
    pub fn snapshot(&mut self) -> GameSnapshot {
        GameSnapshot {
            session_id: self.id.clone(),
            state: self.phase,
            players: self.player_infos(),
            units: self.state.units().clone(),
            map_data: self.state.map().data(),
            server_timestamp: self.clock.stamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::logic::grid::{Facing, GridPos};

    fn session() -> GameSession {
        GameSession::new(
            "s1".into(),
            &["alice".to_string(), "bob".to_string()],
            &["bot_1".to_string()],
            64,
            9,
        )
    }

    #[test]
    fn test_new_session_spawns_three_units_each() {
        let session = session();
        assert_eq!(session.phase, SessionPhase::Lobby);
        assert_eq!(session.state.units().len(), 9);
        let alice = session.player("alice").unwrap();
        assert_eq!(alice.spawn.position, GridPos::new(10, 10));
        assert_eq!(alice.spawn.facing, Facing::SouthEast);
        let bob = session.player("bob").unwrap();
        assert_eq!(bob.spawn.facing, Facing::NorthWest);
        assert!(session.player("bot_1").unwrap().ready);
        assert!(!alice.ready);
        assert_eq!(session.human_ids(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_sides_follow_teams() {
        let mut session = session();
        assert!(!same_side(&session.players, "alice", "bob"));
        session.player_mut("alice").unwrap().team = Some(Team::A);
        session.player_mut("bob").unwrap().team = Some(Team::A);
        assert!(same_side(&session.players, "alice", "bob"));
        assert!(!same_side(&session.players, "alice", "bot_1"));
        assert_eq!(session.side_of("alice"), "team A");
        assert_eq!(session.side_of("ghost"), "ghost");
    }

    #[test]
    fn test_clock_is_strictly_increasing() {
        let mut clock = SessionClock::default();
        let a = clock.stamp();
        let b = clock.stamp();
        let c = clock.stamp();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_snapshot_mirrors_authority() {
        let mut session = session();
        let snapshot = session.snapshot();
        assert_eq!(&snapshot.units, session.state.units());
        assert_eq!(snapshot.players.len(), 3);
        assert_eq!(snapshot.map_data.seed, 9);
        assert_eq!(snapshot.server_timestamp, session.clock.last());
    }
}
