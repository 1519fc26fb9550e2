use serde::{Deserialize, Serialize};
use skirmish_core::logic::{
    grid::{Facing, GridPos},
    map::MapData,
    units::Unit,
};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod sync;

pub use skirmish_core;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl FromStr for Team {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            other => Err(format!("unknown team {other:?}")),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Lobby,
    Running,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: String,
    pub team: Option<Team>,
    pub ready: bool,
    pub spawn_point: GridPos,
    pub spawn_facing: Facing,
    #[serde(default)]
    pub is_bot: bool,
}

/// Full point-in-time view of a session, never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub session_id: String,
    pub state: SessionPhase,
    pub players: Vec<PlayerInfo>,
    pub units: BTreeMap<String, Unit>,
    pub map_data: MapData,
    pub server_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTeamRequest {
    pub session_id: String,
    /// Kept as text so an unknown team is rejected by the lobby rather than
    /// failing the whole frame.
    pub team: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveUnitRequest {
    pub unit_id: String,
    pub x: i32,
    pub y: i32,
    pub facing: Facing,
    pub duration: u32,
    pub turn_duration: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackUnitRequest {
    pub unit_id: String,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinMatchmaking,
    CancelMatchmaking,
    SetTeam(SetTeamRequest),
    SetReady(SessionRef),
    MoveUnit(MoveUnitRequest),
    AttackUnit(AttackUnitRequest),
    RequestGameState(SessionRef),
    LeaveGame,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub player_id: String,
    pub map_size: u32,
    /// Private to this connection; required to resume `player_id` later.
    pub resume_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCreated {
    pub session_id: String,
    pub players: Vec<PlayerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyUpdate {
    pub players: Vec<PlayerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMoved {
    pub unit_id: String,
    pub x: i32,
    pub y: i32,
    pub facing: Facing,
    pub duration: u32,
    pub turn_duration: u32,
    pub server_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAttacked {
    pub attacker_id: String,
    pub target_id: String,
    pub damage: u32,
    pub health: u32,
    pub server_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDestroyed {
    pub unit_id: String,
    pub server_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOver {
    /// Winning side: a team name, a player id, or `None` when nobody is left.
    pub winner: Option<String>,
    pub server_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    Welcome(Welcome),
    MatchmakingStarted,
    GameCreated(GameCreated),
    LobbyUpdate(LobbyUpdate),
    GameStart(Box<GameSnapshot>),
    GameState(Box<GameSnapshot>),
    UnitMoved(UnitMoved),
    UnitAttacked(UnitAttacked),
    UnitDestroyed(UnitDestroyed),
    GameOver(GameOver),
    GameError(GameError),
}

impl ServerMessage {
    /// Authority timestamp carried by the message, if any.
    pub fn server_timestamp(&self) -> Option<u64> {
        match self {
            Self::GameStart(s) | Self::GameState(s) => Some(s.server_timestamp),
            Self::UnitMoved(m) => Some(m.server_timestamp),
            Self::UnitAttacked(m) => Some(m.server_timestamp),
            Self::UnitDestroyed(m) => Some(m.server_timestamp),
            Self::GameOver(m) => Some(m.server_timestamp),
            Self::Welcome(_)
            | Self::MatchmakingStarted
            | Self::GameCreated(_)
            | Self::LobbyUpdate(_)
            | Self::GameError(_) => None,
        }
    }
}
