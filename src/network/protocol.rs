//! Protocol Messages
//!
//! JSON wire format between clients and a room. Inbound messages are
//! validated here and turned into typed [`Intent`]s; outbound messages
//! carry state snapshots and game events with client-facing names.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{Intent, JoinOptions, MoveDelta};
use crate::game::state::{ChatMessage, ItemKind, RoundPhase, RoundSnapshot};
use crate::scores::ScoreRecord;

/// Inbound message errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Malformed JSON or wrong payload types.
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    /// Move deltas were not whole finite numbers.
    #[error("invalid move delta ({dx}, {dy})")]
    InvalidMove {
        /// Raw column delta
        dx: f64,
        /// Raw row delta
        dy: f64,
    },
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter the room.
    Join {
        /// Requested display name.
        #[serde(default)]
        username: Option<String>,
        /// Requested color tag.
        #[serde(default)]
        color: Option<String>,
    },

    /// Step by a delta.
    Move {
        /// Column delta
        dx: f64,
        /// Row delta
        dy: f64,
    },

    /// Post a chat line.
    Chat {
        /// Message text
        text: String,
    },

    /// Leave the room.
    Leave,

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back
        timestamp: u64,
    },
}

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Typed intent for the round. `Ping` has none; the room answers it
    /// directly.
    pub fn into_intent(self) -> Result<Option<Intent>, ProtocolError> {
        let intent = match self {
            ClientMessage::Join { username, color } => Intent::Join(JoinOptions { username, color }),
            ClientMessage::Move { dx, dy } => {
                let delta = MoveDelta::from_raw(dx, dy).ok_or(ProtocolError::InvalidMove { dx, dy })?;
                Intent::Move(delta)
            }
            ClientMessage::Chat { text } => Intent::Chat(text),
            ClientMessage::Leave => Intent::Leave,
            ClientMessage::Ping { .. } => return Ok(None),
        };
        Ok(Some(intent))
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted.
    Joined {
        /// Connection id as a UUID string
        player_id: String,
    },

    /// Replicated room state.
    State(StateUpdate),

    /// Game event notification.
    Event(RoomEvent),

    /// Pong response.
    Pong {
        /// Client timestamp from the ping
        timestamp: u64,
        /// Server Unix time in milliseconds
        server_time: u64,
    },

    /// Room is shutting down.
    Shutdown {
        /// Why
        reason: String,
    },
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Player as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Connection id as a UUID string
    pub id: String,
    /// Display name
    pub username: String,
    /// Color tag
    pub color: String,
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
    /// Score
    pub score: u32,
    /// Still in play
    pub active: bool,
}

/// Item as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    /// Item id
    pub id: u32,
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
    /// Category
    pub kind: ItemKind,
    /// Points
    pub value: u32,
}

/// Obstacle as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObstacleView {
    /// Obstacle id
    pub id: u32,
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

/// Full replicated state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    /// Current level
    pub level: u32,
    /// Seconds left in the level
    pub remaining_time: u32,
    /// Round phase
    pub phase: RoundPhase,
    /// Players
    pub players: Vec<PlayerView>,
    /// Items
    pub items: Vec<ItemView>,
    /// Obstacles
    pub obstacles: Vec<ObstacleView>,
    /// Chat history, oldest first
    pub chat_messages: Vec<ChatMessage>,
    /// State hash (hex)
    pub state_hash: String,
}

impl From<&RoundSnapshot> for StateUpdate {
    fn from(snapshot: &RoundSnapshot) -> Self {
        Self {
            level: snapshot.level,
            remaining_time: snapshot.remaining_time,
            phase: snapshot.phase,
            players: snapshot
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id.to_uuid_string(),
                    username: p.username.clone(),
                    color: p.color.clone(),
                    x: p.position.x,
                    y: p.position.y,
                    score: p.score,
                    active: p.active,
                })
                .collect(),
            items: snapshot
                .items
                .iter()
                .map(|i| ItemView {
                    id: i.id.0,
                    x: i.position.x,
                    y: i.position.y,
                    kind: i.kind,
                    value: i.value,
                })
                .collect(),
            obstacles: snapshot
                .obstacles
                .iter()
                .map(|o| ObstacleView {
                    id: o.id.0,
                    x: o.position.x,
                    y: o.position.y,
                })
                .collect(),
            chat_messages: snapshot.chat_messages.clone(),
            state_hash: hex::encode(snapshot.state_hash),
        }
    }
}

/// Game events with client-facing names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RoomEvent {
    /// Player walked into an obstacle.
    #[serde(rename_all = "camelCase")]
    PlayerLost {
        /// Player UUID
        player_id: String,
        /// Obstacle column
        x: i32,
        /// Obstacle row
        y: i32,
    },

    /// Player picked up an item.
    #[serde(rename_all = "camelCase")]
    Collect {
        /// Player UUID
        player_id: String,
        /// Collected item id
        item_id: u32,
        /// Item kind
        kind: ItemKind,
        /// Points awarded
        points: u32,
        /// Score after the pickup
        score: u32,
    },

    /// Player eliminated at level expiry.
    #[serde(rename_all = "camelCase")]
    PlayerEliminated {
        /// Player UUID
        player_id: String,
        /// Score at elimination
        score: u32,
    },

    /// New level started.
    LevelUp {
        /// The new level
        level: u32,
    },

    /// Round finished.
    GameOver {
        /// Ranked final scores
        scores: Vec<ScoreRecord>,
    },
}

impl From<&GameEvent> for RoomEvent {
    fn from(event: &GameEvent) -> Self {
        match &event.data {
            GameEventData::PlayerLost { player_id, at } => RoomEvent::PlayerLost {
                player_id: player_id.to_uuid_string(),
                x: at.x,
                y: at.y,
            },
            GameEventData::ItemCollected { player_id, item_id, kind, points, new_score } => {
                RoomEvent::Collect {
                    player_id: player_id.to_uuid_string(),
                    item_id: item_id.0,
                    kind: *kind,
                    points: *points,
                    score: *new_score,
                }
            }
            GameEventData::PlayerEliminated { player_id, score } => RoomEvent::PlayerEliminated {
                player_id: player_id.to_uuid_string(),
                score: *score,
            },
            GameEventData::LevelUp { level } => RoomEvent::LevelUp { level: *level },
            GameEventData::GameOver { scores } => RoomEvent::GameOver { scores: scores.clone() },
        }
    }
}
