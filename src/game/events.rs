//! Game Events
//!
//! Side effects produced by the round handlers. The round never talks to
//! the network; it returns these and the runtime broadcasts them.

use serde::{Serialize, Deserialize};

use crate::core::grid::Cell;
use crate::game::state::{ItemId, ItemKind, PlayerId};
use crate::scores::ScoreRecord;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Player walked into an obstacle
    PlayerLost {
        /// Player knocked out
        player_id: PlayerId,
        /// Cell of the obstacle
        at: Cell,
    },

    /// Player picked up an item
    ItemCollected {
        /// Collector
        player_id: PlayerId,
        /// Item removed from the board
        item_id: ItemId,
        /// Item kind
        kind: ItemKind,
        /// Points awarded
        points: u32,
        /// Collector's score after the pickup
        new_score: u32,
    },

    /// Player had the lowest score when the level timer expired
    PlayerEliminated {
        /// Player eliminated
        player_id: PlayerId,
        /// Score at elimination
        score: u32,
    },

    /// A new level began
    LevelUp {
        /// The new level
        level: u32,
    },

    /// Round finished; carries the persisted score list
    GameOver {
        /// Every player ever registered, highest score first
        scores: Vec<ScoreRecord>,
    },
}

/// A game event stamped with the level it happened in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Level when the event occurred
    pub level: u32,

    /// Player involved, if any
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(level: u32, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerLost { player_id, .. } => Some(*player_id),
            GameEventData::ItemCollected { player_id, .. } => Some(*player_id),
            GameEventData::PlayerEliminated { player_id, .. } => Some(*player_id),
            GameEventData::LevelUp { .. } | GameEventData::GameOver { .. } => None,
        };

        Self { level, player_id, data }
    }

    /// Create player lost event.
    pub fn player_lost(level: u32, player_id: PlayerId, at: Cell) -> Self {
        Self::new(level, GameEventData::PlayerLost { player_id, at })
    }

    /// Create item collected event.
    pub fn item_collected(
        level: u32,
        player_id: PlayerId,
        item_id: ItemId,
        kind: ItemKind,
        points: u32,
        new_score: u32,
    ) -> Self {
        Self::new(
            level,
            GameEventData::ItemCollected {
                player_id,
                item_id,
                kind,
                points,
                new_score,
            },
        )
    }

    /// Create player eliminated event.
    pub fn player_eliminated(level: u32, player_id: PlayerId, score: u32) -> Self {
        Self::new(level, GameEventData::PlayerEliminated { player_id, score })
    }

    /// Create level up event.
    pub fn level_up(level: u32) -> Self {
        Self::new(level, GameEventData::LevelUp { level })
    }

    /// Create game over event.
    pub fn game_over(level: u32, scores: Vec<ScoreRecord>) -> Self {
        Self::new(level, GameEventData::GameOver { scores })
    }

    /// Check if this event ends the round.
    pub fn is_game_over(&self) -> bool {
        matches!(self.data, GameEventData::GameOver { .. })
    }
}
