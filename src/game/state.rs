//! Round State Definitions
//!
//! Entity types and the single unit of truth for a room's round.
//! Collections live in the [`EntityRegistry`] and use BTreeMap so every
//! iteration, snapshot and hash is ordered.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::grid::Cell;
use crate::core::hash::{StateHash, compute_state_hash};
use crate::core::rng::DeterministicRng;
use crate::game::registry::EntityRegistry;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Session-scoped player identifier (the transport's connection id).
///
/// Implements Ord for BTreeMap ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id for a new connection.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// First four bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.short())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Item identifier (monotonic per round, never reused).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item{}", self.0)
    }
}

/// Obstacle identifier (monotonic per round).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObstacleId(pub u32);

impl fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obstacle{}", self.0)
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A connected participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Connection id
    pub id: PlayerId,

    /// Display name, unique within the room at join time
    pub username: String,

    /// Free-form color tag chosen by the client
    pub color: String,

    /// Current cell
    pub position: Cell,

    /// Accumulated score
    pub score: u32,

    /// False once the player hit an obstacle or was eliminated.
    /// Inactive players keep their entry for scoring.
    pub active: bool,
}

impl Player {
    /// Create an active player with zero score.
    pub fn new(id: PlayerId, username: String, color: String, position: Cell) -> Self {
        Self {
            id,
            username,
            color,
            position,
            score: 0,
            active: true,
        }
    }

    /// Add points, saturating at `u32::MAX`.
    pub fn add_score(&mut self, amount: u32) {
        self.score = self.score.saturating_add(amount);
    }
}

// =============================================================================
// ITEMS & OBSTACLES
// =============================================================================

/// Category of a pickup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ItemKind {
    /// Rare pickup worth 5 points
    Collectible = 0,
    /// Common pickup worth 1 point
    Coin = 1,
}

impl ItemKind {
    /// Point value of this kind.
    pub fn value(self) -> u32 {
        match self {
            ItemKind::Collectible => 5,
            ItemKind::Coin => 1,
        }
    }
}

/// A pickup on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique id
    pub id: ItemId,
    /// Cell it occupies
    pub position: Cell,
    /// Category
    pub kind: ItemKind,
    /// Points awarded on collection
    pub value: u32,
}

impl Item {
    /// Create an item; value follows the kind.
    pub fn new(id: ItemId, position: Cell, kind: ItemKind) -> Self {
        Self {
            id,
            position,
            kind,
            value: kind.value(),
        }
    }
}

/// An impassable cell. Moving onto one knocks the player out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Unique id
    pub id: ObstacleId,
    /// Cell it occupies
    pub position: Cell,
}

// =============================================================================
// CHAT
// =============================================================================

/// A chat line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the sender
    pub sender: String,
    /// Trimmed, length-capped text
    pub text: String,
    /// Unix time in milliseconds
    pub timestamp: i64,
}

// =============================================================================
// ROUND PHASE
// =============================================================================

/// Lifecycle of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Levels are counting down
    #[default]
    Countdown,
    /// Game over, terminal
    Over,
}

// =============================================================================
// ROUND STATE
// =============================================================================

/// Complete state of a room's round.
#[derive(Clone, Debug)]
pub struct RoundState {
    /// Current level, starts at 1
    pub level: u32,

    /// Seconds left in the current level
    pub remaining_time: u32,

    /// Current phase
    pub phase: RoundPhase,

    /// Seed the arena was generated from
    pub rng_seed: u64,

    /// Placement RNG
    pub rng: DeterministicRng,

    /// Players, items, obstacles and chat
    pub registry: EntityRegistry,

    /// Next item id (monotonic counter)
    pub next_item_id: u32,

    /// Next obstacle id (monotonic counter)
    pub next_obstacle_id: u32,
}

impl RoundState {
    /// Create an empty round at level 1.
    pub fn new(rng_seed: u64, level_duration: u32, chat_limit: usize) -> Self {
        Self {
            level: 1,
            remaining_time: level_duration,
            phase: RoundPhase::Countdown,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            registry: EntityRegistry::new(chat_limit),
            next_item_id: 0,
            next_obstacle_id: 0,
        }
    }

    /// Spawn an item at `position`.
    pub fn spawn_item(&mut self, position: Cell, kind: ItemKind) -> ItemId {
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;
        let inserted = self.registry.insert_item(Item::new(id, position, kind));
        debug_assert!(inserted.is_ok(), "item id {} reused", id.0);
        id
    }

    /// Spawn an obstacle at `position`.
    pub fn spawn_obstacle(&mut self, position: Cell) -> ObstacleId {
        let id = ObstacleId(self.next_obstacle_id);
        self.next_obstacle_id += 1;
        let inserted = self.registry.insert_obstacle(Obstacle { id, position });
        debug_assert!(inserted.is_ok(), "obstacle id {} reused", id.0);
        id
    }

    /// Check if the round has ended.
    pub fn is_over(&self) -> bool {
        matches!(self.phase, RoundPhase::Over)
    }

    /// Compute hash of the replicated state.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.level, self.remaining_time, |hasher| {
            hasher.update_u64(self.rng_seed);
            hasher.update_bool(self.is_over());

            for player in self.registry.players() {
                hasher.update_uuid(player.id.as_bytes());
                hasher.update_str(&player.username);
                hasher.update_str(&player.color);
                hasher.update_cell(player.position);
                hasher.update_u32(player.score);
                hasher.update_bool(player.active);
            }

            for item in self.registry.items() {
                hasher.update_u32(item.id.0);
                hasher.update_cell(item.position);
                hasher.update_u8(item.kind as u8);
            }

            for obstacle in self.registry.obstacles() {
                hasher.update_u32(obstacle.id.0);
                hasher.update_cell(obstacle.position);
            }

            for message in self.registry.chat() {
                hasher.update_str(&message.sender);
                hasher.update_str(&message.text);
                hasher.update_i64(message.timestamp);
            }
        })
    }

    /// Full replicated view of the round.
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            level: self.level,
            remaining_time: self.remaining_time,
            phase: self.phase,
            players: self.registry.players().cloned().collect(),
            items: self.registry.items().cloned().collect(),
            obstacles: self.registry.obstacles().cloned().collect(),
            chat_messages: self.registry.chat().cloned().collect(),
            state_hash: self.compute_hash(),
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Replicated round state, handed to the transport after every mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// Current level
    pub level: u32,
    /// Seconds left in the level
    pub remaining_time: u32,
    /// Round phase
    pub phase: RoundPhase,
    /// Players in id order
    pub players: Vec<Player>,
    /// Items in id order
    pub items: Vec<Item>,
    /// Obstacles in id order
    pub obstacles: Vec<Obstacle>,
    /// Chat history, oldest first
    pub chat_messages: Vec<ChatMessage>,
    /// Digest of everything above
    pub state_hash: StateHash,
}

impl RoundSnapshot {
    /// Compact binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from [`RoundSnapshot::to_bytes`] output.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_ordering() {
        let id1 = PlayerId::new([0; 16]);
        let id2 = PlayerId::new([1; 16]);
        let id3 = PlayerId::new([0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        assert!(id1 < id2);
        assert!(id1 < id3);
        assert!(id3 < id2);
    }

    #[test]
    fn test_player_id_uuid_roundtrip() {
        let id = PlayerId::random();
        assert_eq!(PlayerId::from_uuid_str(&id.to_uuid_string()), Some(id));
        assert_eq!(PlayerId::from_uuid_str("not-a-uuid"), None);
    }

    #[test]
    fn test_item_values() {
        assert_eq!(Item::new(ItemId(0), Cell::new(0, 0), ItemKind::Collectible).value, 5);
        assert_eq!(Item::new(ItemId(1), Cell::new(0, 0), ItemKind::Coin).value, 1);
    }

    #[test]
    fn test_spawn_ids_are_monotonic() {
        let mut state = RoundState::new(1, 60, 50);
        let a = state.spawn_item(Cell::new(1, 1), ItemKind::Coin);
        let b = state.spawn_item(Cell::new(2, 2), ItemKind::Coin);
        state.registry.clear_items();
        let c = state.spawn_item(Cell::new(3, 3), ItemKind::Coin);

        assert_eq!((a, b, c), (ItemId(0), ItemId(1), ItemId(2)));
        assert_eq!(state.spawn_obstacle(Cell::new(4, 4)), ObstacleId(0));
    }

    #[test]
    fn test_spawn_on_shared_cell_keeps_both() {
        let mut state = RoundState::new(1, 60, 50);
        let a = state.spawn_item(Cell::new(1, 1), ItemKind::Coin);
        let b = state.spawn_item(Cell::new(1, 1), ItemKind::Collectible);
        let o = state.spawn_obstacle(Cell::new(1, 1));

        assert_ne!(a, b);
        assert_eq!(state.registry.item_count(), 2);
        assert_eq!(state.registry.obstacle_at(Cell::new(1, 1)), Some(o));
    }

    #[test]
    fn test_hash_covers_seed() {
        let a = RoundState::new(1, 60, 50);
        let b = RoundState::new(2, 60, 50);
        assert_ne!(a.compute_hash(), b.compute_hash());
        assert_eq!(a.compute_hash(), RoundState::new(1, 60, 50).compute_hash());
    }

    #[test]
    fn test_hash_tracks_mutation() {
        let mut state = RoundState::new(12345, 60, 50);
        let before = state.compute_hash();

        state.spawn_item(Cell::new(5, 5), ItemKind::Coin);
        let after_item = state.compute_hash();
        assert_ne!(before, after_item);

        state.remaining_time -= 1;
        assert_ne!(after_item, state.compute_hash());
    }

    #[test]
    fn test_snapshot_binary_encoding() {
        let mut state = RoundState::new(7, 60, 50);
        state.spawn_obstacle(Cell::new(0, 1));
        state.spawn_item(Cell::new(2, 3), ItemKind::Collectible);
        state
            .registry
            .insert_player(Player::new(
                PlayerId::new([9; 16]),
                "ada".to_string(),
                "red".to_string(),
                Cell::new(4, 4),
            ))
            .unwrap();

        let snapshot = state.snapshot();
        let decoded = RoundSnapshot::from_bytes(&snapshot.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.state_hash, state.compute_hash());
    }
}
