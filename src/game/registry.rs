//! Entity Registry
//!
//! Keyed storage for players, items and obstacles plus the bounded chat log.
//! The registry enforces identity invariants only; game rules (name
//! uniqueness, spawn cells) belong to the round controller.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

use crate::core::grid::Cell;
use crate::game::state::{
    ChatMessage, Item, ItemId, Obstacle, ObstacleId, Player, PlayerId,
};

/// Default chat history capacity.
pub const CHAT_HISTORY_LIMIT: usize = 50;

/// Registry insertion errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A player with this connection id already exists.
    #[error("player {0} already registered")]
    DuplicatePlayer(PlayerId),

    /// An item with this id already exists.
    #[error("{0} already registered")]
    DuplicateItem(ItemId),

    /// An obstacle with this id already exists.
    #[error("{0} already registered")]
    DuplicateObstacle(ObstacleId),
}

/// Storage for every entity in a round.
#[derive(Clone, Debug)]
pub struct EntityRegistry {
    players: BTreeMap<PlayerId, Player>,
    items: BTreeMap<ItemId, Item>,
    obstacles: BTreeMap<ObstacleId, Obstacle>,
    chat: VecDeque<ChatMessage>,
    chat_limit: usize,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new(CHAT_HISTORY_LIMIT)
    }
}

impl EntityRegistry {
    /// Create an empty registry keeping at most `chat_limit` chat lines.
    pub fn new(chat_limit: usize) -> Self {
        Self {
            players: BTreeMap::new(),
            items: BTreeMap::new(),
            obstacles: BTreeMap::new(),
            chat: VecDeque::with_capacity(chat_limit + 1),
            chat_limit,
        }
    }

    // -------------------------------------------------------------------------
    // Players
    // -------------------------------------------------------------------------

    /// Insert a player. An existing entry for the same id is left untouched.
    pub fn insert_player(&mut self, player: Player) -> Result<(), RegistryError> {
        if self.players.contains_key(&player.id) {
            return Err(RegistryError::DuplicatePlayer(player.id));
        }
        self.players.insert(player.id, player);
        Ok(())
    }

    /// Get a player by ID.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Remove a player, returning its final state.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    /// Check if a connection id is registered.
    pub fn contains_player(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// All players in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// All players, mutable, in id order.
    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Number of registered players (active or not).
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of players still in play.
    pub fn active_player_count(&self) -> usize {
        self.players.values().filter(|p| p.active).count()
    }

    /// Check whether any registered player uses `name`.
    pub fn display_name_taken(&self, name: &str) -> bool {
        self.players.values().any(|p| p.username == name)
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    /// Insert an item.
    pub fn insert_item(&mut self, item: Item) -> Result<(), RegistryError> {
        if self.items.contains_key(&item.id) {
            return Err(RegistryError::DuplicateItem(item.id));
        }
        self.items.insert(item.id, item);
        Ok(())
    }

    /// Get an item by ID.
    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    /// Remove an item. Returns `None` if it was already gone.
    pub fn remove_item(&mut self, id: &ItemId) -> Option<Item> {
        self.items.remove(id)
    }

    /// All items in id order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Number of items on the board.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Items lying on `cell`, in id order.
    pub fn items_at(&self, cell: Cell) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|item| item.position == cell)
            .map(|item| item.id)
            .collect()
    }

    /// Remove every item.
    pub fn clear_items(&mut self) {
        self.items.clear();
    }

    // -------------------------------------------------------------------------
    // Obstacles
    // -------------------------------------------------------------------------

    /// Insert an obstacle.
    pub fn insert_obstacle(&mut self, obstacle: Obstacle) -> Result<(), RegistryError> {
        if self.obstacles.contains_key(&obstacle.id) {
            return Err(RegistryError::DuplicateObstacle(obstacle.id));
        }
        self.obstacles.insert(obstacle.id, obstacle);
        Ok(())
    }

    /// Get an obstacle by ID.
    pub fn obstacle(&self, id: &ObstacleId) -> Option<&Obstacle> {
        self.obstacles.get(id)
    }

    /// Remove an obstacle.
    pub fn remove_obstacle(&mut self, id: &ObstacleId) -> Option<Obstacle> {
        self.obstacles.remove(id)
    }

    /// All obstacles in id order.
    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.values()
    }

    /// Number of obstacles on the board.
    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    /// The obstacle on `cell`, if any.
    pub fn obstacle_at(&self, cell: Cell) -> Option<ObstacleId> {
        self.obstacles
            .values()
            .find(|obstacle| obstacle.position == cell)
            .map(|obstacle| obstacle.id)
    }

    // -------------------------------------------------------------------------
    // Chat
    // -------------------------------------------------------------------------

    /// Append a chat line, evicting the oldest lines past the limit.
    /// Returns how many lines were evicted.
    pub fn push_chat(&mut self, message: ChatMessage) -> usize {
        self.chat.push_back(message);
        let mut evicted = 0;
        while self.chat.len() > self.chat_limit {
            self.chat.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Chat history, oldest first.
    pub fn chat(&self) -> impl Iterator<Item = &ChatMessage> {
        self.chat.iter()
    }

    /// Number of retained chat lines.
    pub fn chat_len(&self) -> usize {
        self.chat.len()
    }

    // -------------------------------------------------------------------------
    // Occupancy
    // -------------------------------------------------------------------------

    /// Cells covered by obstacles or items.
    pub fn occupied_by_obstacles_and_items(&self) -> BTreeSet<Cell> {
        self.obstacles
            .values()
            .map(|o| o.position)
            .chain(self.items.values().map(|i| i.position))
            .collect()
    }

    /// Cells covered by any entity, players included.
    pub fn occupied_cells(&self) -> BTreeSet<Cell> {
        let mut cells = self.occupied_by_obstacles_and_items();
        cells.extend(self.players.values().map(|p| p.position));
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::ItemKind;

    fn player(byte: u8, name: &str) -> Player {
        Player::new(
            PlayerId::new([byte; 16]),
            name.to_string(),
            "black".to_string(),
            Cell::new(byte as i32, 0),
        )
    }

    fn chat(n: usize) -> ChatMessage {
        ChatMessage {
            sender: "ada".to_string(),
            text: format!("message {}", n),
            timestamp: n as i64,
        }
    }

    #[test]
    fn test_duplicate_player_rejected() {
        let mut registry = EntityRegistry::default();
        registry.insert_player(player(1, "first")).unwrap();

        let mut again = player(1, "second");
        again.score = 99;
        let result = registry.insert_player(again);

        assert_eq!(result, Err(RegistryError::DuplicatePlayer(PlayerId::new([1; 16]))));
        assert_eq!(registry.player_count(), 1);
        let kept = registry.player(&PlayerId::new([1; 16])).unwrap();
        assert_eq!(kept.username, "first");
        assert_eq!(kept.score, 0);
    }

    #[test]
    fn test_remove_player() {
        let mut registry = EntityRegistry::default();
        registry.insert_player(player(1, "a")).unwrap();

        assert!(registry.remove_player(&PlayerId::new([1; 16])).is_some());
        assert!(registry.remove_player(&PlayerId::new([1; 16])).is_none());
        assert_eq!(registry.player_count(), 0);
    }

    #[test]
    fn test_active_count_and_names() {
        let mut registry = EntityRegistry::default();
        registry.insert_player(player(1, "a")).unwrap();
        registry.insert_player(player(2, "b")).unwrap();
        registry.player_mut(&PlayerId::new([2; 16])).unwrap().active = false;

        assert_eq!(registry.active_player_count(), 1);
        assert!(registry.display_name_taken("b"));
        assert!(!registry.display_name_taken("c"));
    }

    #[test]
    fn test_chat_bounded_keeps_newest_in_order() {
        let mut registry = EntityRegistry::default();
        let mut evicted = 0;
        for n in 0..60 {
            evicted += registry.push_chat(chat(n));
        }

        assert_eq!(evicted, 10);
        assert_eq!(registry.chat_len(), CHAT_HISTORY_LIMIT);
        let texts: Vec<_> = registry.chat().map(|m| m.text.clone()).collect();
        let expected: Vec<_> = (10..60).map(|n| format!("message {}", n)).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_item_lookup_and_removal_once() {
        let mut registry = EntityRegistry::default();
        let cell = Cell::new(3, 3);
        registry.insert_item(Item::new(ItemId(0), cell, ItemKind::Coin)).unwrap();
        registry.insert_item(Item::new(ItemId(1), Cell::new(4, 4), ItemKind::Coin)).unwrap();

        assert_eq!(registry.items_at(cell), vec![ItemId(0)]);
        assert!(registry.remove_item(&ItemId(0)).is_some());
        assert!(registry.remove_item(&ItemId(0)).is_none());
        assert!(registry.items_at(cell).is_empty());
    }

    #[test]
    fn test_occupancy_sets() {
        let mut registry = EntityRegistry::default();
        registry.insert_player(player(7, "p")).unwrap();
        registry.insert_item(Item::new(ItemId(0), Cell::new(1, 1), ItemKind::Coin)).unwrap();
        registry
            .insert_obstacle(Obstacle { id: ObstacleId(0), position: Cell::new(2, 2) })
            .unwrap();

        let world = registry.occupied_by_obstacles_and_items();
        assert_eq!(world.len(), 2);
        assert!(!world.contains(&Cell::new(7, 0)));

        let all = registry.occupied_cells();
        assert_eq!(all.len(), 3);
        assert!(all.contains(&Cell::new(7, 0)));
        assert_eq!(registry.obstacle_at(Cell::new(2, 2)), Some(ObstacleId(0)));
        assert_eq!(registry.obstacle_at(Cell::new(3, 3)), None);
    }
}
