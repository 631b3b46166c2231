//! Move Resolution
//!
//! Two steps: [`resolve_move`] inspects the state and decides what a move
//! does (pure), then [`apply_resolution`] commits it and produces events.
//! Keeping detection free of mutation means item matches are gathered
//! before any item is removed.

use tracing::debug;

use crate::core::grid::Cell;
use crate::game::events::GameEvent;
use crate::game::input::MoveDelta;
use crate::game::state::{ItemId, ItemKind, ObstacleId, PlayerId, RoundState};

/// Why a move had no effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveRejection {
    /// No player for this connection
    UnknownPlayer,
    /// Player already lost or was eliminated
    Inactive,
}

/// An item found on the destination cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Collection {
    /// Item to remove
    pub item_id: ItemId,
    /// Its category
    pub kind: ItemKind,
    /// Points it awards
    pub value: u32,
}

/// What a move will do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveResolution {
    /// Nothing happens
    Rejected(MoveRejection),

    /// Destination holds an obstacle; the player is knocked out in place
    Blocked {
        /// Mover
        player_id: PlayerId,
        /// Obstacle hit
        obstacle_id: ObstacleId,
        /// Cell the player tried to enter
        destination: Cell,
    },

    /// Player moves and collects whatever lies on the destination
    Moved {
        /// Mover
        player_id: PlayerId,
        /// Starting cell
        from: Cell,
        /// Clamped destination
        to: Cell,
        /// Items picked up at `to`, in id order
        collections: Vec<Collection>,
    },
}

/// Committed effects of a move.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Events to broadcast, in order
    pub events: Vec<GameEvent>,
    /// At most one active player remains; the round must end
    pub round_over: bool,
}

/// Decide the effect of moving `player_id` by `delta`.
///
/// The destination is clamped onto the `width × height` board. An obstacle
/// takes precedence over items on the same cell.
pub fn resolve_move(
    state: &RoundState,
    player_id: PlayerId,
    delta: MoveDelta,
    width: i32,
    height: i32,
) -> MoveResolution {
    let player = match state.registry.player(&player_id) {
        Some(player) => player,
        None => return MoveResolution::Rejected(MoveRejection::UnknownPlayer),
    };
    if !player.active {
        return MoveResolution::Rejected(MoveRejection::Inactive);
    }

    let destination = player.position.offset_clamped(delta.dx, delta.dy, width, height);

    if let Some(obstacle_id) = state.registry.obstacle_at(destination) {
        return MoveResolution::Blocked {
            player_id,
            obstacle_id,
            destination,
        };
    }

    let collections = state
        .registry
        .items_at(destination)
        .into_iter()
        .filter_map(|item_id| state.registry.item(&item_id))
        .map(|item| Collection {
            item_id: item.id,
            kind: item.kind,
            value: item.value,
        })
        .collect();

    MoveResolution::Moved {
        player_id,
        from: player.position,
        to: destination,
        collections,
    }
}

/// Commit a resolution to the state.
pub fn apply_resolution(state: &mut RoundState, resolution: MoveResolution) -> MoveOutcome {
    let mut outcome = MoveOutcome::default();
    let level = state.level;

    match resolution {
        MoveResolution::Rejected(reason) => {
            debug!(?reason, "move rejected");
        }

        MoveResolution::Blocked { player_id, obstacle_id, destination } => {
            let Some(player) = state.registry.player_mut(&player_id) else {
                return outcome;
            };
            player.active = false;
            debug!(player = %player_id, obstacle = %obstacle_id, at = %destination, "player hit obstacle");

            outcome.events.push(GameEvent::player_lost(level, player_id, player.position));
            outcome.round_over = state.registry.active_player_count() <= 1;
        }

        MoveResolution::Moved { player_id, to, collections, .. } => {
            match state.registry.player_mut(&player_id) {
                Some(player) => player.position = to,
                None => return outcome,
            }

            for collection in collections {
                // Credit only if this pass actually removed the item
                if state.registry.remove_item(&collection.item_id).is_none() {
                    continue;
                }
                let Some(player) = state.registry.player_mut(&player_id) else {
                    break;
                };
                player.add_score(collection.value);

                outcome.events.push(GameEvent::item_collected(
                    level,
                    player_id,
                    collection.item_id,
                    collection.kind,
                    collection.value,
                    player.score,
                ));
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::{GRID_HEIGHT, GRID_WIDTH};
    use crate::game::events::GameEventData;
    use crate::game::state::Player;

    fn state_with_players(positions: &[(u8, Cell)]) -> RoundState {
        let mut state = RoundState::new(12345, 60, 50);
        for (byte, cell) in positions {
            state
                .registry
                .insert_player(Player::new(
                    PlayerId::new([*byte; 16]),
                    format!("p{}", byte),
                    "black".to_string(),
                    *cell,
                ))
                .unwrap();
        }
        state
    }

    fn step(state: &mut RoundState, id: PlayerId, dx: i32, dy: i32) -> MoveOutcome {
        let resolution = resolve_move(state, id, MoveDelta::new(dx, dy), GRID_WIDTH, GRID_HEIGHT);
        apply_resolution(state, resolution)
    }

    #[test]
    fn test_plain_move() {
        let id = PlayerId::new([1; 16]);
        let mut state = state_with_players(&[(1, Cell::new(5, 5))]);

        let outcome = step(&mut state, id, 1, 0);
        assert!(outcome.events.is_empty());
        assert!(!outcome.round_over);
        assert_eq!(state.registry.player(&id).unwrap().position, Cell::new(6, 5));
    }

    #[test]
    fn test_move_clamped_to_board() {
        let id = PlayerId::new([1; 16]);
        let mut state = state_with_players(&[(1, Cell::new(19, 0))]);

        step(&mut state, id, 50, -50);
        assert_eq!(state.registry.player(&id).unwrap().position, Cell::new(19, 0));

        step(&mut state, id, -1000, 1000);
        assert_eq!(state.registry.player(&id).unwrap().position, Cell::new(0, 19));
    }

    #[test]
    fn test_unknown_and_inactive_rejected() {
        let id = PlayerId::new([1; 16]);
        let mut state = state_with_players(&[(1, Cell::new(5, 5))]);

        let ghost = resolve_move(&state, PlayerId::new([9; 16]), MoveDelta::new(1, 0), 20, 20);
        assert_eq!(ghost, MoveResolution::Rejected(MoveRejection::UnknownPlayer));

        state.registry.player_mut(&id).unwrap().active = false;
        let hash_before = state.compute_hash();
        let outcome = step(&mut state, id, 1, 0);

        assert!(outcome.events.is_empty());
        assert_eq!(state.compute_hash(), hash_before);
    }

    #[test]
    fn test_obstacle_takes_precedence_over_items() {
        let a = PlayerId::new([1; 16]);
        let mut state = state_with_players(&[(1, Cell::new(5, 5)), (2, Cell::new(0, 0)), (3, Cell::new(9, 9))]);
        state.spawn_obstacle(Cell::new(6, 5));
        let item = state.spawn_item(Cell::new(6, 5), ItemKind::Collectible);

        let outcome = step(&mut state, a, 1, 0);

        let player = state.registry.player(&a).unwrap();
        assert_eq!(player.position, Cell::new(5, 5), "position unchanged on collision");
        assert!(!player.active);
        assert_eq!(player.score, 0);
        assert!(state.registry.item(&item).is_some(), "item must not be collected");
        assert_eq!(
            outcome.events,
            vec![GameEvent::player_lost(1, a, Cell::new(5, 5))]
        );
        assert!(!outcome.round_over, "two players still active");
    }

    #[test]
    fn test_collision_ends_round_when_one_left() {
        let a = PlayerId::new([1; 16]);
        let mut state = state_with_players(&[(1, Cell::new(5, 5)), (2, Cell::new(0, 0))]);
        state.spawn_obstacle(Cell::new(5, 6));

        let outcome = step(&mut state, a, 0, 1);
        assert!(outcome.round_over);
    }

    #[test]
    fn test_collect_items_on_destination() {
        let a = PlayerId::new([1; 16]);
        let mut state = state_with_players(&[(1, Cell::new(5, 5))]);
        let coin = state.spawn_item(Cell::new(5, 4), ItemKind::Coin);
        let gem = state.spawn_item(Cell::new(5, 4), ItemKind::Collectible);
        let far = state.spawn_item(Cell::new(0, 0), ItemKind::Coin);

        let outcome = step(&mut state, a, 0, -1);

        assert_eq!(state.registry.player(&a).unwrap().score, 6);
        assert!(state.registry.item(&coin).is_none());
        assert!(state.registry.item(&gem).is_none());
        assert!(state.registry.item(&far).is_some());

        let collected: Vec<_> = outcome
            .events
            .iter()
            .map(|e| match &e.data {
                GameEventData::ItemCollected { item_id, new_score, .. } => (*item_id, *new_score),
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(collected, vec![(coin, 1), (gem, 6)]);
    }

    #[test]
    fn test_stale_resolution_collects_once() {
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        let mut state = state_with_players(&[(1, Cell::new(4, 5)), (2, Cell::new(6, 5))]);
        let item = state.spawn_item(Cell::new(5, 5), ItemKind::Collectible);

        // Both resolutions see the item before either is applied
        let first = resolve_move(&state, a, MoveDelta::new(1, 0), 20, 20);
        let second = resolve_move(&state, b, MoveDelta::new(-1, 0), 20, 20);

        let out_a = apply_resolution(&mut state, first);
        let out_b = apply_resolution(&mut state, second);

        assert_eq!(out_a.events.len(), 1);
        assert!(out_b.events.is_empty());
        assert_eq!(state.registry.player(&a).unwrap().score, 5);
        assert_eq!(state.registry.player(&b).unwrap().score, 0);
        assert!(state.registry.item(&item).is_none());
    }
}
