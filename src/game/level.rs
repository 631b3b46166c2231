//! Level Controller
//!
//! Countdown, lowest-score elimination and level advancement. Called once
//! per tick by the round controller.

use tracing::{debug, info, warn};

use crate::core::placement::{place, place_many};
use crate::game::events::GameEvent;
use crate::game::round::RoundConfig;
use crate::game::state::{ItemKind, PlayerId, RoundState};

/// What a countdown tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelOutcome {
    /// Timer still running
    Ticking,
    /// Eliminations done, next level started
    Advanced {
        /// The new level
        level: u32,
    },
    /// At most one active player left; the round must end
    GameOver,
}

/// Result of [`tick_countdown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelTick {
    /// What happened
    pub outcome: LevelOutcome,
    /// Events produced, in order
    pub events: Vec<GameEvent>,
}

impl LevelTick {
    fn new(outcome: LevelOutcome) -> Self {
        Self { outcome, events: Vec::new() }
    }
}

/// Advance the countdown by one second and handle expiry.
///
/// Expiry is evaluated on the tick that brings the timer to zero.
pub fn tick_countdown(state: &mut RoundState, config: &RoundConfig) -> LevelTick {
    state.remaining_time = state.remaining_time.saturating_sub(1);
    if state.remaining_time > 0 {
        return LevelTick::new(LevelOutcome::Ticking);
    }

    expire_level(state, config)
}

/// Run the elimination pass, then either end the round or advance.
pub fn expire_level(state: &mut RoundState, config: &RoundConfig) -> LevelTick {
    let level = state.level;

    let min_score = state
        .registry
        .players()
        .filter(|p| p.active)
        .map(|p| p.score)
        .min();

    let mut tick = LevelTick::new(LevelOutcome::GameOver);
    match min_score {
        // Every active player on the minimum goes, ties included
        Some(min_score) => {
            for player in state.registry.players_mut() {
                if player.active && player.score == min_score {
                    player.active = false;
                    debug!(player = %player.id, score = player.score, level, "player eliminated");
                    tick.events.push(GameEvent::player_eliminated(level, player.id, player.score));
                }
            }
        }
        None => warn!(level, "level expired with no active players"),
    }

    let remaining = state.registry.active_player_count();
    if remaining <= 1 {
        info!(level, eliminated = tick.events.len(), remaining, "round over after elimination");
        return tick;
    }

    advance_level(state, config);
    tick.events.push(GameEvent::level_up(state.level));
    tick.outcome = LevelOutcome::Advanced { level: state.level };
    tick
}

/// Start the next level: regenerate items, respawn active players and reset
/// the timer. Obstacles persist.
pub fn advance_level(state: &mut RoundState, config: &RoundConfig) {
    state.level += 1;

    state.registry.clear_items();
    spawn_item_batch(state, config);
    respawn_active_players(state, config);

    state.remaining_time = config.level_duration;
    info!(level = state.level, items = state.registry.item_count(), "level started");
}

/// Place a full batch of collectibles and coins, avoiding obstacles and the
/// items already on the board.
pub fn spawn_item_batch(state: &mut RoundState, config: &RoundConfig) {
    let occupied = state.registry.occupied_by_obstacles_and_items();
    let count = config.collectibles_per_level + config.coins_per_level;
    let cells = place_many(
        &mut state.rng,
        count,
        config.width,
        config.height,
        &occupied,
        config.placement_attempts,
    );

    for (index, cell) in cells.into_iter().enumerate() {
        let kind = if index < config.collectibles_per_level {
            ItemKind::Collectible
        } else {
            ItemKind::Coin
        };
        state.spawn_item(cell, kind);
    }
}

/// Move every active player to a fresh cell clear of obstacles and items.
/// Other players are not avoided.
pub fn respawn_active_players(state: &mut RoundState, config: &RoundConfig) {
    let occupied = state.registry.occupied_by_obstacles_and_items();
    let active: Vec<PlayerId> = state
        .registry
        .players()
        .filter(|p| p.active)
        .map(|p| p.id)
        .collect();

    for id in active {
        let placement = place(
            &mut state.rng,
            config.width,
            config.height,
            &occupied,
            config.placement_attempts,
        );
        if let Some(player) = state.registry.player_mut(&id) {
            player.position = placement.cell;
        }
    }
}
