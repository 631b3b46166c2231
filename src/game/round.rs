//! Round Controller
//!
//! Top-level orchestrator for one room's round. Owns the [`RoundState`],
//! dispatches intents to the move resolver, drives the level controller
//! from the tick, and produces the final score list on game over.
//!
//! Every method runs to completion without suspending. The caller must
//! guarantee that at most one of them executes at a time for a given round.

use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::grid::{GRID_HEIGHT, GRID_WIDTH};
use crate::core::placement::{place, place_many, MAX_PLACEMENT_ATTEMPTS};
use crate::game::events::GameEvent;
use crate::game::input::{Intent, JoinOptions, MoveDelta, DEFAULT_USERNAME};
use crate::game::level::{self, LevelOutcome};
use crate::game::movement::{apply_resolution, resolve_move};
use crate::game::registry::CHAT_HISTORY_LIMIT;
use crate::game::state::{ChatMessage, Player, PlayerId, RoundPhase, RoundSnapshot, RoundState};
use crate::scores::{rank, ScoreRecord};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Seconds per level.
pub const LEVEL_DURATION_SECS: u32 = 60;

/// Collectibles placed per level.
pub const COLLECTIBLES_PER_LEVEL: usize = 10;

/// Coins placed per level.
pub const COINS_PER_LEVEL: usize = 20;

/// Obstacles placed at setup.
pub const OBSTACLE_COUNT: usize = 15;

/// Players accepted per room.
pub const MAX_PLAYERS: usize = 4;

/// Maximum chat line length (characters).
pub const CHAT_MAX_CHARS: usize = 200;

/// Round rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundConfig {
    /// Board columns
    pub width: i32,
    /// Board rows
    pub height: i32,
    /// Seconds per level
    pub level_duration: u32,
    /// Collectibles per item batch
    pub collectibles_per_level: usize,
    /// Coins per item batch
    pub coins_per_level: usize,
    /// Obstacles placed at setup
    pub obstacle_count: usize,
    /// Join limit
    pub max_players: usize,
    /// Chat history capacity
    pub chat_limit: usize,
    /// Chat line length cap
    pub chat_max_chars: usize,
    /// Placement attempts before degrading
    pub placement_attempts: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            width: GRID_WIDTH,
            height: GRID_HEIGHT,
            level_duration: LEVEL_DURATION_SECS,
            collectibles_per_level: COLLECTIBLES_PER_LEVEL,
            coins_per_level: COINS_PER_LEVEL,
            obstacle_count: OBSTACLE_COUNT,
            max_players: MAX_PLAYERS,
            chat_limit: CHAT_HISTORY_LIMIT,
            chat_max_chars: CHAT_MAX_CHARS,
            placement_attempts: MAX_PLACEMENT_ATTEMPTS,
        }
    }
}

impl RoundConfig {
    /// Defaults overridden by `LEVEL_DURATION_SECS` and `MAX_PLAYERS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        env_override("LEVEL_DURATION_SECS", &mut config.level_duration);
        env_override("MAX_PLAYERS", &mut config.max_players);

        if config.level_duration == 0 {
            warn!("LEVEL_DURATION_SECS must be positive, using {}", LEVEL_DURATION_SECS);
            config.level_duration = LEVEL_DURATION_SECS;
        }
        if config.max_players == 0 {
            warn!("MAX_PLAYERS must be positive, using {}", MAX_PLAYERS);
            config.max_players = MAX_PLAYERS;
        }

        config
    }
}

/// Replace `target` with the parsed value of env var `key`, if set and valid.
pub(crate) fn env_override<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(key, value = %raw, "ignoring invalid environment value"),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Rejected intents. None of these change the round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    /// Connection already has a player.
    #[error("player {0} already joined")]
    AlreadyJoined(PlayerId),

    /// Join limit reached.
    #[error("room is full ({0} players)")]
    RoomFull(usize),

    /// Connection has no player.
    #[error("player {0} has not joined")]
    UnknownPlayer(PlayerId),

    /// Chat text was blank.
    #[error("chat message is empty")]
    EmptyChat,

    /// Round already ended.
    #[error("round is over")]
    RoundOver,
}

// =============================================================================
// ROUND
// =============================================================================

/// One room's round.
#[derive(Clone, Debug)]
pub struct Round {
    room_id: String,
    config: RoundConfig,
    state: RoundState,
    /// Final records of players who left
    departed: Vec<ScoreRecord>,
    final_scores: Option<Vec<ScoreRecord>>,
    /// Panic inside the next tick, leaving the timer at zero
    #[cfg(test)]
    pub(crate) fail_next_tick: bool,
}

impl Round {
    /// Set up a fresh round: level 1, full timer, an item batch, then
    /// obstacles placed clear of the items.
    pub fn new(room_id: impl Into<String>, config: RoundConfig, seed: u64) -> Self {
        let room_id = room_id.into();
        let mut state = RoundState::new(seed, config.level_duration, config.chat_limit);

        level::spawn_item_batch(&mut state, &config);

        let occupied = state.registry.occupied_by_obstacles_and_items();
        let cells = place_many(
            &mut state.rng,
            config.obstacle_count,
            config.width,
            config.height,
            &occupied,
            config.placement_attempts,
        );
        for cell in cells {
            state.spawn_obstacle(cell);
        }

        info!(
            room = %room_id,
            seed,
            items = state.registry.item_count(),
            obstacles = state.registry.obstacle_count(),
            "round set up"
        );

        Self {
            room_id,
            config,
            state,
            departed: Vec::new(),
            final_scores: None,
            #[cfg(test)]
            fail_next_tick: false,
        }
    }

    /// Room this round belongs to.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Read-only state.
    pub fn state(&self) -> &RoundState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut RoundState {
        &mut self.state
    }

    /// Check if the round has ended.
    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    /// Final ranked scores, once the round is over.
    pub fn final_scores(&self) -> Option<&[ScoreRecord]> {
        self.final_scores.as_deref()
    }

    /// Replicated view for broadcasting.
    pub fn snapshot(&self) -> RoundSnapshot {
        self.state.snapshot()
    }

    // -------------------------------------------------------------------------
    // Intents
    // -------------------------------------------------------------------------

    /// Dispatch a typed intent.
    pub fn handle(&mut self, player_id: PlayerId, intent: Intent) -> Result<Vec<GameEvent>, RoundError> {
        match intent {
            Intent::Join(options) => self.join(player_id, options).map(|_| Vec::new()),
            Intent::Move(delta) => self.handle_move(player_id, delta),
            Intent::Chat(text) => self.chat(player_id, &text).map(|_| Vec::new()),
            Intent::Leave => self.leave(player_id).map(|_| Vec::new()),
        }
    }

    /// Register a player on a free cell.
    ///
    /// A taken display name gets a `#n` suffix.
    pub fn join(&mut self, player_id: PlayerId, options: JoinOptions) -> Result<&Player, RoundError> {
        if self.is_over() {
            return Err(RoundError::RoundOver);
        }
        if self.state.registry.contains_player(&player_id) {
            return Err(RoundError::AlreadyJoined(player_id));
        }
        if self.state.registry.player_count() >= self.config.max_players {
            return Err(RoundError::RoomFull(self.config.max_players));
        }

        let username = self.unique_name(options.display_name());
        let occupied = self.state.registry.occupied_cells();
        let placement = place(
            &mut self.state.rng,
            self.config.width,
            self.config.height,
            &occupied,
            self.config.placement_attempts,
        );

        let player = Player::new(player_id, username, options.color(), placement.cell);
        self.state
            .registry
            .insert_player(player)
            .map_err(|_| RoundError::AlreadyJoined(player_id))?;

        let player = self
            .state
            .registry
            .player(&player_id)
            .ok_or(RoundError::UnknownPlayer(player_id))?;
        info!(room = %self.room_id, player = %player_id, name = %player.username, at = %player.position, "player joined");
        Ok(player)
    }

    fn unique_name(&self, base: String) -> String {
        if !self.state.registry.display_name_taken(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}#{}", base, n);
            if !self.state.registry.display_name_taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Remove a player. Its final score is kept for the game-over dump.
    pub fn leave(&mut self, player_id: PlayerId) -> Result<ScoreRecord, RoundError> {
        let player = self
            .state
            .registry
            .remove_player(&player_id)
            .ok_or(RoundError::UnknownPlayer(player_id))?;

        let record = ScoreRecord::new(player.username, player.score);
        info!(room = %self.room_id, player = %player_id, score = record.score, "player left");
        self.departed.push(record.clone());
        Ok(record)
    }

    /// Post a chat line. Unknown senders are shown as the default name.
    pub fn chat(&mut self, player_id: PlayerId, text: &str) -> Result<(), RoundError> {
        if self.is_over() {
            return Err(RoundError::RoundOver);
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(RoundError::EmptyChat);
        }
        let text: String = text.chars().take(self.config.chat_max_chars).collect();

        let sender = self
            .state
            .registry
            .player(&player_id)
            .map(|p| p.username.clone())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        let evicted = self.state.registry.push_chat(ChatMessage {
            sender,
            text,
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
        debug!(room = %self.room_id, player = %player_id, evicted, "chat posted");
        Ok(())
    }

    /// Move a player and apply collisions and pickups.
    pub fn handle_move(&mut self, player_id: PlayerId, delta: MoveDelta) -> Result<Vec<GameEvent>, RoundError> {
        if self.is_over() {
            return Err(RoundError::RoundOver);
        }
        if !self.state.registry.contains_player(&player_id) {
            return Err(RoundError::UnknownPlayer(player_id));
        }

        let resolution = resolve_move(&self.state, player_id, delta, self.config.width, self.config.height);
        let outcome = apply_resolution(&mut self.state, resolution);

        let mut events = outcome.events;
        if outcome.round_over {
            events.push(self.finish());
        }
        Ok(events)
    }

    // -------------------------------------------------------------------------
    // Clock
    // -------------------------------------------------------------------------

    /// One-second tick. Does nothing once the round is over.
    pub fn tick(&mut self) -> Vec<GameEvent> {
        if self.is_over() {
            return Vec::new();
        }

        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_tick) {
            self.state.remaining_time = 0;
            panic!("tick failed in room {}", self.room_id);
        }

        let tick = level::tick_countdown(&mut self.state, &self.config);
        let mut events = tick.events;

        match tick.outcome {
            LevelOutcome::Ticking => {}
            LevelOutcome::Advanced { level } => {
                info!(room = %self.room_id, level, "level up");
            }
            LevelOutcome::GameOver => events.push(self.finish()),
        }

        events
    }

    /// Put the timer back to a full level if it is stuck at zero.
    pub fn recover_timer(&mut self) {
        if self.state.remaining_time == 0 && !self.is_over() {
            warn!(room = %self.room_id, level = self.state.level, "re-arming level timer");
            self.state.remaining_time = self.config.level_duration;
        }
    }

    /// End the round and build the ranked score list of every player ever
    /// registered, departed ones included.
    pub fn finish(&mut self) -> GameEvent {
        let mut records: Vec<ScoreRecord> = self
            .state
            .registry
            .players()
            .map(|p| ScoreRecord::new(p.username.clone(), p.score))
            .chain(self.departed.iter().cloned())
            .collect();
        rank(&mut records);

        self.state.phase = RoundPhase::Over;
        self.final_scores = Some(records.clone());

        info!(room = %self.room_id, level = self.state.level, players = records.len(), "game over");
        GameEvent::game_over(self.state.level, records)
    }
}
