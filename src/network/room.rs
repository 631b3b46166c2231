//! Room Sessions
//!
//! Each room is an actor: one tokio task owns the [`Round`] by value and
//! is the only code that ever mutates it. Ticks and client commands are
//! taken from a single `select!` loop, so handlers never interleave and no
//! lock guards the round. Handles talk to the actor over channels.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::core::hash::StateHash;
use crate::core::rng::derive_room_seed;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::Intent;
use crate::game::round::{env_override, Round, RoundConfig, RoundError};
use crate::game::state::{PlayerId, RoundSnapshot};
use crate::network::protocol::{ClientMessage, ProtocolError, RoomEvent, ServerMessage, StateUpdate};
use crate::scores::{ScoreRecord, ScoreSink};

/// Unique room identifier.
pub type RoomId = [u8; 16];

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Runtime settings shared by all rooms.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Countdown tick period
    pub tick_period: Duration,
    /// Queued commands per room
    pub command_capacity: usize,
    /// Buffered outbound messages per subscriber
    pub broadcast_capacity: usize,
    /// Where the JSON score dump goes
    pub scores_path: PathBuf,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(crate::TICK_PERIOD_SECS),
            command_capacity: 256,
            broadcast_capacity: 256,
            scores_path: PathBuf::from("scores.json"),
        }
    }
}

impl RoomConfig {
    /// Defaults overridden by `TICK_PERIOD_MS` and `SCORES_PATH`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let default_ms = crate::TICK_PERIOD_SECS * 1000;
        let mut tick_ms = default_ms;
        env_override("TICK_PERIOD_MS", &mut tick_ms);
        if tick_ms == 0 {
            warn!("TICK_PERIOD_MS must be positive, using {}", default_ms);
            tick_ms = default_ms;
        }
        config.tick_period = Duration::from_millis(tick_ms);

        if let Ok(path) = std::env::var("SCORES_PATH") {
            config.scores_path = PathBuf::from(path);
        }

        config
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Room errors.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Room actor has stopped.
    #[error("room is closed")]
    Closed,

    /// No room with this id.
    #[error("room {0} not found")]
    NotFound(String),

    /// Handler panicked before replying.
    #[error("room handler failed")]
    HandlerFailed,

    /// Round refused the intent.
    #[error("rejected: {0}")]
    Rejected(#[from] RoundError),

    /// Client message was invalid.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

// =============================================================================
// COMMANDS & HANDLE
// =============================================================================

/// Messages processed by a room actor, one at a time.
#[derive(Debug)]
pub enum RoomCommand {
    /// Apply a player intent.
    Intent {
        /// Sending connection
        player_id: PlayerId,
        /// What it wants
        intent: Intent,
        /// Acknowledgement
        reply: oneshot::Sender<Result<(), RoundError>>,
    },

    /// Read the current state.
    Snapshot(oneshot::Sender<RoundSnapshot>),

    /// Stop the room.
    Close,
}

/// Cheap, cloneable access to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    commands: mpsc::Sender<RoomCommand>,
    outbound: broadcast::Sender<ServerMessage>,
}

impl RoomHandle {
    /// Room identifier.
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Room identifier as a UUID string.
    pub fn label(&self) -> String {
        uuid::Uuid::from_bytes(self.id).to_string()
    }

    /// Receive every message the room broadcasts from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.outbound.subscribe()
    }

    /// Check if the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Apply an intent and wait for the round's verdict.
    pub async fn submit(&self, player_id: PlayerId, intent: Intent) -> Result<(), RoomError> {
        let (reply, verdict) = oneshot::channel();
        self.commands
            .send(RoomCommand::Intent { player_id, intent, reply })
            .await
            .map_err(|_| RoomError::Closed)?;

        verdict.await.map_err(|_| RoomError::HandlerFailed)??;
        Ok(())
    }

    /// Handle a raw client message. Returns the direct reply for the sender,
    /// if any; everything else goes out on the broadcast channel.
    pub async fn dispatch(&self, player_id: PlayerId, message: ClientMessage) -> Result<Option<ServerMessage>, RoomError> {
        if let ClientMessage::Ping { timestamp } = message {
            return Ok(Some(ServerMessage::Pong {
                timestamp,
                server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
            }));
        }

        let Some(intent) = message.into_intent()? else {
            return Ok(None);
        };
        let joined = matches!(intent, Intent::Join(_));

        self.submit(player_id, intent).await?;

        Ok(joined.then(|| ServerMessage::Joined {
            player_id: player_id.to_uuid_string(),
        }))
    }

    /// Current replicated state.
    pub async fn snapshot(&self) -> Result<RoundSnapshot, RoomError> {
        let (reply, snapshot) = oneshot::channel();
        self.commands
            .send(RoomCommand::Snapshot(reply))
            .await
            .map_err(|_| RoomError::Closed)?;
        snapshot.await.map_err(|_| RoomError::HandlerFailed)
    }

    /// Ask the actor to stop.
    pub async fn close(&self) {
        let _ = self.commands.send(RoomCommand::Close).await;
    }
}

// =============================================================================
// ROOM ACTOR
// =============================================================================

/// The single writer of one room's round.
pub struct RoomSession {
    round: Round,
    tick_period: Duration,
    commands: mpsc::Receiver<RoomCommand>,
    outbound: broadcast::Sender<ServerMessage>,
    sink: Arc<dyn ScoreSink>,
    /// Hash of the last state sent to subscribers
    last_state_hash: Option<StateHash>,
}

impl RoomSession {
    /// Start the actor on the current tokio runtime. Logs and persisted
    /// scores are labelled with the round's room id.
    pub fn spawn(
        id: RoomId,
        round: Round,
        config: &RoomConfig,
        sink: Arc<dyn ScoreSink>,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (outbound, _) = broadcast::channel(config.broadcast_capacity);

        let session = Self {
            round,
            tick_period: config.tick_period,
            commands: command_rx,
            outbound: outbound.clone(),
            sink,
            last_state_hash: None,
        };

        let handle = RoomHandle {
            id,
            commands: command_tx,
            outbound,
        };

        (handle, tokio::spawn(session.run()))
    }

    /// Actor loop. Returns when closed or when every handle is dropped.
    pub async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.tick_period, self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(room = %self.round.room_id(), "room started");

        loop {
            tokio::select! {
                _ = ticker.tick(), if !self.round.is_over() => {
                    self.on_tick().await;
                }
                command = self.commands.recv() => match command {
                    Some(RoomCommand::Close) | None => break,
                    Some(command) => self.on_command(command).await,
                },
            }
        }

        self.broadcast(ServerMessage::Shutdown {
            reason: "room closed".to_string(),
        });
        info!(room = %self.round.room_id(), level = self.round.state().level, "room stopped");
    }

    async fn on_tick(&mut self) {
        let round = &mut self.round;
        match catch_unwind(AssertUnwindSafe(|| round.tick())) {
            Ok(events) => self.publish(events).await,
            Err(_) => {
                error!(room = %self.round.room_id(), "tick handler panicked");
                self.round.recover_timer();
            }
        }
        self.broadcast_state();
    }

    async fn on_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Intent { player_id, intent, reply } => {
                let kind = intent.kind();
                let round = &mut self.round;

                match catch_unwind(AssertUnwindSafe(|| round.handle(player_id, intent))) {
                    Ok(Ok(events)) => {
                        self.publish(events).await;
                        let _ = reply.send(Ok(()));
                    }
                    Ok(Err(e)) => {
                        debug!(room = %self.round.room_id(), player = %player_id, kind, error = %e, "intent rejected");
                        let _ = reply.send(Err(e));
                    }
                    Err(_) => {
                        error!(room = %self.round.room_id(), player = %player_id, kind, "intent handler panicked");
                    }
                }
                self.broadcast_state();
            }
            RoomCommand::Snapshot(reply) => {
                let _ = reply.send(self.round.snapshot());
            }
            RoomCommand::Close => {}
        }
    }

    /// Broadcast events in order. Final scores are persisted before the
    /// game over event goes out.
    async fn publish(&mut self, events: Vec<GameEvent>) {
        for event in events {
            if let GameEventData::GameOver { scores } = &event.data {
                self.persist(scores).await;
            }
            self.broadcast(ServerMessage::Event(RoomEvent::from(&event)));
        }
    }

    /// Write final scores on the blocking pool. The actor waits for the
    /// write, so no other handler runs in between.
    async fn persist(&mut self, scores: &[ScoreRecord]) {
        let sink = Arc::clone(&self.sink);
        let room = self.round.room_id().to_string();
        let records = scores.to_vec();

        match tokio::task::spawn_blocking(move || sink.save(&room, &records)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(room = %self.round.room_id(), error = %e, "failed to persist scores"),
            Err(e) => error!(room = %self.round.room_id(), error = %e, "score writer task failed"),
        }
    }

    /// Send the current state unless it matches the last one sent.
    fn broadcast_state(&mut self) {
        let snapshot = self.round.snapshot();
        if self.last_state_hash == Some(snapshot.state_hash) {
            debug!(room = %self.round.room_id(), "state unchanged, skipping broadcast");
            return;
        }
        self.last_state_hash = Some(snapshot.state_hash);
        self.broadcast(ServerMessage::State(StateUpdate::from(&snapshot)));
    }

    fn broadcast(&self, message: ServerMessage) {
        // No subscribers is fine
        let _ = self.outbound.send(message);
    }
}

// =============================================================================
// ROOM MANAGER
// =============================================================================

/// Registry of running rooms. Never touches round state directly.
pub struct RoomManager {
    rooms: RwLock<BTreeMap<RoomId, RoomHandle>>,
    round_config: RoundConfig,
    room_config: RoomConfig,
    sink: Arc<dyn ScoreSink>,
}

impl RoomManager {
    /// Create an empty manager.
    pub fn new(round_config: RoundConfig, room_config: RoomConfig, sink: Arc<dyn ScoreSink>) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            round_config,
            room_config,
            sink,
        }
    }

    /// Start a new room with a freshly derived seed.
    pub async fn create_room(&self) -> RoomHandle {
        let id = uuid::Uuid::new_v4().into_bytes();
        let seed = derive_room_seed(&id, rand::random());
        let label = uuid::Uuid::from_bytes(id).to_string();

        let round = Round::new(label, self.round_config.clone(), seed);
        let (handle, _task) = RoomSession::spawn(id, round, &self.room_config, self.sink.clone());

        let mut rooms = self.rooms.write().await;
        rooms.insert(id, handle.clone());

        handle
    }

    /// Get a room by ID.
    pub async fn get_room(&self, id: &RoomId) -> Result<RoomHandle, RoomError> {
        let rooms = self.rooms.read().await;
        rooms
            .get(id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(uuid::Uuid::from_bytes(*id).to_string()))
    }

    /// Stop and forget a room.
    pub async fn remove_room(&self, id: &RoomId) -> Option<RoomHandle> {
        let handle = {
            let mut rooms = self.rooms.write().await;
            rooms.remove(id)
        };
        if let Some(handle) = &handle {
            handle.close().await;
        }
        handle
    }

    /// Get running room count.
    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }

    /// Forget rooms whose actor has stopped.
    pub async fn cleanup(&self) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, handle| !handle.is_closed());
    }

    /// Stop every room.
    pub async fn shutdown(&self) {
        let handles: Vec<RoomHandle> = {
            let mut rooms = self.rooms.write().await;
            std::mem::take(&mut *rooms).into_values().collect()
        };
        for handle in handles {
            handle.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::JoinOptions;
    use crate::game::state::RoundPhase;
    use crate::scores::{JsonFileSink, MemorySink};
    use tokio::time::timeout;

    fn fast_config() -> (RoundConfig, RoomConfig) {
        let round = RoundConfig {
            level_duration: 4,
            ..Default::default()
        };
        let room = RoomConfig {
            tick_period: Duration::from_millis(25),
            ..Default::default()
        };
        (round, room)
    }

    fn join(name: &str) -> ClientMessage {
        ClientMessage::Join {
            username: Some(name.to_string()),
            color: None,
        }
    }

    #[tokio::test]
    async fn test_join_and_snapshot() {
        let manager = RoomManager::new(RoundConfig::default(), RoomConfig::default(), Arc::new(MemorySink::new()));
        let room = manager.create_room().await;
        let player = PlayerId::new([1; 16]);

        let reply = room.dispatch(player, join("ada")).await.unwrap();
        assert_eq!(
            reply,
            Some(ServerMessage::Joined {
                player_id: player.to_uuid_string(),
            })
        );

        let snapshot = room.snapshot().await.unwrap();
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].username, "ada");
        assert_eq!(snapshot.items.len(), 30);
        assert_eq!(snapshot.obstacles.len(), 15);
    }

    #[tokio::test]
    async fn test_duplicate_join_rejected() {
        let manager = RoomManager::new(RoundConfig::default(), RoomConfig::default(), Arc::new(MemorySink::new()));
        let room = manager.create_room().await;
        let player = PlayerId::new([1; 16]);

        room.submit(player, Intent::Join(JoinOptions::default())).await.unwrap();
        let result = room.submit(player, Intent::Join(JoinOptions::default())).await;

        assert!(matches!(result, Err(RoomError::Rejected(RoundError::AlreadyJoined(_)))));
        assert_eq!(room.snapshot().await.unwrap().players.len(), 1);
    }

    #[tokio::test]
    async fn test_ping_and_invalid_move() {
        let manager = RoomManager::new(RoundConfig::default(), RoomConfig::default(), Arc::new(MemorySink::new()));
        let room = manager.create_room().await;
        let player = PlayerId::new([1; 16]);

        let pong = room.dispatch(player, ClientMessage::Ping { timestamp: 42 }).await.unwrap();
        assert!(matches!(pong, Some(ServerMessage::Pong { timestamp: 42, .. })));

        let result = room.dispatch(player, ClientMessage::Move { dx: f64::NAN, dy: 0.0 }).await;
        assert!(matches!(result, Err(RoomError::Protocol(ProtocolError::InvalidMove { .. }))));
    }

    #[tokio::test]
    async fn test_state_broadcast_after_command() {
        let manager = RoomManager::new(RoundConfig::default(), RoomConfig::default(), Arc::new(MemorySink::new()));
        let room = manager.create_room().await;
        let mut rx = room.subscribe();

        room.dispatch(PlayerId::new([1; 16]), join("ada")).await.unwrap();

        let message = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        match message {
            ServerMessage::State(update) => assert_eq!(update.players.len(), 1),
            other => panic!("expected state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unchanged_state_not_rebroadcast() {
        let manager = RoomManager::new(RoundConfig::default(), RoomConfig::default(), Arc::new(MemorySink::new()));
        let room = manager.create_room().await;
        let mut rx = room.subscribe();
        let player = PlayerId::new([1; 16]);

        room.dispatch(player, join("ada")).await.unwrap();
        assert!(room.dispatch(player, join("ada")).await.is_err());
        assert!(room.submit(player, Intent::Chat("  ".to_string())).await.is_err());
        room.submit(player, Intent::Chat("hi".to_string())).await.unwrap();

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        match (first, second) {
            (ServerMessage::State(a), ServerMessage::State(b)) => {
                assert!(a.chat_messages.is_empty());
                assert_eq!(b.chat_messages.len(), 1);
                assert_ne!(a.state_hash, b.state_hash);
            }
            other => panic!("expected two state updates, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tick_panic_rearms_timer() {
        let round_config = RoundConfig {
            level_duration: 50,
            ..Default::default()
        };
        let room_config = RoomConfig {
            tick_period: Duration::from_millis(10),
            ..Default::default()
        };

        let mut round = Round::new("faulty", round_config, 5);
        round.join(PlayerId::new([1; 16]), JoinOptions::default()).unwrap();
        round.join(PlayerId::new([2; 16]), JoinOptions::default()).unwrap();
        round.fail_next_tick = true;

        let (room, _task) = RoomSession::spawn([7; 16], round, &room_config, Arc::new(MemorySink::new()));
        let mut rx = room.subscribe();

        // Re-armed to a full level, then the countdown carries on
        let times = timeout(Duration::from_secs(2), async {
            let mut times = Vec::new();
            while times.len() < 2 {
                match rx.recv().await {
                    Ok(ServerMessage::State(update)) => times.push(update.remaining_time),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("broadcast closed: {}", e),
                }
            }
            times
        })
        .await
        .unwrap();

        assert_eq!(times, vec![50, 49]);
        let snapshot = room.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, RoundPhase::Countdown);
        assert_eq!(snapshot.players.len(), 2);
    }

    #[tokio::test]
    async fn test_game_over_persists_then_broadcasts() {
        let (round_config, room_config) = fast_config();
        let sink = Arc::new(MemorySink::new());
        let manager = RoomManager::new(round_config, room_config, sink.clone());
        let room = manager.create_room().await;
        let mut rx = room.subscribe();

        room.dispatch(PlayerId::new([1; 16]), join("ada")).await.unwrap();
        room.dispatch(PlayerId::new([2; 16]), join("bo")).await.unwrap();

        // Both stay on zero, so the first expiry ends the round
        let scores = timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(ServerMessage::Event(RoomEvent::GameOver { scores })) => break scores,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("broadcast closed: {}", e),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(scores, vec![ScoreRecord::new("ada", 0), ScoreRecord::new("bo", 0)]);

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, room.label());
        assert_eq!(saved[0].1, scores);

        let result = room.submit(PlayerId::new([1; 16]), Intent::Chat("gg".to_string())).await;
        assert!(matches!(result, Err(RoomError::Rejected(RoundError::RoundOver))));
    }

    #[tokio::test]
    async fn test_game_over_writes_score_file() {
        let (round_config, room_config) = fast_config();
        let path = std::env::temp_dir().join(format!("grid-arena-room-{}.json", uuid::Uuid::new_v4()));
        let manager = RoomManager::new(round_config, room_config, Arc::new(JsonFileSink::new(&path)));
        let room = manager.create_room().await;
        let mut rx = room.subscribe();

        room.dispatch(PlayerId::new([1; 16]), join("ada")).await.unwrap();

        timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(ServerMessage::Event(RoomEvent::GameOver { .. })) => break,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("broadcast closed: {}", e),
                }
            }
        })
        .await
        .unwrap();

        // Written before the event went out
        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<ScoreRecord> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, vec![ScoreRecord::new("ada", 0)]);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_manager_lifecycle() {
        let manager = RoomManager::new(RoundConfig::default(), RoomConfig::default(), Arc::new(MemorySink::new()));
        let a = manager.create_room().await;
        let b = manager.create_room().await;
        assert_eq!(manager.room_count().await, 2);
        assert!(manager.get_room(&a.id()).await.is_ok());

        let removed = manager.remove_room(&a.id()).await.unwrap();
        assert_eq!(manager.room_count().await, 1);
        assert!(matches!(manager.get_room(&a.id()).await, Err(RoomError::NotFound(_))));

        // Actor drains the close command and exits
        timeout(Duration::from_secs(1), async {
            while !removed.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(matches!(removed.snapshot().await, Err(RoomError::Closed)));

        b.close().await;
        timeout(Duration::from_secs(1), async {
            while !b.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        manager.cleanup().await;
        assert_eq!(manager.room_count().await, 0);
    }
}
