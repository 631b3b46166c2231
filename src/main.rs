//! Grid Arena Server
//!
//! Demo runner: starts one room, fills it with wandering bots and logs
//! the round until game over (or Ctrl-C).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use grid_arena::{
    JsonFileSink, PlayerId, RoomConfig, RoomHandle, RoomManager, RoundConfig, RoundError, VERSION,
    network::{
        protocol::{ClientMessage, RoomEvent, ServerMessage},
        room::RoomError,
    },
};

const BOT_NAMES: [&str; 4] = ["ada", "bo", "cy", "dee"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let round_config = RoundConfig::from_env();
    let room_config = RoomConfig::from_env();

    info!("Grid Arena Server v{}", VERSION);
    info!(
        "Board {}x{}, {}s levels, {} players max, tick every {:?}",
        round_config.width,
        round_config.height,
        round_config.level_duration,
        round_config.max_players,
        room_config.tick_period,
    );

    let sink = Arc::new(JsonFileSink::new(&room_config.scores_path));
    info!("Final scores go to {}", sink.path().display());
    let manager = RoomManager::new(round_config, room_config, sink);

    let room = manager.create_room().await;
    let mut messages = room.subscribe();
    info!(room = %room.label(), "room created");

    let mut bots = Vec::with_capacity(BOT_NAMES.len());
    for name in BOT_NAMES {
        let player = PlayerId::random();
        room.dispatch(
            player,
            ClientMessage::Join {
                username: Some(name.to_string()),
                color: None,
            },
        )
        .await?;
        bots.push(tokio::spawn(run_bot(room.clone(), player)));
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            message = messages.recv() => match message {
                Ok(ServerMessage::Event(event)) => {
                    let over = matches!(event, RoomEvent::GameOver { .. });
                    log_event(&event);
                    if over {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagging"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    for bot in bots {
        bot.abort();
    }
    manager.shutdown().await;
    Ok(())
}

/// Wander randomly until the round ends.
async fn run_bot(room: RoomHandle, player: PlayerId) {
    let mut ticker = tokio::time::interval(Duration::from_millis(400));

    loop {
        ticker.tick().await;

        let (dx, dy) = match rand::thread_rng().gen_range(0..4) {
            0 => (1.0, 0.0),
            1 => (-1.0, 0.0),
            2 => (0.0, 1.0),
            _ => (0.0, -1.0),
        };

        match room.dispatch(player, ClientMessage::Move { dx, dy }).await {
            Ok(_) => {}
            Err(RoomError::Rejected(RoundError::RoundOver)) | Err(RoomError::Closed) => break,
            Err(e) => debug!(player = %player, error = %e, "bot move failed"),
        }
    }
}

fn log_event(event: &RoomEvent) {
    match event {
        RoomEvent::PlayerLost { player_id, x, y } => {
            info!("Player {} hit an obstacle at ({}, {})", player_id, x, y);
        }
        RoomEvent::Collect { player_id, kind, score, .. } => {
            debug!("Player {} collected {:?} (score {})", player_id, kind, score);
        }
        RoomEvent::PlayerEliminated { player_id, score } => {
            info!("Player {} eliminated with {} points", player_id, score);
        }
        RoomEvent::LevelUp { level } => {
            info!("=== Level {} ===", level);
        }
        RoomEvent::GameOver { scores } => {
            info!("=== Game Over ===");
            for (place, record) in scores.iter().enumerate() {
                info!("#{}: {} - Score: {}", place + 1, record.username, record.score);
            }
        }
    }
}
