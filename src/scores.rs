//! Score Persistence
//!
//! Write-once dump of final scores when a round ends. The round only
//! produces the records; where they go is up to the [`ScoreSink`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Final score of one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Display name at the time the round ended (or the player left)
    pub username: String,
    /// Final score
    pub score: u32,
}

impl ScoreRecord {
    /// Create a record.
    pub fn new(username: impl Into<String>, score: u32) -> Self {
        Self {
            username: username.into(),
            score,
        }
    }
}

/// Sort records by score descending, then username, so the dump does not
/// depend on join order.
pub fn rank(records: &mut [ScoreRecord]) {
    records.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.username.cmp(&b.username)));
}

/// Score persistence errors.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Filesystem failure.
    #[error("score file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding failure.
    #[error("score encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Sink state was poisoned by a panicking writer.
    #[error("score sink poisoned")]
    Poisoned,
}

/// Durable destination for final scores.
pub trait ScoreSink: Send + Sync {
    /// Persist the final score list of a room. May block; room actors
    /// call it through `spawn_blocking`.
    fn save(&self, room: &str, records: &[ScoreRecord]) -> Result<(), ScoreError>;
}

/// Writes the latest score list as a pretty-printed JSON array,
/// overwriting the previous dump.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Create a sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScoreSink for JsonFileSink {
    fn save(&self, room: &str, records: &[ScoreRecord]) -> Result<(), ScoreError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::info!(room, path = %self.path.display(), count = records.len(), "scores saved");
        Ok(())
    }
}

/// Keeps every dump in memory, keyed by room.
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<(String, Vec<ScoreRecord>)>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dump received so far, in arrival order.
    pub fn saved(&self) -> Vec<(String, Vec<ScoreRecord>)> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

impl ScoreSink for MemorySink {
    fn save(&self, room: &str, records: &[ScoreRecord]) -> Result<(), ScoreError> {
        let mut saved = self.saved.lock().map_err(|_| ScoreError::Poisoned)?;
        saved.push((room.to_string(), records.to_vec()));
        Ok(())
    }
}
