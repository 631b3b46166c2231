//! Player Intents
//!
//! Closed set of typed intents. Raw client payloads are validated here,
//! at the boundary, before any round logic sees them.

use serde::{Serialize, Deserialize};

/// Maximum display name length (characters).
pub const MAX_USERNAME_CHARS: usize = 24;

/// Name used when a client omits one.
pub const DEFAULT_USERNAME: &str = "Anonymous";

/// Color used when a client omits one.
pub const DEFAULT_COLOR: &str = "black";

/// A validated movement delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDelta {
    /// Column delta
    pub dx: i32,
    /// Row delta
    pub dy: i32,
}

impl MoveDelta {
    /// Create a delta.
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// Validate raw numeric deltas.
    ///
    /// Rejects NaN, infinities and fractional values. Whole numbers outside
    /// the `i32` range saturate; the move is clamped to the board anyway.
    pub fn from_raw(dx: f64, dy: f64) -> Option<Self> {
        Some(Self {
            dx: whole_delta(dx)?,
            dy: whole_delta(dy)?,
        })
    }
}

fn whole_delta(value: f64) -> Option<i32> {
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    // `as` saturates for out-of-range floats
    Some(value as i32)
}

/// Join request options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOptions {
    /// Requested display name
    pub username: Option<String>,
    /// Requested color tag
    pub color: Option<String>,
}

impl JoinOptions {
    /// Trimmed, length-capped display name, or the default.
    pub fn display_name(&self) -> String {
        let trimmed = self.username.as_deref().map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return DEFAULT_USERNAME.to_string();
        }
        trimmed.chars().take(MAX_USERNAME_CHARS).collect()
    }

    /// Requested color, or the default.
    pub fn color(&self) -> String {
        match self.color.as_deref().map(str::trim) {
            Some(color) if !color.is_empty() => color.to_string(),
            _ => DEFAULT_COLOR.to_string(),
        }
    }
}

/// Everything a connection can ask the round to do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Enter the room
    Join(JoinOptions),
    /// Step by a delta
    Move(MoveDelta),
    /// Post a chat line (raw, validated by the round)
    Chat(String),
    /// Leave the room
    Leave,
}

impl Intent {
    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Join(_) => "join",
            Intent::Move(_) => "move",
            Intent::Chat(_) => "chat",
            Intent::Leave => "leave",
        }
    }
}
