//! Audio Invaders - an audio-first arcade shooter
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entities, spawning, combat, game state)
//! - `audio`: Procedural synthesizer and continuous ambience voices
//! - `session`: Explicit composition of simulation, audio and collaborators
//! - `highscores`: Scoreboard client contract and qualification rules
//! - `settings`: Persisted preferences

pub mod announce;
pub mod audio;
pub mod highscores;
pub mod input;
pub mod render;
pub mod session;
pub mod settings;
pub mod sim;

pub use announce::{Announcer, AnnouncementSlot, Verbosity};
pub use highscores::{HighScoreFlow, HighScores, Scoreboard};
pub use render::{NullRenderer, Renderer};
pub use session::{GameSession, SessionEvent};
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Logical playfield dimensions
    pub const GAME_WIDTH: f32 = 600.0;
    pub const GAME_HEIGHT: f32 = 600.0;

    /// Width of the centered band where the cannon can register a hit
    pub const HIT_ZONE_WIDTH: f32 = 120.0;
    pub const HIT_THRESHOLD: f32 = HIT_ZONE_WIDTH / 2.0;
    pub const CENTER_X: f32 = GAME_WIDTH / 2.0;

    /// Seconds between spawn evaluations
    pub const SPAWN_INTERVAL: f32 = 2.0;

    /// Energy limits
    pub const START_ENERGY: i32 = 100;
    /// Ceiling for normal hits up to round 5
    pub const BASE_ENERGY_CAP: i32 = 100;
    pub const MAX_ENERGY: i32 = 175;

    /// Score needed per round
    pub const POINTS_PER_ROUND: u64 = 500;

    /// Alert thresholds (inclusive)
    pub const WARNING_ENERGY: i32 = 25;
    pub const DANGER_ENERGY: i32 = 10;

    /// Delay before the game-over overlay is shown (seconds)
    pub const GAME_OVER_UI_DELAY: f64 = 1.2;
    /// Delay before the start control is focused after game over (seconds)
    pub const START_FOCUS_DELAY: f64 = 5.0;

    /// Longest frame step fed to the simulation (seconds); longer gaps are
    /// treated as a stall
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Minimum spacing between accepted fire requests (ms)
    pub const FIRE_DEBOUNCE_MS: f64 = 80.0;
}

/// Map an x coordinate to a stereo pan value in [-1, 1]
#[inline]
pub fn pan_for_x(x: f32) -> f32 {
    ((x / consts::GAME_WIDTH) * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Vertical progress as a percentage in [0, 100]
#[inline]
pub fn y_percent(y: f32) -> f32 {
    (y / consts::GAME_HEIGHT * 100.0).clamp(0.0, 100.0)
}

/// Linear 0..1 ramp of `value` across `[start, end]`
#[inline]
pub fn ramp(value: f32, start: f32, end: f32) -> f32 {
    ((value - start) / (end - start)).clamp(0.0, 1.0)
}
