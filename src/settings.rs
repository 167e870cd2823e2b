//! Player preferences
//!
//! Persisted as JSON in LocalStorage; native builds use defaults.

use serde::{Deserialize, Serialize};

use crate::announce::Verbosity;

/// Default leaderboard endpoint, relative to the page
pub const DEFAULT_SCOREBOARD_URL: &str = "/api/highScores.php";

/// Shared token the leaderboard expects with every submission
pub const DEFAULT_SCOREBOARD_TOKEN: &str = "h4ckingIsBadMkay?!";

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How much game narration the screen reader gets
    pub verbosity: Verbosity,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    pub muted: bool,

    // === Leaderboard ===
    pub scoreboard_url: String,
    pub scoreboard_token: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Original,
            master_volume: crate::audio::synth::DEFAULT_MASTER_VOLUME,
            muted: false,
            scoreboard_url: DEFAULT_SCOREBOARD_URL.to_string(),
            scoreboard_token: DEFAULT_SCOREBOARD_TOKEN.to_string(),
        }
    }
}

impl Settings {
    /// Parse stored JSON, falling back to defaults for anything unreadable
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_else(|err| {
            log::warn!("Ignoring stored settings: {}", err);
            Self::default()
        })
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "audio_invaders_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                log::info!("Loaded settings from LocalStorage");
                return Self::from_json(&json);
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
