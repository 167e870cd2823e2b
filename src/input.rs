//! Input mapping
//!
//! Keyboard and pointer wiring lives in the binary; this module decides what a
//! key means and throttles fire requests.

use crate::consts::FIRE_DEBOUNCE_MS;

/// What a key press asks the game to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Fire,
    AnnounceScore,
    AnnounceEnergy,
    AnnounceRound,
}

/// Map a keyboard event to a command.
///
/// `key` is the layout-dependent key (`"s"`, `"E"`), `code` the physical
/// code (`"Space"`). Stat hotkeys only apply while a game is running.
pub fn command_for_key(key: &str, code: &str, active: bool) -> Option<Command> {
    if active {
        match key.to_ascii_lowercase().as_str() {
            "s" => return Some(Command::AnnounceScore),
            "e" => return Some(Command::AnnounceEnergy),
            "r" => return Some(Command::AnnounceRound),
            _ => {}
        }
    }
    match code {
        "Space" | "Enter" => Some(Command::Fire),
        _ => None,
    }
}

/// Drops fire requests that arrive too soon after the last accepted one
#[derive(Debug, Clone, Default)]
pub struct FireGate {
    last_fire_ms: Option<f64>,
}

impl FireGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a fire request at `now_ms` should go through
    pub fn try_fire(&mut self, now_ms: f64) -> bool {
        if let Some(last) = self.last_fire_ms {
            if now_ms - last < FIRE_DEBOUNCE_MS {
                return false;
            }
        }
        self.last_fire_ms = Some(now_ms);
        true
    }

    pub fn reset(&mut self) {
        self.last_fire_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce() {
        let mut gate = FireGate::new();
        assert!(gate.try_fire(1000.0));
        assert!(!gate.try_fire(1079.9));
        assert!(gate.try_fire(1080.0));
        assert!(!gate.try_fire(1100.0));
        gate.reset();
        assert!(gate.try_fire(1100.0));
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(command_for_key("S", "KeyS", true), Some(Command::AnnounceScore));
        assert_eq!(command_for_key("e", "KeyE", true), Some(Command::AnnounceEnergy));
        assert_eq!(command_for_key("r", "KeyR", true), Some(Command::AnnounceRound));
        assert_eq!(command_for_key("s", "KeyS", false), None);
        assert_eq!(command_for_key(" ", "Space", true), Some(Command::Fire));
        assert_eq!(command_for_key("Enter", "Enter", false), Some(Command::Fire));
        assert_eq!(command_for_key("x", "KeyX", true), None);
    }
}
