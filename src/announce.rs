//! Screen-reader announcements
//!
//! Game events are narrated through a single-slot `Announcer`: a new message
//! replaces whatever was there, nothing is queued. Event narration passes
//! through the player's `Verbosity` first; direct announcements (stat hotkeys,
//! game over, high-score results) bypass it.

use serde::{Deserialize, Serialize};

/// Sink for accessibility text (an ARIA live region in the browser)
pub trait Announcer {
    fn announce(&mut self, text: &str);
}

/// How much game narration the player wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// No event narration
    Off,
    /// Score and round only, in short form
    Low,
    /// Everything
    #[default]
    Original,
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Off => "off",
            Verbosity::Low => "low",
            Verbosity::Original => "original",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(Verbosity::Off),
            "low" => Some(Verbosity::Low),
            "original" => Some(Verbosity::Original),
            _ => None,
        }
    }

    /// Text to announce for an event, if any survives the filter
    pub fn filter<'a>(self, topic: Topic, text: &'a str, low_text: Option<&'a str>) -> Option<&'a str> {
        match self {
            Verbosity::Off => None,
            Verbosity::Low => match topic {
                Topic::Score | Topic::Round => Some(low_text.unwrap_or(text)),
                Topic::Other => None,
            },
            Verbosity::Original => Some(text),
        }
    }
}

/// What an event announcement is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Score,
    Round,
    Other,
}

/// Latest-wins announcement slot
#[derive(Debug, Clone, Default)]
pub struct AnnouncementSlot {
    current: Option<String>,
    total: usize,
}

impl AnnouncementSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The message currently on display
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Number of announcements made so far
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn take(&mut self) -> Option<String> {
        self.current.take()
    }
}

impl Announcer for AnnouncementSlot {
    fn announce(&mut self, text: &str) {
        self.current = Some(text.to_string());
        self.total += 1;
    }
}
