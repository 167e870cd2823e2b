//! Procedural audio
//!
//! Sound effects are described as voice graphs and rendered by a backend.
//! Nothing here is needed for gameplay: without a backend the synthesizer
//! is silent.

pub mod ambience;
pub mod backend;
pub mod graph;
pub mod synth;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use ambience::Ambience;
pub use backend::{AudioBackend, AudioLog, RecordingBackend};
pub use graph::{Automation, ContinuousVoice, Param, VoiceGraph};
pub use synth::{SoundEffect, Synthesizer};
#[cfg(target_arch = "wasm32")]
pub use web::WebAudioBackend;
