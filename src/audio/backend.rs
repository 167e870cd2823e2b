//! Audio backends
//!
//! The synthesizer describes voices as `VoiceGraph`s; a backend turns them into
//! sound. `RecordingBackend` keeps everything in memory against a virtual clock
//! (native builds and tests), `web::WebAudioBackend` drives the Web Audio API.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::graph::{Automation, ContinuousVoice, NodeId, Param, VoiceGraph};

/// Renders voice graphs against a shared audio clock
pub trait AudioBackend {
    /// Current audio-clock time in seconds
    fn current_time(&self) -> f64;

    /// Resume a suspended context (browsers require a user gesture)
    fn resume(&mut self) {}

    /// Set the shared master volume node
    fn set_master_volume(&mut self, volume: f32);

    /// Start a fire-and-forget voice; the backend releases it at `release_at`
    fn play(&mut self, voice: VoiceGraph);

    /// Create a long-lived voice (replacing any previous one with the same key)
    fn open(&mut self, voice: ContinuousVoice, graph: VoiceGraph);

    /// Apply automation to one parameter of an open continuous voice
    fn schedule(
        &mut self,
        voice: ContinuousVoice,
        node: NodeId,
        param: Param,
        automation: &Automation,
    );

    /// Stop and disconnect a continuous voice
    fn close(&mut self, voice: ContinuousVoice);
}

/// Everything a `RecordingBackend` has been asked to do
#[derive(Debug, Default)]
pub struct AudioLog {
    /// Names of fire-and-forget voices, in play order
    pub played: Vec<&'static str>,
    /// Voices that have not reached their release time
    pub live: Vec<VoiceGraph>,
    /// Number of voices released so far
    pub released: usize,
    pub open: HashMap<ContinuousVoice, VoiceGraph>,
    /// Automation applied to continuous voices, in order
    pub scheduled: Vec<(ContinuousVoice, NodeId, Param, Automation)>,
    pub master_volume: f32,
}

impl AudioLog {
    pub fn played_count(&self, name: &str) -> usize {
        self.played.iter().filter(|n| **n == name).count()
    }

    pub fn last_played(&self) -> Option<&'static str> {
        self.played.last().copied()
    }

    /// Most recent automation applied to `param` of `voice`
    pub fn last_scheduled(&self, voice: ContinuousVoice, param: Param) -> Option<&Automation> {
        self.scheduled
            .iter()
            .rev()
            .find(|(v, _, p, _)| *v == voice && *p == param)
            .map(|(_, _, _, a)| a)
    }

    pub fn scheduled_count(&self, voice: ContinuousVoice) -> usize {
        self.scheduled.iter().filter(|(v, ..)| *v == voice).count()
    }
}

/// In-memory backend with a manually advanced clock
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    clock: Rc<Cell<f64>>,
    log: Rc<RefCell<AudioLog>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the log (stays valid after the backend is boxed)
    pub fn log(&self) -> Rc<RefCell<AudioLog>> {
        Rc::clone(&self.log)
    }

    /// Move the audio clock, releasing voices whose time has come
    pub fn set_time(&self, t: f64) {
        self.clock.set(t);
        self.release_expired();
    }

    pub fn advance(&self, dt: f64) {
        self.set_time(self.clock.get() + dt);
    }

    fn release_expired(&self) {
        let now = self.clock.get();
        let mut log = self.log.borrow_mut();
        let before = log.live.len();
        log.live.retain(|v| v.release_at > now);
        let released = before - log.live.len();
        log.released += released;
    }
}

impl AudioBackend for RecordingBackend {
    fn current_time(&self) -> f64 {
        self.clock.get()
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.log.borrow_mut().master_volume = volume;
    }

    fn play(&mut self, voice: VoiceGraph) {
        self.release_expired();
        let mut log = self.log.borrow_mut();
        log.played.push(voice.name);
        log.live.push(voice);
    }

    fn open(&mut self, voice: ContinuousVoice, graph: VoiceGraph) {
        self.log.borrow_mut().open.insert(voice, graph);
    }

    fn schedule(
        &mut self,
        voice: ContinuousVoice,
        node: NodeId,
        param: Param,
        automation: &Automation,
    ) {
        let mut entries = self.log.borrow_mut();
        if !entries.open.contains_key(&voice) {
            log::warn!("Automation for closed voice {}", voice.name());
            return;
        }
        entries.scheduled.push((voice, node, param, automation.clone()));
    }

    fn close(&mut self, voice: ContinuousVoice) {
        self.log.borrow_mut().open.remove(&voice);
    }
}
