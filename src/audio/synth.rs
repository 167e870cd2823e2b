//! Procedural sound effects
//!
//! Every effect is built fresh as a `VoiceGraph` scheduled against the audio
//! clock, then handed to the backend which releases it after its lifetime.
//! No voice is ever reused.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::backend::AudioBackend;
use super::graph::{Automation, ContinuousVoice, NodeId, Param, VoiceGraph, Waveform};

/// Master volume applied when a backend is attached
pub const DEFAULT_MASTER_VOLUME: f32 = 0.5;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoundEffect {
    /// Positional alien blip; pitch rises as the alien descends
    AlienBeep {
        pan: f32,
        y_percent: f32,
        tone_offset: f32,
    },
    /// Alien reached the bottom
    AlienExplosion,
    /// Streak bonus granted
    PowerUp,
    /// Cannon fired
    Shoot,
    /// Alien destroyed
    Hit,
    /// Nothing in the hit zone
    Miss,
    /// Energy ran out
    Bell,
    /// Runner destroyed
    RunnerExplosion,
}

impl SoundEffect {
    pub fn name(&self) -> &'static str {
        match self {
            SoundEffect::AlienBeep { .. } => "alien_beep",
            SoundEffect::AlienExplosion => "alien_explosion",
            SoundEffect::PowerUp => "power_up",
            SoundEffect::Shoot => "shoot",
            SoundEffect::Hit => "hit",
            SoundEffect::Miss => "miss",
            SoundEffect::Bell => "bell",
            SoundEffect::RunnerExplosion => "runner_explosion",
        }
    }
}

/// Build the voice for `effect` starting at audio time `t`.
///
/// `detune_roll` in [-1, 1] scales the beep's random detune.
pub fn voice_for(effect: SoundEffect, t: f64, detune_roll: f32) -> VoiceGraph {
    let name = effect.name();
    match effect {
        SoundEffect::AlienBeep {
            pan,
            y_percent,
            tone_offset,
        } => alien_beep(name, t, pan, y_percent, tone_offset, detune_roll),
        SoundEffect::AlienExplosion => alien_explosion(name, t),
        SoundEffect::PowerUp => power_up(name, t),
        SoundEffect::Shoot => shoot(name, t),
        SoundEffect::Hit => hit(name, t),
        SoundEffect::Miss => miss(name, t),
        SoundEffect::Bell => bell(name, t),
        SoundEffect::RunnerExplosion => runner_explosion(name, t),
    }
}

/// Oscillator -> gain -> master, the shape most effects share
fn simple_voice(
    name: &'static str,
    t: f64,
    stop: f64,
    waveform: Waveform,
    frequency: Automation,
    gain: Automation,
) -> VoiceGraph {
    let mut g = VoiceGraph::new(name, t, stop);
    let osc = g.oscillator(waveform);
    let amp = g.gain();
    g.automate(osc, Param::Frequency, frequency);
    g.automate(amp, Param::Gain, gain);
    g.connect(osc, amp);
    g.to_master(amp);
    g
}

/// Short square blip: 200 Hz at the top to 600 Hz at the bottom
fn alien_beep(
    name: &'static str,
    t: f64,
    pan: f32,
    y_percent: f32,
    tone_offset: f32,
    detune_roll: f32,
) -> VoiceGraph {
    let freq = 200.0 + y_percent * 4.0 + tone_offset;
    // Later-round aliens spread their detune a little wider
    let detune_range = 25.0 + tone_offset.abs() * 0.2;

    let mut g = VoiceGraph::new(name, t, t + 0.15);
    let osc = g.oscillator(Waveform::Square);
    let amp = g.gain();
    let panner = g.panner();

    g.automate(osc, Param::Frequency, Automation::new().set(freq, t));
    g.automate(
        osc,
        Param::Detune,
        Automation::new().set(detune_roll.clamp(-1.0, 1.0) * detune_range, t),
    );
    g.automate(
        amp,
        Param::Gain,
        Automation::new()
            .set(0.0, t)
            .linear(0.3, t + 0.01)
            .exponential(0.001, t + 0.1),
    );
    g.automate(
        panner,
        Param::Pan,
        Automation::new().set(pan.clamp(-1.0, 1.0), t),
    );

    g.connect(osc, amp);
    g.connect(amp, panner);
    g.to_master(panner);
    g
}

/// Square + sawtooth crunch sweeping down to a low boom
fn alien_explosion(name: &'static str, t: f64) -> VoiceGraph {
    const OVERALL: f32 = 0.20;
    const TRANSIENT: f32 = 0.30;
    const DURATION: f64 = 0.75;
    const START: f32 = 145.0;
    const MID: f32 = 85.0;
    const END: f32 = 65.0;
    const DETUNE: f32 = 8.0;

    let mut g = VoiceGraph::new(name, t, t + DURATION + 0.04).release_at(t + DURATION + 0.12);
    let crunch = g.oscillator(Waveform::Square);
    let body = g.oscillator(Waveform::Sawtooth);
    let amp = g.gain();

    g.automate(crunch, Param::Detune, Automation::new().set(-DETUNE, t));
    g.automate(body, Param::Detune, Automation::new().set(DETUNE, t));
    g.automate(
        amp,
        Param::Gain,
        Automation::new()
            .set(OVERALL, t)
            .exponential(TRANSIENT, t + 0.02)
            .exponential(0.0001, t + DURATION),
    );
    g.automate(
        crunch,
        Param::Frequency,
        Automation::new()
            .set(START, t)
            .exponential(MID, t + DURATION * 0.35)
            .exponential(END, t + DURATION),
    );
    g.automate(
        body,
        Param::Frequency,
        Automation::new()
            .set(START * 0.9, t)
            .exponential(MID * 0.95, t + DURATION * 0.4)
            .exponential(END * 1.05, t + DURATION),
    );

    g.connect(crunch, amp);
    g.connect(body, amp);
    g.to_master(amp);
    g
}

/// Rising sawtooth pair with a fading 16 Hz tremolo
fn power_up(name: &'static str, t: f64) -> VoiceGraph {
    const DURATION: f64 = 1.0;

    let mut g = VoiceGraph::new(name, t, t + DURATION + 0.05).release_at(t + DURATION + 0.2);
    let carriers = [g.oscillator(Waveform::Sawtooth), g.oscillator(Waveform::Sawtooth)];
    let lfo = g.oscillator(Waveform::Sine);
    let lfo_depth = g.gain();
    let bias = g.constant();
    let tremolo = g.gain();
    let main = g.gain();

    for (osc, detune) in carriers.iter().zip([-6.0, 6.0]) {
        g.automate(*osc, Param::Detune, Automation::new().set(detune, t));
        g.automate(
            *osc,
            Param::Frequency,
            Automation::new()
                .set(210.0, t)
                .exponential(480.0, t + DURATION * 0.45)
                .exponential(1100.0, t + DURATION),
        );
        g.connect(*osc, tremolo);
    }

    g.automate(
        main,
        Param::Gain,
        Automation::new()
            .set(0.10, t)
            .exponential(0.0001, t + DURATION),
    );
    g.automate(lfo, Param::Frequency, Automation::new().set(16.0, t));
    g.automate(
        lfo_depth,
        Param::Gain,
        Automation::new()
            .set(0.75, t)
            .exponential(0.05, t + DURATION * 0.85),
    );
    // DC bias keeps the modulated gain non-negative
    g.automate(bias, Param::Offset, Automation::new().set(0.5, t));

    g.connect(lfo, lfo_depth);
    g.modulate(lfo_depth, tremolo, Param::Gain);
    g.modulate(bias, tremolo, Param::Gain);
    g.connect(tremolo, main);
    g.to_master(main);
    g
}

fn shoot(name: &'static str, t: f64) -> VoiceGraph {
    simple_voice(
        name,
        t,
        t + 0.2,
        Waveform::Sawtooth,
        Automation::new().set(800.0, t).exponential(100.0, t + 0.2),
        Automation::new().set(0.3, t).exponential(0.001, t + 0.2),
    )
}

fn hit(name: &'static str, t: f64) -> VoiceGraph {
    simple_voice(
        name,
        t,
        t + 0.3,
        Waveform::Sine,
        Automation::new().set(1200.0, t).exponential(1500.0, t + 0.1),
        Automation::new()
            .set(0.0, t)
            .linear(0.5, t + 0.01)
            .exponential(0.001, t + 0.3),
    )
}

fn miss(name: &'static str, t: f64) -> VoiceGraph {
    simple_voice(
        name,
        t,
        t + 0.2,
        Waveform::Sawtooth,
        Automation::new().set(150.0, t).linear(100.0, t + 0.2),
        Automation::new().set(0.3, t).linear(0.0, t + 0.2),
    )
}

/// A3 triangle with a three second tail
fn bell(name: &'static str, t: f64) -> VoiceGraph {
    simple_voice(
        name,
        t,
        t + 3.0,
        Waveform::Triangle,
        Automation::new().set(220.0, t),
        Automation::new()
            .set(0.0, t)
            .linear(1.0, t + 0.05)
            .exponential(0.001, t + 3.0),
    )
}

/// Sub-bass thump layered under a gritty sawtooth body
fn runner_explosion(name: &'static str, t: f64) -> VoiceGraph {
    let mut g = VoiceGraph::new(name, t, t + 0.55);

    let thump = g.oscillator(Waveform::Sine);
    let thump_amp = g.gain();
    g.automate(
        thump,
        Param::Frequency,
        Automation::new().set(50.0, t).exponential(28.0, t + 0.18),
    );
    g.automate(
        thump_amp,
        Param::Gain,
        Automation::new().set(0.28, t).exponential(0.001, t + 0.22),
    );
    g.stop_early(thump, t + 0.24);
    g.connect(thump, thump_amp);
    g.to_master(thump_amp);

    let body = g.oscillator(Waveform::Sawtooth);
    let body_amp = g.gain();
    g.automate(
        body,
        Param::Frequency,
        Automation::new().set(180.0, t).exponential(65.0, t + 0.45),
    );
    g.automate(
        body_amp,
        Param::Gain,
        Automation::new().set(0.16, t).exponential(0.001, t + 0.5),
    );
    g.connect(body, body_amp);
    g.to_master(body_amp);
    g
}

/// Front end for all audio output.
///
/// Without a backend every call is a silent no-op, so gameplay never depends
/// on audio being available.
pub struct Synthesizer {
    backend: Option<Box<dyn AudioBackend>>,
    rng: Pcg32,
    master_volume: f32,
    muted: bool,
}

impl Synthesizer {
    pub fn new(backend: Option<Box<dyn AudioBackend>>, seed: u64) -> Self {
        if backend.is_none() {
            log::warn!("No audio backend - sound disabled");
        }
        let mut synth = Self {
            backend,
            rng: Pcg32::seed_from_u64(seed),
            master_volume: DEFAULT_MASTER_VOLUME,
            muted: false,
        };
        synth.apply_volume();
        synth
    }

    /// A synthesizer that never makes a sound
    pub fn silent() -> Self {
        Self {
            backend: None,
            rng: Pcg32::seed_from_u64(0),
            master_volume: DEFAULT_MASTER_VOLUME,
            muted: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Current audio-clock time (0 when silent)
    pub fn now(&self) -> f64 {
        self.backend.as_ref().map_or(0.0, |b| b.current_time())
    }

    /// Resume audio context (required after user gesture)
    pub fn resume(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.resume();
        }
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    /// Mute/unmute all audio
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume();
    }

    fn apply_volume(&mut self) {
        let volume = if self.muted { 0.0 } else { self.master_volume };
        if let Some(backend) = self.backend.as_mut() {
            backend.set_master_volume(volume);
        }
    }

    /// Play a sound effect
    pub fn play(&mut self, effect: SoundEffect) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        let roll = self.rng.random::<f32>() * 2.0 - 1.0;
        let voice = voice_for(effect, backend.current_time(), roll);
        backend.play(voice);
    }

    /// Create a continuous voice
    pub fn open(&mut self, voice: ContinuousVoice, graph: VoiceGraph) {
        if let Some(backend) = self.backend.as_mut() {
            backend.open(voice, graph);
        }
    }

    /// Automate a parameter of a continuous voice
    pub fn schedule(
        &mut self,
        voice: ContinuousVoice,
        node: NodeId,
        param: Param,
        automation: Automation,
    ) {
        if let Some(backend) = self.backend.as_mut() {
            backend.schedule(voice, node, param, &automation);
        }
    }

    /// Tear down a continuous voice
    pub fn close(&mut self, voice: ContinuousVoice) {
        if let Some(backend) = self.backend.as_mut() {
            backend.close(voice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::RecordingBackend;
    use crate::audio::graph::{Link, NodeKind, ParamEvent};

    #[test]
    fn test_beep_pitch_pan_and_envelope() {
        let effect = SoundEffect::AlienBeep {
            pan: -1.5,
            y_percent: 50.0,
            tone_offset: 20.0,
        };
        let g = voice_for(effect, 2.0, 1.0);
        let osc = NodeKind::Oscillator(Waveform::Square);
        assert_eq!(
            g.find(osc, Param::Frequency).unwrap().events(),
            &[ParamEvent::Set { value: 420.0, at: 2.0 }]
        );
        // 25 + 0.2 * 20 cents at full roll
        let detune = g.find(osc, Param::Detune).unwrap().events()[0];
        assert!(matches!(detune, ParamEvent::Set { value, .. } if (value - 29.0).abs() < 1e-4));
        assert_eq!(
            g.find(NodeKind::StereoPanner, Param::Pan).unwrap().events(),
            &[ParamEvent::Set { value: -1.0, at: 2.0 }]
        );
        let gain = g.find(NodeKind::Gain, Param::Gain).unwrap().events();
        assert_eq!(gain[0], ParamEvent::Set { value: 0.0, at: 2.0 });
        assert!(matches!(gain[1], ParamEvent::Linear { value, .. } if value == 0.3));
        assert!(matches!(gain[2], ParamEvent::Exponential { .. }));
        assert!((g.stop - 2.15).abs() < 1e-9);
        assert_eq!(g.links.last(), Some(&(2, Link::Master)));
    }

    #[test]
    fn test_explosion_layers_and_teardown() {
        let g = voice_for(SoundEffect::AlienExplosion, 0.0, 0.0);
        assert_eq!(g.count(NodeKind::Oscillator(Waveform::Square)), 1);
        assert_eq!(g.count(NodeKind::Oscillator(Waveform::Sawtooth)), 1);
        assert!((g.release_at - 0.87).abs() < 1e-9);
        let gain = g.find(NodeKind::Gain, Param::Gain).unwrap().events();
        assert_eq!(gain[0], ParamEvent::Set { value: 0.2, at: 0.0 });
        assert!(matches!(gain[1], ParamEvent::Exponential { value, at } if value == 0.3 && at == 0.02));
    }

    #[test]
    fn test_power_up_tremolo_routing() {
        let g = voice_for(SoundEffect::PowerUp, 0.0, 0.0);
        let modulations = g
            .links
            .iter()
            .filter(|(_, l)| matches!(l, Link::Param(_, Param::Gain)))
            .count();
        assert_eq!(modulations, 2);
        assert_eq!(g.count(NodeKind::Constant), 1);
        assert!((g.release_at - 1.2).abs() < 1e-9);
        let lfo = g.find(NodeKind::Oscillator(Waveform::Sine), Param::Frequency);
        assert_eq!(lfo.unwrap().events(), &[ParamEvent::Set { value: 16.0, at: 0.0 }]);
    }

    #[test]
    fn test_runner_explosion_thump_stops_first() {
        let g = voice_for(SoundEffect::RunnerExplosion, 1.0, 0.0);
        assert!((g.stop_time(0) - 1.24).abs() < 1e-9);
        assert!((g.stop_time(2) - 1.55).abs() < 1e-9);
    }

    #[test]
    fn test_every_effect_releases() {
        let effects = [
            SoundEffect::AlienExplosion,
            SoundEffect::PowerUp,
            SoundEffect::Shoot,
            SoundEffect::Hit,
            SoundEffect::Miss,
            SoundEffect::Bell,
            SoundEffect::RunnerExplosion,
        ];
        for effect in effects {
            let g = voice_for(effect, 0.0, 0.0);
            assert!(g.release_at >= g.stop, "{} released early", g.name);
            for node in &g.nodes {
                for (_, a) in &node.automation {
                    assert!(a.end_time().unwrap() <= g.stop + 1e-9, "{}", g.name);
                }
            }
        }
    }

    #[test]
    fn test_silent_synth_is_noop() {
        let mut synth = Synthesizer::silent();
        assert!(!synth.is_available());
        synth.play(SoundEffect::Bell);
        synth.schedule(
            ContinuousVoice::EnergyAlert,
            0,
            Param::Gain,
            Automation::new().set(0.0, 0.0),
        );
        assert_eq!(synth.now(), 0.0);
    }

    #[test]
    fn test_play_through_backend() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let mut synth = Synthesizer::new(Some(Box::new(backend.clone())), 1);
        assert_eq!(log.borrow().master_volume, DEFAULT_MASTER_VOLUME);

        backend.set_time(4.0);
        synth.play(SoundEffect::Shoot);
        assert_eq!(log.borrow().last_played(), Some("shoot"));
        assert_eq!(log.borrow().live[0].start, 4.0);

        synth.set_muted(true);
        assert_eq!(log.borrow().master_volume, 0.0);
    }
}
