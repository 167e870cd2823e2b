//! Alert and ambience controller
//!
//! Drives the two long-lived voices: the runner presence hum and the
//! energy alert tone. Pulses are re-armed against the simulation clock by
//! `pump`, so a test can step time instead of waiting on timers. Envelope
//! times are always taken from the audio clock.

use super::graph::{Automation, ContinuousVoice, NodeId, Param, VoiceGraph, Waveform};
use super::synth::Synthesizer;
use crate::sim::AlertLevel;

// Node layout of the runner presence voice
const RUNNER_OSC: NodeId = 0;
const RUNNER_GAIN: NodeId = 1;
const RUNNER_PAN: NodeId = 2;

// Node layout of the energy alert voice
const ALERT_OSC: NodeId = 0;
const ALERT_GAIN: NodeId = 1;

/// Runner pulse: 120 ms on, 180 ms off
pub const RUNNER_PULSE_PERIOD: f64 = 0.3;
const RUNNER_PULSE_GAIN: f32 = 0.07;
const RUNNER_PULSE_HOLD: f64 = 0.12;

/// Warning: 0.6 s tone every 2.1 s
pub const WARNING_PERIOD: f64 = 2.1;
const WARNING_FREQ: f32 = 120.0;
const WARNING_DETUNE: f32 = -12.0;
const WARNING_GAIN: f32 = 0.06;
const WARNING_ON: f64 = 0.6;

/// Danger: 0.7 s siren sweep, then 0.6 s pause
pub const DANGER_PERIOD: f64 = 1.3;
const DANGER_LOW: f32 = 220.0;
const DANGER_HIGH: f32 = 440.0;
const DANGER_RISE: f64 = 0.7;
const DANGER_GAIN: f32 = 0.045;

/// Silent sawtooth -> gain -> panner, started at `t` and never stopped
pub fn runner_presence_graph(t: f64) -> VoiceGraph {
    let mut g = VoiceGraph::new(ContinuousVoice::RunnerPresence.name(), t, f64::INFINITY)
        .release_at(f64::INFINITY);
    let osc = g.oscillator(Waveform::Sawtooth);
    let gain = g.gain();
    let pan = g.panner();
    g.automate(gain, Param::Gain, Automation::new().set(0.0, t));
    g.automate(pan, Param::Pan, Automation::new().set(0.0, t));
    g.connect(osc, gain);
    g.connect(gain, pan);
    g.to_master(pan);
    g
}

/// Silent square -> gain, started at `t` and never stopped
pub fn energy_alert_graph(t: f64) -> VoiceGraph {
    let mut g = VoiceGraph::new(ContinuousVoice::EnergyAlert.name(), t, f64::INFINITY)
        .release_at(f64::INFINITY);
    let osc = g.oscillator(Waveform::Square);
    let gain = g.gain();
    g.automate(gain, Param::Gain, Automation::new().set(0.0, t));
    g.connect(osc, gain);
    g.to_master(gain);
    g
}

/// Fire a pulse if `next` is due, re-arming it one period later
fn take_due(next: &mut Option<f64>, now: f64, period: f64) -> bool {
    match *next {
        Some(at) if now >= at => {
            let mut following = at + period;
            // Skip pulses missed while the loop was suspended
            if following <= now {
                following = now + period;
            }
            *next = Some(following);
            true
        }
        _ => false,
    }
}

/// Continuous audio state derived from energy and the live runner
#[derive(Debug, Default)]
pub struct Ambience {
    alert: AlertLevel,
    next_alert_pulse: Option<f64>,
    next_runner_pulse: Option<f64>,
}

impl Ambience {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alert(&self) -> AlertLevel {
        self.alert
    }

    pub fn runner_active(&self) -> bool {
        self.next_runner_pulse.is_some()
    }

    /// Create both continuous voices for a new session
    pub fn open(&mut self, synth: &mut Synthesizer) {
        let t = synth.now();
        *self = Self::default();
        synth.open(ContinuousVoice::RunnerPresence, runner_presence_graph(t));
        synth.open(ContinuousVoice::EnergyAlert, energy_alert_graph(t));
    }

    /// Move the alert voice to `level`; re-entering the current level does nothing
    pub fn set_alert(&mut self, level: AlertLevel, now: f64, synth: &mut Synthesizer) {
        if level == self.alert {
            return;
        }
        log::debug!("Energy alert {:?} -> {:?}", self.alert, level);
        self.silence_alert(synth);

        let t = synth.now();
        match level {
            AlertLevel::None => {}
            AlertLevel::Warning => {
                synth.schedule(
                    ContinuousVoice::EnergyAlert,
                    ALERT_OSC,
                    Param::Detune,
                    Automation::new().set(WARNING_DETUNE, t),
                );
                self.next_alert_pulse = Some(now + WARNING_PERIOD);
            }
            AlertLevel::Danger => {
                self.next_alert_pulse = Some(now + DANGER_PERIOD);
            }
        }
        self.alert = level;
    }

    /// Cancel the pulse and fade the alert voice out over 200 ms
    fn silence_alert(&mut self, synth: &mut Synthesizer) {
        self.next_alert_pulse = None;
        self.alert = AlertLevel::None;

        let t = synth.now();
        let voice = ContinuousVoice::EnergyAlert;
        synth.schedule(
            voice,
            ALERT_OSC,
            Param::Frequency,
            Automation::new().cancel(t).set(0.0, t),
        );
        synth.schedule(voice, ALERT_OSC, Param::Detune, Automation::new().set(0.0, t));
        synth.schedule(
            voice,
            ALERT_GAIN,
            Param::Gain,
            Automation::new().cancel(t).linear(0.0, t + 0.2),
        );
    }

    fn alert_pulse(&self, synth: &mut Synthesizer) {
        let t = synth.now();
        let voice = ContinuousVoice::EnergyAlert;
        match self.alert {
            AlertLevel::None => {}
            AlertLevel::Warning => {
                synth.schedule(
                    voice,
                    ALERT_OSC,
                    Param::Frequency,
                    Automation::new().cancel(t).set(WARNING_FREQ, t),
                );
                synth.schedule(
                    voice,
                    ALERT_OSC,
                    Param::Detune,
                    Automation::new().set(WARNING_DETUNE, t),
                );
                synth.schedule(
                    voice,
                    ALERT_GAIN,
                    Param::Gain,
                    Automation::new()
                        .cancel(t)
                        .set(0.0, t)
                        .linear(WARNING_GAIN, t + 0.02)
                        .set(WARNING_GAIN, t + WARNING_ON)
                        .linear(0.0, t + WARNING_ON + 0.15),
                );
            }
            AlertLevel::Danger => {
                synth.schedule(
                    voice,
                    ALERT_OSC,
                    Param::Frequency,
                    Automation::new()
                        .cancel(t)
                        .set(DANGER_LOW, t)
                        .linear(DANGER_HIGH, t + DANGER_RISE),
                );
                synth.schedule(
                    voice,
                    ALERT_GAIN,
                    Param::Gain,
                    Automation::new()
                        .cancel(t)
                        .set(0.0, t)
                        .linear(DANGER_GAIN, t + 0.05)
                        .set(DANGER_GAIN, t + DANGER_RISE - 0.1)
                        .linear(0.0, t + DANGER_RISE),
                );
            }
        }
    }

    /// Begin the presence pulse; a no-op if it is already running
    pub fn start_runner(&mut self, now: f64) {
        if self.next_runner_pulse.is_none() {
            self.next_runner_pulse = Some(now + RUNNER_PULSE_PERIOD);
        }
    }

    /// Point the presence voice at the runner's live position
    pub fn track_runner(&self, pan: f32, pitch: f32, synth: &mut Synthesizer) {
        let t = synth.now();
        let voice = ContinuousVoice::RunnerPresence;
        synth.schedule(voice, RUNNER_PAN, Param::Pan, Automation::new().set(pan, t));
        synth.schedule(
            voice,
            RUNNER_OSC,
            Param::Frequency,
            Automation::new().set(pitch, t),
        );
    }

    /// Stop the presence pulse and silence the hum at once
    pub fn stop_runner(&mut self, synth: &mut Synthesizer) {
        self.next_runner_pulse = None;
        let t = synth.now();
        let voice = ContinuousVoice::RunnerPresence;
        synth.schedule(
            voice,
            RUNNER_GAIN,
            Param::Gain,
            Automation::new().cancel(t).set(0.0, t),
        );
        synth.schedule(voice, RUNNER_PAN, Param::Pan, Automation::new().set(0.0, t));
    }

    fn runner_pulse(&self, synth: &mut Synthesizer) {
        let t = synth.now();
        synth.schedule(
            ContinuousVoice::RunnerPresence,
            RUNNER_GAIN,
            Param::Gain,
            Automation::new()
                .cancel(t)
                .set(0.0, t)
                .linear(RUNNER_PULSE_GAIN, t + 0.015)
                .set(RUNNER_PULSE_GAIN, t + RUNNER_PULSE_HOLD)
                .linear(0.0, t + RUNNER_PULSE_HOLD + 0.06),
        );
    }

    /// Fire any pulses that have come due by simulation time `now`
    pub fn pump(&mut self, now: f64, synth: &mut Synthesizer) {
        if take_due(&mut self.next_runner_pulse, now, RUNNER_PULSE_PERIOD) {
            self.runner_pulse(synth);
        }
        let period = match self.alert {
            AlertLevel::Warning => WARNING_PERIOD,
            AlertLevel::Danger => DANGER_PERIOD,
            AlertLevel::None => return,
        };
        if take_due(&mut self.next_alert_pulse, now, period) {
            self.alert_pulse(synth);
        }
    }

    /// Silence everything and tear down both voices (game over)
    pub fn shutdown(&mut self, synth: &mut Synthesizer) {
        self.stop_runner(synth);
        self.silence_alert(synth);
        synth.close(ContinuousVoice::RunnerPresence);
        synth.close(ContinuousVoice::EnergyAlert);
    }
}
