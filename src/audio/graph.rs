//! Voice graph description
//!
//! A voice is a small audio graph (oscillators, gains, panners) plus the
//! parameter automation scheduled on it. Graphs are plain data so the
//! synthesizer can be tested without an audio device; a backend renders them.

/// Oscillator waveforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Automatable parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Oscillator frequency (Hz)
    Frequency,
    /// Oscillator detune (cents)
    Detune,
    /// Gain node amplitude
    Gain,
    /// Stereo panner position [-1, 1]
    Pan,
    /// Constant source output
    Offset,
}

/// Exponential ramps cannot reach zero; targets are floored here
pub const EXP_FLOOR: f32 = 0.0001;

/// One scheduled change on an audio parameter (times in audio-clock seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    /// Drop everything scheduled at or after `from`
    Cancel { from: f64 },
    Set { value: f32, at: f64 },
    Linear { value: f32, at: f64 },
    Exponential { value: f32, at: f64 },
}

impl ParamEvent {
    pub fn time(&self) -> f64 {
        match *self {
            ParamEvent::Cancel { from } => from,
            ParamEvent::Set { at, .. }
            | ParamEvent::Linear { at, .. }
            | ParamEvent::Exponential { at, .. } => at,
        }
    }
}

/// Ordered automation for a single parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Automation {
    events: Vec<ParamEvent>,
}

impl Automation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(mut self, from: f64) -> Self {
        self.events.push(ParamEvent::Cancel { from });
        self
    }

    pub fn set(mut self, value: f32, at: f64) -> Self {
        self.events.push(ParamEvent::Set { value, at });
        self
    }

    pub fn linear(mut self, value: f32, at: f64) -> Self {
        self.events.push(ParamEvent::Linear { value, at });
        self
    }

    pub fn exponential(mut self, value: f32, at: f64) -> Self {
        self.events.push(ParamEvent::Exponential {
            value: value.max(EXP_FLOOR),
            at,
        });
        self
    }

    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time of the last scheduled event
    pub fn end_time(&self) -> Option<f64> {
        self.events.iter().map(ParamEvent::time).reduce(f64::max)
    }
}

/// Node kinds a voice is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Oscillator(Waveform),
    Gain,
    StereoPanner,
    /// DC source (used to bias modulation)
    Constant,
}

impl NodeKind {
    /// Scheduled sources must be started and stopped
    pub fn is_source(&self) -> bool {
        matches!(self, NodeKind::Oscillator(_) | NodeKind::Constant)
    }
}

/// Index of a node inside its graph
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub automation: Vec<(Param, Automation)>,
    /// Source stop time when earlier than the graph's `stop`
    pub stop: Option<f64>,
}

impl Node {
    pub fn automation_for(&self, param: Param) -> Option<&Automation> {
        self.automation
            .iter()
            .find(|(p, _)| *p == param)
            .map(|(_, a)| a)
    }
}

/// Where a node's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Node(NodeId),
    /// Modulates a parameter of another node
    Param(NodeId, Param),
    /// The shared master volume node
    Master,
}

/// A complete voice: nodes, routing and lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceGraph {
    /// Effect name, for logs and tests
    pub name: &'static str,
    pub nodes: Vec<Node>,
    pub links: Vec<(NodeId, Link)>,
    /// When sources start
    pub start: f64,
    /// When sources stop
    pub stop: f64,
    /// When the backend disconnects every node
    pub release_at: f64,
}

/// Seconds to a whole-millisecond timer delay. `None` for a release that
/// never comes (continuous voices use `f64::INFINITY`).
pub fn delay_millis(seconds: f64) -> Option<i32> {
    seconds
        .is_finite()
        .then(|| (seconds.max(0.0) * 1000.0).ceil() as i32)
}

impl VoiceGraph {
    /// An empty voice whose sources run over `[start, stop]` and are released at `stop`
    pub fn new(name: &'static str, start: f64, stop: f64) -> Self {
        Self {
            name,
            nodes: Vec::new(),
            links: Vec::new(),
            start,
            stop,
            release_at: stop,
        }
    }

    /// Release nodes at an explicit time instead of at `stop`
    pub fn release_at(mut self, at: f64) -> Self {
        self.release_at = at;
        self
    }

    fn add(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            automation: Vec::new(),
            stop: None,
        });
        self.nodes.len() - 1
    }

    pub fn oscillator(&mut self, waveform: Waveform) -> NodeId {
        self.add(NodeKind::Oscillator(waveform))
    }

    pub fn gain(&mut self) -> NodeId {
        self.add(NodeKind::Gain)
    }

    pub fn panner(&mut self) -> NodeId {
        self.add(NodeKind::StereoPanner)
    }

    pub fn constant(&mut self) -> NodeId {
        self.add(NodeKind::Constant)
    }

    pub fn automate(&mut self, node: NodeId, param: Param, automation: Automation) {
        self.nodes[node].automation.push((param, automation));
    }

    /// Stop one source before the rest of the voice
    pub fn stop_early(&mut self, node: NodeId, at: f64) {
        self.nodes[node].stop = Some(at);
    }

    /// Stop time of a source node
    pub fn stop_time(&self, node: NodeId) -> f64 {
        self.nodes[node].stop.unwrap_or(self.stop)
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        self.links.push((from, Link::Node(to)));
    }

    pub fn modulate(&mut self, from: NodeId, to: NodeId, param: Param) {
        self.links.push((from, Link::Param(to, param)));
    }

    pub fn to_master(&mut self, from: NodeId) {
        self.links.push((from, Link::Master));
    }

    /// Automation for `param` on the first node of `kind`
    pub fn find(&self, kind: NodeKind, param: Param) -> Option<&Automation> {
        self.nodes
            .iter()
            .find(|n| n.kind == kind)
            .and_then(|n| n.automation_for(param))
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

/// Long-lived voices that survive across many envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContinuousVoice {
    RunnerPresence,
    EnergyAlert,
}

impl ContinuousVoice {
    pub fn name(&self) -> &'static str {
        match self {
            ContinuousVoice::RunnerPresence => "runner_presence",
            ContinuousVoice::EnergyAlert => "energy_alert",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_floor() {
        let a = Automation::new().set(0.3, 0.0).exponential(0.0, 0.1);
        assert_eq!(
            a.events()[1],
            ParamEvent::Exponential {
                value: EXP_FLOOR,
                at: 0.1
            }
        );
        assert_eq!(a.end_time(), Some(0.1));
    }

    #[test]
    fn test_graph_building() {
        let mut g = VoiceGraph::new("test", 1.0, 1.5).release_at(2.0);
        let osc = g.oscillator(Waveform::Sine);
        let gain = g.gain();
        g.connect(osc, gain);
        g.to_master(gain);
        g.automate(gain, Param::Gain, Automation::new().set(0.5, 1.0));
        assert_eq!(g.links, vec![(0, Link::Node(1)), (1, Link::Master)]);
        assert_eq!(g.count(NodeKind::Oscillator(Waveform::Sine)), 1);
        assert!(g.find(NodeKind::Gain, Param::Gain).is_some());
        assert_eq!(g.release_at, 2.0);
    }

    #[test]
    fn test_delay_millis() {
        assert_eq!(delay_millis(0.3), Some(300));
        assert_eq!(delay_millis(0.0004), Some(1));
        assert_eq!(delay_millis(-1.0), Some(0));
        assert_eq!(delay_millis(f64::INFINITY - 2.0), None, "continuous release");
        assert_eq!(delay_millis(f64::NAN), None);
    }
}
