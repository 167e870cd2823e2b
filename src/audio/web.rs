//! Web Audio API backend
//!
//! Builds real node graphs from `VoiceGraph`s. Every voice hangs off one
//! shared master gain node; fire-and-forget voices are disconnected by a
//! timer once their release time has passed.

use std::collections::HashMap;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{
    AudioContext, AudioContextState, AudioNode, AudioParam, AudioScheduledSourceNode,
    ConstantSourceNode, GainNode, OscillatorNode, OscillatorType, StereoPannerNode,
};

use super::backend::AudioBackend;
use super::graph::{
    Automation, ContinuousVoice, Link, NodeId, NodeKind, Param, ParamEvent, VoiceGraph, Waveform,
    delay_millis,
};
use super::synth::DEFAULT_MASTER_VOLUME;

/// Tail left for a closed continuous voice to finish its fade
const CLOSE_TAIL: f64 = 0.25;

enum WebNode {
    Oscillator(OscillatorNode),
    Gain(GainNode),
    Panner(StereoPannerNode),
    Constant(ConstantSourceNode),
}

impl WebNode {
    fn create(ctx: &AudioContext, kind: NodeKind) -> Option<Self> {
        let node = match kind {
            NodeKind::Oscillator(waveform) => {
                let osc = ctx.create_oscillator().ok()?;
                osc.set_type(oscillator_type(waveform));
                WebNode::Oscillator(osc)
            }
            NodeKind::Gain => WebNode::Gain(ctx.create_gain().ok()?),
            NodeKind::StereoPanner => WebNode::Panner(ctx.create_stereo_panner().ok()?),
            NodeKind::Constant => WebNode::Constant(ctx.create_constant_source().ok()?),
        };
        Some(node)
    }

    fn audio_node(&self) -> &AudioNode {
        match self {
            WebNode::Oscillator(n) => n.as_ref(),
            WebNode::Gain(n) => n.as_ref(),
            WebNode::Panner(n) => n.as_ref(),
            WebNode::Constant(n) => n.as_ref(),
        }
    }

    fn source(&self) -> Option<&AudioScheduledSourceNode> {
        match self {
            WebNode::Oscillator(n) => Some(n.as_ref()),
            WebNode::Constant(n) => Some(n.as_ref()),
            _ => None,
        }
    }

    fn param(&self, param: Param) -> Option<AudioParam> {
        match (self, param) {
            (WebNode::Oscillator(n), Param::Frequency) => Some(n.frequency()),
            (WebNode::Oscillator(n), Param::Detune) => Some(n.detune()),
            (WebNode::Gain(n), Param::Gain) => Some(n.gain()),
            (WebNode::Panner(n), Param::Pan) => Some(n.pan()),
            (WebNode::Constant(n), Param::Offset) => Some(n.offset()),
            _ => None,
        }
    }
}

fn oscillator_type(waveform: Waveform) -> OscillatorType {
    match waveform {
        Waveform::Sine => OscillatorType::Sine,
        Waveform::Square => OscillatorType::Square,
        Waveform::Sawtooth => OscillatorType::Sawtooth,
        Waveform::Triangle => OscillatorType::Triangle,
    }
}

fn apply(param: &AudioParam, automation: &Automation) {
    for event in automation.events() {
        match *event {
            ParamEvent::Cancel { from } => {
                param.cancel_scheduled_values(from).ok();
            }
            ParamEvent::Set { value, at } => {
                param.set_value_at_time(value, at).ok();
            }
            ParamEvent::Linear { value, at } => {
                param.linear_ramp_to_value_at_time(value, at).ok();
            }
            ParamEvent::Exponential { value, at } => {
                param.exponential_ramp_to_value_at_time(value, at).ok();
            }
        }
    }
}

/// Disconnect `nodes` after `delay` seconds of wall time
fn disconnect_later(nodes: Vec<WebNode>, delay: f64) {
    let Some(millis) = delay_millis(delay) else {
        log::warn!("Voice never releases; leaving its nodes connected");
        return;
    };
    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::once_into_js(move || {
        for node in &nodes {
            node.audio_node().disconnect().ok();
        }
    });
    window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
        .ok();
}

/// Audio backend over a browser `AudioContext`
pub struct WebAudioBackend {
    ctx: AudioContext,
    master: GainNode,
    continuous: HashMap<ContinuousVoice, Vec<WebNode>>,
}

impl WebAudioBackend {
    /// Fails when the page may not create an audio context
    pub fn new() -> Option<Self> {
        let ctx = AudioContext::new().ok()?;
        let master = ctx.create_gain().ok()?;
        master.gain().set_value(DEFAULT_MASTER_VOLUME);
        master
            .connect_with_audio_node(&ctx.destination())
            .ok()?;
        Some(Self {
            ctx,
            master,
            continuous: HashMap::new(),
        })
    }

    /// Create, automate, route and start every node of `graph`
    fn build(&self, graph: &VoiceGraph) -> Option<Vec<WebNode>> {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| WebNode::create(&self.ctx, n.kind))
            .collect::<Option<Vec<_>>>()?;

        for (node, web) in graph.nodes.iter().zip(&nodes) {
            for (param, automation) in &node.automation {
                if let Some(target) = web.param(*param) {
                    apply(&target, automation);
                }
            }
        }

        for (from, link) in &graph.links {
            let source = nodes.get(*from)?.audio_node();
            match *link {
                Link::Node(to) => {
                    source
                        .connect_with_audio_node(nodes.get(to)?.audio_node())
                        .ok()?;
                }
                Link::Param(to, param) => {
                    let target = nodes.get(to)?.param(param)?;
                    source.connect_with_audio_param(&target).ok()?;
                }
                Link::Master => {
                    source.connect_with_audio_node(&self.master).ok()?;
                }
            }
        }

        for (id, web) in nodes.iter().enumerate() {
            if let Some(source) = web.source() {
                source.start_with_when(graph.start).ok();
                let stop = graph.stop_time(id);
                if stop.is_finite() {
                    source.stop_with_when(stop).ok();
                }
            }
        }
        Some(nodes)
    }
}

impl AudioBackend for WebAudioBackend {
    fn current_time(&self) -> f64 {
        self.ctx.current_time()
    }

    fn resume(&mut self) {
        if self.ctx.state() == AudioContextState::Suspended {
            let _ = self.ctx.resume();
        }
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master
            .gain()
            .set_value_at_time(volume, self.ctx.current_time())
            .ok();
    }

    fn play(&mut self, voice: VoiceGraph) {
        let Some(nodes) = self.build(&voice) else {
            log::warn!("Failed to build voice {}", voice.name);
            return;
        };
        disconnect_later(nodes, voice.release_at - self.ctx.current_time());
    }

    fn open(&mut self, voice: ContinuousVoice, graph: VoiceGraph) {
        self.close(voice);
        match self.build(&graph) {
            Some(nodes) => {
                self.continuous.insert(voice, nodes);
            }
            None => log::warn!("Failed to open voice {}", voice.name()),
        }
    }

    fn schedule(
        &mut self,
        voice: ContinuousVoice,
        node: NodeId,
        param: Param,
        automation: &Automation,
    ) {
        let target = self
            .continuous
            .get(&voice)
            .and_then(|nodes| nodes.get(node))
            .and_then(|n| n.param(param));
        if let Some(target) = target {
            apply(&target, automation);
        }
    }

    fn close(&mut self, voice: ContinuousVoice) {
        let Some(nodes) = self.continuous.remove(&voice) else {
            return;
        };
        let stop = self.ctx.current_time() + CLOSE_TAIL;
        for node in &nodes {
            if let Some(source) = node.source() {
                source.stop_with_when(stop).ok();
            }
        }
        disconnect_later(nodes, CLOSE_TAIL + 0.05);
    }
}
