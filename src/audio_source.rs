use crate::bytecode::ResourceBlock;
use crate::effect::EffectChain;
use crate::graph::{Graph, NodeId, Sync};
use crate::runtime::RuntimeContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Saw,
}

/// A phase accumulator walking `[0, 1)`, re-sampled against its frequency
/// node every frame — the frequency itself may be a controller, so the
/// phase increment is recomputed rather than cached.
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: NodeId,
    phase: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: NodeId) -> Self {
        Self {
            waveform,
            frequency,
            phase: 0.0,
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn next(&mut self, graph: &mut Graph, ctx: &RuntimeContext) -> f64 {
        let value = match self.waveform {
            Waveform::Sine => (ctx.two_pi * self.phase).sin(),
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Saw => 2.0 * self.phase - 1.0,
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };
        let frequency = graph.value_at(self.frequency, ctx);
        self.phase += frequency / ctx.sample_rate as f64;
        self.phase -= self.phase.floor();
        value
    }
}

/// White noise, uniform on `[-1, 1]`.
pub struct Noise;

impl Noise {
    fn next(&self, ctx: &RuntimeContext) -> f64 {
        ctx.uniform(-1.0, 1.0)
    }
}

/// Streams decoded PCM from a resource block. `grains` are frame-index
/// boundaries subdividing the sample; looping restarts playback at the
/// start of whichever grain the read head last crossed into, rather than
/// rewinding the whole sample.
pub struct Sample {
    pub resource: usize,
    pub grains: Vec<usize>,
    pub looping: bool,
    position: usize,
}

impl Sample {
    pub fn new(resource: usize, grains: Vec<usize>, looping: bool) -> Self {
        Self {
            resource,
            grains,
            looping,
            position: 0,
        }
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn grain_start(&self, position: usize) -> usize {
        self.grains.iter().rev().find(|&&b| b <= position).copied().unwrap_or(0)
    }

    fn grain_end(&self, position: usize, len: usize) -> usize {
        self.grains.iter().find(|&&b| b > position).copied().unwrap_or(len)
    }

    fn next(&mut self, resources: &[ResourceBlock]) -> Option<f64> {
        let samples = &resources[self.resource].samples;
        let len = samples.len();
        if self.position >= len {
            return None;
        }
        let value = samples[self.position] as f64 / i32::MAX as f64;
        let end = self.grain_end(self.position, len);
        self.position += 1;
        if self.position >= end && self.looping {
            self.position = self.grain_start(self.position.min(len.saturating_sub(1)));
        }
        Some(value)
    }

    fn is_exhausted(&self, resources: &[ResourceBlock]) -> bool {
        !self.looping && self.position >= resources[self.resource].samples.len()
    }
}

pub enum SourceKind {
    Oscillator(Oscillator),
    Noise(Noise),
    Sample(Sample),
}

/// A live voice: a signal generator plus the per-voice volume/pan controls
/// and effect chain it is mixed through. `done` latches once a finite
/// source (a non-looping `Sample`) runs out; oscillators and noise never
/// set it. Carries its own `Sync` rather than living in the `Graph` arena,
/// since a voice is spawned and retired by `play`/`perform`, not addressed
/// by other nodes the way controllers are.
pub struct AudioSourceNode {
    pub kind: SourceKind,
    pub volume: NodeId,
    pub pan: NodeId,
    pub effects: EffectChain,
    pub done: bool,
    pub sync: Sync,
}

impl AudioSourceNode {
    pub fn new(kind: SourceKind, volume: NodeId, pan: NodeId) -> Self {
        Self {
            kind,
            volume,
            pan,
            effects: EffectChain::new(),
            done: false,
            sync: Sync::new(),
        }
    }

    fn reset_playback(&mut self) {
        match &mut self.kind {
            SourceKind::Oscillator(osc) => osc.reset(),
            SourceKind::Noise(_) => {}
            SourceKind::Sample(s) => s.reset(),
        }
    }

    /// First activation: starts the volume/pan controllers (and, for an
    /// `Oscillator`, its frequency controller) and marks the voice playing.
    /// A no-op if already active, matching `Sync::start`'s own guard.
    pub fn start(&mut self, graph: &mut Graph, ctx: &RuntimeContext, time: f64) {
        if self.sync.enabled {
            return;
        }
        self.sync.enabled = true;
        self.sync.start_time = time;
        self.sync.repeat_time = time;
        self.done = false;
        self.reset_playback();
        graph.start(self.volume, time, ctx);
        graph.start(self.pan, time, ctx);
        if let SourceKind::Oscillator(osc) = &self.kind {
            graph.start(osc.frequency, time, ctx);
        }
    }

    /// Retriggers an already-playing (or previously finished) voice from
    /// the top, the way a `perform` event retriggers its action on every
    /// tick: resets the generator's internal state and re-enters its
    /// volume/pan envelopes via `repeat` rather than `start`.
    pub fn restart(&mut self, graph: &mut Graph, ctx: &RuntimeContext, time: f64) {
        if !self.sync.enabled {
            self.start(graph, ctx, time);
            return;
        }
        self.sync.repeat_time = time;
        self.done = false;
        self.reset_playback();
        graph.repeat(self.volume, time, ctx);
        graph.repeat(self.pan, time, ctx);
    }

    pub fn is_active(&self) -> bool {
        self.sync.enabled && !self.done
    }

    fn next_raw(&mut self, resources: &[ResourceBlock], graph: &mut Graph, ctx: &RuntimeContext) -> f64 {
        match &mut self.kind {
            SourceKind::Oscillator(osc) => osc.next(graph, ctx),
            SourceKind::Noise(n) => n.next(ctx),
            SourceKind::Sample(s) => {
                let value = s.next(resources).unwrap_or(0.0);
                if s.is_exhausted(resources) {
                    self.done = true;
                }
                value
            }
        }
    }

    /// Equal-power pan law, normalized to unity gain at center: `pan` in
    /// `[-1, 1]`, 0 centered gives `(1, 1)`; the hard-panned side rises to
    /// `sqrt(2)` while the other falls to 0, tracing the same cos/sin curve
    /// as a center-attenuated law, just rescaled so center carries no
    /// attenuation.
    fn pan_gains(pan: f64) -> (f64, f64) {
        let angle = (pan.clamp(-1.0, 1.0) + 1.0) * std::f64::consts::FRAC_PI_4;
        let scale = std::f64::consts::SQRT_2;
        (scale * angle.cos(), scale * angle.sin())
    }

    /// Additively mixes `frames` frames of this source into `output`,
    /// an interleaved buffer with `ctx.channels` channels per frame.
    pub fn fill_buffer(&mut self, resources: &[ResourceBlock], graph: &mut Graph, ctx: &RuntimeContext, output: &mut [f32], frames: usize) {
        let channels = ctx.channels as usize;
        for frame in 0..frames {
            if !self.is_active() {
                break;
            }
            let raw = self.next_raw(resources, graph, ctx);
            let volume = graph.value_at(self.volume, ctx);
            let pan = graph.value_at(self.pan, ctx);
            let sample = self.effects.apply(graph, raw * volume, ctx);
            let (left_gain, right_gain) = Self::pan_gains(pan);
            let base = frame * channels;
            if channels >= 2 {
                output[base] += (sample * left_gain) as f32;
                output[base + 1] += (sample * right_gain) as f32;
                for ch in output[base + 2..base + channels].iter_mut() {
                    *ch += sample as f32;
                }
            } else if channels == 1 {
                output[base] += sample as f32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_oscillator_starts_at_zero_and_rises() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let freq = graph.number(440.0);
        graph.start(freq, 0.0, &ctx);
        let mut osc = Oscillator::new(Waveform::Sine, freq);
        let first = osc.next(&mut graph, &ctx);
        assert!(first.abs() < 1e-9);
        let second = osc.next(&mut graph, &ctx);
        assert!(second > first);
    }

    #[test]
    fn pan_gains_are_unity_at_center() {
        let (l, r) = AudioSourceNode::pan_gains(0.0);
        assert!((l - 1.0).abs() < 1e-9);
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pan_gains_favor_one_side_at_the_extremes() {
        let (l, r) = AudioSourceNode::pan_gains(-1.0);
        assert!((l - std::f64::consts::SQRT_2).abs() < 1e-9);
        assert!(r.abs() < 1e-9);
        let (l, r) = AudioSourceNode::pan_gains(1.0);
        assert!(l.abs() < 1e-9);
        assert!((r - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn non_looping_sample_latches_done_once_exhausted() {
        let resources = vec![ResourceBlock {
            length: 2,
            sample_rate: 44100,
            samples: vec![i32::MAX, i32::MAX / 2],
        }];
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let volume = graph.number(1.0);
        let pan = graph.number(0.0);
        graph.start(volume, 0.0, &ctx);
        graph.start(pan, 0.0, &ctx);
        let mut node = AudioSourceNode::new(SourceKind::Sample(Sample::new(0, Vec::new(), false)), volume, pan);
        node.start(&mut graph, &ctx, 0.0);
        let mut buffer = vec![0.0f32; 2 * ctx.channels as usize];
        node.fill_buffer(&resources, &mut graph, &ctx, &mut buffer, 2);
        assert!(!node.done);
        node.fill_buffer(&resources, &mut graph, &ctx, &mut buffer, 1);
        assert!(node.done);
    }
}
