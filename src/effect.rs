use std::collections::VecDeque;

use crate::graph::{Graph, NodeId};
use crate::runtime::RuntimeContext;

/// A single-sample effect stage, applied in-line as an `AudioSource`'s
/// output is filled.
pub trait Effect {
    fn apply(&mut self, graph: &mut Graph, sample: f64, ctx: &RuntimeContext) -> f64;
}

/// Feedback delay line. `delay`/`feedback` are graph-controlled so they can
/// themselves be swept or held.
pub struct Delay {
    pub delay: NodeId,
    pub feedback: NodeId,
    buffer: VecDeque<f64>,
}

impl Delay {
    pub fn new(delay: NodeId, feedback: NodeId) -> Self {
        Self {
            delay,
            feedback,
            buffer: VecDeque::new(),
        }
    }

    fn resize(&mut self, samples: usize) {
        while self.buffer.len() < samples {
            self.buffer.push_back(0.0);
        }
        while self.buffer.len() > samples {
            self.buffer.pop_front();
        }
    }
}

impl Effect for Delay {
    fn apply(&mut self, graph: &mut Graph, sample: f64, ctx: &RuntimeContext) -> f64 {
        let seconds = graph.value_at(self.delay, ctx).max(0.0);
        let feedback = graph.value_at(self.feedback, ctx).clamp(0.0, 0.99);
        let samples = ((seconds * ctx.sample_rate as f64) as usize).max(1);
        self.resize(samples);

        let delayed = self.buffer.pop_front().unwrap_or(0.0);
        self.buffer.push_back(sample + delayed * feedback);
        sample + delayed
    }
}

/// Placeholder low-pass stage. Never wired up to an actual filter design,
/// same as the controller.h source it mirrors — kept as an interface so a
/// future cutoff-bearing implementation slots in without touching callers.
pub struct LowPassFilter {
    pub cutoff: NodeId,
}

impl LowPassFilter {
    pub fn new(cutoff: NodeId) -> Self {
        Self { cutoff }
    }
}

impl Effect for LowPassFilter {
    fn apply(&mut self, _graph: &mut Graph, sample: f64, _ctx: &RuntimeContext) -> f64 {
        sample
    }
}

pub enum EffectKind {
    Delay(Delay),
    LowPass(LowPassFilter),
}

impl Effect for EffectKind {
    fn apply(&mut self, graph: &mut Graph, sample: f64, ctx: &RuntimeContext) -> f64 {
        match self {
            EffectKind::Delay(d) => d.apply(graph, sample, ctx),
            EffectKind::LowPass(f) => f.apply(graph, sample, ctx),
        }
    }
}

/// Ordered chain of effects an `AudioSource` runs its output through before
/// it is mixed.
#[derive(Default)]
pub struct EffectChain {
    stages: Vec<EffectKind>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: EffectKind) {
        self.stages.push(stage);
    }

    pub fn apply(&mut self, graph: &mut Graph, sample: f64, ctx: &RuntimeContext) -> f64 {
        self.stages.iter_mut().fold(sample, |s, stage| stage.apply(graph, s, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_of_zero_samples_still_produces_output() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let delay_node = graph.number(0.0);
        let feedback_node = graph.number(0.0);
        graph.start(delay_node, 0.0, &ctx);
        graph.start(feedback_node, 0.0, &ctx);
        let mut delay = Delay::new(delay_node, feedback_node);
        let out = delay.apply(&mut graph, 1.0, &ctx);
        assert_eq!(out, 1.0 + 0.0);
    }

    #[test]
    fn low_pass_is_a_pass_through() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let cutoff = graph.number(1000.0);
        graph.start(cutoff, 0.0, &ctx);
        let mut filter = LowPassFilter::new(cutoff);
        assert_eq!(filter.apply(&mut graph, 0.42, &ctx), 0.42);
    }
}
