use crate::graph::{Graph, NodeId, Sync};
use crate::runtime::RuntimeContext;

/// `Hold(value, length)` — outputs `value.getValue()` until
/// `clock - startTime >= length`, then stops.
pub struct Hold {
    pub value: NodeId,
    pub length: NodeId,
}

impl Hold {
    pub fn new(value: NodeId, length: NodeId) -> Self {
        Self { value, length }
    }

    pub fn evaluate(&self, graph: &mut Graph, id: NodeId, elapsed: f64, ctx: &RuntimeContext, sync: &mut Sync) -> f64 {
        let _ = id;
        let value = graph.value_at(self.value, ctx);
        let length = graph.value_at(self.length, ctx);
        if elapsed >= length {
            sync.enabled = false;
        }
        value
    }
}

/// `Sweep(from, to, length)` — linear ramp; stops at length; final sample
/// returns `to.getValue()`.
pub struct Sweep {
    pub from: NodeId,
    pub to: NodeId,
    pub length: NodeId,
}

impl Sweep {
    pub fn new(from: NodeId, to: NodeId, length: NodeId) -> Self {
        Self { from, to, length }
    }

    pub fn evaluate(&self, graph: &mut Graph, elapsed: f64, ctx: &RuntimeContext, sync: &mut Sync) -> f64 {
        let from = graph.value_at(self.from, ctx);
        let to = graph.value_at(self.to, ctx);
        let length = graph.value_at(self.length, ctx);
        if elapsed >= length {
            sync.enabled = false;
            return to;
        }
        from + (to - from) * (elapsed / length)
    }
}

/// `LFO(from, to, length)` — raised-cosine from `from` to `to` over
/// `length` seconds; stops once `elapsed >= length`, like `Hold`/`Sweep`,
/// so it can hand off to a parent `sequence`/`repeat`.
pub struct Lfo {
    pub from: NodeId,
    pub to: NodeId,
    pub length: NodeId,
}

impl Lfo {
    pub fn new(from: NodeId, to: NodeId, length: NodeId) -> Self {
        Self { from, to, length }
    }

    pub fn evaluate(&self, graph: &mut Graph, elapsed: f64, ctx: &RuntimeContext, sync: &mut Sync) -> f64 {
        let from = graph.value_at(self.from, ctx);
        let to = graph.value_at(self.to, ctx);
        let length = graph.value_at(self.length, ctx).max(1e-9);
        if elapsed >= length {
            sync.enabled = false;
            return to;
        }
        from + (to - from) * (1.0 - (ctx.two_pi * elapsed / length).cos()) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOrder {
    Forwards,
    Backwards,
    PingPong,
    Random,
}

/// `Sequence(values, order)` — steps through child controllers in the
/// given order. On each child's stop, advances; ping-pong runs `2N-1`
/// steps total, the others `N`; random never repeats the immediately
/// previous index. `syncLength()` is the sum of the children's lengths.
pub struct Sequence {
    pub values: Vec<NodeId>,
    pub order: SequenceOrder,
    current: usize,
    direction: i32,
    switches: usize,
    max_switches: usize,
}

impl Sequence {
    pub fn new(values: Vec<NodeId>, order: SequenceOrder) -> Self {
        let max_switches = match order {
            SequenceOrder::PingPong => 2 * values.len().max(1) - 1,
            _ => values.len().max(1),
        };
        Self {
            values,
            order,
            current: 0,
            direction: 1,
            switches: 0,
            max_switches,
        }
    }

    pub fn on_start(&mut self, graph: &mut Graph, time: f64, ctx: &RuntimeContext) {
        self.switches = 0;
        self.direction = 1;
        self.current = match self.order {
            SequenceOrder::Backwards => self.values.len().saturating_sub(1),
            SequenceOrder::Random => ctx.uniform_index(self.values.len().max(1)),
            SequenceOrder::Forwards | SequenceOrder::PingPong => 0,
        };
        if let Some(&id) = self.values.get(self.current) {
            graph.start(id, time, ctx);
        }
    }

    pub fn on_repeat(&mut self, graph: &mut Graph, time: f64, ctx: &RuntimeContext) {
        self.on_start(graph, time, ctx);
    }

    pub fn sync_length(&self, graph: &mut Graph, ctx: &RuntimeContext) -> f64 {
        self.values.iter().map(|&id| graph.sync_length(id, ctx)).sum()
    }

    pub fn evaluate(&mut self, graph: &mut Graph, time: f64, ctx: &RuntimeContext, sync: &mut Sync) -> f64 {
        if self.values.is_empty() {
            sync.enabled = false;
            return 0.0;
        }
        let current_id = self.values[self.current];
        if !graph.is_enabled(current_id) {
            self.switches += 1;
            if self.switches >= self.max_switches {
                sync.enabled = false;
                return graph.value_at(current_id, ctx);
            }
            self.advance(ctx);
            graph.start(self.values[self.current], time, ctx);
        }
        graph.value_at(self.values[self.current], ctx)
    }

    fn advance(&mut self, ctx: &RuntimeContext) {
        let len = self.values.len();
        match self.order {
            SequenceOrder::Forwards => self.current = (self.current + 1) % len,
            SequenceOrder::Backwards => self.current = (self.current + len - 1) % len,
            SequenceOrder::PingPong => {
                if self.current == len - 1 {
                    self.direction = -1;
                } else if self.current == 0 {
                    self.direction = 1;
                }
                self.current = (self.current as i32 + self.direction) as usize;
            }
            SequenceOrder::Random => {
                if len <= 1 {
                    return;
                }
                let mut next = ctx.uniform_index(len);
                while next == self.current {
                    next = ctx.uniform_index(len);
                }
                self.current = next;
            }
        }
    }
}

/// `Repeat(value, repeats)` — runs `value` `repeats` times back-to-back,
/// restarting at `value.startTime + value.syncLength()`. `repeats == 0`
/// means infinite.
pub struct Repeat {
    pub value: NodeId,
    pub repeats: NodeId,
    times: u32,
}

impl Repeat {
    pub fn new(value: NodeId, repeats: NodeId) -> Self {
        Self { value, repeats, times: 0 }
    }

    pub fn sync_length(&self, graph: &mut Graph, ctx: &RuntimeContext) -> f64 {
        let repeats = graph.value_at(self.repeats, ctx);
        if repeats <= 0.0 {
            return f64::INFINITY;
        }
        repeats * graph.sync_length(self.value, ctx)
    }

    pub fn evaluate(&mut self, graph: &mut Graph, id: NodeId, time: f64, ctx: &RuntimeContext, sync: &mut Sync) -> f64 {
        let _ = id;
        if !graph.is_enabled(self.value) {
            self.times += 1;
            let repeats = graph.value_at(self.repeats, ctx) as u32;
            if repeats != 0 && self.times >= repeats {
                sync.enabled = false;
                return graph.value_at(self.value, ctx);
            }
            graph.start(self.value, time, ctx);
        }
        graph.value_at(self.value, ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomKind {
    Step,
    Linear,
}

/// `Random(from, to, length, type)` — type `step` holds a uniform sample
/// for `length`; type `linear` interpolates between the current and next
/// uniform sample.
pub struct Random {
    pub from: NodeId,
    pub to: NodeId,
    pub length: NodeId,
    pub kind: RandomKind,
    current: f64,
    next: f64,
    segment_start: f64,
}

impl Random {
    pub fn new(from: NodeId, to: NodeId, length: NodeId, kind: RandomKind) -> Self {
        Self {
            from,
            to,
            length,
            kind,
            current: 0.0,
            next: 0.0,
            segment_start: 0.0,
        }
    }

    pub fn on_start(&mut self, graph: &mut Graph, time: f64, ctx: &RuntimeContext) {
        graph.start(self.from, time, ctx);
        graph.start(self.to, time, ctx);
        graph.start(self.length, time, ctx);
        let from = graph.value_at(self.from, ctx);
        let to = graph.value_at(self.to, ctx);
        self.current = ctx.uniform(from, to);
        self.next = ctx.uniform(from, to);
        self.segment_start = 0.0;
    }

    pub fn evaluate(&mut self, graph: &mut Graph, elapsed: f64, ctx: &RuntimeContext, _sync: &mut Sync) -> f64 {
        let length = graph.value_at(self.length, ctx).max(1e-9);
        while elapsed - self.segment_start >= length {
            self.segment_start += length;
            self.current = self.next;
            let from = graph.value_at(self.from, ctx);
            let to = graph.value_at(self.to, ctx);
            self.next = ctx.uniform(from, to);
        }
        match self.kind {
            RandomKind::Step => self.current,
            RandomKind::Linear => {
                let t = ((elapsed - self.segment_start) / length).clamp(0.0, 1.0);
                self.current + (self.next - self.current) * t
            }
        }
    }
}
