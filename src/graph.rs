use crate::controller::{Hold, Lfo, Random, Repeat, Sequence, SequenceOrder, Sweep};
use crate::runtime::RuntimeContext;

/// Index into a [`Graph`]'s arena. The arena never deallocates (it lives
/// for the whole program run), cycles are excluded statically by the
/// parser's recursion check, so a bare index is always valid — no
/// generation counter is needed (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// The start/repeat/stop lifecycle shared by every node in the graph
/// (§3 `Sync` lifecycle invariants).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sync {
    pub enabled: bool,
    pub start_time: f64,
    pub repeat_time: f64,
}

impl Sync {
    pub fn new() -> Self {
        Self::default()
    }
}

pub enum ValueKind {
    Number(f64),
    Time,
    List(Vec<NodeId>),
    /// Wraps another node, tracking its own lifetime (stop-when-inner-stops)
    /// independent of whoever else also reads the inner node.
    Variable { target: NodeId, last: f64 },
    Hold(Hold),
    Sweep(Sweep),
    Lfo(Lfo),
    Sequence(Sequence),
    Repeat(Repeat),
    Random(Random),
    Add(NodeId, NodeId),
    Subtract(NodeId, NodeId),
    Multiply(NodeId, NodeId),
    Divide(NodeId, NodeId),
    Power(NodeId, NodeId),
    Equal(NodeId, NodeId),
    Less(NodeId, NodeId),
    Greater(NodeId, NodeId),
    LessEqual(NodeId, NodeId),
    GreaterEqual(NodeId, NodeId),
    Limit { value: NodeId, min: NodeId, max: NodeId },
    If { condition: NodeId, then_value: NodeId, else_value: NodeId },
    Trigger { condition: NodeId, value: NodeId },
    /// Doesn't start `value` until `elapsed >= time`; reads as 0 until then.
    Delay { value: NodeId, time: NodeId, started: bool },
    AllOf(Vec<NodeId>),
    AnyOf(Vec<NodeId>),
    NoneOf(Vec<NodeId>),
    MinOf(Vec<NodeId>),
    MaxOf(Vec<NodeId>),
    /// `mode`: 0 nearest, 1 up, 2 down — matches `EnumLiteral`'s declared order.
    Round { value: NodeId, mode: NodeId },
}

pub struct ValueNode {
    pub sync: Sync,
    pub kind: ValueKind,
    pub last_value: f64,
}

impl ValueNode {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            sync: Sync::new(),
            kind,
            last_value: 0.0,
        }
    }
}

/// Arena of runtime value nodes. Evaluation takes a node out of its slot,
/// computes using ordinary recursive calls into the (now-unborrowed)
/// arena, then puts it back — the same take/mutate/put-back shape
/// `unified_graph.rs::eval_node` uses to satisfy the borrow checker while
/// walking a self-referential node graph.
pub struct Graph {
    slots: Vec<Option<ValueNode>>,
}

impl Graph {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn insert(&mut self, kind: ValueKind) -> NodeId {
        let id = self.slots.len() as u32;
        self.slots.push(Some(ValueNode::new(kind)));
        NodeId(id)
    }

    pub fn number(&mut self, value: f64) -> NodeId {
        self.insert(ValueKind::Number(value))
    }

    fn take(&mut self, id: NodeId) -> ValueNode {
        self.slots[id.0 as usize]
            .take()
            .expect("node evaluated reentrantly")
    }

    fn put_back(&mut self, id: NodeId, node: ValueNode) {
        self.slots[id.0 as usize] = Some(node);
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.slots[id.0 as usize].as_ref().map(|n| n.sync.enabled).unwrap_or(false)
    }

    pub fn start_time(&self, id: NodeId) -> f64 {
        self.slots[id.0 as usize].as_ref().map(|n| n.sync.start_time).unwrap_or(0.0)
    }

    /// `start(t)` with `enabled=false` sets `startTime=repeatTime=t`,
    /// `enabled=true`, and runs a one-shot `init` that recursively starts
    /// children. `start` while already enabled is a no-op.
    pub fn start(&mut self, id: NodeId, time: f64, ctx: &RuntimeContext) {
        let mut node = self.take(id);
        if !node.sync.enabled {
            node.sync.enabled = true;
            node.sync.start_time = time;
            node.sync.repeat_time = time;
            self.init(id, &mut node, time, ctx);
        }
        self.put_back(id, node);
    }

    /// `repeat(t)` sets `repeatTime=t` and reinitializes without touching
    /// `enabled`.
    pub fn repeat(&mut self, id: NodeId, time: f64, ctx: &RuntimeContext) {
        let mut node = self.take(id);
        node.sync.repeat_time = time;
        self.reinit(id, &mut node, time, ctx);
        self.put_back(id, node);
    }

    pub fn stop(&mut self, id: NodeId) {
        if let Some(node) = self.slots[id.0 as usize].as_mut() {
            node.sync.enabled = false;
        }
    }

    fn init(&mut self, id: NodeId, node: &mut ValueNode, time: f64, ctx: &RuntimeContext) {
        match &mut node.kind {
            ValueKind::Variable { target, .. } => self.start(*target, time, ctx),
            ValueKind::Hold(h) => {
                self.start(h.value, time, ctx);
                self.start(h.length, time, ctx);
            }
            ValueKind::Sweep(s) => {
                self.start(s.from, time, ctx);
                self.start(s.to, time, ctx);
                self.start(s.length, time, ctx);
            }
            ValueKind::Lfo(l) => {
                self.start(l.from, time, ctx);
                self.start(l.to, time, ctx);
                self.start(l.length, time, ctx);
            }
            ValueKind::Sequence(seq) => seq.on_start(self, time, ctx),
            ValueKind::Repeat(r) => {
                self.start(r.value, time, ctx);
                self.start(r.repeats, time, ctx);
            }
            ValueKind::Random(r) => r.on_start(self, time, ctx),
            ValueKind::Add(a, b)
            | ValueKind::Subtract(a, b)
            | ValueKind::Multiply(a, b)
            | ValueKind::Divide(a, b)
            | ValueKind::Power(a, b)
            | ValueKind::Equal(a, b)
            | ValueKind::Less(a, b)
            | ValueKind::Greater(a, b)
            | ValueKind::LessEqual(a, b)
            | ValueKind::GreaterEqual(a, b) => {
                self.start(*a, time, ctx);
                self.start(*b, time, ctx);
            }
            ValueKind::Limit { value, min, max } => {
                self.start(*value, time, ctx);
                self.start(*min, time, ctx);
                self.start(*max, time, ctx);
            }
            ValueKind::If { condition, then_value, else_value } => {
                self.start(*condition, time, ctx);
                self.start(*then_value, time, ctx);
                self.start(*else_value, time, ctx);
            }
            ValueKind::Trigger { condition, value } => {
                self.start(*condition, time, ctx);
                self.start(*value, time, ctx);
            }
            ValueKind::Delay { time: length, .. } => self.start(*length, time, ctx),
            ValueKind::AllOf(nodes) | ValueKind::AnyOf(nodes) | ValueKind::NoneOf(nodes) | ValueKind::MinOf(nodes) | ValueKind::MaxOf(nodes) => {
                for &node_id in nodes.iter() {
                    self.start(node_id, time, ctx);
                }
            }
            ValueKind::Round { value, mode } => {
                self.start(*value, time, ctx);
                self.start(*mode, time, ctx);
            }
            ValueKind::Number(_) | ValueKind::Time | ValueKind::List(_) => {}
        }
        let _ = id;
    }

    fn reinit(&mut self, _id: NodeId, node: &mut ValueNode, time: f64, ctx: &RuntimeContext) {
        match &mut node.kind {
            ValueKind::Sequence(seq) => seq.on_repeat(self, time, ctx),
            ValueKind::Repeat(r) => {
                self.start(r.value, time, ctx);
                self.start(r.repeats, time, ctx);
            }
            _ => {}
        }
    }

    /// The node's natural duration in seconds, or `+inf` for nodes with no
    /// end (bare oscillators, raw `Value`, arithmetic over infinite children).
    pub fn sync_length(&mut self, id: NodeId, ctx: &RuntimeContext) -> f64 {
        let node = self.take(id);
        let length = match &node.kind {
            ValueKind::Hold(h) => self.value_at(h.length, ctx),
            ValueKind::Sweep(s) => self.value_at(s.length, ctx),
            ValueKind::Lfo(l) => self.value_at(l.length, ctx),
            ValueKind::Sequence(seq) => seq.sync_length(self, ctx),
            ValueKind::Repeat(r) => r.sync_length(self, ctx),
            ValueKind::Random(_) => f64::INFINITY,
            ValueKind::Variable { target, .. } => self.sync_length(*target, ctx),
            ValueKind::Limit { value, .. } | ValueKind::Trigger { value, .. } => self.sync_length(*value, ctx),
            ValueKind::Delay { value, time, .. } => self.value_at(*time, ctx) + self.sync_length(*value, ctx),
            _ => f64::INFINITY,
        };
        self.put_back(id, node);
        length
    }

    /// Computes the current value at the context's clock, handing back a
    /// node's last-produced value once it reports `!enabled` — the
    /// handoff a `Sequence` relies on between successive children.
    pub fn value_at(&mut self, id: NodeId, ctx: &RuntimeContext) -> f64 {
        let mut node = self.take(id);
        if !node.sync.enabled {
            self.put_back(id, node);
            return self.last_value(id).unwrap_or(0.0);
        }
        let time = ctx.clock();
        let elapsed = time - node.sync.start_time;
        let value = match &mut node.kind {
            ValueKind::Number(v) => *v,
            ValueKind::Time => time,
            ValueKind::List(_) => 0.0,
            ValueKind::Variable { target, last } => {
                let v = self.value_at(*target, ctx);
                if !self.is_enabled(*target) {
                    node.sync.enabled = false;
                }
                *last = v;
                v
            }
            ValueKind::Hold(h) => h.evaluate(self, id, elapsed, ctx, &mut node.sync),
            ValueKind::Sweep(s) => s.evaluate(self, elapsed, ctx, &mut node.sync),
            ValueKind::Lfo(l) => l.evaluate(self, elapsed, ctx, &mut node.sync),
            ValueKind::Sequence(seq) => seq.evaluate(self, time, ctx, &mut node.sync),
            ValueKind::Repeat(r) => r.evaluate(self, id, time, ctx, &mut node.sync),
            ValueKind::Random(r) => r.evaluate(self, elapsed, ctx, &mut node.sync),
            ValueKind::Add(a, b) => self.value_at(*a, ctx) + self.value_at(*b, ctx),
            ValueKind::Subtract(a, b) => self.value_at(*a, ctx) - self.value_at(*b, ctx),
            ValueKind::Multiply(a, b) => self.value_at(*a, ctx) * self.value_at(*b, ctx),
            ValueKind::Divide(a, b) => self.value_at(*a, ctx) / self.value_at(*b, ctx),
            ValueKind::Power(a, b) => self.value_at(*a, ctx).powf(self.value_at(*b, ctx)),
            ValueKind::Equal(a, b) => bool_f64(self.value_at(*a, ctx) == self.value_at(*b, ctx)),
            ValueKind::Less(a, b) => bool_f64(self.value_at(*a, ctx) < self.value_at(*b, ctx)),
            ValueKind::Greater(a, b) => bool_f64(self.value_at(*a, ctx) > self.value_at(*b, ctx)),
            ValueKind::LessEqual(a, b) => bool_f64(self.value_at(*a, ctx) <= self.value_at(*b, ctx)),
            ValueKind::GreaterEqual(a, b) => bool_f64(self.value_at(*a, ctx) >= self.value_at(*b, ctx)),
            ValueKind::Limit { value, min, max } => {
                let v = self.value_at(*value, ctx);
                let lo = self.value_at(*min, ctx);
                let hi = self.value_at(*max, ctx);
                v.clamp(lo.min(hi), lo.max(hi))
            }
            ValueKind::If { condition, then_value, else_value } => {
                if self.value_at(*condition, ctx) != 0.0 {
                    self.value_at(*then_value, ctx)
                } else {
                    self.value_at(*else_value, ctx)
                }
            }
            ValueKind::Trigger { condition, value } => {
                if self.value_at(*condition, ctx) != 0.0 {
                    self.value_at(*value, ctx)
                } else {
                    0.0
                }
            }
            ValueKind::Delay { value, time: length, started } => {
                if !*started && elapsed >= self.value_at(*length, ctx) {
                    *started = true;
                    self.start(*value, time, ctx);
                }
                if *started {
                    self.value_at(*value, ctx)
                } else {
                    0.0
                }
            }
            ValueKind::AllOf(nodes) => {
                let nodes = nodes.clone();
                bool_f64(nodes.iter().all(|&n| self.value_at(n, ctx) != 0.0))
            }
            ValueKind::AnyOf(nodes) => {
                let nodes = nodes.clone();
                bool_f64(nodes.iter().any(|&n| self.value_at(n, ctx) != 0.0))
            }
            ValueKind::NoneOf(nodes) => {
                let nodes = nodes.clone();
                bool_f64(nodes.iter().all(|&n| self.value_at(n, ctx) == 0.0))
            }
            ValueKind::MinOf(nodes) => {
                let nodes = nodes.clone();
                nodes.iter().map(|&n| self.value_at(n, ctx)).fold(f64::INFINITY, f64::min)
            }
            ValueKind::MaxOf(nodes) => {
                let nodes = nodes.clone();
                nodes.iter().map(|&n| self.value_at(n, ctx)).fold(f64::NEG_INFINITY, f64::max)
            }
            ValueKind::Round { value, mode } => {
                let v = self.value_at(*value, ctx);
                let m = self.value_at(*mode, ctx);
                if m == 1.0 {
                    v.ceil()
                } else if m == 2.0 {
                    v.floor()
                } else {
                    v.round()
                }
            }
        };
        node.last_value = value;
        self.put_back(id, node);
        value
    }

    fn last_value(&self, id: NodeId) -> Option<f64> {
        self.slots[id.0 as usize].as_ref().map(|n| n.last_value)
    }

    /// The children of a `List` node, or `None` if `id` isn't one. Used by
    /// native calls (`sequence`, `all`, `sample`'s `grains`, ...) that take
    /// a `[...]` literal as one of their arguments.
    pub fn list_children(&self, id: NodeId) -> Option<Vec<NodeId>> {
        self.slots[id.0 as usize].as_ref().and_then(|n| match &n.kind {
            ValueKind::List(ids) => Some(ids.clone()),
            _ => None,
        })
    }

    /// The literal value of a `Number` node, or `None` for anything else.
    /// Used to read constant-only arguments (enum tags, resource indices
    /// expressed as numbers) without going through the `Sync` lifecycle.
    pub fn number_value(&self, id: NodeId) -> Option<f64> {
        self.slots[id.0 as usize].as_ref().and_then(|n| match &n.kind {
            ValueKind::Number(v) => Some(*v),
            _ => None,
        })
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

fn bool_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_node_is_constant_once_started() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let n = graph.number(42.0);
        graph.start(n, 0.0, &ctx);
        assert_eq!(graph.value_at(n, &ctx), 42.0);
    }

    #[test]
    fn disabled_node_returns_last_value() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let n = graph.number(7.0);
        graph.start(n, 0.0, &ctx);
        graph.value_at(n, &ctx);
        graph.stop(n);
        assert_eq!(graph.value_at(n, &ctx), 7.0);
    }
}
