use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::{Graph, NodeId};
use crate::runtime::RuntimeContext;

/// What an event retriggers when it fires: either a graph node (reached via
/// `Graph::repeat`) or a standalone audio voice (reached by the caller,
/// since voices live outside the arena — see `advance`'s `fired_voices`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventTarget {
    Node(NodeId),
    Voice(u32),
}

fn quantize(value: f64, step: f64) -> f64 {
    if step > 0.0 {
        (value / step).round() * step
    } else {
        value
    }
}

/// What happens when an event fires and how (if at all) it reschedules
/// itself.
pub enum EventKind {
    /// Fires forever at a fixed interval.
    Repeated { target: EventTarget, interval: f64 },
    /// Fires forever, redrawing a uniform interval in `[min, max]` each
    /// time, quantized to `step` (no quantization when `step <= 0`).
    RandomRepeated { target: EventTarget, min: f64, max: f64, step: f64 },
    /// Fires `remaining` more times at a fixed interval, then stops.
    Interval { target: EventTarget, interval: f64, remaining: u32 },
    /// Fires `remaining` more times, redrawing a uniform interval each time,
    /// quantized to `step`.
    RandomInterval { target: EventTarget, min: f64, max: f64, step: f64, remaining: u32 },
    /// Cycles through a fixed list of intervals, wrapping around forever.
    Rhythm { target: EventTarget, pattern: Vec<f64>, step: usize },
}

struct ScheduledEvent {
    due: f64,
    seq: u64,
    discarded: bool,
    kind: EventKind,
}

/// Entries compare by due time, breaking ties by insertion order so two
/// events scheduled for the same instant fire in the order they were
/// queued. `BinaryHeap` is a max-heap, so ordering is reversed to make
/// the earliest-due event pop first.
struct HeapEntry {
    due: f64,
    seq: u64,
    id: u32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .partial_cmp(&self.due)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of pending events, keyed by next fire time. Cancelled events
/// are marked discarded rather than removed, since a `BinaryHeap` has no
/// cheap arbitrary-removal operation; they are skipped when popped.
pub struct EventQueue {
    heap: BinaryHeap<HeapEntry>,
    slots: Vec<Option<ScheduledEvent>>,
    next_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventId(pub u32);

impl EventQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            slots: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn schedule(&mut self, due: f64, kind: EventKind) -> EventId {
        let id = self.slots.len() as u32;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.push(Some(ScheduledEvent {
            due,
            seq,
            discarded: false,
            kind,
        }));
        self.heap.push(HeapEntry { due, seq, id });
        EventId(id)
    }

    pub fn discard(&mut self, id: EventId) {
        if let Some(event) = self.slots[id.0 as usize].as_mut() {
            event.discarded = true;
        }
    }

    fn reschedule(&mut self, id: u32, due: f64) {
        if let Some(event) = self.slots[id as usize].as_mut() {
            event.due = due;
            let seq = self.next_seq;
            self.next_seq += 1;
            event.seq = seq;
            self.heap.push(HeapEntry { due, seq, id });
        }
    }

    /// Fires every event due at or before `time`, rescheduling the ones
    /// that repeat. Events targeting a standalone voice append their voice
    /// index to `fired_voices` rather than touching the graph directly —
    /// the caller owns the voice list and retriggers it from there.
    pub fn advance(&mut self, graph: &mut Graph, ctx: &RuntimeContext, time: f64, fired_voices: &mut Vec<u32>) {
        while let Some(top) = self.heap.peek() {
            if top.due > time {
                break;
            }
            let entry = self.heap.pop().unwrap();
            let discarded = self.slots[entry.id as usize].as_ref().map(|e| e.discarded).unwrap_or(true);
            if discarded {
                continue;
            }
            // Stale heap entry left behind by an earlier reschedule.
            let live_due = self.slots[entry.id as usize].as_ref().map(|e| e.due);
            if live_due != Some(entry.due) {
                continue;
            }
            self.fire(graph, ctx, entry.id, entry.due, fired_voices);
        }
    }

    fn retrigger(graph: &mut Graph, ctx: &RuntimeContext, target: EventTarget, due: f64, fired_voices: &mut Vec<u32>) {
        match target {
            EventTarget::Node(id) => graph.repeat(id, due, ctx),
            EventTarget::Voice(index) => fired_voices.push(index),
        }
    }

    fn fire(&mut self, graph: &mut Graph, ctx: &RuntimeContext, id: u32, due: f64, fired_voices: &mut Vec<u32>) {
        let next_due = {
            let event = self.slots[id as usize].as_mut().expect("event slot vacated while scheduled");
            match &mut event.kind {
                EventKind::Repeated { target, interval } => {
                    Self::retrigger(graph, ctx, *target, due, fired_voices);
                    Some(due + *interval)
                }
                EventKind::RandomRepeated { target, min, max, step } => {
                    Self::retrigger(graph, ctx, *target, due, fired_voices);
                    Some(due + quantize(ctx.uniform(*min, *max), *step))
                }
                EventKind::Interval { target, interval, remaining } => {
                    Self::retrigger(graph, ctx, *target, due, fired_voices);
                    if *remaining > 1 {
                        *remaining -= 1;
                        Some(due + *interval)
                    } else {
                        None
                    }
                }
                EventKind::RandomInterval { target, min, max, step, remaining } => {
                    Self::retrigger(graph, ctx, *target, due, fired_voices);
                    if *remaining > 1 {
                        *remaining -= 1;
                        Some(due + quantize(ctx.uniform(*min, *max), *step))
                    } else {
                        None
                    }
                }
                EventKind::Rhythm { target, pattern, step } => {
                    Self::retrigger(graph, ctx, *target, due, fired_voices);
                    if pattern.is_empty() {
                        None
                    } else {
                        let interval = pattern[*step];
                        *step = (*step + 1) % pattern.len();
                        Some(due + interval)
                    }
                }
            }
        };
        match next_due {
            Some(next) => self.reschedule(id, next),
            None => self.discard(EventId(id)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_event_reschedules_itself() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let target = graph.number(1.0);
        graph.start(target, 0.0, &ctx);
        let mut queue = EventQueue::new();
        let mut fired = Vec::new();
        queue.schedule(1.0, EventKind::Repeated { target: EventTarget::Node(target), interval: 1.0 });
        queue.advance(&mut graph, &ctx, 0.5, &mut fired);
        assert!(!queue.is_empty());
        queue.advance(&mut graph, &ctx, 1.0, &mut fired);
        assert!(!queue.is_empty());
    }

    #[test]
    fn bounded_interval_event_discards_after_its_count() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let target = graph.number(1.0);
        graph.start(target, 0.0, &ctx);
        let mut queue = EventQueue::new();
        let mut fired = Vec::new();
        queue.schedule(1.0, EventKind::Interval { target: EventTarget::Node(target), interval: 1.0, remaining: 2 });
        queue.advance(&mut graph, &ctx, 1.0, &mut fired);
        assert!(!queue.is_empty());
        queue.advance(&mut graph, &ctx, 2.0, &mut fired);
        assert!(queue.is_empty());
    }

    #[test]
    fn discarded_event_does_not_fire() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let target = graph.number(1.0);
        graph.start(target, 0.0, &ctx);
        let mut queue = EventQueue::new();
        let mut fired = Vec::new();
        let id = queue.schedule(1.0, EventKind::Repeated { target: EventTarget::Node(target), interval: 1.0 });
        queue.discard(id);
        queue.advance(&mut graph, &ctx, 2.0, &mut fired);
        assert!(queue.is_empty());
    }

    #[test]
    fn voice_target_reports_through_fired_voices_instead_of_the_graph() {
        let mut graph = Graph::new();
        let ctx = RuntimeContext::default_audio();
        let mut queue = EventQueue::new();
        let mut fired = Vec::new();
        queue.schedule(1.0, EventKind::Interval { target: EventTarget::Voice(3), interval: 1.0, remaining: 1 });
        queue.advance(&mut graph, &ctx, 1.0, &mut fired);
        assert_eq!(fired, vec![3]);
        assert!(queue.is_empty());
    }
}
