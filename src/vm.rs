//! The bytecode interpreter (§4.4). `Vm::new` loads a decoded
//! [`BytecodeContainer`] and `run` executes its entry block once, which
//! walks every top-level `play`/`perform`/assignment in the program and
//! builds the runtime structures (`Graph` nodes, `AudioSourceNode`
//! voices, scheduled events) they describe. Playback afterwards is
//! driven by repeatedly calling `advance` and `mix_into` as the clock
//! moves forward — the bytecode itself never runs again.
//!
//! The original machine.cpp never implements real dispatch (its
//! `execute()` only advances the instruction pointer through 0x00-0x07
//! without constructing anything), so the native-call bodies here are
//! built directly from §4.3/§4.4/§6 against the already-written
//! `graph`/`controller`/`audio_source`/`event` modules rather than
//! ported from source.

use std::cell::RefCell;
use std::rc::Rc;

use crate::audio_source::{AudioSourceNode, Noise, Oscillator, Sample, SourceKind, Waveform};
use crate::bytecode::{native, opcode};
use crate::bytecode_reader::BytecodeContainer;
use crate::controller::{Hold, Lfo, Random, RandomKind, Repeat, Sequence, SequenceOrder, Sweep};
use crate::error::{OrganicError, OrganicResult};
use crate::event::{EventKind, EventQueue, EventTarget};
use crate::graph::{Graph, NodeId, ValueKind};
use crate::runtime::RuntimeContext;

/// A value on the VM's operand stack. Controllers and arithmetic all
/// ultimately resolve to a [`NodeId`] in the `Graph`; audio sources are
/// kept out of the arena (they carry their own `Sync` — see
/// `audio_source.rs`) and shared through an `Rc<RefCell<_>>` so a
/// variable holding one and the `voices` list it eventually lands in can
/// alias the same instance.
#[derive(Clone)]
enum Object {
    Number(f64),
    Node(NodeId),
    Resource(u8),
    Source(Rc<RefCell<AudioSourceNode>>),
    Default,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn read_f64(bytes: &[u8], at: usize) -> f64 {
    f64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

pub struct Vm {
    graph: Graph,
    resources: Vec<crate::bytecode::ResourceBlock>,
    program: Vec<u8>,
    entry_offset: u32,
    variables: Vec<Object>,
    voices: Vec<Rc<RefCell<AudioSourceNode>>>,
    events: EventQueue,
    stack: Vec<Object>,
}

impl Vm {
    pub fn new(container: BytecodeContainer) -> Self {
        Self {
            graph: Graph::new(),
            resources: container.resources,
            program: container.program,
            entry_offset: container.entry_offset,
            variables: vec![Object::Default; container.variable_count as usize],
            voices: Vec::new(),
            events: EventQueue::new(),
            stack: Vec::new(),
        }
    }

    /// Runs the entry block once, constructing every `play`/`perform`
    /// target it reaches. Must be called before `advance`/`mix_into`.
    pub fn run(&mut self, ctx: &RuntimeContext) -> OrganicResult<()> {
        let entry = self.entry_offset;
        self.execute(entry, ctx)?;
        self.stack.clear();
        Ok(())
    }

    /// Fires any events due at `time`, retriggering their graph node or
    /// voice target.
    pub fn advance(&mut self, ctx: &RuntimeContext, time: f64) {
        let mut fired_voices = Vec::new();
        self.events.advance(&mut self.graph, ctx, time, &mut fired_voices);
        for index in fired_voices {
            if let Some(voice) = self.voices.get(index as usize) {
                voice.borrow_mut().restart(&mut self.graph, ctx, time);
            }
        }
    }

    pub fn has_pending_work(&self) -> bool {
        !self.events.is_empty() || self.voices.iter().any(|v| v.borrow().is_active())
    }

    /// Additively mixes every active voice into `output` (an interleaved
    /// buffer of `ctx.channels` channels, `frames` frames long) and
    /// applies the master volume.
    pub fn mix_into(&mut self, ctx: &RuntimeContext, output: &mut [f32], frames: usize) {
        for sample in output.iter_mut() {
            *sample = 0.0;
        }
        for voice in &self.voices {
            if voice.borrow().is_active() {
                voice.borrow_mut().fill_buffer(&self.resources, &mut self.graph, ctx, output, frames);
            }
        }
        let volume = ctx.volume() as f32;
        for sample in output.iter_mut() {
            *sample *= volume;
        }
    }

    fn execute(&mut self, mut pc: u32, ctx: &RuntimeContext) -> OrganicResult<()> {
        loop {
            let op = *self
                .program
                .get(pc as usize)
                .ok_or_else(|| OrganicError::machine("program counter ran off the end of the bytecode"))?;
            pc += 1;
            match op {
                opcode::RETURN => return Ok(()),
                opcode::STACK_PUSH_DEFAULT => {
                    self.stack.push(Object::Default);
                }
                opcode::STACK_PUSH_BYTE => {
                    let b = self.program[pc as usize];
                    pc += 1;
                    self.stack.push(Object::Number(b as f64));
                }
                opcode::STACK_PUSH_INT => {
                    let v = read_u32(&self.program, pc as usize);
                    pc += 4;
                    self.stack.push(Object::Number(v as f64));
                }
                opcode::STACK_PUSH_DOUBLE => {
                    let v = read_f64(&self.program, pc as usize);
                    pc += 8;
                    self.stack.push(Object::Number(v));
                }
                opcode::STACK_PUSH_ADDRESS => {
                    // No native op currently consumes a pushed address;
                    // the format supports it (§4.3) but `perform`'s
                    // action argument is evaluated eagerly instead (see
                    // `call_perform`), so this just keeps the stack
                    // depth consistent with the instruction's presence.
                    let offset = read_u32(&self.program, pc as usize);
                    pc += 4;
                    self.stack.push(Object::Number(offset as f64));
                }
                opcode::STACK_PUSH_RESOURCE => {
                    let i = self.program[pc as usize];
                    pc += 1;
                    self.stack.push(Object::Resource(i));
                }
                opcode::SET_VARIABLE => {
                    let slot = self.program[pc as usize];
                    pc += 1;
                    let value = self.stack.pop().ok_or_else(|| OrganicError::machine("stack underflow in SET_VARIABLE"))?;
                    self.variables[slot as usize] = value;
                }
                opcode::GET_VARIABLE => {
                    let slot = self.program[pc as usize];
                    pc += 1;
                    let stored = self.variables[slot as usize].clone();
                    self.stack.push(self.read_variable(stored));
                }
                opcode::CALL_NATIVE => {
                    let native_op = self.program[pc as usize];
                    let arity = self.program[pc as usize + 1];
                    pc += 2;
                    self.call_native(native_op, arity, ctx)?;
                }
                opcode::CALL_USER => {
                    let block = read_u32(&self.program, pc as usize);
                    pc += 4;
                    let _arity = self.program[pc as usize];
                    pc += 1;
                    self.call_user(block, ctx)?;
                }
                other => return Err(OrganicError::machine(format!("invalid opcode 0x{other:02x}"))),
            }
        }
    }

    /// A fresh reference to a stored value. For a graph node this wraps
    /// it in a `Variable`, which tracks its own stop-when-inner-stops
    /// lifetime independent of any other reference to the same node
    /// (§3) — two `GET_VARIABLE`s of the same controller don't share
    /// one lifetime.
    fn read_variable(&mut self, stored: Object) -> Object {
        match stored {
            Object::Node(target) => Object::Node(self.graph.insert(ValueKind::Variable { target, last: 0.0 })),
            other => other,
        }
    }

    fn call_user(&mut self, block_offset: u32, ctx: &RuntimeContext) -> OrganicResult<()> {
        // Function parameters and top-level assignments are drawn from
        // one global slot table (see `Emitter::variable_slot`), so a
        // recursive call would otherwise clobber its own caller's
        // locals. Saving and restoring the whole frame around the call
        // is the cheapest way to make that safe without a real
        // per-call frame.
        let saved = self.variables.clone();
        self.execute(block_offset, ctx)?;
        self.variables = saved;
        Ok(())
    }

    fn pop_n(&mut self, n: u8) -> OrganicResult<Vec<Object>> {
        let n = n as usize;
        if self.stack.len() < n {
            return Err(OrganicError::machine("stack underflow in CALL_NATIVE"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn as_node(&mut self, obj: Object, default: f64) -> NodeId {
        match obj {
            Object::Node(id) => id,
            Object::Number(v) => self.graph.number(v),
            _ => self.graph.number(default),
        }
    }

    /// Evaluates `obj` once at `now`, for arguments that configure a
    /// node's shape (enum tags, resource-relative indices, loop flags)
    /// rather than driving its per-sample output.
    fn scalar(&mut self, ctx: &RuntimeContext, now: f64, obj: Object, default: f64) -> f64 {
        match obj {
            Object::Number(v) => v,
            Object::Node(id) => {
                self.graph.start(id, now, ctx);
                self.graph.value_at(id, ctx)
            }
            _ => default,
        }
    }

    fn scalar_opt(&mut self, ctx: &RuntimeContext, now: f64, obj: Object) -> Option<f64> {
        match obj {
            Object::Default => None,
            other => Some(self.scalar(ctx, now, other, 0.0)),
        }
    }

    fn list_nodes(&self, obj: &Object) -> Vec<NodeId> {
        match obj {
            Object::Node(id) => self.graph.list_children(*id).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn list_numbers_opt(&mut self, ctx: &RuntimeContext, now: f64, obj: Object) -> Option<Vec<f64>> {
        if matches!(obj, Object::Default) {
            return None;
        }
        let ids = self.list_nodes(&obj);
        Some(ids.into_iter().map(|id| self.scalar(ctx, now, Object::Node(id), 0.0)).collect())
    }

    fn call_native(&mut self, op: u8, arity: u8, ctx: &RuntimeContext) -> OrganicResult<()> {
        let now = ctx.clock();
        let result = match op {
            native::LIST => {
                let args = self.pop_n(arity)?;
                let ids = args.into_iter().map(|a| self.as_node(a, 0.0)).collect();
                Object::Node(self.graph.insert(ValueKind::List(ids)))
            }
            native::TIME => Object::Node(self.graph.insert(ValueKind::Time)),
            native::ADD | native::SUBTRACT | native::MULTIPLY | native::DIVIDE | native::POWER | native::EQUAL | native::LESS
            | native::GREATER | native::LESSEQUAL | native::GREATEREQUAL => {
                let mut args = self.pop_n(2)?.into_iter();
                let a = self.as_node(args.next().unwrap(), 0.0);
                let b = self.as_node(args.next().unwrap(), 0.0);
                let kind = match op {
                    native::ADD => ValueKind::Add(a, b),
                    native::SUBTRACT => ValueKind::Subtract(a, b),
                    native::MULTIPLY => ValueKind::Multiply(a, b),
                    native::DIVIDE => ValueKind::Divide(a, b),
                    native::POWER => ValueKind::Power(a, b),
                    native::EQUAL => ValueKind::Equal(a, b),
                    native::LESS => ValueKind::Less(a, b),
                    native::GREATER => ValueKind::Greater(a, b),
                    native::LESSEQUAL => ValueKind::LessEqual(a, b),
                    _ => ValueKind::GreaterEqual(a, b),
                };
                Object::Node(self.graph.insert(kind))
            }
            native::ALL | native::ANY | native::NONE | native::MIN | native::MAX => {
                let values = self.pop_n(1)?.into_iter().next().unwrap();
                let ids = self.list_nodes(&values);
                let kind = match op {
                    native::ALL => ValueKind::AllOf(ids),
                    native::ANY => ValueKind::AnyOf(ids),
                    native::NONE => ValueKind::NoneOf(ids),
                    native::MIN => ValueKind::MinOf(ids),
                    _ => ValueKind::MaxOf(ids),
                };
                Object::Node(self.graph.insert(kind))
            }
            native::ROUND => {
                let mut args = self.pop_n(2)?.into_iter();
                let value = self.as_node(args.next().unwrap(), 0.0);
                let mode = self.as_node(args.next().unwrap(), 0.0);
                Object::Node(self.graph.insert(ValueKind::Round { value, mode }))
            }
            native::SINE | native::SQUARE | native::TRIANGLE | native::SAW => self.call_oscillator(op, arity, ctx, now)?,
            native::NOISE => {
                let mut args = self.pop_n(2)?.into_iter();
                let volume = self.as_node(args.next().unwrap(), 1.0);
                let pan = self.as_node(args.next().unwrap(), 0.0);
                let node = AudioSourceNode::new(SourceKind::Noise(Noise), volume, pan);
                Object::Source(Rc::new(RefCell::new(node)))
            }
            native::SAMPLE => self.call_sample(ctx, now)?,
            native::HOLD => {
                let mut args = self.pop_n(2)?.into_iter();
                let value = self.as_node(args.next().unwrap(), 0.0);
                let length = self.as_node(args.next().unwrap(), f64::INFINITY);
                Object::Node(self.graph.insert(ValueKind::Hold(Hold::new(value, length))))
            }
            native::SWEEP => {
                let mut args = self.pop_n(3)?.into_iter();
                let from = self.as_node(args.next().unwrap(), 0.0);
                let to = self.as_node(args.next().unwrap(), 0.0);
                let length = self.as_node(args.next().unwrap(), 1.0);
                Object::Node(self.graph.insert(ValueKind::Sweep(Sweep::new(from, to, length))))
            }
            native::LFO => {
                let mut args = self.pop_n(3)?.into_iter();
                let from = self.as_node(args.next().unwrap(), 0.0);
                let to = self.as_node(args.next().unwrap(), 1.0);
                let length = self.as_node(args.next().unwrap(), 1.0);
                Object::Node(self.graph.insert(ValueKind::Lfo(Lfo::new(from, to, length))))
            }
            native::SEQUENCE => {
                let mut args = self.pop_n(2)?.into_iter();
                let values_obj = args.next().unwrap();
                let values = self.list_nodes(&values_obj);
                let order_obj = args.next().unwrap();
                let order_num = self.scalar(ctx, now, order_obj, 0.0);
                let order = match order_num as i64 {
                    1 => SequenceOrder::Backwards,
                    2 => SequenceOrder::PingPong,
                    3 => SequenceOrder::Random,
                    _ => SequenceOrder::Forwards,
                };
                Object::Node(self.graph.insert(ValueKind::Sequence(Sequence::new(values, order))))
            }
            native::REPEAT => {
                let mut args = self.pop_n(2)?.into_iter();
                let value = self.as_node(args.next().unwrap(), 0.0);
                let repeats = self.as_node(args.next().unwrap(), 0.0);
                Object::Node(self.graph.insert(ValueKind::Repeat(Repeat::new(value, repeats))))
            }
            native::RANDOM => {
                let mut args = self.pop_n(4)?.into_iter();
                let from = self.as_node(args.next().unwrap(), 0.0);
                let to = self.as_node(args.next().unwrap(), 1.0);
                let length = self.as_node(args.next().unwrap(), 1.0);
                let kind_obj = args.next().unwrap();
                let kind = match self.scalar(ctx, now, kind_obj, 0.0) as i64 {
                    1 => RandomKind::Linear,
                    _ => RandomKind::Step,
                };
                Object::Node(self.graph.insert(ValueKind::Random(Random::new(from, to, length, kind))))
            }
            native::LIMIT => {
                let mut args = self.pop_n(3)?.into_iter();
                let value = self.as_node(args.next().unwrap(), 0.0);
                let min = self.as_node(args.next().unwrap(), 0.0);
                let max = self.as_node(args.next().unwrap(), 0.0);
                Object::Node(self.graph.insert(ValueKind::Limit { value, min, max }))
            }
            native::TRIGGER => {
                let mut args = self.pop_n(2)?.into_iter();
                let condition = self.as_node(args.next().unwrap(), 0.0);
                let value = self.as_node(args.next().unwrap(), 0.0);
                Object::Node(self.graph.insert(ValueKind::Trigger { condition, value }))
            }
            native::IF => {
                let mut args = self.pop_n(3)?.into_iter();
                let condition = self.as_node(args.next().unwrap(), 0.0);
                let then_value = self.as_node(args.next().unwrap(), 0.0);
                let else_value = self.as_node(args.next().unwrap(), 0.0);
                Object::Node(self.graph.insert(ValueKind::If { condition, then_value, else_value }))
            }
            native::DELAY => {
                let mut args = self.pop_n(2)?.into_iter();
                let value = self.as_node(args.next().unwrap(), 0.0);
                let time = self.as_node(args.next().unwrap(), 0.0);
                Object::Node(self.graph.insert(ValueKind::Delay { value, time, started: false }))
            }
            native::PLAY => {
                let value = self.pop_n(1)?.into_iter().next().unwrap();
                match value {
                    Object::Source(source) => {
                        source.borrow_mut().start(&mut self.graph, ctx, now);
                        self.voices.push(source);
                    }
                    other => {
                        let id = self.as_node(other, 0.0);
                        self.graph.start(id, now, ctx);
                    }
                }
                Object::Number(0.0)
            }
            native::PERFORM => self.call_perform(arity, ctx, now)?,
            other => return Err(OrganicError::machine(format!("unhandled native op 0x{other:02x}"))),
        };
        self.stack.push(result);
        Ok(())
    }

    /// `sine`/`square`/`triangle`/`saw` compile to a fixed 3-argument
    /// call; `oscillator(type: ...)` shares the `SINE` op id but carries
    /// a 4th argument selecting the waveform at this call's construction
    /// time (see `bytecode::native::id_for`'s comment on `Oscillator`).
    fn call_oscillator(&mut self, op: u8, arity: u8, ctx: &RuntimeContext, now: f64) -> OrganicResult<Object> {
        let (waveform, volume, frequency, pan) = if op == native::SINE && arity == 4 {
            let mut args = self.pop_n(4)?.into_iter();
            let volume = args.next().unwrap();
            let frequency = args.next().unwrap();
            let type_obj = args.next().unwrap();
            let pan = args.next().unwrap();
            let waveform = match self.scalar(ctx, now, type_obj, 0.0) as i64 {
                1 => Waveform::Square,
                2 => Waveform::Triangle,
                3 => Waveform::Saw,
                _ => Waveform::Sine,
            };
            (waveform, volume, frequency, pan)
        } else {
            let mut args = self.pop_n(3)?.into_iter();
            let volume = args.next().unwrap();
            let frequency = args.next().unwrap();
            let pan = args.next().unwrap();
            let waveform = match op {
                native::SQUARE => Waveform::Square,
                native::TRIANGLE => Waveform::Triangle,
                native::SAW => Waveform::Saw,
                _ => Waveform::Sine,
            };
            (waveform, volume, frequency, pan)
        };
        let volume_node = self.as_node(volume, 1.0);
        let frequency_node = self.as_node(frequency, 440.0);
        let pan_node = self.as_node(pan, 0.0);
        let osc = Oscillator::new(waveform, frequency_node);
        let node = AudioSourceNode::new(SourceKind::Oscillator(osc), volume_node, pan_node);
        Ok(Object::Source(Rc::new(RefCell::new(node))))
    }

    fn call_sample(&mut self, ctx: &RuntimeContext, now: f64) -> OrganicResult<Object> {
        let mut args = self.pop_n(5)?.into_iter();
        let resource = match args.next().unwrap() {
            Object::Resource(i) => i as usize,
            _ => return Err(OrganicError::machine("sample()'s resource operand must come from STACK_PUSH_RESOURCE")),
        };
        let volume = self.as_node(args.next().unwrap(), 1.0);
        let pan = self.as_node(args.next().unwrap(), 0.0);
        let looping = self.scalar(ctx, now, args.next().unwrap(), 0.0) != 0.0;
        let grains = self
            .list_numbers_opt(ctx, now, args.next().unwrap())
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.max(0.0) as usize)
            .collect();
        let sample = Sample::new(resource, grains, looping);
        let node = AudioSourceNode::new(SourceKind::Sample(sample), volume, pan);
        Ok(Object::Source(Rc::new(RefCell::new(node))))
    }

    fn call_perform(&mut self, arity: u8, ctx: &RuntimeContext, now: f64) -> OrganicResult<Object> {
        let mut args = self.pop_n(arity)?.into_iter();
        let action = args.next().unwrap();
        let delay_obj = args.next().unwrap();
        let interval_obj = args.next().unwrap();
        let floor_obj = args.next().unwrap();
        let ceiling_obj = args.next().unwrap();
        let step_obj = args.next().unwrap();
        let repeats_obj = args.next().unwrap();
        let rhythm_obj = args.next();

        // The action is evaluated once, the same way `play`'s argument
        // is: what repeats on every tick is the *retrigger* of the
        // resulting node or voice (`Graph::repeat`/`AudioSourceNode::
        // restart`), not a re-evaluation of the expression.
        let target = match action {
            Object::Source(source) => {
                source.borrow_mut().start(&mut self.graph, ctx, now);
                let index = self.voices.len() as u32;
                self.voices.push(source);
                EventTarget::Voice(index)
            }
            other => {
                let id = self.as_node(other, 0.0);
                self.graph.start(id, now, ctx);
                EventTarget::Node(id)
            }
        };

        let delay = self.scalar_opt(ctx, now, delay_obj).unwrap_or(0.0);
        let interval = self.scalar_opt(ctx, now, interval_obj);
        let floor = self.scalar_opt(ctx, now, floor_obj);
        let ceiling = self.scalar_opt(ctx, now, ceiling_obj);
        let step = self.scalar_opt(ctx, now, step_obj).unwrap_or(0.0);
        let repeats = self.scalar_opt(ctx, now, repeats_obj).unwrap_or(0.0) as u32;
        let rhythm = rhythm_obj.and_then(|o| self.list_numbers_opt(ctx, now, o));

        let due = now + delay;
        let kind = if let Some(pattern) = rhythm.filter(|p| !p.is_empty()) {
            EventKind::Rhythm { target, pattern, step: 0 }
        } else if let (Some(floor), Some(ceiling)) = (floor, ceiling) {
            if repeats == 0 {
                EventKind::RandomRepeated { target, min: floor, max: ceiling, step }
            } else {
                EventKind::RandomInterval { target, min: floor, max: ceiling, step, remaining: repeats }
            }
        } else {
            let interval = interval.unwrap_or(0.0);
            if repeats == 0 {
                EventKind::Repeated { target, interval }
            } else {
                EventKind::Interval { target, interval, remaining: repeats }
            }
        };
        self.events.schedule(due, kind);
        Ok(Object::Number(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::bytecode::Emitter;
    use crate::bytecode_reader;
    use crate::location::SourceLocation;
    use crate::parser;
    use std::io::Write;

    fn compile(source: &str) -> BytecodeContainer {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.organic");
        std::fs::File::create(&path).unwrap().write_all(source.as_bytes()).unwrap();
        let (program, _diagnostics) = parser::parse_program(&path).unwrap();
        let bytes = Emitter::new().emit_program(&program).unwrap();
        bytecode_reader::read(&bytes).unwrap()
    }

    #[test]
    fn empty_program_runs_to_completion() {
        let path: std::rc::Rc<str> = "t.organic".into();
        let node = Node::Program { instructions: Vec::new(), location: SourceLocation::start_of(path) };
        let bytes = Emitter::new().emit_program(&node).unwrap();
        let container = bytecode_reader::read(&bytes).unwrap();
        let mut vm = Vm::new(container);
        let ctx = RuntimeContext::default_audio();
        vm.run(&ctx).unwrap();
        assert!(!vm.has_pending_work());
    }

    #[test]
    fn playing_a_sine_produces_an_active_voice() {
        let container = compile("sine(volume: 1, frequency: 440)\n");
        let mut vm = Vm::new(container);
        let ctx = RuntimeContext::default_audio();
        vm.run(&ctx).unwrap();
        assert_eq!(vm.voices.len(), 1);
        assert!(vm.voices[0].borrow().is_active());
    }

    #[test]
    fn hold_assigned_to_a_variable_is_readable_through_get_variable() {
        let container = compile("x = hold(value: 5, length: 1)\nplay(value: sine(volume: x, frequency: 220))\n");
        let mut vm = Vm::new(container);
        let ctx = RuntimeContext::default_audio();
        vm.run(&ctx).unwrap();
        assert_eq!(vm.voices.len(), 1);
    }

    #[test]
    fn a_user_function_call_produces_a_usable_value() {
        let container = compile("double(n) = n * 2\nplay(value: sine(volume: 1, frequency: double(220)))\n");
        let mut vm = Vm::new(container);
        let ctx = RuntimeContext::default_audio();
        vm.run(&ctx).unwrap();
        assert_eq!(vm.voices.len(), 1);
        let freq = vm.voices[0].borrow().volume; // smoke: node exists, graph not empty
        let _ = freq;
    }

    #[test]
    fn perform_schedules_a_repeating_event() {
        let container = compile("perform(action: sine(volume: 1, frequency: 440), interval: 1)\n");
        let mut vm = Vm::new(container);
        let ctx = RuntimeContext::default_audio();
        vm.run(&ctx).unwrap();
        assert_eq!(vm.voices.len(), 1);
        assert!(!vm.events.is_empty());
    }

    #[test]
    fn bounded_perform_eventually_empties_the_queue() {
        let container = compile("perform(action: sine(volume: 1, frequency: 440), interval: 1, repeats: 1)\n");
        let mut vm = Vm::new(container);
        let ctx = RuntimeContext::default_audio();
        vm.run(&ctx).unwrap();
        ctx.advance_clock(1.0);
        vm.advance(&ctx, ctx.clock());
        assert!(vm.events.is_empty());
    }
}
