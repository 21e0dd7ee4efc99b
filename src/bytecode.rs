use std::collections::HashMap;
use std::path::PathBuf;

use crate::ast::{Argument, BinaryOp, CallTarget, IntrinsicKind, Node};
use crate::error::{OrganicError, OrganicResult};
use crate::source_path;

/// Single-byte opcodes, matching the original bytecode constants table.
pub mod opcode {
    pub const RETURN: u8 = 0x00;
    pub const STACK_PUSH_DEFAULT: u8 = 0x01;
    pub const STACK_PUSH_BYTE: u8 = 0x02;
    pub const STACK_PUSH_INT: u8 = 0x03;
    pub const STACK_PUSH_DOUBLE: u8 = 0x04;
    pub const STACK_PUSH_ADDRESS: u8 = 0x05;
    pub const STACK_PUSH_RESOURCE: u8 = 0x06;
    pub const SET_VARIABLE: u8 = 0x07;
    pub const GET_VARIABLE: u8 = 0x08;
    pub const CALL_NATIVE: u8 = 0x09;
    pub const CALL_USER: u8 = 0x0a;
}

/// Native intrinsic ids, byte value -> operation (§6).
pub mod native {
    pub const LIST: u8 = 0x00;
    pub const TIME: u8 = 0x01;

    pub const ADD: u8 = 0x10;
    pub const SUBTRACT: u8 = 0x11;
    pub const MULTIPLY: u8 = 0x12;
    pub const DIVIDE: u8 = 0x13;
    pub const POWER: u8 = 0x14;
    pub const EQUAL: u8 = 0x15;
    pub const LESS: u8 = 0x16;
    pub const GREATER: u8 = 0x17;
    pub const LESSEQUAL: u8 = 0x18;
    pub const GREATEREQUAL: u8 = 0x19;

    // Reserved intrinsics with no byte given in the original constants
    // table; assigned into the unused tail of the comparison range.
    pub const ALL: u8 = 0x1a;
    pub const ANY: u8 = 0x1b;
    pub const NONE: u8 = 0x1c;
    pub const MIN: u8 = 0x1d;
    pub const MAX: u8 = 0x1e;
    pub const ROUND: u8 = 0x1f;

    pub const SINE: u8 = 0x30;
    pub const SQUARE: u8 = 0x31;
    pub const TRIANGLE: u8 = 0x32;
    pub const SAW: u8 = 0x33;
    pub const NOISE: u8 = 0x34;
    pub const SAMPLE: u8 = 0x35;

    pub const HOLD: u8 = 0x50;
    pub const LFO: u8 = 0x51;
    pub const SWEEP: u8 = 0x52;
    pub const SEQUENCE: u8 = 0x53;
    pub const REPEAT: u8 = 0x54;
    pub const RANDOM: u8 = 0x55;
    pub const LIMIT: u8 = 0x56;
    pub const TRIGGER: u8 = 0x57;
    pub const IF: u8 = 0x58;

    pub const DELAY: u8 = 0x70;

    pub const PLAY: u8 = 0x90;
    pub const PERFORM: u8 = 0x91;

    pub fn id_for(kind: IntrinsicKind) -> Option<u8> {
        use IntrinsicKind::*;
        Some(match kind {
            Time => TIME,
            Hold => HOLD,
            Lfo => LFO,
            Sweep => SWEEP,
            Sequence => SEQUENCE,
            Repeat => REPEAT,
            Random => RANDOM,
            Limit => LIMIT,
            Trigger => TRIGGER,
            If => IF,
            Sine => SINE,
            Square => SQUARE,
            Triangle => TRIANGLE,
            Saw => SAW,
            Noise => NOISE,
            Sample => SAMPLE,
            Oscillator => SINE, // oscillator(type: ...) picks its waveform at build time
            Delay => DELAY,
            Play => PLAY,
            Perform => PERFORM,
            All => ALL,
            Any => ANY,
            None => NONE,
            Min => MIN,
            Max => MAX,
            Round => ROUND,
            Include => return Option::None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Return,
    PushDefault,
    PushByte(u8),
    PushInt(u32),
    PushDouble(f64),
    /// Operand resolved to a byte offset once block layout is known;
    /// carries the target block's index until then.
    PushAddress(usize),
    PushResource(u8),
    SetVariable(u8),
    GetVariable(u8),
    CallNative { op: u8, arity: u8 },
    CallUser { block: usize, arity: u8 },
}

impl Instruction {
    fn write(&self, offsets: &[u32], out: &mut Vec<u8>) {
        match self {
            Instruction::Return => out.push(opcode::RETURN),
            Instruction::PushDefault => out.push(opcode::STACK_PUSH_DEFAULT),
            Instruction::PushByte(b) => {
                out.push(opcode::STACK_PUSH_BYTE);
                out.push(*b);
            }
            Instruction::PushInt(i) => {
                out.push(opcode::STACK_PUSH_INT);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Instruction::PushDouble(d) => {
                out.push(opcode::STACK_PUSH_DOUBLE);
                out.extend_from_slice(&d.to_le_bytes());
            }
            Instruction::PushAddress(block) => {
                out.push(opcode::STACK_PUSH_ADDRESS);
                out.extend_from_slice(&offsets[*block].to_le_bytes());
            }
            Instruction::PushResource(i) => {
                out.push(opcode::STACK_PUSH_RESOURCE);
                out.push(*i);
            }
            Instruction::SetVariable(i) => {
                out.push(opcode::SET_VARIABLE);
                out.push(*i);
            }
            Instruction::GetVariable(i) => {
                out.push(opcode::GET_VARIABLE);
                out.push(*i);
            }
            Instruction::CallNative { op, arity } => {
                out.push(opcode::CALL_NATIVE);
                out.push(*op);
                out.push(*arity);
            }
            Instruction::CallUser { block, arity } => {
                out.push(opcode::CALL_USER);
                out.extend_from_slice(&offsets[*block].to_le_bytes());
                out.push(*arity);
            }
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            Instruction::Return | Instruction::PushDefault => 1,
            Instruction::PushByte(_) | Instruction::PushResource(_) | Instruction::SetVariable(_) | Instruction::GetVariable(_) => 2,
            Instruction::PushInt(_) | Instruction::PushAddress(_) => 5,
            Instruction::PushDouble(_) => 9,
            Instruction::CallNative { .. } => 3,
            Instruction::CallUser { .. } => 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstructionBlock {
    pub instructions: Vec<Instruction>,
}

impl InstructionBlock {
    fn byte_len(&self) -> usize {
        self.instructions.iter().map(Instruction::byte_len).sum()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceBlock {
    pub length: u32,
    pub sample_rate: u32,
    pub samples: Vec<i32>,
}

pub const MAGIC: &[u8; 4] = b"BACH";

/// Walks the AST into instruction/resource blocks and serializes the
/// container, fixing up forward addresses once every block's size (and
/// therefore offset) is known.
pub struct Emitter {
    blocks: Vec<InstructionBlock>,
    resources: Vec<ResourceBlock>,
    resource_index: HashMap<PathBuf, u8>,
    variables: Vec<String>,
    functions: HashMap<String, usize>,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            resources: Vec::new(),
            resource_index: HashMap::new(),
            variables: Vec::new(),
            functions: HashMap::new(),
        }
    }

    pub fn emit_program(mut self, program: &Node) -> OrganicResult<Vec<u8>> {
        let entry = match program {
            Node::Program { instructions, .. } => self.emit_block(instructions, false)?,
            other => return Err(OrganicError::machine(format!("expected Program node, found {other:?}"))),
        };
        debug_assert_eq!(entry, self.blocks.len() - 1, "entry block must be last");
        Ok(self.write())
    }

    fn variable_slot(&mut self, name: &str) -> u8 {
        if let Some(i) = self.variables.iter().position(|v| v == name) {
            return i as u8;
        }
        self.variables.push(name.to_string());
        (self.variables.len() - 1) as u8
    }

    /// Slot reserved for discarding a statement-position expression's
    /// pushed value (see `emit_statement_sequence`). Named with a `$`
    /// prefix, which the tokenizer never produces for a user identifier,
    /// so it can never collide with a real variable.
    fn discard_slot(&mut self) -> u8 {
        self.variable_slot("$discard")
    }

    /// Emits a sequence of top-level instructions. Each statement's
    /// pushed expression value is immediately discarded into a reserved
    /// slot — the opcode table has no dedicated `Pop` — except the last
    /// one when `keep_last` is set, which is left on the stack as the
    /// block's result (a user function's return value; a plain `Program`
    /// block has no such consumer, so `keep_last` is false there).
    fn emit_statement_sequence(&mut self, instructions: &[Node], keep_last: bool, out: &mut Vec<Instruction>) -> OrganicResult<()> {
        for (i, instruction) in instructions.iter().enumerate() {
            self.emit_instruction(instruction, out)?;
            let is_tail = keep_last && i + 1 == instructions.len();
            if !is_tail && is_bare_expression(instruction) {
                let slot = self.discard_slot();
                out.push(Instruction::SetVariable(slot));
            }
        }
        if keep_last && !instructions.iter().any(is_bare_expression) {
            // A function whose body is all assignments has nothing to
            // return; fall back to a default value rather than leaving
            // the stack unbalanced.
            out.push(Instruction::PushDefault);
        }
        Ok(())
    }

    fn emit_block(&mut self, instructions: &[Node], keep_last: bool) -> OrganicResult<usize> {
        let mut body = Vec::new();
        self.emit_statement_sequence(instructions, keep_last, &mut body)?;
        body.push(Instruction::Return);
        self.blocks.push(InstructionBlock { instructions: body });
        Ok(self.blocks.len() - 1)
    }

    /// Compiles a user-defined function to its own block. The index is
    /// reserved before the body compiles so a self-recursive call inside
    /// the body can already resolve it. The block opens by popping its
    /// `arity` arguments (top of stack = last argument pushed) into their
    /// parameter slots via `SET_VARIABLE`, which is how `CALL_USER` binds
    /// parameters without carrying slot indices in the instruction itself.
    /// Its last statement's value is left on the stack as the call's
    /// result instead of being discarded like the others.
    fn emit_function(&mut self, name: &str, params: &[String], body: &[Node]) -> OrganicResult<()> {
        let block_index = self.blocks.len();
        self.blocks.push(InstructionBlock { instructions: Vec::new() });
        self.functions.insert(name.to_string(), block_index);

        let mut instructions = Vec::new();
        for param in params.iter().rev() {
            let slot = self.variable_slot(param);
            instructions.push(Instruction::SetVariable(slot));
        }
        self.emit_statement_sequence(body, true, &mut instructions)?;
        instructions.push(Instruction::Return);
        self.blocks[block_index].instructions = instructions;
        Ok(())
    }

    fn emit_instruction(&mut self, node: &Node, out: &mut Vec<Instruction>) -> OrganicResult<()> {
        match node {
            Node::Assign { variable, value, .. } => {
                self.emit_expr(value, out)?;
                let slot = self.variable_slot(variable);
                out.push(Instruction::SetVariable(slot));
            }
            Node::Define { name, inputs, body, .. } => {
                self.emit_function(name, inputs, body)?;
            }
            Node::Include { .. } => {
                // includes were already merged into this file's own
                // instructions by the parser; nothing left to emit.
            }
            other => self.emit_expr(other, out)?,
        }
        Ok(())
    }

    fn emit_expr(&mut self, node: &Node, out: &mut Vec<Instruction>) -> OrganicResult<()> {
        match node {
            Node::Value { value, .. } => {
                push_number(*value, out);
            }
            Node::Str { .. } => {
                // string literals only ever appear as a `sample(path: ...)`
                // argument, handled in the Call branch below.
            }
            Node::Paren { inner, .. } => self.emit_expr(inner, out)?,
            Node::List { values, .. } => {
                for value in values {
                    self.emit_expr(value, out)?;
                }
                out.push(Instruction::CallNative {
                    op: native::LIST,
                    arity: values.len() as u8,
                });
            }
            Node::VariableRef { name, .. } | Node::InputRef { name, .. } => {
                let slot = self.variable_slot(name);
                out.push(Instruction::GetVariable(slot));
            }
            Node::FunctionRef { .. } => {
                // referenced only through a Call, never evaluated bare.
            }
            Node::BinaryOp { op, left, right, .. } => {
                self.emit_expr(left, out)?;
                self.emit_expr(right, out)?;
                out.push(Instruction::CallNative {
                    op: native_op_for(*op),
                    arity: 2,
                });
            }
            Node::Call {
                target, arguments, ..
            } => self.emit_call(target, arguments, out)?,
            Node::Program { .. } | Node::Assign { .. } | Node::Define { .. } | Node::Include { .. } => {
                return Err(OrganicError::machine("instruction node in expression position"));
            }
        }
        Ok(())
    }

    fn emit_call(
        &mut self,
        target: &CallTarget,
        arguments: &[Argument],
        out: &mut Vec<Instruction>,
    ) -> OrganicResult<()> {
        match target {
            CallTarget::Intrinsic(IntrinsicKind::Sample) => {
                self.emit_sample_call(arguments, out)?;
            }
            CallTarget::Intrinsic(kind) => {
                self.emit_intrinsic_call(*kind, arguments, out)?;
            }
            CallTarget::User(name) => {
                for argument in arguments {
                    self.emit_expr(&argument.value, out)?;
                }
                let block = *self
                    .functions
                    .get(name)
                    .ok_or_else(|| OrganicError::machine(format!("call to undefined function '{name}'")))?;
                out.push(Instruction::CallUser {
                    block,
                    arity: arguments.len() as u8,
                });
            }
        }
        Ok(())
    }

    /// Emits a native call's arguments in the intrinsic's fixed canonical
    /// order (so the machine can read them back positionally) rather than
    /// the order the caller happened to write them in. Arguments the
    /// caller named are slotted by name; any left unnamed fill the
    /// remaining slots left-to-right. A slot nothing filled becomes
    /// `STACK_PUSH_DEFAULT` if it's optional, or a compile error if not.
    fn emit_intrinsic_call(&mut self, kind: IntrinsicKind, arguments: &[Argument], out: &mut Vec<Instruction>) -> OrganicResult<()> {
        match canonical_params(kind) {
            Some(params) => {
                let slots = reorder_arguments(params, arguments.iter().map(|a| (a.name.as_deref(), a.value.as_ref())))?;
                self.emit_slots(kind, params, &slots, out)?;
            }
            None => {
                for argument in arguments {
                    self.emit_expr(&argument.value, out)?;
                }
                let op = native::id_for(kind).unwrap_or(native::LIST);
                out.push(Instruction::CallNative {
                    op,
                    arity: arguments.len() as u8,
                });
            }
        }
        Ok(())
    }

    fn emit_slots(&mut self, kind: IntrinsicKind, params: &[&str], slots: &[Option<&Node>], out: &mut Vec<Instruction>) -> OrganicResult<()> {
        let optional = optional_params(kind);
        for (i, slot) in slots.iter().enumerate() {
            match slot {
                Some(value) => self.emit_expr(value, out)?,
                None if optional.contains(&params[i]) => out.push(Instruction::PushDefault),
                None => {
                    return Err(OrganicError::machine(format!(
                        "{kind:?}() is missing required argument '{}'",
                        params[i]
                    )))
                }
            }
        }
        let op = native::id_for(kind).unwrap_or(native::LIST);
        out.push(Instruction::CallNative {
            op,
            arity: params.len() as u8,
        });
        Ok(())
    }

    fn emit_sample_call(&mut self, arguments: &[Argument], out: &mut Vec<Instruction>) -> OrganicResult<()> {
        let mut path = None;
        let mut rest = Vec::with_capacity(arguments.len());
        for argument in arguments {
            if argument.name.as_deref() == Some("path") {
                path = Some(argument.value.as_ref());
            } else {
                rest.push(argument);
            }
        }
        let path = match path {
            Some(Node::Str { value, .. }) => value.clone(),
            Some(_) => return Err(OrganicError::machine("sample()'s 'path' argument must be a string literal")),
            None => return Err(OrganicError::machine("sample() is missing required argument 'path'")),
        };
        let index = self.resource_index_for(&path)?;
        out.push(Instruction::PushResource(index));

        let params = canonical_params(IntrinsicKind::Sample).expect("sample has a canonical parameter list");
        let slots = reorder_arguments(params, rest.iter().map(|a| (a.name.as_deref(), a.value.as_ref())))?;
        for slot in &slots {
            match slot {
                Some(value) => self.emit_expr(value, out)?,
                None => out.push(Instruction::PushDefault),
            }
        }
        out.push(Instruction::CallNative {
            op: native::SAMPLE,
            arity: 1 + params.len() as u8,
        });
        Ok(())
    }

    fn resource_index_for(&mut self, path: &str) -> OrganicResult<u8> {
        let canonical = source_path::canonicalize(std::path::Path::new(path));
        if let Some(index) = self.resource_index.get(&canonical) {
            return Ok(*index);
        }
        let (samples, sample_rate) = decode_wav(&canonical)?;
        let index = self.resources.len() as u8;
        self.resources.push(ResourceBlock {
            length: samples.len() as u32,
            sample_rate,
            samples,
        });
        self.resource_index.insert(canonical, index);
        Ok(index)
    }

    fn write(&self) -> Vec<u8> {
        let mut offsets = vec![0u32; self.blocks.len()];
        let header_len = MAGIC.len() + 2;
        let resources_len: usize = self.resources.iter().map(resource_byte_len).sum();
        let mut cursor = header_len + resources_len;
        for (i, block) in self.blocks.iter().enumerate() {
            offsets[i] = cursor as u32;
            cursor += block.byte_len();
        }

        let mut out = Vec::with_capacity(cursor);
        out.extend_from_slice(MAGIC);
        out.push(self.variables.len() as u8);
        out.push(self.resources.len() as u8);
        for resource in &self.resources {
            out.extend_from_slice(&resource.length.to_le_bytes());
            out.extend_from_slice(&resource.sample_rate.to_le_bytes());
            for sample in &resource.samples {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
        for block in &self.blocks {
            for instruction in &block.instructions {
                instruction.write(&offsets, &mut out);
            }
        }
        out
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

/// A statement that pushes a value nobody names — `Assign`/`Define`/
/// `Include` already balance the stack on their own (see
/// `emit_instruction`) and don't need their result discarded.
fn is_bare_expression(node: &Node) -> bool {
    !matches!(node, Node::Assign { .. } | Node::Define { .. } | Node::Include { .. })
}

fn resource_byte_len(resource: &ResourceBlock) -> usize {
    4 + 4 + resource.samples.len() * 4
}

fn push_number(value: f64, out: &mut Vec<Instruction>) {
    if value.fract() == 0.0 && (0.0..=255.0).contains(&value) {
        out.push(Instruction::PushByte(value as u8));
    } else if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= u32::MAX as f64 {
        out.push(Instruction::PushInt(value as u32));
    } else {
        out.push(Instruction::PushDouble(value));
    }
}

/// The fixed argument order the machine assumes for each intrinsic that
/// takes named arguments. `Time` and `Include` take none; anything else
/// not listed here falls back to as-written positional emission.
fn canonical_params(kind: IntrinsicKind) -> Option<&'static [&'static str]> {
    use IntrinsicKind::*;
    match kind {
        Hold => Some(&["value", "length"]),
        Sweep => Some(&["from", "to", "length"]),
        Lfo => Some(&["from", "to", "length"]),
        Sequence => Some(&["values", "order"]),
        Repeat => Some(&["value", "repeats"]),
        Random => Some(&["from", "to", "length", "type"]),
        Limit => Some(&["value", "min", "max"]),
        Trigger => Some(&["condition", "value"]),
        If => Some(&["condition", "then", "else"]),
        All | Any | None | Min | Max => Some(&["values"]),
        Round => Some(&["value", "mode"]),
        Sine | Square | Triangle | Saw => Some(&["volume", "frequency", "pan"]),
        Noise => Some(&["volume", "pan"]),
        Sample => Some(&["volume", "pan", "loop", "grains"]),
        Oscillator => Some(&["volume", "frequency", "type", "pan"]),
        Delay => Some(&["value", "time"]),
        Play => Some(&["value"]),
        Perform => Some(&["action", "delay", "interval", "floor", "ceiling", "step", "repeats", "rhythm"]),
        Time | Include => Option::None,
    }
}

/// Canonical slots that are allowed to go unfilled (emitted as
/// `STACK_PUSH_DEFAULT` for the machine to supply its own default).
fn optional_params(kind: IntrinsicKind) -> &'static [&'static str] {
    use IntrinsicKind::*;
    match kind {
        Sine | Square | Triangle | Saw | Oscillator => &["pan"],
        Noise => &["pan"],
        Sample => &["volume", "pan", "loop", "grains"],
        Perform => &["delay", "interval", "floor", "ceiling", "step", "repeats", "rhythm"],
        _ => &[],
    }
}

/// Slots named arguments into their canonical position; anything left
/// unnamed fills the remaining slots left-to-right in the order written.
fn reorder_arguments<'a, I>(params: &[&str], arguments: I) -> OrganicResult<Vec<Option<&'a Node>>>
where
    I: IntoIterator<Item = (Option<&'a str>, &'a Node)>,
{
    let mut slots: Vec<Option<&Node>> = vec![Option::None; params.len()];
    let mut positional = Vec::new();
    for (name, value) in arguments {
        match name {
            Some(name) => {
                let index = params
                    .iter()
                    .position(|p| *p == name)
                    .ok_or_else(|| OrganicError::machine(format!("unknown argument '{name}'")))?;
                if slots[index].is_some() {
                    return Err(OrganicError::machine(format!("duplicate argument '{name}'")));
                }
                slots[index] = Some(value);
            }
            Option::None => positional.push(value),
        }
    }
    let mut positional = positional.into_iter();
    for slot in slots.iter_mut() {
        if slot.is_none() {
            if let Some(value) = positional.next() {
                *slot = Some(value);
            }
        }
    }
    Ok(slots)
}

fn native_op_for(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Add => native::ADD,
        BinaryOp::Subtract => native::SUBTRACT,
        BinaryOp::Multiply => native::MULTIPLY,
        BinaryOp::Divide => native::DIVIDE,
        BinaryOp::Power => native::POWER,
        BinaryOp::Equal => native::EQUAL,
        BinaryOp::Less => native::LESS,
        BinaryOp::Greater => native::GREATER,
        BinaryOp::LessEqual => native::LESSEQUAL,
        BinaryOp::GreaterEqual => native::GREATEREQUAL,
    }
}

fn decode_wav(path: &std::path::Path) -> OrganicResult<(Vec<i32>, u32)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| OrganicError::file(path, e.to_string()))?;
    let spec = reader.spec();
    let samples: Result<Vec<i32>, _> = match spec.sample_format {
        hound::SampleFormat::Int => reader.samples::<i32>().collect(),
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v * i32::MAX as f32) as i32))
            .collect(),
    };
    let samples = samples.map_err(|e| OrganicError::file(path, e.to_string()))?;
    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_starts_with_magic_and_counts() {
        let emitter = Emitter::new();
        let bytes = emitter.write();
        assert_eq!(&bytes[0..4], b"BACH");
        assert_eq!(bytes[4], 0); // no variables
        assert_eq!(bytes[5], 0); // no resources
    }

    #[test]
    fn push_number_picks_the_smallest_encoding() {
        let mut out = Vec::new();
        push_number(3.0, &mut out);
        assert_eq!(out, vec![Instruction::PushByte(3)]);

        let mut out = Vec::new();
        push_number(1000.0, &mut out);
        assert_eq!(out, vec![Instruction::PushInt(1000)]);

        let mut out = Vec::new();
        push_number(0.5, &mut out);
        assert_eq!(out, vec![Instruction::PushDouble(0.5)]);
    }

    #[test]
    fn instruction_byte_lengths_match_the_operand_table() {
        assert_eq!(Instruction::Return.byte_len(), 1);
        assert_eq!(Instruction::PushByte(0).byte_len(), 2);
        assert_eq!(Instruction::PushInt(0).byte_len(), 5);
        assert_eq!(Instruction::PushDouble(0.0).byte_len(), 9);
        assert_eq!(Instruction::PushAddress(0).byte_len(), 5);
        assert_eq!(Instruction::PushResource(0).byte_len(), 2);
        assert_eq!(Instruction::SetVariable(0).byte_len(), 2);
        assert_eq!(Instruction::GetVariable(0).byte_len(), 2);
        assert_eq!(Instruction::CallNative { op: 0, arity: 0 }.byte_len(), 3);
        assert_eq!(Instruction::CallUser { block: 0, arity: 0 }.byte_len(), 6);
    }
}
