use crate::bytecode::{opcode, ResourceBlock, MAGIC};
use crate::error::{OrganicError, OrganicResult};

/// A decoded bytecode container: the header counts, the resource table
/// (decoded sample data), and the raw instruction-block bytes the VM
/// executes directly by address.
pub struct BytecodeContainer {
    pub variable_count: u8,
    pub resources: Vec<ResourceBlock>,
    pub program: Vec<u8>,
    /// Byte offset, from the start of `program`, of the entry block.
    pub entry_offset: u32,
}

pub fn read(bytes: &[u8]) -> OrganicResult<BytecodeContainer> {
    if bytes.len() < 6 || &bytes[0..4] != MAGIC {
        return Err(OrganicError::file("<bytecode>", "bad magic bytes, expected 'BACH'"));
    }
    let variable_count = bytes[4];
    let resource_count = bytes[5];

    let mut cursor = 6usize;
    let mut resources = Vec::with_capacity(resource_count as usize);
    for _ in 0..resource_count {
        let length = read_u32(bytes, cursor)?;
        cursor += 4;
        let sample_rate = read_u32(bytes, cursor)?;
        cursor += 4;
        let mut samples = Vec::with_capacity(length as usize);
        for _ in 0..length {
            samples.push(read_u32(bytes, cursor)? as i32);
            cursor += 4;
        }
        resources.push(ResourceBlock {
            length,
            sample_rate,
            samples,
        });
    }

    // The program's entry block is the last instruction block; since
    // blocks are only self-delimiting by a trailing RETURN, find it by
    // scanning from the front instead of guessing an offset backwards.
    let program_start = cursor;
    let mut offsets = Vec::new();
    let mut scan = program_start;
    while scan < bytes.len() {
        offsets.push(scan as u32);
        scan = skip_block(bytes, scan)?;
    }
    let entry_offset = *offsets
        .last()
        .ok_or_else(|| OrganicError::file("<bytecode>", "no instruction blocks present"))?;

    Ok(BytecodeContainer {
        variable_count,
        resources,
        program: bytes.to_vec(),
        entry_offset,
    })
}

fn skip_block(bytes: &[u8], mut cursor: usize) -> OrganicResult<usize> {
    loop {
        let op = *bytes
            .get(cursor)
            .ok_or_else(|| OrganicError::machine("unexpected end of bytecode"))?;
        let len = match op {
            opcode::RETURN | opcode::STACK_PUSH_DEFAULT => 1,
            opcode::STACK_PUSH_BYTE | opcode::STACK_PUSH_RESOURCE | opcode::SET_VARIABLE | opcode::GET_VARIABLE => 2,
            opcode::STACK_PUSH_INT | opcode::STACK_PUSH_ADDRESS => 5,
            opcode::STACK_PUSH_DOUBLE => 9,
            opcode::CALL_NATIVE => 3,
            opcode::CALL_USER => 6,
            other => return Err(OrganicError::machine(format!("invalid opcode 0x{other:02x}"))),
        };
        cursor += len;
        if op == opcode::RETURN {
            return Ok(cursor);
        }
    }
}

fn read_u32(bytes: &[u8], at: usize) -> OrganicResult<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| OrganicError::machine("unexpected end of bytecode"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::bytecode::Emitter;
    use crate::location::SourceLocation;
    use std::rc::Rc;

    fn empty_program() -> Node {
        let path: Rc<str> = "t.organic".into();
        Node::Program {
            instructions: Vec::new(),
            location: SourceLocation::start_of(path),
        }
    }

    #[test]
    fn roundtrips_an_empty_program() {
        let bytes = Emitter::new().emit_program(&empty_program()).unwrap();
        let container = read(&bytes).unwrap();
        assert_eq!(container.variable_count, 0);
        assert!(container.resources.is_empty());
        // entry block is a single RETURN byte right after the header.
        assert_eq!(container.entry_offset, 6);
        assert_eq!(container.program[6], opcode::RETURN);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 10];
        assert!(read(&bytes).is_err());
    }
}
