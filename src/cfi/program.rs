//! Component C: a CFI program is an ordered sequence of instructions
//! occupying a length-bounded byte range (the remainder of a CIE or FDE
//! record after its header fields).

use crate::cfi::insn::{parse_insn, CfiInstruction};
use crate::cursor::Cursor;
use crate::error::Result;

/// The CFI instruction stream of a single CIE or FDE, in program order.
#[derive(Debug, Clone, Default)]
pub struct CfiProgram {
    instructions: Vec<CfiInstruction>,
}

impl CfiProgram {
    pub fn instructions(&self) -> &[CfiInstruction] {
        &self.instructions
    }

    /// Executes the location-advance effect of every instruction in order,
    /// starting from `initial_pc`, and returns the final PC. Used only to
    /// exercise the monotonic-PC testable property; this crate does not
    /// otherwise run a CFI virtual machine.
    pub fn final_pc(&self, initial_pc: u64, code_alignment_factor: u64) -> u64 {
        let mut pc = initial_pc;
        for insn in &self.instructions {
            insn.advance(&mut pc, code_alignment_factor);
        }
        pc
    }
}

/// Parses instructions from `cursor`'s current position up to `cursor.max()`.
pub fn parse_program(cursor: &mut Cursor, pointer_size: u8) -> Result<CfiProgram> {
    let mut instructions = Vec::new();
    while cursor.position() < cursor.max() {
        instructions.push(parse_insn(cursor, pointer_size)?);
    }
    Ok(CfiProgram { instructions })
}
