//! Call Frame Information instruction decoding (component B) and program
//! assembly (component C).

pub mod insn;
pub mod program;

pub use insn::{CfiInstruction, CfiMnemonic};
pub use program::{parse_program, CfiProgram};
