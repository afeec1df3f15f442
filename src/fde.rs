//! Component E: a Frame Description Entry — one function's (or function
//! range's) unwind program plus, if present, its exception-handling LSDA.

use crate::cfi::{parse_program, CfiProgram};
use crate::cie::Cie;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::lsda::{parse_lsda, Lsda};

/// A parsed FDE. `start_addr`/`range_len` describe the half-open PC range
/// `[start_addr, start_addr + range_len)` this FDE's program covers.
#[derive(Debug, Clone)]
pub struct Fde {
    pub position: u64,
    pub cie_position: u64,
    pub length: u64,
    pub start_addr: u64,
    pub start_addr_position: u64,
    pub range_len: u64,
    pub end_addr_position: u64,
    pub end_addr_size: u64,
    pub lsda_addr: Option<u64>,
    pub lsda_addr_position: Option<u64>,
    pub lsda_addr_size: Option<u64>,
    pub lsda: Option<Lsda>,
    pub program: CfiProgram,
}

impl Fde {
    pub fn end_addr(&self) -> u64 {
        self.start_addr + self.range_len
    }

    pub fn contains(&self, pc: u64) -> bool {
        pc >= self.start_addr && pc < self.end_addr()
    }
}

/// Parses the FDE whose length field starts at `cursor`'s current position,
/// given the already-parsed `cie` it refers back to. `gcc_except_table`, if
/// given, is used to resolve this FDE's LSDA (spec §4.E / §4.F); a `None`
/// means any non-omitted LSDA address is left unresolved (`lsda` stays
/// `None`, `lsda_addr` is still recorded).
pub fn parse_fde(
    cursor: &mut Cursor,
    cie: &Cie,
    cie_position: u64,
    pointer_size: u8,
    gcc_except_table: Option<(&[u8], u64)>,
) -> Result<Fde> {
    let position = cursor.current_address();
    let length = cursor.read_length()?;
    let end = cursor.position() + length;

    let _id = cursor.read_u32()?;

    let start_addr_position = cursor.current_address();
    let start_addr = cursor.read_encoded_pointer(cie.fde_encoding, pointer_size)?;

    let end_addr_position = cursor.current_address();
    let range_len = cursor.read_value_with_format(cie.fde_encoding.without_application(), pointer_size)?;
    let end_addr_size = cursor.current_address() - end_addr_position;

    if cie.has_augmentation('z') {
        cursor.read_uleb128()?;
    }

    let mut lsda_addr = None;
    let mut lsda_addr_position = None;
    let mut lsda_addr_size = None;
    let mut lsda = None;
    if !cie.lsda_encoding.is_omit() {
        let field_start = cursor.current_address();
        lsda_addr_position = Some(field_start);
        let addr = cursor.read_encoded_pointer(cie.lsda_encoding, pointer_size)?;
        lsda_addr = Some(addr);
        lsda_addr_size = Some(cursor.current_address() - field_start);
        if addr != 0 {
            if let Some((data, table_base)) = gcc_except_table {
                // An empty `.gcc_except_table` degrades the same as an
                // absent one (spec §6: "empty `.gcc_except_table` ⇒ FDEs
                // parsed without LSDAs") — `elf::read_sections` reports a
                // zero-size section as `Some((&[], addr))`, not `None`.
                if !data.is_empty() {
                    lsda = Some(parse_lsda(data, table_base, addr, start_addr, pointer_size)?);
                }
            }
        }
    }

    let mut program_cursor = cursor.clone();
    program_cursor.set_max(end);
    let program = parse_program(&mut program_cursor, pointer_size)?;
    cursor.set_position(end);

    Ok(Fde {
        position,
        cie_position,
        length,
        start_addr,
        start_addr_position,
        range_len,
        end_addr_position,
        end_addr_size,
        lsda_addr,
        lsda_addr_position,
        lsda_addr_size,
        lsda,
        program,
    })
}
