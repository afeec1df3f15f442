//! Component B: one Call Frame Information instruction — opcode
//! classification, byte-span capture, and the handful of queries the rest
//! of the parser (and a future unwinder, out of scope here) needs.

use crate::cursor::Cursor;
use crate::error::{EhFrameError, Result};

#[allow(non_upper_case_globals)]
mod opcode {
    pub const DW_CFA_nop: u8 = 0x00;
    pub const DW_CFA_set_loc: u8 = 0x01;
    pub const DW_CFA_advance_loc1: u8 = 0x02;
    pub const DW_CFA_advance_loc2: u8 = 0x03;
    pub const DW_CFA_advance_loc4: u8 = 0x04;
    pub const DW_CFA_offset_extended: u8 = 0x05;
    pub const DW_CFA_restore_extended: u8 = 0x06;
    pub const DW_CFA_undefined: u8 = 0x07;
    pub const DW_CFA_same_value: u8 = 0x08;
    pub const DW_CFA_register: u8 = 0x09;
    pub const DW_CFA_remember_state: u8 = 0x0a;
    pub const DW_CFA_restore_state: u8 = 0x0b;
    pub const DW_CFA_def_cfa: u8 = 0x0c;
    pub const DW_CFA_def_cfa_register: u8 = 0x0d;
    pub const DW_CFA_def_cfa_offset: u8 = 0x0e;
    pub const DW_CFA_def_cfa_expression: u8 = 0x0f;
    pub const DW_CFA_expression: u8 = 0x10;
    pub const DW_CFA_offset_extended_sf: u8 = 0x11;
    pub const DW_CFA_def_cfa_sf: u8 = 0x12;
    pub const DW_CFA_def_cfa_offset_sf: u8 = 0x13;
    pub const DW_CFA_val_offset: u8 = 0x14;
    pub const DW_CFA_val_offset_sf: u8 = 0x15;
    pub const DW_CFA_val_expression: u8 = 0x16;
    pub const DW_CFA_MIPS_advance_loc8: u8 = 0x1d;
    pub const DW_CFA_GNU_window_save: u8 = 0x2d;
    pub const DW_CFA_GNU_args_size: u8 = 0x2e;
    pub const DW_CFA_GNU_negative_offset_extended: u8 = 0x2f;
}
use opcode::*;

/// Decoded shape of a CFI instruction. Operand types follow spec §4.B's
/// table. `UnhandledInstruction` covers opcodes whose byte span is parsed
/// and recorded correctly but whose operands this parser does not further
/// structure (DWARF expressions, GNU args-size) — matching the source this
/// spec was distilled from, which resolves its own open question about
/// these opcodes this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfiMnemonic {
    Nop,
    RememberState,
    RestoreState,
    AdvanceLoc,
    Offset,
    Restore,
    Undefined,
    SameValue,
    RestoreExtended,
    DefCfaRegister,
    DefCfaOffset,
    SetLoc,
    OffsetExtended,
    Register,
    DefCfa,
    DefCfaSf,
    DefCfaOffsetSf,
    OffsetExtendedSf,
    UnhandledInstruction,
}

/// A single CFI instruction: the exact bytes it occupies in the owning
/// program, plus the pointer size its CIE/FDE was parsed with (needed to
/// re-decode `set_loc`).
#[derive(Debug, Clone)]
pub struct CfiInstruction {
    bytes: Vec<u8>,
    pointer_size: u8,
}

impl CfiInstruction {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    fn upper2(&self) -> u8 {
        self.opcode() >> 6
    }

    fn lower6(&self) -> u8 {
        self.opcode() & 0x3f
    }

    pub fn is_nop(&self) -> bool {
        self.upper2() == 0 && self.lower6() == DW_CFA_nop
    }

    pub fn is_def_cfa_offset(&self) -> bool {
        self.upper2() == 0 && self.lower6() == DW_CFA_def_cfa_offset
    }

    pub fn is_remember_state(&self) -> bool {
        self.upper2() == 0 && self.lower6() == DW_CFA_remember_state
    }

    pub fn is_restore_state(&self) -> bool {
        self.upper2() == 0 && self.lower6() == DW_CFA_restore_state
    }

    /// Decodes this instruction's mnemonic and up to two integer operands.
    /// Re-parsing `bytes()` through this method is required to reproduce
    /// the same triple (spec §8).
    pub fn decode(&self) -> Result<(CfiMnemonic, i64, i64)> {
        let mut cursor = Cursor::new(&self.bytes, 0);
        let opcode = cursor.read_u8()?;
        let upper2 = opcode >> 6;
        let lower6 = opcode & 0x3f;

        match upper2 {
            1 => return Ok((CfiMnemonic::AdvanceLoc, lower6 as i64, 0)),
            2 => {
                let factored_offset = cursor.read_uleb128()?;
                return Ok((CfiMnemonic::Offset, lower6 as i64, factored_offset as i64));
            }
            3 => return Ok((CfiMnemonic::Restore, lower6 as i64, 0)),
            0 => {}
            _ => unreachable!("two-bit field"),
        }

        Ok(match lower6 {
            DW_CFA_nop => (CfiMnemonic::Nop, 0, 0),
            DW_CFA_remember_state => (CfiMnemonic::RememberState, 0, 0),
            DW_CFA_restore_state => (CfiMnemonic::RestoreState, 0, 0),
            DW_CFA_undefined => (CfiMnemonic::Undefined, cursor.read_uleb128()? as i64, 0),
            DW_CFA_same_value => (CfiMnemonic::SameValue, cursor.read_uleb128()? as i64, 0),
            DW_CFA_restore_extended => {
                (CfiMnemonic::RestoreExtended, cursor.read_uleb128()? as i64, 0)
            }
            DW_CFA_def_cfa_register => {
                (CfiMnemonic::DefCfaRegister, cursor.read_uleb128()? as i64, 0)
            }
            DW_CFA_def_cfa_offset => (CfiMnemonic::DefCfaOffset, cursor.read_uleb128()? as i64, 0),
            DW_CFA_set_loc => {
                let addr = match self.pointer_size {
                    4 => cursor.read_u32()? as i64,
                    8 => cursor.read_u64()? as i64,
                    other => return Err(EhFrameError::UnsupportedPointerSize(other)),
                };
                (CfiMnemonic::SetLoc, addr, 0)
            }
            DW_CFA_advance_loc1 => (CfiMnemonic::AdvanceLoc, cursor.read_u8()? as i64, 0),
            DW_CFA_advance_loc2 => (CfiMnemonic::AdvanceLoc, cursor.read_u16()? as i64, 0),
            DW_CFA_advance_loc4 => (CfiMnemonic::AdvanceLoc, cursor.read_u32()? as i64, 0),
            DW_CFA_offset_extended => {
                let reg = cursor.read_uleb128()? as i64;
                let off = cursor.read_uleb128()? as i64;
                (CfiMnemonic::OffsetExtended, reg, off)
            }
            DW_CFA_register => {
                let reg1 = cursor.read_uleb128()? as i64;
                let reg2 = cursor.read_uleb128()? as i64;
                (CfiMnemonic::Register, reg1, reg2)
            }
            DW_CFA_def_cfa => {
                let reg = cursor.read_uleb128()? as i64;
                let off = cursor.read_uleb128()? as i64;
                (CfiMnemonic::DefCfa, reg, off)
            }
            DW_CFA_def_cfa_sf => {
                let reg = cursor.read_uleb128()? as i64;
                let off = cursor.read_sleb128()?;
                (CfiMnemonic::DefCfaSf, reg, off)
            }
            DW_CFA_def_cfa_offset_sf => (CfiMnemonic::DefCfaOffsetSf, cursor.read_sleb128()?, 0),
            DW_CFA_offset_extended_sf => {
                let reg = cursor.read_uleb128()? as i64;
                let off = cursor.read_sleb128()?;
                (CfiMnemonic::OffsetExtendedSf, reg, off)
            }
            // DWARF expressions and the GNU args-size hint are parsed (their
            // byte span is correct) but not further decoded.
            DW_CFA_def_cfa_expression | DW_CFA_expression | DW_CFA_val_expression
            | DW_CFA_GNU_args_size => (CfiMnemonic::UnhandledInstruction, 0, 0),
            _ => (CfiMnemonic::UnhandledInstruction, 0, 0),
        })
    }

    /// Advances `pc` by this instruction's effect if it is a location-advance;
    /// returns whether it was. `set_loc` sets an absolute address, which the
    /// source this parser is modeled on treats as a hard, unsupported case;
    /// we log and decline to advance rather than abort the process.
    pub fn advance(&self, pc: &mut u64, caf: u64) -> bool {
        let opcode = self.opcode();
        let upper2 = opcode >> 6;
        let lower6 = opcode & 0x3f;

        match upper2 {
            1 => {
                *pc += lower6 as u64 * caf;
                true
            }
            0 => match lower6 {
                DW_CFA_set_loc => {
                    log::warn!("DW_CFA_set_loc encountered during advance(); not supported");
                    false
                }
                DW_CFA_advance_loc1 => {
                    *pc += self.bytes[1] as u64 * caf;
                    true
                }
                DW_CFA_advance_loc2 => {
                    let delta = u16::from_le_bytes([self.bytes[1], self.bytes[2]]);
                    *pc += delta as u64 * caf;
                    true
                }
                DW_CFA_advance_loc4 => {
                    let delta = u32::from_le_bytes([
                        self.bytes[1],
                        self.bytes[2],
                        self.bytes[3],
                        self.bytes[4],
                    ]);
                    *pc += delta as u64 * caf;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}

/// Parses one instruction starting at `cursor`'s current position, which
/// must be within the owning program's bound (`cursor.max()`). Unknown or
/// out-of-scope opcodes (`DW_CFA_val_offset[_sf]`, `DW_CFA_MIPS_advance_loc8`,
/// GNU window-save/negative-offset-extended) are a fatal error for the
/// enclosing frame, per spec §4.B / §7.
pub fn parse_insn(cursor: &mut Cursor, pointer_size: u8) -> Result<CfiInstruction> {
    let start = cursor.position();
    let opcode = cursor.read_u8()?;
    let upper2 = opcode >> 6;
    let lower6 = opcode & 0x3f;

    match upper2 {
        1 => {}
        2 => {
            cursor.read_uleb128()?;
        }
        3 => {}
        0 => match lower6 {
            DW_CFA_nop | DW_CFA_remember_state | DW_CFA_restore_state => {}
            DW_CFA_undefined
            | DW_CFA_same_value
            | DW_CFA_restore_extended
            | DW_CFA_def_cfa_register
            | DW_CFA_GNU_args_size
            | DW_CFA_def_cfa_offset => {
                cursor.read_uleb128()?;
            }
            DW_CFA_set_loc => match pointer_size {
                4 => {
                    cursor.read_u32()?;
                }
                8 => {
                    cursor.read_u64()?;
                }
                other => return Err(EhFrameError::UnsupportedPointerSize(other)),
            },
            DW_CFA_advance_loc1 => {
                cursor.read_u8()?;
            }
            DW_CFA_advance_loc2 => {
                cursor.read_u16()?;
            }
            DW_CFA_advance_loc4 => {
                cursor.read_u32()?;
            }
            DW_CFA_offset_extended | DW_CFA_register | DW_CFA_def_cfa => {
                cursor.read_uleb128()?;
                cursor.read_uleb128()?;
            }
            DW_CFA_def_cfa_sf => {
                cursor.read_uleb128()?;
                cursor.read_sleb128()?;
            }
            DW_CFA_def_cfa_expression => {
                let n = cursor.read_uleb128()?;
                skip(cursor, n)?;
            }
            DW_CFA_expression | DW_CFA_val_expression => {
                cursor.read_uleb128()?;
                let n = cursor.read_uleb128()?;
                skip(cursor, n)?;
            }
            DW_CFA_def_cfa_offset_sf => {
                cursor.read_sleb128()?;
            }
            DW_CFA_offset_extended_sf => {
                cursor.read_uleb128()?;
                cursor.read_sleb128()?;
            }
            DW_CFA_val_offset
            | DW_CFA_val_offset_sf
            | DW_CFA_MIPS_advance_loc8
            | DW_CFA_GNU_window_save
            | DW_CFA_GNU_negative_offset_extended => {
                return Err(EhFrameError::UnknownCfiOpcode(opcode));
            }
            _ => return Err(EhFrameError::UnknownCfiOpcode(opcode)),
        },
        _ => unreachable!("two-bit field"),
    }

    let end = cursor.position();
    let span = cursor.slice(start, end)?;
    Ok(CfiInstruction {
        bytes: span.to_vec(),
        pointer_size,
    })
}

fn skip(cursor: &mut Cursor, n: u64) -> Result<()> {
    for _ in 0..n {
        cursor.read_u8()?;
    }
    Ok(())
}
