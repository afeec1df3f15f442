//! Components G and H: the section-set driver, which walks `.eh_frame`'s
//! length-prefixed records and classifies each as a CIE or an FDE, and the
//! query façade over the result.

use std::collections::HashMap;

use crate::cie::{parse_cie, Cie};
use crate::cursor::Cursor;
use crate::error::{EhFrameError, Result};
use crate::fde::{parse_fde, Fde};

/// The raw section bytes and addresses this crate needs. Locating these in
/// an ELF file is left to the caller (or to the `elf` module's adapter);
/// this type is the seam between "somewhere in a binary" and "a buffer at
/// a known virtual address".
#[derive(Debug, Clone, Copy)]
pub struct ParseInput<'a> {
    pub eh_frame: &'a [u8],
    pub eh_frame_addr: u64,
    pub gcc_except_table: Option<(&'a [u8], u64)>,
    pub pointer_size: u8,
}

/// The parsed contents of `.eh_frame` (and, transitively, any LSDAs its
/// FDEs reference): every CIE, every FDE, queryable by address.
#[derive(Debug, Clone)]
pub struct EhFrameParser {
    cies: Vec<Cie>,
    fdes: Vec<Fde>,
}

impl EhFrameParser {
    pub fn cies(&self) -> &[Cie] {
        &self.cies
    }

    pub fn fdes(&self) -> &[Fde] {
        &self.fdes
    }

    /// Finds the FDE whose `[start_addr, end_addr)` range contains `pc`, if
    /// any. `fdes()` is kept sorted by `start_addr`, so this is a range
    /// search over that order — not the `.eh_frame_hdr` binary-search
    /// table, which this crate does not consult.
    pub fn find_fde(&self, pc: u64) -> Option<&Fde> {
        let idx = self.fdes.partition_point(|fde| fde.start_addr <= pc);
        if idx == 0 {
            return None;
        }
        let candidate = &self.fdes[idx - 1];
        candidate.contains(pc).then_some(candidate)
    }
}

/// Walks `input.eh_frame` from the start, classifying each length-prefixed
/// record as a CIE (`cie_id == 0`) or an FDE (a nonzero back-reference to
/// a CIE already seen earlier in the section). Stops at a zero-length,
/// `0xffffffff`, or `u64::MAX` terminator record, or at a truncated length
/// read (a dangling `0xffffffff` with no extended-length word behind it) —
/// all end the section gracefully rather than failing the whole parse.
pub fn parse(input: ParseInput) -> Result<EhFrameParser> {
    let mut cies_by_position: HashMap<u64, Cie> = HashMap::new();
    let mut cie_order = Vec::new();
    let mut fdes = Vec::new();

    let mut cursor = Cursor::new(input.eh_frame, input.eh_frame_addr);

    loop {
        let record_start = cursor.position();
        if record_start >= cursor.max() {
            break;
        }

        // A truncated length read (e.g. a trailing `0xffffffff` with no
        // following extended-length word, spec §8 scenario 4) ends the
        // section gracefully rather than failing the whole parse — unlike
        // a truncated read inside an already-recognized CIE/FDE record,
        // which still propagates as a hard error.
        let length = match cursor.read_length() {
            Ok(length) => length,
            Err(EhFrameError::Truncated(_)) => break,
            Err(err) => return Err(err),
        };
        if length == 0 || length == 0xffff_ffff || length == u64::MAX {
            break;
        }
        let next_position = cursor.position() + length;

        let cie_ref_field_position = cursor.position();
        let cie_ref = cursor.read_u32()?;

        if cie_ref == 0 {
            cursor.set_position(record_start);
            let cie = parse_cie(&mut cursor, input.pointer_size)?;
            cie_order.push(cie.position);
            cies_by_position.insert(cie.position, cie);
        } else {
            let cie_raw_position = cie_ref_field_position - cie_ref as u64;
            let cie_position = input.eh_frame_addr + cie_raw_position;
            let cie = cies_by_position.get(&cie_position).cloned().ok_or(
                EhFrameError::InvalidCieReference {
                    fde_position: input.eh_frame_addr + record_start,
                    cie_position,
                    reason: "no CIE parsed at the referenced position",
                },
            )?;
            cursor.set_position(record_start);
            let fde = parse_fde(
                &mut cursor,
                &cie,
                cie_position,
                input.pointer_size,
                input.gcc_except_table,
            )?;
            fdes.push(fde);
        }

        if cursor.position() > next_position {
            return Err(EhFrameError::Truncated(
                "CIE/FDE record read past its own length",
            ));
        }
        cursor.set_position(next_position);
    }

    fdes.sort_by_key(|fde| fde.start_addr);
    let cies = cie_order
        .into_iter()
        .filter_map(|position| cies_by_position.remove(&position))
        .collect();

    Ok(EhFrameParser { cies, fdes })
}
