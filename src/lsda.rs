//! Component F: the Language-Specific Data Area referenced by an FDE's
//! augmentation data — call sites, their action chains, and the exception
//! type table those actions index into.

use std::collections::HashMap;

use crate::cursor::Cursor;
use crate::encoding::PointerEncoding;
use crate::error::{EhFrameError, Result};

/// One entry of the (negatively indexed) exception type table.
#[derive(Debug, Clone)]
pub struct TypeTableEntry {
    pub pointer_to_typeinfo: u64,
    pub encoding_size: u64,
}

/// One `(filter, next_offset)` link of a call site's action chain, reduced
/// to the filter value the chain actually needs once linearized.
#[derive(Debug, Clone, Copy)]
pub struct Action {
    pub filter: i64,
}

/// One entry of the call-site table: a `[addr, end_addr)` PC range and
/// where to land (and which actions to run) if an exception unwinds
/// through it.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub offset: u64,
    pub addr: u64,
    pub addr_position: u64,
    pub length: u64,
    pub end_addr: u64,
    pub end_addr_position: u64,
    pub landing_pad_offset: u64,
    pub landing_pad_addr: u64,
    pub landing_pad_addr_position: u64,
    pub landing_pad_addr_end_position: u64,
    pub actions: Vec<Action>,
}

/// A parsed LSDA. `type_table` is keyed by the 1-based filter value used
/// in action chains, populated only for the filters actually referenced
/// (libehp calls this "lazy" — we mirror that instead of materializing
/// every representable index).
#[derive(Debug, Clone)]
pub struct Lsda {
    pub landing_pad_base_addr: u64,
    pub type_table_encoding: PointerEncoding,
    pub type_table_addr: Option<u64>,
    pub cs_table_start_addr: u64,
    pub cs_table_end_addr: u64,
    pub action_table_start_addr: u64,
    pub call_sites: Vec<CallSite>,
    pub type_table: HashMap<u64, TypeTableEntry>,
}

impl Lsda {
    /// Looks up a positive action-chain filter in the type table. Negative
    /// filters (dynamic exception specifications) and zero (no type info)
    /// are never present here; callers should check the sign first.
    pub fn type_info(&self, filter: i64) -> Option<&TypeTableEntry> {
        if filter <= 0 {
            return None;
        }
        self.type_table.get(&(filter as u64))
    }
}

/// Parses the LSDA at `lsda_addr` (a virtual address) out of
/// `gcc_except_table`'s bytes, which start at virtual address `table_base`.
/// `fde_start_addr` is the default landing-pad base when the LSDA omits one.
pub fn parse_lsda(
    data: &[u8],
    table_base: u64,
    lsda_addr: u64,
    fde_start_addr: u64,
    pointer_size: u8,
) -> Result<Lsda> {
    let table_end = table_base + data.len() as u64;
    if lsda_addr < table_base || lsda_addr >= table_end {
        return Err(EhFrameError::OutOfRangeLsda {
            addr: lsda_addr,
            start: table_base,
            end: table_end,
        });
    }

    let start = lsda_addr - table_base;
    let mut cursor = Cursor::at(data, table_base, start);

    let landing_pad_base_encoding = PointerEncoding(cursor.read_u8()?);
    let landing_pad_base_addr = if landing_pad_base_encoding.is_omit() {
        fde_start_addr
    } else {
        cursor.read_encoded_pointer(landing_pad_base_encoding, pointer_size)?
    };

    let type_table_encoding = PointerEncoding(cursor.read_u8()?);
    let type_table_pos = if type_table_encoding.is_omit() {
        None
    } else {
        let type_table_offset = cursor.read_uleb128()?;
        Some(cursor.position() + type_table_offset)
    };
    let type_table_addr = type_table_pos.map(|pos| table_base + pos);

    let cs_table_encoding = PointerEncoding(cursor.read_u8()?);
    let cs_table_length = cursor.read_uleb128()?;
    let cs_table_start = cursor.position();
    let cs_table_end = cs_table_start + cs_table_length;
    let cs_table_start_addr = cursor.current_address();
    let action_table_start_addr = cs_table_start_addr + cs_table_length;

    let mut call_sites = Vec::new();
    loop {
        let addr_position = cursor.current_address();
        let offset = cursor.read_encoded_pointer(cs_table_encoding, pointer_size)?;
        let addr = landing_pad_base_addr + offset;

        let end_addr_position = cursor.current_address();
        let length = cursor.read_encoded_pointer(cs_table_encoding, pointer_size)?;
        let end_addr = addr + length;

        let landing_pad_addr_position = cursor.current_address();
        let landing_pad_offset = cursor.read_encoded_pointer(cs_table_encoding, pointer_size)?;
        let landing_pad_addr_end_position = cursor.current_address();
        let landing_pad_addr = if landing_pad_offset == 0 {
            0
        } else {
            landing_pad_base_addr + landing_pad_offset
        };
        let action = cursor.read_uleb128()?;

        let actions = if action == 0 {
            Vec::new()
        } else {
            let chain_start = action_table_start_addr + action - 1 - table_base;
            parse_action_chain(data, table_base, chain_start)?
        };

        call_sites.push(CallSite {
            offset,
            addr,
            addr_position,
            length,
            end_addr,
            end_addr_position,
            landing_pad_offset,
            landing_pad_addr,
            landing_pad_addr_position,
            landing_pad_addr_end_position,
            actions,
        });

        if cursor.position() >= cs_table_end {
            break;
        }
    }

    let mut type_table = HashMap::new();
    if let Some(tt_pos) = type_table_pos {
        for call_site in &call_sites {
            for action in &call_site.actions {
                if action.filter > 0 {
                    let index = action.filter as u64;
                    type_table.entry(index).or_insert(parse_type_table_entry(
                        data,
                        table_base,
                        type_table_encoding,
                        tt_pos,
                        index,
                        pointer_size,
                    )?);
                } else if action.filter < 0 {
                    log::debug!(
                        "dynamic exception specification (filter {}) in LSDA at 0x{lsda_addr:x}, not expanded",
                        action.filter
                    );
                }
            }
        }
    }

    Ok(Lsda {
        landing_pad_base_addr,
        type_table_encoding,
        type_table_addr,
        cs_table_start_addr,
        cs_table_end_addr: cs_table_start_addr + cs_table_length,
        action_table_start_addr,
        call_sites,
        type_table,
    })
}

/// Walks one call site's action chain: sLEB128 filter, sLEB128 offset to
/// the next link relative to the position just after the filter, `0`
/// terminates. A repeated position indicates a cycle, a hard parse error
/// rather than an infinite loop (spec §8).
fn parse_action_chain(data: &[u8], table_base: u64, start: u64) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    let mut visited = std::collections::HashSet::new();
    let mut pos = start;
    loop {
        if !visited.insert(pos) {
            return Err(EhFrameError::ActionChainCycle);
        }
        let mut cursor = Cursor::at(data, table_base, pos);
        let filter = cursor.read_sleb128()?;
        let next_link_position = cursor.position();
        let next_offset = cursor.read_sleb128()?;
        actions.push(Action { filter });
        if next_offset == 0 {
            break;
        }
        pos = (next_link_position as i64 + next_offset) as u64;
    }
    Ok(actions)
}

/// Parses one type-table entry at `index` (1-based), which lives at
/// `tt_pos - index * entry_size` — the table is indexed backwards from its
/// anchor. A zero value stays zero even under a pc-relative encoding: the
/// source this is modeled on treats a null type-info pointer as absent
/// regardless of application.
fn parse_type_table_entry(
    data: &[u8],
    table_base: u64,
    encoding: PointerEncoding,
    tt_pos: u64,
    index: u64,
    pointer_size: u8,
) -> Result<TypeTableEntry> {
    let encoding_size = encoding
        .value_size(pointer_size)
        .ok_or(EhFrameError::InvalidTypeTableEncoding(encoding.0))?;

    let entry_pos = (tt_pos as i64 - index as i64 * encoding_size as i64) as u64;
    let has_pcrel = encoding.0 & 0x10 == 0x10;
    let format_only = encoding.without_indirect().without_application();

    let mut cursor = Cursor::at(data, table_base, entry_pos);
    let raw = cursor.read_value_with_format(format_only, pointer_size)?;

    let pointer_to_typeinfo = if raw != 0 && has_pcrel {
        raw.wrapping_add(table_base).wrapping_add(entry_pos)
    } else {
        raw
    };

    Ok(TypeTableEntry {
        pointer_to_typeinfo,
        encoding_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // One call site with a positive type filter pointing at a single
    // absptr type-table entry.
    const WITH_TYPE_FILTER: [u8; 28] = [
        0xff, // landing pad base: omit
        0x00, // type table encoding: absptr
        0x19, // type table offset uleb = 25
        0x03, // cs table encoding: udata4
        0x0d, // cs table length = 13
        0x10, 0x00, 0x00, 0x00, // call_site_offset = 16
        0x20, 0x00, 0x00, 0x00, // call_site_length = 32
        0x40, 0x00, 0x00, 0x00, // landing_pad_offset = 64
        0x01, // action = 1 (first action chain entry)
        0x01, // filter = 1
        0x00, // next_offset = 0, end of chain
        0x34, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // type table entry -1: 0x1234
    ];

    #[test]
    fn call_site_with_positive_filter_resolves_type_table_entry() {
        let table_base = 0x5000;
        let fde_start_addr = 0x9000;
        let lsda = parse_lsda(&WITH_TYPE_FILTER, table_base, table_base, fde_start_addr, 8).unwrap();

        assert_eq!(lsda.landing_pad_base_addr, fde_start_addr);
        assert_eq!(lsda.type_table_addr, Some(table_base + 28));
        assert_eq!(lsda.call_sites.len(), 1);

        let cs = &lsda.call_sites[0];
        assert_eq!(cs.addr, fde_start_addr + 16);
        assert_eq!(cs.end_addr, fde_start_addr + 16 + 32);
        assert_eq!(cs.landing_pad_addr, fde_start_addr + 64);
        assert_eq!(cs.actions.len(), 1);
        assert_eq!(cs.actions[0].filter, 1);

        let entry = lsda.type_info(1).unwrap();
        assert_eq!(entry.pointer_to_typeinfo, 0x1234);
        assert_eq!(entry.encoding_size, 8);
    }

    // Same shape but with no type table and a negative (DES) filter, which
    // must be recorded on the action chain without being looked up.
    const WITH_DES_FILTER: [u8; 19] = [
        0xff, // landing pad base: omit
        0xff, // type table encoding: omit
        0x03, // cs table encoding: udata4
        0x0d, // cs table length = 13
        0x10, 0x00, 0x00, 0x00, // call_site_offset
        0x20, 0x00, 0x00, 0x00, // call_site_length
        0x40, 0x00, 0x00, 0x00, // landing_pad_offset
        0x01, // action = 1
        0x7f, // filter = -1 (dynamic exception specification)
        0x00, // next_offset = 0
    ];

    #[test]
    fn negative_filter_is_recorded_but_not_resolved() {
        let table_base = 0x5000;
        let lsda = parse_lsda(&WITH_DES_FILTER, table_base, table_base, 0x9000, 8).unwrap();

        assert_eq!(lsda.call_sites[0].actions[0].filter, -1);
        assert!(lsda.type_table.is_empty());
        assert!(lsda.type_info(-1).is_none());
    }

    #[test]
    fn out_of_range_lsda_address_is_an_error() {
        let table_base = 0x5000;
        let err = parse_lsda(&WITH_DES_FILTER, table_base, table_base + 1000, 0x9000, 8);
        assert!(matches!(err, Err(EhFrameError::OutOfRangeLsda { .. })));
    }
}
