//! Component D: a Common Information Entry — the template shared by every
//! FDE that refers to it (augmentation, alignment factors, personality).

use crate::cfi::{parse_program, CfiProgram};
use crate::cursor::Cursor;
use crate::encoding::{PointerEncoding, DW_EH_PE_OMIT};
use crate::error::{EhFrameError, Result};

/// A parsed CIE. Position fields are section-relative virtual addresses,
/// matching the rest of this crate's addressing convention.
#[derive(Debug, Clone)]
pub struct Cie {
    pub position: u64,
    pub length: u64,
    pub version: u8,
    pub augmentation: String,
    pub code_alignment_factor: u64,
    pub data_alignment_factor: i64,
    pub return_address_register: u64,
    pub augmentation_data_length: Option<u64>,
    pub personality_encoding: PointerEncoding,
    pub personality: Option<u64>,
    pub personality_pointer_position: Option<u64>,
    pub personality_pointer_size: Option<u64>,
    pub lsda_encoding: PointerEncoding,
    pub fde_encoding: PointerEncoding,
    pub program: CfiProgram,
}

impl Cie {
    pub fn has_augmentation(&self, letter: char) -> bool {
        self.augmentation.contains(letter)
    }
}

/// Parses the CIE whose length field starts at `cursor`'s current position.
/// `cursor`'s `max()` must already be scoped to the `.eh_frame` section (the
/// record's own length is read from the stream, not assumed).
pub fn parse_cie(cursor: &mut Cursor, pointer_size: u8) -> Result<Cie> {
    let position = cursor.current_address();
    let length = cursor.read_length()?;
    let end = cursor.position() + length;

    let cie_id = cursor.read_u32()?;
    if cie_id != 0 {
        return Err(EhFrameError::InvalidCieId(cie_id));
    }

    let version = cursor.read_u8()?;
    if version != 1 && version != 3 {
        return Err(EhFrameError::InvalidCieVersion(version));
    }

    let augmentation = cursor.read_cstr()?;

    let code_alignment_factor = cursor.read_uleb128()?;
    let data_alignment_factor = cursor.read_sleb128()?;

    let return_address_register = if version == 1 {
        cursor.read_u8()? as u64
    } else {
        cursor.read_uleb128()?
    };

    let has_z = augmentation.contains('z');
    let augmentation_data_length = if has_z {
        Some(cursor.read_uleb128()?)
    } else {
        None
    };

    let mut personality_encoding = PointerEncoding(DW_EH_PE_OMIT);
    let mut personality = None;
    let mut personality_pointer_position = None;
    let mut personality_pointer_size = None;
    if augmentation.contains('P') {
        personality_encoding = PointerEncoding(cursor.read_u8()?);
        let start = cursor.position();
        let value = cursor.read_encoded_pointer(personality_encoding.without_indirect(), pointer_size)?;
        personality = Some(value);
        personality_pointer_position = Some(start);
        personality_pointer_size = Some(cursor.position() - start);
    }

    let mut lsda_encoding = PointerEncoding(DW_EH_PE_OMIT);
    if augmentation.contains('L') {
        lsda_encoding = PointerEncoding(cursor.read_u8()?);
    }

    let mut fde_encoding = PointerEncoding(DW_EH_PE_OMIT);
    if augmentation.contains('R') {
        fde_encoding = PointerEncoding(cursor.read_u8()?);
    }

    if augmentation.contains('S') {
        log::debug!("CIE at 0x{position:x} has the 'S' (signal frame) augmentation letter, recorded and otherwise unused");
    }
    for letter in augmentation.chars() {
        if letter != 'z'
            && letter != 'P'
            && letter != 'L'
            && letter != 'R'
            && letter != 'S'
        {
            log::warn!(
                "CIE at 0x{position:x} has unrecognized augmentation letter '{letter}', skipping remaining augmentation-dependent fields"
            );
        }
    }

    let mut program_cursor = cursor.clone();
    program_cursor.set_max(end);
    let program = parse_program(&mut program_cursor, pointer_size)?;
    cursor.set_position(end);

    Ok(Cie {
        position,
        length,
        version,
        augmentation,
        code_alignment_factor,
        data_alignment_factor,
        return_address_register,
        augmentation_data_length,
        personality_encoding,
        personality,
        personality_pointer_position,
        personality_pointer_size,
        lsda_encoding,
        fde_encoding,
        program,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // version 1, augmentation "zR", CAF=1, DAF=-8, RAR=16, fde_encoding=pcrel|sdata4,
    // program: def_cfa(7,8); offset(16,1); nop; nop.
    const CIE: [u8; 24] = [
        0x14, 0, 0, 0, 0, 0, 0, 0, 1, 0x7a, 0x52, 0, 1, 0x78, 0x10, 1, 0x1b, 0x0c, 7, 8, 0x90, 1,
        0, 0,
    ];

    #[test]
    fn parses_zr_augmented_cie() {
        let mut cursor = Cursor::new(&CIE, 0);
        let cie = parse_cie(&mut cursor, 8).unwrap();

        assert_eq!(cie.version, 1);
        assert_eq!(cie.augmentation, "zR");
        assert_eq!(cie.code_alignment_factor, 1);
        assert_eq!(cie.data_alignment_factor, -8);
        assert_eq!(cie.return_address_register, 16);
        assert_eq!(cie.augmentation_data_length, Some(1));
        assert_eq!(cie.fde_encoding.0, 0x1b);
        assert!(cie.personality.is_none());
        assert_eq!(cie.program.instructions().len(), 4);
        assert_eq!(cursor.position(), CIE.len() as u64);
    }

    #[test]
    fn rejects_nonzero_cie_id() {
        let mut bad = CIE;
        bad[4] = 1;
        let mut cursor = Cursor::new(&bad, 0);
        assert!(parse_cie(&mut cursor, 8).is_err());
    }
}
