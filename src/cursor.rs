//! Component A: bounds-checked primitive reads over a byte slice, with a
//! per-call upper bound (`max`) and the virtual base address the slice is
//! loaded at (`section_base`), needed to resolve PC-relative encodings.

use std::io;

use byteorder::{ByteOrder, LittleEndian};

use crate::encoding::{PointerApplication, PointerEncoding, PointerFormat};
use crate::error::{EhFrameError, Result};

/// A cursor over `data`, reading from `position` and refusing to read past
/// `max` (which may be less than `data.len()` when bounding a single
/// record or program). `section_base` is the virtual address of `data[0]`.
#[derive(Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    position: u64,
    max: u64,
    section_base: u64,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], section_base: u64) -> Self {
        Self {
            data,
            position: 0,
            max: data.len() as u64,
            section_base,
        }
    }

    pub fn at(data: &'a [u8], section_base: u64, position: u64) -> Self {
        let mut c = Self::new(data, section_base);
        c.position = position;
        c
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Bound subsequent reads to at most `max` (a position in the same
    /// coordinate space as `position()`). Used to scope a CIE/FDE/program
    /// to its own length-prefixed record.
    pub fn set_max(&mut self, max: u64) {
        self.max = max;
    }

    pub fn section_base(&self) -> u64 {
        self.section_base
    }

    /// Virtual address of the current read position.
    pub fn current_address(&self) -> u64 {
        self.section_base.wrapping_add(self.position)
    }

    fn check_bounds(&self, size: u64) -> Result<()> {
        if self.position.saturating_add(size) > self.max {
            return Err(EhFrameError::Truncated("read past record bound"));
        }
        if self.position.saturating_add(size) > self.data.len() as u64 {
            return Err(EhFrameError::Truncated("read past buffer end"));
        }
        Ok(())
    }

    fn bytes(&self, size: u64) -> Result<&'a [u8]> {
        self.check_bounds(size)?;
        let start = self.position as usize;
        let end = start + size as usize;
        Ok(&self.data[start..end])
    }

    /// Raw bytes in `[start, end)`, both positions in the same coordinate
    /// space as `position()`. Used to capture a just-parsed record's exact
    /// byte span (e.g. a single CFI instruction) for later re-decoding.
    pub fn slice(&self, start: u64, end: u64) -> Result<&'a [u8]> {
        if end > self.data.len() as u64 || start > end {
            return Err(EhFrameError::Truncated("slice out of bounds"));
        }
        Ok(&self.data[start as usize..end as usize])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let b = self.bytes(1)?[0];
        self.position += 1;
        Ok(b)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let v = LittleEndian::read_u16(self.bytes(2)?);
        self.position += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let v = LittleEndian::read_i16(self.bytes(2)?);
        self.position += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = LittleEndian::read_u32(self.bytes(4)?);
        self.position += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let v = LittleEndian::read_i32(self.bytes(4)?);
        self.position += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let v = LittleEndian::read_u64(self.bytes(8)?);
        self.position += 8;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let v = LittleEndian::read_i64(self.bytes(8)?);
        self.position += 8;
        Ok(v)
    }

    /// Reads a NUL-terminated ASCII string, advancing past the terminator.
    pub fn read_cstr(&mut self) -> Result<String> {
        let mut s = String::new();
        loop {
            let b = self.read_u8()?;
            if b == 0 {
                break;
            }
            s.push(b as char);
        }
        Ok(s)
    }

    /// The bytes remaining up to `max`, handed to the `leb128` crate's
    /// `Read`-based decoders so over-reads surface as truncation rather
    /// than walking off the end of the record.
    fn bounded_reader(&self) -> io::Cursor<&'a [u8]> {
        let start = self.position as usize;
        let end = (self.max as usize).min(self.data.len());
        io::Cursor::new(&self.data[start.min(end)..end])
    }

    pub fn read_uleb128(&mut self) -> Result<u64> {
        let mut reader = self.bounded_reader();
        let value = leb128::read::unsigned(&mut reader)?;
        self.position += reader.position();
        Ok(value)
    }

    pub fn read_sleb128(&mut self) -> Result<i64> {
        let mut reader = self.bounded_reader();
        let value = leb128::read::signed(&mut reader)?;
        self.position += reader.position();
        Ok(value)
    }

    /// 4-byte length, promoted to an 8-byte "extended length" when it reads
    /// as `0xffffffff` (spec §4.A / §6).
    pub fn read_length(&mut self) -> Result<u64> {
        let length = self.read_u32()?;
        if length == 0xffff_ffff {
            self.read_u64()
        } else {
            Ok(length as u64)
        }
    }

    /// Decodes a value under `encoding`'s format nibble only (no base
    /// applied). Used directly for FDE range lengths, which are plain
    /// unsigned lengths regardless of the FDE encoding's high nibble.
    pub fn read_value_with_format(
        &mut self,
        encoding: PointerEncoding,
        pointer_size: u8,
    ) -> Result<u64> {
        if encoding.is_omit() {
            return Err(EhFrameError::OmitPointerEncoding);
        }
        match encoding.format()? {
            PointerFormat::DW_EH_PE_uleb128 => self.read_uleb128(),
            PointerFormat::DW_EH_PE_sleb128 => Ok(self.read_sleb128()? as u64),
            PointerFormat::DW_EH_PE_udata2 => Ok(self.read_u16()? as u64),
            PointerFormat::DW_EH_PE_udata4 => Ok(self.read_u32()? as u64),
            PointerFormat::DW_EH_PE_udata8 => self.read_u64(),
            PointerFormat::DW_EH_PE_sdata2 => Ok(self.read_i16()? as i64 as u64),
            PointerFormat::DW_EH_PE_sdata4 => Ok(self.read_i32()? as i64 as u64),
            PointerFormat::DW_EH_PE_sdata8 => Ok(self.read_i64()? as u64),
            PointerFormat::DW_EH_PE_absptr => match pointer_size {
                4 => Ok(self.read_u32()? as u64),
                8 => self.read_u64(),
                other => Err(EhFrameError::UnsupportedPointerSize(other)),
            },
        }
    }

    /// Full DWARF-encoded pointer read: format nibble decides the raw
    /// value, application nibble decides the base it's relative to. The
    /// `indirect` bit is recorded on `encoding` but never dereferenced
    /// (spec §4.A).
    pub fn read_encoded_pointer(
        &mut self,
        encoding: PointerEncoding,
        pointer_size: u8,
    ) -> Result<u64> {
        if encoding.is_omit() {
            return Err(EhFrameError::OmitPointerEncoding);
        }
        let read_position = self.position;
        let unapplied = self.read_value_with_format(encoding.without_indirect(), pointer_size)?;

        match encoding.application()? {
            PointerApplication::DW_EH_PE_absptr => Ok(unapplied),
            PointerApplication::DW_EH_PE_pcrel => {
                Ok(unapplied.wrapping_add(self.section_base).wrapping_add(read_position))
            }
            other @ (PointerApplication::DW_EH_PE_textrel
            | PointerApplication::DW_EH_PE_datarel
            | PointerApplication::DW_EH_PE_funcrel
            | PointerApplication::DW_EH_PE_aligned) => {
                Err(EhFrameError::UnsupportedPointerApplication(other as u8))
            }
        }
    }
}
