//! DWARF pointer encoding byte: low nibble selects the value's numeric
//! representation, high nibble selects the base it's applied against, and
//! the top bit marks it as indirect. See spec §4.A / §6.

use num_enum::TryFromPrimitive;

/// `omit` sentinel value for an encoding byte: no pointer is present.
pub const DW_EH_PE_OMIT: u8 = 0xff;

const APPLICATION_MASK: u8 = 0x70;
const INDIRECT_BIT: u8 = 0x80;
const FORMAT_MASK: u8 = 0x0f;

#[allow(non_camel_case_types)]
#[derive(Debug, TryFromPrimitive, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PointerFormat {
    /// The value is a literal pointer whose size is the architecture's pointer width.
    DW_EH_PE_absptr = 0x00,
    /// Unsigned LEB128.
    DW_EH_PE_uleb128 = 0x01,
    /// A 2 byte unsigned value.
    DW_EH_PE_udata2 = 0x02,
    /// A 4 byte unsigned value.
    DW_EH_PE_udata4 = 0x03,
    /// An 8 byte unsigned value.
    DW_EH_PE_udata8 = 0x04,
    /// Signed LEB128.
    DW_EH_PE_sleb128 = 0x09,
    /// A 2 byte signed value.
    DW_EH_PE_sdata2 = 0x0a,
    /// A 4 byte signed value.
    DW_EH_PE_sdata4 = 0x0b,
    /// An 8 byte signed value.
    DW_EH_PE_sdata8 = 0x0c,
}

#[allow(non_camel_case_types)]
#[derive(Debug, TryFromPrimitive, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PointerApplication {
    /// Value as read, no base applied.
    DW_EH_PE_absptr = 0x00,
    /// Value is relative to the address of the encoded value itself.
    DW_EH_PE_pcrel = 0x10,
    /// Value is relative to the start of the `.text` section. Unsupported: a hard error.
    DW_EH_PE_textrel = 0x20,
    /// Value is relative to the start of `.got`/`.eh_frame_hdr`. Unsupported: a hard error.
    DW_EH_PE_datarel = 0x30,
    /// Value is relative to the start of the function. Unsupported: a hard error.
    DW_EH_PE_funcrel = 0x40,
    /// Value is aligned to an address-unit boundary. Unsupported: a hard error.
    DW_EH_PE_aligned = 0x50,
}

/// A raw DWARF pointer-encoding byte, decomposed into format + application +
/// indirect bit. `indirect` is recorded but never dereferenced by this
/// parser (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEncoding(pub u8);

impl PointerEncoding {
    pub fn is_omit(self) -> bool {
        self.0 == DW_EH_PE_OMIT
    }

    pub fn is_indirect(self) -> bool {
        self.0 & INDIRECT_BIT != 0
    }

    pub fn without_indirect(self) -> Self {
        Self(self.0 & !INDIRECT_BIT)
    }

    pub fn without_application(self) -> Self {
        Self(self.0 & !APPLICATION_MASK)
    }

    pub fn format(self) -> Result<PointerFormat, num_enum::TryFromPrimitiveError<PointerFormat>> {
        PointerFormat::try_from(self.0 & FORMAT_MASK)
    }

    pub fn application(
        self,
    ) -> Result<PointerApplication, num_enum::TryFromPrimitiveError<PointerApplication>> {
        PointerApplication::try_from(self.0 & APPLICATION_MASK)
    }

    /// Byte size of a value read under this encoding's format nibble, given
    /// the architecture pointer size. Used for type-table negative
    /// indexing (spec §4.F).
    pub fn value_size(self, pointer_size: u8) -> Option<u64> {
        match self.format().ok()? {
            PointerFormat::DW_EH_PE_udata2 | PointerFormat::DW_EH_PE_sdata2 => Some(2),
            PointerFormat::DW_EH_PE_udata4 | PointerFormat::DW_EH_PE_sdata4 => Some(4),
            PointerFormat::DW_EH_PE_udata8 | PointerFormat::DW_EH_PE_sdata8 => Some(8),
            PointerFormat::DW_EH_PE_absptr => Some(pointer_size as u64),
            PointerFormat::DW_EH_PE_uleb128 | PointerFormat::DW_EH_PE_sleb128 => None,
        }
    }
}
