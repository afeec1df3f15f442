use std::io;

use num_enum::TryFromPrimitiveError;
use thiserror::Error;

use crate::encoding::{PointerApplication, PointerFormat};

/// Everything that can go wrong while decoding `.eh_frame` / `.eh_frame_hdr` /
/// `.gcc_except_table`. Parsing is all-or-nothing: any variant here aborts
/// the enclosing `parse()` call, per the parser's synchronous, single-pass
/// design.
#[derive(Debug, Error)]
pub enum EhFrameError {
    #[error("truncated input: {0}")]
    Truncated(&'static str),

    #[error("encoded pointer has encoding `omit`, caller must check before reading")]
    OmitPointerEncoding,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("LEB decode error: {0}")]
    Leb(#[from] leb128::read::Error),

    #[error("pointer format decode error: {0}")]
    PointerFormatDecode(#[from] TryFromPrimitiveError<PointerFormat>),

    #[error("pointer application decode error: {0}")]
    PointerApplicationDecode(#[from] TryFromPrimitiveError<PointerApplication>),

    #[error("unsupported pointer application 0x{0:02x}")]
    UnsupportedPointerApplication(u8),

    #[error("invalid CIE version {0}, expected 1 or 3")]
    InvalidCieVersion(u8),

    #[error("invalid CIE id {0}, expected 0")]
    InvalidCieId(u32),

    #[error("FDE at 0x{fde_position:x} references CIE at 0x{cie_position:x}: {reason}")]
    InvalidCieReference {
        fde_position: u64,
        cie_position: u64,
        reason: &'static str,
    },

    #[error("unknown CFI opcode 0x{0:02x}")]
    UnknownCfiOpcode(u8),

    #[error("LSDA address 0x{addr:x} outside .gcc_except_table [0x{start:x}, 0x{end:x})")]
    OutOfRangeLsda { addr: u64, start: u64, end: u64 },

    #[error("invalid type table encoding nibble 0x{0:x}")]
    InvalidTypeTableEncoding(u8),

    #[error("action chain did not terminate within .gcc_except_table")]
    ActionChainCycle,

    #[error("unsupported pointer size {0}, expected 4 or 8")]
    UnsupportedPointerSize(u8),

    #[error("section '{0}' not found")]
    SectionNotFound(&'static str),

    #[error("object file error: {0}")]
    Object(#[from] object::Error),
}

pub type Result<T> = std::result::Result<T, EhFrameError>;
