//! Parses ELF exception-handling metadata — `.eh_frame`, `.eh_frame_hdr`,
//! and `.gcc_except_table` — into CIEs, FDEs, their CFI programs, and the
//! LSDAs those programs' augmentation data points at.
//!
//! This crate decodes; it does not unwind. Given section bytes and
//! addresses it produces a structured, queryable representation. Locating
//! those sections in a binary is handled by the optional [`elf`] adapter;
//! everything else works from plain byte slices.

pub mod cfi;
pub mod cie;
pub mod cursor;
pub mod elf;
pub mod encoding;
pub mod error;
pub mod fde;
pub mod lsda;
pub mod parser;

pub use cie::Cie;
pub use error::{EhFrameError, Result};
pub use fde::Fde;
pub use lsda::{Action, CallSite, Lsda, TypeTableEntry};
pub use parser::{parse, EhFrameParser, ParseInput};
