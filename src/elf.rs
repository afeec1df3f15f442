//! Component I: a thin adapter that locates `.eh_frame`, `.eh_frame_hdr`,
//! and `.gcc_except_table` in an ELF file. Section lookup itself is out of
//! this crate's scope beyond this adapter — everything downstream works
//! from plain byte slices and addresses (see `parser::ParseInput`).

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use object::{Object, ObjectSection};

use crate::error::{EhFrameError, Result};

/// The sections this crate parses, copied out of a mapped ELF file so the
/// mapping and the `object` parse don't need to outlive this value.
#[derive(Debug, Clone)]
pub struct ElfSections {
    pub eh_frame: Vec<u8>,
    pub eh_frame_addr: u64,
    pub eh_frame_hdr: Option<(Vec<u8>, u64)>,
    pub gcc_except_table: Option<(Vec<u8>, u64)>,
    pub pointer_size: u8,
}

/// Maps `path` and copies out the sections above plus the architecture's
/// pointer size (4 for ELFCLASS32, 8 for ELFCLASS64).
pub fn read_sections(path: &Path) -> Result<ElfSections> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let object_file = object::File::parse(&*mmap)?;

    let eh_frame_section = object_file
        .section_by_name(".eh_frame")
        .ok_or(EhFrameError::SectionNotFound(".eh_frame"))?;
    let eh_frame = eh_frame_section.uncompressed_data()?.into_owned();
    let eh_frame_addr = eh_frame_section.address();

    let eh_frame_hdr = read_optional_section(&object_file, ".eh_frame_hdr");
    let gcc_except_table = read_optional_section(&object_file, ".gcc_except_table");

    let pointer_size = if object_file.is_64() { 8 } else { 4 };

    Ok(ElfSections {
        eh_frame,
        eh_frame_addr,
        eh_frame_hdr,
        gcc_except_table,
        pointer_size,
    })
}

fn read_optional_section(object_file: &object::File, name: &str) -> Option<(Vec<u8>, u64)> {
    let section = object_file.section_by_name(name)?;
    let data = section.uncompressed_data().ok()?.into_owned();
    Some((data, section.address()))
}
