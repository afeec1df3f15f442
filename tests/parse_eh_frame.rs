//! End-to-end coverage of the section-set driver and query façade over a
//! hand-assembled `.eh_frame` buffer: one CIE (augmentation "R", absolute
//! pointer encoding) followed by two FDEs and a zero-length terminator.

use ehframe::parser::{parse, ParseInput};

fn build_eh_frame() -> Vec<u8> {
    let mut buf = Vec::new();

    // CIE: length=12, cie_id=0, version=1, aug="R", CAF=1, DAF=-4, RAR=16,
    // fde_encoding=0x03 (udata4, absolute), program=[nop].
    buf.extend_from_slice(&[
        0x0c, 0x00, 0x00, 0x00, // length
        0x00, 0x00, 0x00, 0x00, // cie_id
        0x01, // version
        0x52, 0x00, // "R\0"
        0x01, // CAF uleb = 1
        0x7c, // DAF sleb = -4
        0x10, // return address register = 16
        0x03, // fde_encoding = udata4 | absptr
        0x00, // program: nop
    ]);
    assert_eq!(buf.len(), 16);

    // FDE 1: start=0x2000, range=0x30, program=[nop].
    buf.extend_from_slice(&[
        0x0d, 0x00, 0x00, 0x00, // length = 13
        0x14, 0x00, 0x00, 0x00, // cie back-ref = 20 (field position 20, cie at 0)
        0x00, 0x20, 0x00, 0x00, // start_addr = 0x2000
        0x30, 0x00, 0x00, 0x00, // range_len = 0x30
        0x00, // program: nop
    ]);
    assert_eq!(buf.len(), 33);

    // FDE 2: start=0x3000, range=0x10, program=[nop].
    buf.extend_from_slice(&[
        0x0d, 0x00, 0x00, 0x00, // length = 13
        0x25, 0x00, 0x00, 0x00, // cie back-ref = 37 (field position 37, cie at 0)
        0x00, 0x30, 0x00, 0x00, // start_addr = 0x3000
        0x10, 0x00, 0x00, 0x00, // range_len = 0x10
        0x00, // program: nop
    ]);
    assert_eq!(buf.len(), 50);

    // Zero-length terminator.
    buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    buf
}

#[test]
fn driver_classifies_cie_and_fdes_and_stops_at_terminator() {
    let eh_frame = build_eh_frame();
    let parsed = parse(ParseInput {
        eh_frame: &eh_frame,
        eh_frame_addr: 0,
        gcc_except_table: None,
        pointer_size: 8,
    })
    .unwrap();

    assert_eq!(parsed.cies().len(), 1);
    assert_eq!(parsed.fdes().len(), 2);

    let cie = &parsed.cies()[0];
    assert_eq!(cie.augmentation, "R");
    assert_eq!(cie.code_alignment_factor, 1);
    assert_eq!(cie.data_alignment_factor, -4);

    let first = &parsed.fdes()[0];
    assert_eq!(first.start_addr, 0x2000);
    assert_eq!(first.end_addr(), 0x2030);

    let second = &parsed.fdes()[1];
    assert_eq!(second.start_addr, 0x3000);
    assert_eq!(second.end_addr(), 0x3010);
}

#[test]
fn find_fde_resolves_pc_to_the_containing_range() {
    let eh_frame = build_eh_frame();
    let parsed = parse(ParseInput {
        eh_frame: &eh_frame,
        eh_frame_addr: 0,
        gcc_except_table: None,
        pointer_size: 8,
    })
    .unwrap();

    assert_eq!(parsed.find_fde(0x2010).unwrap().start_addr, 0x2000);
    assert_eq!(parsed.find_fde(0x3008).unwrap().start_addr, 0x3000);
    assert!(parsed.find_fde(0x2030).is_none()); // end is exclusive
    assert!(parsed.find_fde(0x1000).is_none());
    assert!(parsed.find_fde(0x2800).is_none()); // between the two ranges
}

#[test]
fn unrecognized_augmentation_letter_is_not_fatal() {
    use ehframe::cie::parse_cie;
    use ehframe::cursor::Cursor;

    // Same CIE as above but augmentation is "Rx": 'x' is unknown and must
    // be tolerated (logged, not an error) since 'z' is absent so there is
    // no augmentation-data length to desynchronize on.
    let cie_bytes: [u8; 17] = [
        0x0d, 0x00, 0x00, 0x00, // length = 13
        0x00, 0x00, 0x00, 0x00, // cie_id
        0x01, // version
        0x52, 0x78, 0x00, // "Rx\0"
        0x01, // CAF
        0x7c, // DAF
        0x10, // RAR
        0x03, // fde_encoding (for 'R')
        0x00, // program: nop
    ];

    let mut cursor = Cursor::new(&cie_bytes, 0);
    let cie = parse_cie(&mut cursor, 8).unwrap();
    assert_eq!(cie.augmentation, "Rx");
}

#[test]
fn truncated_extended_length_terminator_ends_the_section_without_error() {
    // The CIE plus one FDE from `build_eh_frame`, but instead of a clean
    // zero-length terminator the section ends on a dangling `0xffffffff`
    // with no following 8-byte extended-length word (spec §8 scenario 4).
    let mut eh_frame = build_eh_frame();
    eh_frame.truncate(33); // CIE + FDE 1, drop FDE 2 and the terminator
    eh_frame.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);

    let parsed = parse(ParseInput {
        eh_frame: &eh_frame,
        eh_frame_addr: 0,
        gcc_except_table: None,
        pointer_size: 8,
    })
    .unwrap();

    assert_eq!(parsed.cies().len(), 1);
    assert_eq!(parsed.fdes().len(), 1);
    assert_eq!(parsed.fdes()[0].start_addr, 0x2000);
}

#[test]
fn zero_length_terminator_word_also_ends_the_section() {
    let mut eh_frame = build_eh_frame();
    eh_frame.truncate(33); // CIE + FDE 1 only, keep the existing all-zero terminator semantics
    eh_frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let parsed = parse(ParseInput {
        eh_frame: &eh_frame,
        eh_frame_addr: 0,
        gcc_except_table: None,
        pointer_size: 8,
    })
    .unwrap();

    assert_eq!(parsed.fdes().len(), 1);
}

#[test]
fn empty_gcc_except_table_degrades_to_fdes_without_lsdas() {
    // A CIE with an 'L' augmentation (LSDA encoding present) and an FDE
    // whose lsda_addr is nonzero, paired with a present-but-empty
    // `.gcc_except_table` blob — exactly what `elf::read_sections` hands
    // back for a zero-size section.
    let mut buf = Vec::new();

    // CIE: length=16, aug="zLR", CAF=1, DAF=-4, RAR=16, aug_data_len=1,
    // lsda_encoding=absptr(0x00), fde_encoding=udata4|absptr(0x03),
    // program=[nop]. 20 bytes total (4-byte length field + 16 of content).
    buf.extend_from_slice(&[
        0x10, 0x00, 0x00, 0x00, // length = 16
        0x00, 0x00, 0x00, 0x00, // cie_id
        0x01, // version
        0x7a, 0x4c, 0x52, 0x00, // "zLR\0"
        0x01, // CAF uleb = 1
        0x7c, // DAF sleb = -4
        0x10, // return address register = 16
        0x01, // aug_data_len uleb = 1
        0x00, // lsda_encoding = absptr
        0x03, // fde_encoding = udata4 | absptr
        0x00, // program: nop
    ]);
    assert_eq!(buf.len(), 20);

    // FDE: length=18, cie back-ref=24 (field position 24, cie at 0),
    // start=0x2000, range=0x30, aug_data_len=4, lsda_addr=0x9000 (nonzero),
    // program=[nop]. 22 bytes total.
    buf.extend_from_slice(&[
        0x12, 0x00, 0x00, 0x00, // length = 18
        0x18, 0x00, 0x00, 0x00, // cie back-ref = 24
        0x00, 0x20, 0x00, 0x00, // start_addr = 0x2000
        0x30, 0x00, 0x00, 0x00, // range_len = 0x30
        0x04, // aug_data_len uleb = 4
        0x00, 0x90, 0x00, 0x00, // lsda_addr = 0x9000
        0x00, // program: nop
    ]);
    assert_eq!(buf.len(), 42);

    buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // terminator

    let empty_table: [u8; 0] = [];
    let parsed = parse(ParseInput {
        eh_frame: &buf,
        eh_frame_addr: 0,
        gcc_except_table: Some((&empty_table, 0x9000)),
        pointer_size: 8,
    })
    .unwrap();

    assert_eq!(parsed.fdes().len(), 1);
    let fde = &parsed.fdes()[0];
    assert_eq!(fde.lsda_addr, Some(0x9000));
    assert!(fde.lsda.is_none());
}
