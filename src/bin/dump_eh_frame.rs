use std::path::Path;

use ehframe::{elf, parser};

fn main() {
    env_logger::init();

    let args: Vec<_> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} <program>", args[0]);
        return;
    }

    let sections = elf::read_sections(Path::new(&args[1])).unwrap();

    let gcc_except_table = sections
        .gcc_except_table
        .as_ref()
        .map(|(data, addr)| (data.as_slice(), *addr));

    let parsed = parser::parse(parser::ParseInput {
        eh_frame: &sections.eh_frame,
        eh_frame_addr: sections.eh_frame_addr,
        gcc_except_table,
        pointer_size: sections.pointer_size,
    })
    .unwrap();

    println!("{} CIEs, {} FDEs", parsed.cies().len(), parsed.fdes().len());
    for fde in parsed.fdes() {
        println!(
            "[{:08x}] FDE start={:08x} end={:08x} lsda={}",
            fde.position,
            fde.start_addr,
            fde.end_addr(),
            fde.lsda_addr.map_or("none".to_string(), |a| format!("{a:08x}"))
        );
    }
}
