//! Standalone disassembler: prints every instruction of a compiled script's
//! main block, or of a range starting at a given offset.

use libertyvm::instruction::Instruction;
use libertyvm::opcode_table::standard_table;
use libertyvm::scm_file::ScmFile;
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: {} <script.scm> [start-offset-hex]", args[0]);
        return Ok(());
    }

    let data = std::fs::read(&args[1])?;
    let file = ScmFile::load(data)?;
    let table = standard_table();

    let start = match args.get(2) {
        Some(s) => u32::from_str_radix(s.trim_start_matches("0x"), 16)
            .map_err(|_| format!("invalid start offset: {s}"))?,
        None => file.code_section(),
    };

    let mut addr = start;
    while addr < file.main_size() {
        match Instruction::decode(file.data(), addr, &table, "disassembler") {
            Ok(instruction) => {
                println!("{addr:06x}: {instruction}");
                addr += instruction.size;
            }
            Err(e) => {
                eprintln!("{addr:06x}: {e}");
                break;
            }
        }
    }
    Ok(())
}
