//! Test support: a byte-level script assembler and container builder used
//! across the unit tests.

use crate::config::VmConfig;
use crate::game_world::NullWorld;
use crate::instruction;
use crate::interpreter::Interpreter;
use crate::opcode_table::standard_table;
use crate::scm_file::ScmFile;
use crate::vm::{Pc, Vm};

/// Emits instruction bytes the way the compiler would.
#[derive(Default)]
pub struct Asm {
    bytes: Vec<u8>,
}

impl Asm {
    pub fn new() -> Self {
        Asm::default()
    }

    pub fn op(&mut self, id: u16) -> &mut Self {
        self.bytes.extend_from_slice(&id.to_le_bytes());
        self
    }

    pub fn int8(&mut self, v: i8) -> &mut Self {
        self.bytes.push(instruction::TYPE_INT8);
        self.bytes.push(v as u8);
        self
    }

    pub fn int16(&mut self, v: i16) -> &mut Self {
        self.bytes.push(instruction::TYPE_INT16);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn int32(&mut self, v: i32) -> &mut Self {
        self.bytes.push(instruction::TYPE_INT32);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Fixed-point real: value is quantized to sixteenths.
    pub fn real(&mut self, v: f32) -> &mut Self {
        self.bytes.push(instruction::TYPE_REAL16);
        let raw = (v * 16.0) as i16;
        self.bytes.extend_from_slice(&raw.to_le_bytes());
        self
    }

    pub fn global(&mut self, slot: u16) -> &mut Self {
        self.bytes.push(instruction::TYPE_GLOBAL);
        self.bytes.extend_from_slice(&slot.to_le_bytes());
        self
    }

    pub fn local(&mut self, slot: u16) -> &mut Self {
        self.bytes.push(instruction::TYPE_LOCAL);
        self.bytes.extend_from_slice(&slot.to_le_bytes());
        self
    }

    /// Inline 8-byte string; the first character doubles as the tag, so it
    /// must be printable.
    pub fn string8(&mut self, s: &str) -> &mut Self {
        let mut raw = [0u8; instruction::STRING_LEN];
        for (i, b) in s.bytes().take(instruction::STRING_LEN).enumerate() {
            raw[i] = b;
        }
        self.bytes.extend_from_slice(&raw);
        self
    }

    pub fn end_args(&mut self) -> &mut Self {
        self.bytes.push(instruction::TYPE_END_OF_ARG_LIST);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

fn jump_header(target: u32) -> Vec<u8> {
    let mut out = vec![0x02, 0x00, instruction::TYPE_INT32];
    out.extend_from_slice(&target.to_le_bytes());
    out
}

/// Build a whole script container: header jumps, globals section, model
/// table, mission table and code block. `globals_size` is the reported
/// globals-section size in bytes (header included) and must be at least 8.
pub fn build_container(
    models: &[&str],
    mission_offsets: &[u32],
    globals_size: u32,
    code: &[u8],
) -> Vec<u8> {
    assert!(globals_size >= 8);
    let model_section = 8 + globals_size;
    let mission_section = model_section + 4 + 24 * models.len() as u32 + 8;
    let code_section = mission_section + 12 + 4 * mission_offsets.len() as u32;

    let mut out = Vec::new();
    out.extend_from_slice(&jump_header(model_section - 8));
    out.push(0xC6);
    out.resize((model_section - 8) as usize, 0);
    out.extend_from_slice(&jump_header(mission_section - 8));
    out.push(0);
    out.extend_from_slice(&(models.len() as u32).to_le_bytes());
    for model in models {
        let mut entry = [0u8; 24];
        for (i, b) in model.bytes().take(23).enumerate() {
            entry[i] = b;
        }
        out.extend_from_slice(&entry);
    }
    out.extend_from_slice(&jump_header(code_section));
    out.push(0);
    let total = code_section + code.len() as u32;
    out.extend_from_slice(&total.to_le_bytes()); // main size
    out.extend_from_slice(&0u32.to_le_bytes()); // largest mission size
    out.extend_from_slice(&(mission_offsets.len() as u32).to_le_bytes());
    for offset in mission_offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    debug_assert_eq!(out.len() as u32, code_section);
    out.extend_from_slice(code);
    out
}

/// A loaded container holding just the given code block and 64 global
/// slots. Returns the file and the code's start offset.
pub fn program_file(code: Vec<u8>) -> (ScmFile, Pc) {
    let data = build_container(&[], &[], 8 + 64 * 4, &code);
    let file = ScmFile::load(data).unwrap();
    let start = file.code_section();
    (file, start)
}

/// An interpreter over the given code with the standard table and a null
/// world; the root thread is started at the code's first byte.
pub fn interpreter_for(code: Vec<u8>) -> (Interpreter, Pc) {
    interpreter_with_config(code, VmConfig::default())
}

pub fn interpreter_with_config(code: Vec<u8>, config: VmConfig) -> (Interpreter, Pc) {
    let (file, start) = program_file(code);
    let mut vm = Vm::new(file);
    vm.start_thread(start, false);
    let interp = Interpreter::new(vm, standard_table(), Box::new(NullWorld::default()), config);
    (interp, start)
}
