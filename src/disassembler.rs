use crate::instruction::{Instruction, Operand};
use crate::opcode_table::OpcodeTable;
use crate::scm_file::ScmFile;
use crate::vm::Pc;
use serde::Serialize;

/// One disassembled instruction in protocol shape.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionInfo {
    pub address: Pc,
    pub function: String,
    pub arguments: Vec<ArgumentInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArgumentInfo {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: ArgumentValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Int(i32),
    Real(f32),
    Text(String),
}

fn argument_info(operand: &Operand) -> ArgumentInfo {
    let value = match *operand {
        Operand::Int8(v) => ArgumentValue::Int(v as i32),
        Operand::Int16(v) => ArgumentValue::Int(v as i32),
        Operand::Int32(v) => ArgumentValue::Int(v),
        Operand::Real(v) => ArgumentValue::Real(v),
        Operand::String8(_) => ArgumentValue::Text(operand.as_string().unwrap_or_default()),
        Operand::Global(i) => ArgumentValue::Int(i as i32),
        Operand::Local(i) => ArgumentValue::Int(i as i32),
    };
    ArgumentInfo {
        kind: operand.type_name(),
        value,
    }
}

fn info(addr: Pc, instruction: &Instruction) -> InstructionInfo {
    let mut function = String::new();
    if instruction.negated {
        function.push_str("not ");
    }
    function.push_str(instruction.name);
    InstructionInfo {
        address: addr,
        function,
        arguments: instruction.operands.iter().map(argument_info).collect(),
    }
}

/// A short forward disassembly starting at `start`, computed by replaying
/// the decoder without touching any live state. Stops early at the first
/// undecodable instruction; a pause inside data or an unmapped region
/// simply yields a shorter window.
pub fn window(
    file: &ScmFile,
    table: &OpcodeTable,
    start: Pc,
    count: usize,
) -> Vec<InstructionInfo> {
    let mut out = Vec::with_capacity(count);
    let mut addr = start;
    for _ in 0..count {
        match Instruction::decode(file.data(), addr, table, "disassembler") {
            Ok(instruction) => {
                out.push(info(addr, &instruction));
                addr += instruction.size;
            }
            Err(_) => break,
        }
    }
    out
}
