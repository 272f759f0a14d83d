use crate::error::ScriptFault;
use crate::opcode_table::OpcodeTable;
use std::fmt::{self, Display, Formatter, Write as _};

/// Operand type tags as encoded in the instruction stream.
pub const TYPE_END_OF_ARG_LIST: u8 = 0x00;
pub const TYPE_INT32: u8 = 0x01;
pub const TYPE_GLOBAL: u8 = 0x02;
pub const TYPE_LOCAL: u8 = 0x03;
pub const TYPE_INT8: u8 = 0x04;
pub const TYPE_INT16: u8 = 0x05;
pub const TYPE_REAL16: u8 = 0x06;

/// Tag bytes above this value are the first byte of an inline 8-byte string;
/// the byte is part of the string, not a separate tag.
const INLINE_STRING_THRESHOLD: u8 = 42;

/// Length of an inline string operand.
pub const STRING_LEN: usize = 8;

/// Divisor turning a 16-bit fixed-point payload into a real value.
const FIXED_POINT_SCALE: f32 = 16.0;

/// One decoded operand.
///
/// Immediate integers are decoded sign-extended at their encoded width.
/// `Global` and `Local` carry the slot index; handlers resolve them to
/// writable storage through the execution context, so an opcode can assign
/// a result back into script state.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Real(f32),
    String8([u8; STRING_LEN]),
    Global(u16),
    Local(u16),
}

impl Operand {
    /// Wire name of the operand's type, used by the inspection protocol.
    pub fn type_name(&self) -> &'static str {
        match self {
            Operand::Int8(_) => "int8",
            Operand::Int16(_) => "int16",
            Operand::Int32(_) => "int32",
            Operand::Real(_) => "real",
            Operand::String8(_) => "string",
            Operand::Global(_) => "global",
            Operand::Local(_) => "local",
        }
    }

    /// The immediate integer value, if this operand is one.
    pub fn immediate_int(&self) -> Option<i32> {
        match *self {
            Operand::Int8(v) => Some(v as i32),
            Operand::Int16(v) => Some(v as i32),
            Operand::Int32(v) => Some(v),
            _ => None,
        }
    }

    /// The inline string with trailing NULs stripped, if this operand is one.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Operand::String8(raw) => Some(
                raw.iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as char)
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn is_slot(&self) -> bool {
        matches!(self, Operand::Global(_) | Operand::Local(_))
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int8(v) => write!(f, "{v}"),
            Operand::Int16(v) => write!(f, "{v}"),
            Operand::Int32(v) => write!(f, "{v}"),
            Operand::Real(v) => write!(f, "{v}"),
            Operand::String8(_) => write!(f, "'{}'", self.as_string().unwrap_or_default()),
            Operand::Global(i) => write!(f, "${i}"),
            Operand::Local(i) => write!(f, "@{i}"),
        }
    }
}

fn rd_u8(data: &[u8], at: u32) -> Result<u8, ScriptFault> {
    data.get(at as usize)
        .copied()
        .ok_or(ScriptFault::OutOfBounds {
            offset: at,
            len: 1,
            size: data.len(),
        })
}

fn rd_bytes<const N: usize>(data: &[u8], at: u32) -> Result<[u8; N], ScriptFault> {
    let start = at as usize;
    data.get(start..start + N)
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or(ScriptFault::OutOfBounds {
            offset: at,
            len: N,
            size: data.len(),
        })
}

/// Decode the operand list for one instruction.
///
/// `declared` is the opcode's declared parameter count; a negative count
/// means "decode until the end-of-arg-list tag". The terminator is consumed
/// but not surfaced. Returns the operands and the exact number of bytes
/// consumed; the cursor advance is always the payload size implied by each
/// tag, never inferred from content.
pub fn decode_operands(
    data: &[u8],
    start: u32,
    declared: i16,
    whom: &str,
) -> Result<(Vec<Operand>, u32), ScriptFault> {
    let mut at = start;
    let mut operands = Vec::new();

    let mut open_ended = declared < 0;
    let required = declared.unsigned_abs() as usize;

    let mut p = 0;
    while p < required || open_ended {
        let tag = rd_u8(data, at)?;

        if tag > INLINE_STRING_THRESHOLD {
            // Inline string: the byte just read is the first character.
            operands.push(Operand::String8(rd_bytes::<STRING_LEN>(data, at)?));
            at += STRING_LEN as u32;
            p += 1;
            continue;
        }
        at += 1;

        match tag {
            TYPE_END_OF_ARG_LIST => {
                open_ended = false;
            }
            TYPE_INT8 => {
                operands.push(Operand::Int8(rd_u8(data, at)? as i8));
                at += 1;
            }
            TYPE_INT16 => {
                operands.push(Operand::Int16(i16::from_le_bytes(rd_bytes(data, at)?)));
                at += 2;
            }
            TYPE_INT32 => {
                operands.push(Operand::Int32(i32::from_le_bytes(rd_bytes(data, at)?)));
                at += 4;
            }
            TYPE_GLOBAL => {
                operands.push(Operand::Global(u16::from_le_bytes(rd_bytes(data, at)?)));
                at += 2;
            }
            TYPE_LOCAL => {
                operands.push(Operand::Local(u16::from_le_bytes(rd_bytes(data, at)?)));
                at += 2;
            }
            TYPE_REAL16 => {
                let raw = i16::from_le_bytes(rd_bytes(data, at)?);
                operands.push(Operand::Real(raw as f32 / FIXED_POINT_SCALE));
                at += 2;
            }
            _ => {
                return Err(ScriptFault::UnknownType {
                    tag,
                    offset: at - 1,
                    thread: whom.to_string(),
                });
            }
        }
        p += 1;
    }

    Ok((operands, at - start))
}

/// A fully decoded instruction, as used by the disassembler and tests.
/// The dispatch loop decodes the same fields piecemeal.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Opcode id with the negate bit masked off.
    pub opcode: u16,
    /// Whether the encoded id carried the negate-condition bit.
    pub negated: bool,
    /// Table name for the opcode.
    pub name: &'static str,
    pub operands: Vec<Operand>,
    /// Total encoded size in bytes, id included.
    pub size: u32,
}

impl Instruction {
    /// Decode the instruction at `addr`, consulting `table` for the declared
    /// parameter count. Fails with `IllegalInstruction` when the id has no
    /// table entry.
    pub fn decode(
        data: &[u8],
        addr: u32,
        table: &OpcodeTable,
        whom: &str,
    ) -> Result<Self, ScriptFault> {
        let raw = u16::from_le_bytes(rd_bytes(data, addr)?);
        let (opcode, negated) = OpcodeTable::split_id(raw);
        let entry = table
            .lookup(opcode)
            .ok_or_else(|| ScriptFault::IllegalInstruction {
                opcode,
                offset: addr,
                thread: whom.to_string(),
            })?;
        let (operands, consumed) = decode_operands(data, addr + 2, entry.params, whom)?;
        Ok(Instruction {
            opcode,
            negated,
            name: entry.name,
            operands,
            size: 2 + consumed,
        })
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "not ")?;
        }
        write!(f, "{}", self.name)?;
        let mut sep = ' ';
        for op in &self.operands {
            f.write_char(sep)?;
            write!(f, "{op}")?;
            sep = ',';
        }
        Ok(())
    }
}
