use thiserror::Error;

/// Faults raised while loading or executing script bytecode.
///
/// Fatal faults unwind out of the per-tick call; whether a dispatch fault
/// takes down the whole machine or only the offending thread is decided by
/// the scheduler (see `VmConfig::isolate_faults`). Corruption faults
/// (`CorruptFile`, `OutOfBounds`) are always fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptFault {
    /// The script container failed structural validation at load time.
    #[error("corrupt script file: {0}")]
    CorruptFile(String),

    /// An opcode id with no table entry was dispatched.
    #[error("illegal instruction {opcode:04x} encountered at offset {offset:04x} on thread {thread}")]
    IllegalInstruction {
        opcode: u16,
        offset: u32,
        thread: String,
    },

    /// An operand tag byte that no decoder recognises.
    #[error("unknown data type {tag:02x} encountered at offset {offset:04x} on thread {thread}")]
    UnknownType { tag: u8, offset: u32, thread: String },

    /// A call opcode exceeded the bounded per-thread call stack.
    #[error("call stack overflow at offset {offset:04x} on thread {thread}")]
    StackOverflow { offset: u32, thread: String },

    /// A return opcode on the root thread found no frame to pop.
    #[error("call stack underflow at offset {offset:04x} on thread {thread}")]
    StackUnderflow { offset: u32, thread: String },

    /// A read past the end of the loaded bytecode buffer.
    #[error("read of {len} bytes at offset {offset:04x} is out of bounds (script size {size})")]
    OutOfBounds { offset: u32, len: usize, size: usize },
}

impl ScriptFault {
    /// True for faults that indicate corrupted shared state rather than a
    /// misbehaving thread. These abort the machine even when thread fault
    /// isolation is enabled.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ScriptFault::CorruptFile(_) | ScriptFault::OutOfBounds { .. }
        )
    }
}
