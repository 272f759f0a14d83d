use crate::error::ScriptFault;
use crate::interpreter::ScriptContext;
use indexmap::IndexMap;
use log::debug;

/// High bit of an encoded opcode id: invert the boolean produced by a
/// conditional opcode. Masked off before table lookup.
pub const NEGATE_CONDITION_MASK: u16 = 0x8000;

/// An opcode implementation. Handlers read their decoded operands through
/// the context and may mutate the owning thread, the globals store and the
/// game world.
pub type OpcodeHandler = fn(&mut ScriptContext<'_>) -> Result<(), ScriptFault>;

/// One registered opcode.
#[derive(Clone)]
pub struct OpcodeEntry {
    /// Human-readable name, e.g. "goto_if_false".
    pub name: &'static str,
    /// Declared parameter count. Negative means the operand list is
    /// open-ended and terminated in-stream by the end-of-arg-list tag.
    pub params: i16,
    /// `None` marks a bound-but-unimplemented opcode: dispatch consumes the
    /// declared operands and emits a diagnostic, nothing else.
    pub handler: Option<OpcodeHandler>,
}

impl OpcodeEntry {
    pub fn implemented(&self) -> bool {
        self.handler.is_some()
    }
}

/// A named group of related opcodes, merged into the table at start-up.
pub struct OpcodeModule {
    name: &'static str,
    entries: Vec<(u16, OpcodeEntry)>,
}

impl OpcodeModule {
    pub fn new(name: &'static str) -> Self {
        OpcodeModule {
            name,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register an implemented opcode.
    pub fn bind_function(
        &mut self,
        id: u16,
        name: &'static str,
        params: i16,
        handler: OpcodeHandler,
    ) {
        self.entries.push((
            id,
            OpcodeEntry {
                name,
                params,
                handler: Some(handler),
            },
        ));
    }

    /// Register a diagnostic no-op with the same arity contract as the real
    /// opcode, keeping the instruction stream aligned.
    pub fn bind_unimplemented(&mut self, id: u16, name: &'static str, params: i16) {
        self.entries.push((
            id,
            OpcodeEntry {
                name,
                params,
                handler: None,
            },
        ));
    }
}

/// The merged opcode dispatch table. Built exactly once at start-up and
/// read-only thereafter; owned by the script subsystem, not a global.
pub struct OpcodeTable {
    entries: IndexMap<u16, OpcodeEntry>,
}

impl OpcodeTable {
    /// Merge independent modules into one table. Duplicate ids are rejected:
    /// the first registration wins and later ones are ignored, so modules
    /// sharing id space cannot silently override each other.
    pub fn from_modules(modules: Vec<OpcodeModule>) -> Self {
        let mut entries: IndexMap<u16, OpcodeEntry> = IndexMap::new();
        for module in modules {
            for (id, entry) in module.entries {
                match entries.entry(id) {
                    indexmap::map::Entry::Occupied(existing) => {
                        debug!(
                            "module {} re-registers opcode {:04x} ({}); keeping {}",
                            module.name,
                            id,
                            entry.name,
                            existing.get().name
                        );
                    }
                    indexmap::map::Entry::Vacant(slot) => {
                        slot.insert(entry);
                    }
                }
            }
        }
        debug!("opcode table built with {} entries", entries.len());
        OpcodeTable { entries }
    }

    /// Split a raw encoded id into the table id and the negate flag.
    pub fn split_id(raw: u16) -> (u16, bool) {
        (
            raw & !NEGATE_CONDITION_MASK,
            raw & NEGATE_CONDITION_MASK != 0,
        )
    }

    /// Look up an opcode by id. Callers pass an already-masked id; raw ids
    /// with the negate bit set go through `split_id` first.
    pub fn lookup(&self, opcode: u16) -> Option<&OpcodeEntry> {
        self.entries.get(&opcode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The full table for the supported script dialect: every standard module
/// merged in registration order.
pub fn standard_table() -> OpcodeTable {
    OpcodeTable::from_modules(vec![
        crate::opcodes_vm::module(),
        crate::opcodes_math::module(),
        crate::opcodes_compare::module(),
        crate::opcodes_game::module(),
    ])
}
