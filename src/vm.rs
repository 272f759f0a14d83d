use crate::error::ScriptFault;
use crate::scm_file::ScmFile;
use log::error;

/// Local variable slots available to each script thread.
pub const THREAD_LOCAL_SLOTS: usize = 256;

/// Maximum call depth per thread.
pub const CALL_STACK_DEPTH: usize = 4;

/// Sleep-timer sentinel: the thread yielded for the rest of the tick and
/// runs again next tick.
pub const WAKE_YIELDED: i32 = -1;

/// Local slots that accumulate elapsed milliseconds every tick the thread
/// runs; scripts use them as free-running timers.
pub const TIMER_LOCAL_A: usize = 16;
pub const TIMER_LOCAL_B: usize = 17;

/// Byte offset within the loaded script buffer; the program counter.
pub type Pc = u32;

/// The flat store of 4-byte script variables shared by every thread.
///
/// Slots hold raw 32-bit cells: integer access reads them as `i32`,
/// real access reinterprets the same bits as `f32`, matching the on-disk
/// representation the globals section is copied from. Sized at load time,
/// never resized.
pub struct Globals {
    slots: Vec<i32>,
}

impl Globals {
    /// Copy the globals section out of a loaded script file.
    pub fn from_file(file: &ScmFile) -> Self {
        let start = file.global_section() as usize;
        let end = (file.global_section() + file.globals_size()) as usize;
        let section = file.data().get(start..end).unwrap_or(&[]);
        let slots = section
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Globals { slots }
    }

    pub fn with_slots(count: usize) -> Self {
        Globals {
            slots: vec![0; count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get_int(&self, index: u16) -> i32 {
        match self.slots.get(index as usize) {
            Some(&v) => v,
            None => {
                error!("global {} out of bounds ({} slots)", index, self.slots.len());
                0
            }
        }
    }

    pub fn set_int(&mut self, index: u16, value: i32) {
        match self.slots.get_mut(index as usize) {
            Some(slot) => *slot = value,
            None => error!("global {} out of bounds ({} slots)", index, self.slots.len()),
        }
    }

    pub fn get_float(&self, index: u16) -> f32 {
        f32::from_bits(self.get_int(index) as u32)
    }

    pub fn set_float(&mut self, index: u16, value: f32) {
        self.set_int(index, value.to_bits() as i32);
    }

    /// Raw snapshot of every slot, for save/inspection purposes.
    pub fn raw(&self) -> &[i32] {
        &self.slots
    }
}

/// One cooperative script thread: a continuation record owned by the
/// scheduler, not an operating-system thread.
#[derive(Debug, Clone)]
pub struct ScriptThread {
    /// Stable identity, unique for the life of the machine.
    pub id: u32,
    pub name: String,
    /// Start address; negative jump targets resolve relative to this.
    pub base_address: Pc,
    pub program_counter: Pc,

    /// Open condition-chain bookkeeping (see the chain-opening opcode).
    pub condition_count: u32,
    pub condition_result: bool,
    pub condition_mask: u8,
    pub condition_and: bool,

    /// Milliseconds until the thread wakes; `WAKE_YIELDED` means yielded
    /// until next tick.
    pub wake_counter: i32,
    pub locals: [i32; THREAD_LOCAL_SLOTS],
    pub is_mission: bool,
    pub finished: bool,
    /// The startup thread; a return on an empty stack here is a fault
    /// rather than thread exit.
    pub is_root: bool,

    /// Mission threads with this set snap back to their outermost frame
    /// when the player is wasted or busted.
    pub death_arrest_check: bool,
    pub wasted_or_busted: bool,
    /// The current sleep can be cut short by the skip control.
    pub allow_wait_skip: bool,

    stack_depth: usize,
    calls: [Pc; CALL_STACK_DEPTH],
}

impl ScriptThread {
    pub fn new(id: u32, start: Pc, mission: bool, root: bool) -> Self {
        ScriptThread {
            id,
            name: "THREAD".to_string(),
            base_address: start,
            program_counter: start,
            condition_count: 0,
            condition_result: false,
            condition_mask: 0,
            condition_and: false,
            wake_counter: 0,
            locals: [0; THREAD_LOCAL_SLOTS],
            is_mission: mission,
            finished: false,
            is_root: root,
            death_arrest_check: true,
            wasted_or_busted: false,
            allow_wait_skip: false,
            stack_depth: 0,
            calls: [0; CALL_STACK_DEPTH],
        }
    }

    pub fn local(&self, index: u16) -> i32 {
        match self.locals.get(index as usize) {
            Some(&v) => v,
            None => {
                error!("local {} out of bounds on thread {}", index, self.name);
                0
            }
        }
    }

    pub fn set_local(&mut self, index: u16, value: i32) {
        match self.locals.get_mut(index as usize) {
            Some(slot) => *slot = value,
            None => error!("local {} out of bounds on thread {}", index, self.name),
        }
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_depth
    }

    /// Return addresses currently on the call stack, innermost last.
    pub fn call_stack(&self) -> &[Pc] {
        &self.calls[..self.stack_depth]
    }

    /// Push a continuation address for a call opcode.
    pub fn push_call(&mut self, return_to: Pc) -> Result<(), ScriptFault> {
        if self.stack_depth == CALL_STACK_DEPTH {
            return Err(ScriptFault::StackOverflow {
                offset: self.program_counter,
                thread: self.name.clone(),
            });
        }
        self.calls[self.stack_depth] = return_to;
        self.stack_depth += 1;
        Ok(())
    }

    /// Pop the innermost continuation for a return opcode. `None` means the
    /// stack was empty; the scheduler decides whether that exits the thread
    /// or faults.
    pub fn pop_call(&mut self) -> Option<Pc> {
        if self.stack_depth == 0 {
            return None;
        }
        self.stack_depth -= 1;
        Some(self.calls[self.stack_depth])
    }

    /// Snap back to the outermost stored frame (death/arrest handling).
    pub fn reset_to_outer_frame(&mut self) {
        self.stack_depth = 0;
        self.program_counter = self.calls[0];
    }

    /// Force-finish during cleanup: takes effect on the next scheduling
    /// pass, never mid-instruction.
    pub fn force_finish(&mut self) {
        self.wake_counter = WAKE_YIELDED;
        self.finished = true;
    }
}

/// A thread requested by a running handler; adopted into the live set by
/// the scheduler after the current slice.
#[derive(Debug, Clone)]
pub struct PendingThread {
    pub start: Pc,
    pub mission: bool,
    /// Values copied into the leading local slots of the new thread.
    pub args: Vec<i32>,
}

/// All mutable machine state: the loaded file, the shared globals and the
/// live thread set.
pub struct Vm {
    pub file: ScmFile,
    pub globals: Globals,
    pub threads: Vec<ScriptThread>,
    pub pending: Vec<PendingThread>,
    next_thread_id: u32,
}

impl Vm {
    /// Build a machine over a loaded file, copying out its globals section.
    pub fn new(file: ScmFile) -> Self {
        let globals = Globals::from_file(&file);
        Vm {
            file,
            globals,
            threads: Vec::new(),
            pending: Vec::new(),
            next_thread_id: 0,
        }
    }

    /// Start a thread at the given byte offset. The first thread started is
    /// the root thread.
    pub fn start_thread(&mut self, start: Pc, mission: bool) -> u32 {
        let id = self.next_thread_id;
        self.next_thread_id += 1;
        let root = id == 0;
        self.threads.push(ScriptThread::new(id, start, mission, root));
        id
    }

    /// Move handler-spawned threads into the live set, seeding their locals
    /// from the spawn arguments. They run later in the same tick, after
    /// their spawner.
    pub fn adopt_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for spawn in pending {
            self.start_thread(spawn.start, spawn.mission);
            if let Some(thread) = self.threads.last_mut() {
                for (slot, value) in spawn.args.iter().enumerate() {
                    thread.set_local(slot as u16, *value);
                }
            }
        }
    }

    /// Drop finished threads from the live set.
    pub fn reap_finished(&mut self) {
        self.threads.retain(|t| !t.finished);
    }

    pub fn thread_by_id(&self, id: u32) -> Option<&ScriptThread> {
        self.threads.iter().find(|t| t.id == id)
    }
}
