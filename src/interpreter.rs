use crate::config::VmConfig;
use crate::debugger::{DebugControl, ThreadSnapshot};
use crate::disassembler;
use crate::error::ScriptFault;
use crate::game_world::GameWorld;
use crate::instruction::{decode_operands, Operand};
use crate::opcode_table::OpcodeTable;
use crate::scm_file::ScmFile;
use crate::vm::{
    Globals, Pc, PendingThread, ScriptThread, Vm, TIMER_LOCAL_A, TIMER_LOCAL_B, WAKE_YIELDED,
};
use log::{debug, error, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// The opcode that opens an AND/OR condition chain. Every other opcode
/// executed while a chain is open folds its stored result into the chain;
/// the opener itself must not.
const OPCODE_OPEN_CHAIN: u16 = 0x00D6;

/// What an opcode handler sees: the decoded operand list plus mutable
/// access to the owning thread, the shared globals, the loaded file, the
/// game world and the spawn queue.
pub struct ScriptContext<'a> {
    pub args: &'a [Operand],
    pub thread: &'a mut ScriptThread,
    pub globals: &'a mut Globals,
    pub file: &'a ScmFile,
    pub world: &'a mut dyn GameWorld,
    pub spawn: &'a mut Vec<PendingThread>,
}

impl ScriptContext<'_> {
    /// Integer value of an operand: an immediate, or the current contents
    /// of the referenced slot.
    pub fn int(&self, index: usize) -> i32 {
        match self.args.get(index) {
            Some(Operand::Global(slot)) => self.globals.get_int(*slot),
            Some(Operand::Local(slot)) => self.thread.local(*slot),
            Some(op) => op.immediate_int().unwrap_or_else(|| {
                error!("operand {index} of {} is not an integer", self.thread.name);
                0
            }),
            None => {
                error!("missing operand {index} on thread {}", self.thread.name);
                0
            }
        }
    }

    /// Real value of an operand: a fixed-point immediate, or the slot
    /// contents reinterpreted as a real.
    pub fn real(&self, index: usize) -> f32 {
        match self.args.get(index) {
            Some(Operand::Global(slot)) => self.globals.get_float(*slot),
            Some(Operand::Local(slot)) => f32::from_bits(self.thread.local(*slot) as u32),
            Some(Operand::Real(v)) => *v,
            _ => {
                error!("operand {index} of {} is not a real", self.thread.name);
                0.0
            }
        }
    }

    pub fn string(&self, index: usize) -> String {
        self.args
            .get(index)
            .and_then(Operand::as_string)
            .unwrap_or_default()
    }

    /// Store an integer through a slot-reference operand. Writing through
    /// an immediate is a script bug; it is logged and ignored.
    pub fn set_int(&mut self, index: usize, value: i32) {
        match self.args.get(index) {
            Some(Operand::Global(slot)) => self.globals.set_int(*slot, value),
            Some(Operand::Local(slot)) => {
                let slot = *slot;
                self.thread.set_local(slot, value);
            }
            _ => error!(
                "operand {index} on thread {} is not writable",
                self.thread.name
            ),
        }
    }

    pub fn set_real(&mut self, index: usize, value: f32) {
        match self.args.get(index) {
            Some(Operand::Global(slot)) => self.globals.set_float(*slot, value),
            Some(Operand::Local(slot)) => {
                let slot = *slot;
                self.thread.set_local(slot, value.to_bits() as i32);
            }
            _ => error!(
                "operand {index} on thread {} is not writable",
                self.thread.name
            ),
        }
    }

    /// Store a boolean for the condition machinery to pick up after the
    /// handler returns.
    pub fn set_condition(&mut self, value: bool) {
        self.thread.condition_result = value;
    }

    /// Resolve a jump-label operand. Negative labels are relative to the
    /// thread's base address (mission-local jumps).
    pub fn jump_target(&self, index: usize) -> Pc {
        let label = self.int(index);
        if label < 0 {
            self.thread.base_address + (-label) as Pc
        } else {
            label as Pc
        }
    }

    /// Queue a new thread; it joins the live set after the current slice
    /// and runs later in the same tick. `args` seed its leading locals.
    pub fn start_thread(&mut self, start: Pc, mission: bool, args: Vec<i32>) {
        self.spawn.push(PendingThread {
            start,
            mission,
            args,
        });
    }
}

/// The fetch-decode-dispatch engine driving every script thread once per
/// fixed game step.
pub struct Interpreter {
    pub vm: Vm,
    table: OpcodeTable,
    world: Box<dyn GameWorld>,
    config: VmConfig,
    debug: Arc<DebugControl>,
    /// Unimplemented opcode ids already diagnosed; each logs once.
    warned: HashSet<u16>,
}

impl Interpreter {
    pub fn new(vm: Vm, table: OpcodeTable, world: Box<dyn GameWorld>, config: VmConfig) -> Self {
        Interpreter {
            vm,
            table,
            world,
            config,
            debug: Arc::new(DebugControl::new()),
            warned: HashSet::new(),
        }
    }

    /// Handle shared with the inspection channel.
    pub fn debug_handle(&self) -> Arc<DebugControl> {
        Arc::clone(&self.debug)
    }

    pub fn table(&self) -> &OpcodeTable {
        &self.table
    }

    pub fn world_mut(&mut self) -> &mut dyn GameWorld {
        self.world.as_mut()
    }

    pub fn has_live_threads(&self) -> bool {
        !self.vm.threads.is_empty()
    }

    /// Number of distinct unimplemented opcodes diagnosed so far.
    pub fn warned_opcode_count(&self) -> usize {
        self.warned.len()
    }

    /// Advance every live thread by one fixed game step of `ms`
    /// milliseconds. Threads run in stable creation order; threads spawned
    /// during the tick run after their spawner in the same tick. Finished
    /// threads leave the live set at the end of the pass.
    pub fn tick(&mut self, ms: i32) -> Result<(), ScriptFault> {
        let mut index = 0;
        while index < self.vm.threads.len() {
            match self.run_slice(index, ms) {
                Ok(()) => {}
                Err(fault) if self.config.isolate_faults && !fault.is_corruption() => {
                    error!("script fault isolated to its thread: {fault}");
                    self.vm.threads[index].force_finish();
                }
                Err(fault) => return Err(fault),
            }
            self.vm.adopt_pending();
            index += 1;
        }
        self.vm.reap_finished();
        self.debug.publish_running(self.thread_snapshots());
        Ok(())
    }

    /// One thread's share of a tick: wake handling, then instructions until
    /// it sleeps, finishes or exhausts the per-tick budget.
    fn run_slice(&mut self, index: usize, ms: i32) -> Result<(), ScriptFault> {
        {
            let thread = &mut self.vm.threads[index];
            if thread.is_mission
                && thread.death_arrest_check
                && self.world.is_player_wasted_or_busted()
            {
                thread.wasted_or_busted = true;
                thread.reset_to_outer_frame();
            }
            if thread.allow_wait_skip && self.world.wait_skip_pressed() {
                thread.wake_counter = 0;
                thread.allow_wait_skip = false;
            }
            if thread.wake_counter > 0 {
                thread.wake_counter = (thread.wake_counter - ms).max(0);
            }
            if thread.wake_counter > 0 {
                return Ok(());
            }
        }

        let budget = self.config.instruction_budget;
        let mut executed = 0u32;
        loop {
            {
                let thread = &self.vm.threads[index];
                if thread.wake_counter != 0 || thread.finished {
                    break;
                }
            }
            self.debug_gate(index);
            self.dispatch_one(index)?;
            executed += 1;
            if executed >= budget {
                warn!(
                    "thread {} exhausted its {budget}-instruction budget this tick",
                    self.vm.threads[index].name
                );
                break;
            }
        }

        let thread = &mut self.vm.threads[index];
        thread.locals[TIMER_LOCAL_A] = thread.locals[TIMER_LOCAL_A].wrapping_add(ms);
        thread.locals[TIMER_LOCAL_B] = thread.locals[TIMER_LOCAL_B].wrapping_add(ms);
        if thread.wake_counter == WAKE_YIELDED {
            thread.wake_counter = 0;
        }
        Ok(())
    }

    /// The single pause point. When a breakpoint or pause request matches
    /// the next dispatch, the whole scheduler halts here until the bridge
    /// resumes it.
    fn debug_gate(&mut self, index: usize) {
        let (id, pc) = {
            let thread = &self.vm.threads[index];
            (thread.id, thread.program_counter)
        };
        if !self.debug.should_break(id, pc) {
            return;
        }
        let snapshot = self.thread_snapshots();
        self.debug.enter_pause(id, pc, snapshot);
    }

    /// Fetch, decode and dispatch exactly one instruction.
    fn dispatch_one(&mut self, index: usize) -> Result<(), ScriptFault> {
        let pc = self.vm.threads[index].program_counter;
        let thread_name = self.vm.threads[index].name.clone();

        let raw = self.vm.file.read_u16(pc)?;
        let (opcode, negated) = OpcodeTable::split_id(raw);
        let entry = self
            .table
            .lookup(opcode)
            .cloned()
            .ok_or_else(|| ScriptFault::IllegalInstruction {
                opcode,
                offset: pc,
                thread: thread_name.clone(),
            })?;

        let (operands, consumed) =
            decode_operands(self.vm.file.data(), pc + 2, entry.params, &thread_name)?;

        let Vm {
            file,
            globals,
            threads,
            pending,
            ..
        } = &mut self.vm;
        let thread = &mut threads[index];

        debug!(
            "{:8} {} {:06x} {:04x} {}",
            thread.name, thread.condition_result as u8, pc, opcode, entry.name
        );

        // The program counter moves past the whole instruction before the
        // handler runs; control opcodes overwrite it.
        thread.program_counter = pc + 2 + consumed;

        match entry.handler {
            Some(handler) => {
                let mut context = ScriptContext {
                    args: &operands,
                    thread,
                    globals,
                    file,
                    world: self.world.as_mut(),
                    spawn: pending,
                };
                handler(&mut context)?;
            }
            None => {
                if self.warned.insert(opcode) {
                    warn!(
                        "unimplemented opcode {opcode:04x} ({}) at {pc:06x} on thread {thread_name}",
                        entry.name
                    );
                }
            }
        }

        let thread = &mut self.vm.threads[index];
        if negated {
            thread.condition_result = !thread.condition_result;
        }
        if thread.condition_count > 0 && opcode != OPCODE_OPEN_CHAIN {
            thread.condition_count -= 1;
            if thread.condition_and {
                if !thread.condition_result {
                    thread.condition_mask = 0;
                }
            } else if thread.condition_mask != 0 || thread.condition_result {
                thread.condition_mask = 0xFF;
            }
            thread.condition_result = thread.condition_mask != 0;
        }
        Ok(())
    }

    /// Protocol-shaped state for every live thread, including a short
    /// forward disassembly replayed from each program counter.
    pub fn thread_snapshots(&self) -> Vec<ThreadSnapshot> {
        self.vm
            .threads
            .iter()
            .map(|t| ThreadSnapshot {
                address: t.id,
                program_counter: t.program_counter,
                name: t.name.clone(),
                wake_counter: t.wake_counter,
                call_stack: t.call_stack().to_vec(),
                disassembly: disassembler::window(
                    &self.vm.file,
                    &self.table,
                    t.program_counter,
                    self.config.disassembly_window,
                ),
            })
            .collect()
    }
}
