use crate::disassembler::InstructionInfo;
use crate::vm::Pc;
use log::info;
use serde::Serialize;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// How long a bridge request waits for the scheduler to reach the next
/// instruction boundary before answering with whatever state it has.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Interrupted,
}

/// A registered stop condition: thread identity plus program counter.
/// `thread: None` matches any thread at that address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub thread: Option<u32>,
    pub pc: Pc,
}

/// The (thread, pc) pair the scheduler is currently halted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakpointHit {
    pub program_counter: Pc,
    pub thread: u32,
}

/// Per-thread state in protocol shape. `address` is the thread's stable
/// identity.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadSnapshot {
    pub address: u32,
    pub program_counter: Pc,
    pub name: String,
    pub wake_counter: i32,
    pub call_stack: Vec<Pc>,
    pub disassembly: Vec<InstructionInfo>,
}

/// Everything a state query reports.
#[derive(Debug, Clone, Serialize)]
pub struct MachineSnapshot {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoint: Option<BreakpointHit>,
    pub threads: Vec<ThreadSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Step,
    Continue,
}

struct Shared {
    status: RunStatus,
    pause_requested: bool,
    breakpoints: Vec<Breakpoint>,
    active: Option<BreakpointHit>,
    command: Option<Command>,
    threads: Vec<ThreadSnapshot>,
    /// Bumped on every snapshot publication; lets a step request wait for
    /// the re-pause that follows its single instruction.
    generation: u64,
}

/// The rendezvous between the scheduler and the inspection channel.
///
/// The scheduler calls `should_break`/`enter_pause` at instruction
/// boundaries and `publish_running` at tick end; the bridge thread issues
/// interrupt/step/continue and reads composed snapshots. The handshake is a
/// mutex plus condition variable on both sides; nobody spins.
pub struct DebugControl {
    shared: Mutex<Shared>,
    cond: Condvar,
}

impl Default for DebugControl {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugControl {
    pub fn new() -> Self {
        DebugControl {
            shared: Mutex::new(Shared {
                status: RunStatus::Running,
                pause_requested: false,
                breakpoints: Vec::new(),
                active: None,
                command: None,
                threads: Vec::new(),
                generation: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn add_breakpoint(&self, thread: Option<u32>, pc: Pc) {
        let mut shared = self.shared.lock().unwrap();
        let breakpoint = Breakpoint { thread, pc };
        if !shared.breakpoints.contains(&breakpoint) {
            shared.breakpoints.push(breakpoint);
        }
    }

    pub fn remove_breakpoint(&self, thread: Option<u32>, pc: Pc) {
        let mut shared = self.shared.lock().unwrap();
        shared
            .breakpoints
            .retain(|b| !(b.pc == pc && b.thread == thread));
    }

    /// Scheduler side: does the next dispatch on (thread, pc) hit a stop
    /// condition?
    pub fn should_break(&self, thread: u32, pc: Pc) -> bool {
        let shared = self.shared.lock().unwrap();
        shared.pause_requested
            || shared
                .breakpoints
                .iter()
                .any(|b| b.pc == pc && b.thread.map_or(true, |t| t == thread))
    }

    /// Scheduler side: halt here until the bridge says otherwise. The whole
    /// scheduler stops; no thread advances while this blocks. Returns after
    /// a continue, or after a step with the scheduler re-arming itself to
    /// pause at the very next instruction boundary.
    pub fn enter_pause(&self, thread: u32, pc: Pc, threads: Vec<ThreadSnapshot>) {
        let mut shared = self.shared.lock().unwrap();
        let hit = BreakpointHit {
            program_counter: pc,
            thread,
        };
        info!("interpreter halted at {:04x} on thread {}", pc, thread);
        shared.status = RunStatus::Interrupted;
        shared.pause_requested = false;
        shared.active = Some(hit);
        shared.threads = threads;
        shared.generation += 1;
        self.cond.notify_all();

        loop {
            shared = self
                .cond
                .wait_while(shared, |s| s.command.is_none())
                .unwrap();
            match shared.command.take() {
                Some(Command::Step) => {
                    // One instruction, then back here via the pause flag.
                    shared.pause_requested = true;
                    return;
                }
                Some(Command::Continue) => {
                    if let Some(active) = shared.active.take() {
                        shared.breakpoints.retain(|b| {
                            !(b.pc == active.program_counter
                                && b.thread.map_or(true, |t| t == active.thread))
                        });
                    }
                    shared.status = RunStatus::Running;
                    shared.generation += 1;
                    self.cond.notify_all();
                    info!("interpreter resumed");
                    return;
                }
                None => {}
            }
        }
    }

    /// Scheduler side: refresh the published thread state at tick end.
    /// Skipped while interrupted so a pending step observes only the
    /// re-pause snapshot, never a tick-end one.
    pub fn publish_running(&self, threads: Vec<ThreadSnapshot>) {
        let mut shared = self.shared.lock().unwrap();
        if shared.status == RunStatus::Interrupted {
            return;
        }
        shared.threads = threads;
        shared.generation += 1;
    }

    fn compose(shared: &Shared) -> MachineSnapshot {
        MachineSnapshot {
            status: shared.status,
            breakpoint: shared.active,
            threads: shared.threads.clone(),
        }
    }

    /// Bridge side: current state, no scheduling action.
    pub fn state(&self) -> MachineSnapshot {
        let shared = self.shared.lock().unwrap();
        Self::compose(&shared)
    }

    /// Bridge side: request a pause at the next instruction boundary and
    /// wait for the scheduler to acknowledge it.
    pub fn interrupt(&self) -> MachineSnapshot {
        let mut shared = self.shared.lock().unwrap();
        if shared.status == RunStatus::Interrupted {
            return Self::compose(&shared);
        }
        shared.pause_requested = true;
        let (guard, _) = self
            .cond
            .wait_timeout_while(shared, HANDSHAKE_TIMEOUT, |s| {
                s.status != RunStatus::Interrupted
            })
            .unwrap();
        Self::compose(&guard)
    }

    /// Bridge side: while paused, execute exactly one instruction on the
    /// halted thread, then re-pause. No-op while running.
    pub fn step(&self) -> MachineSnapshot {
        let mut shared = self.shared.lock().unwrap();
        if shared.status != RunStatus::Interrupted {
            return Self::compose(&shared);
        }
        let waited_for = shared.generation;
        shared.command = Some(Command::Step);
        self.cond.notify_all();
        let (guard, _) = self
            .cond
            .wait_timeout_while(shared, HANDSHAKE_TIMEOUT, |s| {
                s.generation <= waited_for || s.status != RunStatus::Interrupted
            })
            .unwrap();
        Self::compose(&guard)
    }

    /// Bridge side: clear the active breakpoint and resume normal
    /// scheduling. No-op while running.
    pub fn resume(&self) -> MachineSnapshot {
        let mut shared = self.shared.lock().unwrap();
        if shared.status != RunStatus::Interrupted {
            return Self::compose(&shared);
        }
        shared.command = Some(Command::Continue);
        self.cond.notify_all();
        let (guard, _) = self
            .cond
            .wait_timeout_while(shared, HANDSHAKE_TIMEOUT, |s| {
                s.status == RunStatus::Interrupted
            })
            .unwrap();
        Self::compose(&guard)
    }
}
