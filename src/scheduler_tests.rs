//! Scheduler behavior tests: sleep timing, call stacks, condition chains,
//! thread lifecycle, fault policy and the per-tick instruction budget.

use crate::config::VmConfig;
use crate::error::ScriptFault;
use crate::game_world::{GameWorld, MessageKind};
use crate::interpreter::Interpreter;
use crate::opcode_table::standard_table;
use crate::test_scripts::{interpreter_for, interpreter_with_config, program_file, Asm};
use crate::vm::Vm;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use test_log::test;

/// The code block's start offset is fixed by the test container layout.
fn program_start() -> u32 {
    let (_, start) = program_file(Vec::new());
    start
}

/// A world with test-controllable player state.
#[derive(Default)]
struct TestWorld {
    wasted: Arc<AtomicBool>,
    skip: Arc<AtomicBool>,
}

impl GameWorld for TestWorld {
    fn hour(&self) -> i32 {
        12
    }
    fn minute(&self) -> i32 {
        30
    }
    fn set_time(&mut self, _hour: i32, _minute: i32) {}
    fn is_button_pressed(&self, _player: i32, _button: i32) -> bool {
        false
    }
    fn wait_skip_pressed(&self) -> bool {
        self.skip.load(Ordering::Relaxed)
    }
    fn is_player_wasted_or_busted(&self) -> bool {
        self.wasted.load(Ordering::Relaxed)
    }
    fn mission_over(&mut self) {}
    fn display_message(&mut self, _id: &str, _ms: i32, _style: i32, _kind: MessageKind) {}
    fn clear_messages(&mut self) {}
    fn request_model(&mut self, _id: i32, _name: Option<&str>) {}
}

#[test]
fn sleep_timer_gates_execution_until_elapsed() {
    let mut asm = Asm::new();
    asm.op(0x0004).global(2).int32(1); // set g2 = 1
    asm.op(0x0001).int32(500); // wait 500
    asm.op(0x0004).global(2).int32(2); // set g2 = 2
    asm.op(0x004E); // terminate
    let (mut interp, _) = interpreter_for(asm.build());

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.globals.get_int(2), 1);

    // 31 more 16ms ticks leave 4ms outstanding; no instruction runs.
    for _ in 0..31 {
        interp.tick(16).unwrap();
        assert_eq!(interp.vm.globals.get_int(2), 1);
    }

    // The tick that crosses 500ms resumes the thread within that tick.
    interp.tick(16).unwrap();
    assert_eq!(interp.vm.globals.get_int(2), 2);
    assert!(!interp.has_live_threads());
}

#[test]
fn nested_calls_unwind_to_the_outermost_continuation() {
    let mut asm = Asm::new();
    asm.op(0x0050).int32(-26); // gosub A
    asm.op(0x0004).global(2).int32(99); // runs only after full unwind
    asm.op(0x0001).int32(1000); // wait
    asm.op(0x004E); // terminate
    asm.op(0x0050).int32(-35); // A: gosub B
    asm.op(0x0051); // return
    asm.op(0x0050).int32(-44); // B: gosub C
    asm.op(0x0051); // return
    asm.op(0x0051); // C: return
    let (mut interp, start) = interpreter_for(asm.build());

    interp.tick(16).unwrap();
    let thread = &interp.vm.threads[0];
    assert_eq!(interp.vm.globals.get_int(2), 99);
    assert!(thread.call_stack().is_empty());
    // Asleep at the wait following the instruction after the outermost call.
    assert_eq!(thread.program_counter, start + 24);
}

#[test]
fn call_stack_overflow_is_fatal() {
    let mut asm = Asm::new();
    asm.op(0x0004).global(2).int32(0);
    asm.op(0x0050).int32(-10); // gosub to itself, pushing forever
    let (mut interp, _) = interpreter_for(asm.build());

    let err = interp.tick(16).unwrap_err();
    assert!(matches!(err, ScriptFault::StackOverflow { .. }));
}

#[test]
fn return_on_empty_stack_faults_the_root_thread() {
    let mut asm = Asm::new();
    asm.op(0x0051); // return with nothing to pop
    let (mut interp, _) = interpreter_for(asm.build());

    let err = interp.tick(16).unwrap_err();
    assert!(matches!(err, ScriptFault::StackUnderflow { .. }));
}

#[test]
fn return_on_empty_stack_exits_a_spawned_thread() {
    let start = program_start();
    let mut asm = Asm::new();
    asm.op(0x004F).int32((start + 15) as i32).end_args(); // start_new_script
    asm.op(0x0001).int32(1000); // wait
    asm.op(0x0051); // spawned thread body: bare return
    let (mut interp, _) = interpreter_for(asm.build());

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.threads.len(), 1);
    assert_eq!(interp.vm.threads[0].id, 0);
}

#[test]
fn negate_bit_complements_the_condition() {
    let program = |negate: bool| {
        let mut asm = Asm::new();
        asm.op(0x0004).global(5).int32(7);
        let id = if negate { 0x0038 | 0x8000 } else { 0x0038 };
        asm.op(id).global(5).int32(7); // g5 == 7, optionally negated
        asm.op(0x0001).int32(1000);
        asm.build()
    };

    let (mut plain, _) = interpreter_for(program(false));
    plain.tick(16).unwrap();
    assert!(plain.vm.threads[0].condition_result);

    let (mut negated, _) = interpreter_for(program(true));
    negated.tick(16).unwrap();
    assert!(!negated.vm.threads[0].condition_result);
}

#[test]
fn and_chain_folds_all_results() {
    let program = |second: i32| {
        let mut asm = Asm::new();
        asm.op(0x0004).global(1).int32(1);
        asm.op(0x0004).global(2).int32(2);
        asm.op(0x00D6).int8(1); // AND over the next two conditions
        asm.op(0x0038).global(1).int32(1);
        asm.op(0x0038).global(2).int32(second);
        asm.op(0x0001).int32(1000);
        asm.build()
    };

    let (mut both_true, _) = interpreter_for(program(2));
    both_true.tick(16).unwrap();
    assert!(both_true.vm.threads[0].condition_result);

    let (mut one_false, _) = interpreter_for(program(3));
    one_false.tick(16).unwrap();
    assert!(!one_false.vm.threads[0].condition_result);
}

#[test]
fn or_chain_folds_any_result() {
    let program = |first: i32, second: i32| {
        let mut asm = Asm::new();
        asm.op(0x0004).global(1).int32(1);
        asm.op(0x0004).global(2).int32(2);
        asm.op(0x00D6).int8(21); // OR over the next two conditions
        asm.op(0x0038).global(1).int32(first);
        asm.op(0x0038).global(2).int32(second);
        asm.op(0x0001).int32(1000);
        asm.build()
    };

    let (mut one_true, _) = interpreter_for(program(999, 2));
    one_true.tick(16).unwrap();
    assert!(one_true.vm.threads[0].condition_result);

    let (mut none_true, _) = interpreter_for(program(999, 999));
    none_true.tick(16).unwrap();
    assert!(!none_true.vm.threads[0].condition_result);
}

#[test]
fn unimplemented_opcode_advances_pc_and_leaves_globals_untouched() {
    let mut asm = Asm::new();
    asm.op(0x00A7).int8(1).int8(2).int8(3).int8(4); // bound but unimplemented
    asm.op(0x0001).int32(1000);
    let (mut interp, start) = interpreter_for(asm.build());

    let before = interp.vm.globals.raw().to_vec();
    interp.tick(16).unwrap();
    assert_eq!(interp.vm.globals.raw(), &before[..]);
    // Past the 4 encoded operands and the wait.
    assert_eq!(interp.vm.threads[0].program_counter, start + 10 + 7);
    assert_eq!(interp.warned_opcode_count(), 1);
}

#[test]
fn unimplemented_opcode_diagnoses_once_per_id() {
    let mut asm = Asm::new();
    asm.op(0x00A7).int8(1).int8(2).int8(3).int8(4);
    asm.op(0x00A7).int8(5).int8(6).int8(7).int8(8);
    asm.op(0x0001).int32(1000);
    let (mut interp, _) = interpreter_for(asm.build());

    interp.tick(16).unwrap();
    assert_eq!(interp.warned_opcode_count(), 1);
}

#[test]
fn unknown_opcode_fault_names_id_and_pc() {
    let mut asm = Asm::new();
    asm.op(0x0999);
    let (mut interp, start) = interpreter_for(asm.build());

    let err = interp.tick(16).unwrap_err();
    assert_eq!(
        err,
        ScriptFault::IllegalInstruction {
            opcode: 0x0999,
            offset: start,
            thread: "THREAD".to_string()
        }
    );
}

#[test]
fn fault_isolation_finishes_only_the_offending_thread() {
    let start = program_start();
    let mut asm = Asm::new();
    asm.op(0x004F).int32((start + 15) as i32).end_args();
    asm.op(0x0001).int32(1000);
    asm.op(0x0999); // spawned thread trips an unknown opcode
    let config = VmConfig {
        isolate_faults: true,
        ..VmConfig::default()
    };
    let (mut interp, _) = interpreter_with_config(asm.build(), config);

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.threads.len(), 1);
    assert_eq!(interp.vm.threads[0].id, 0);
}

#[test]
fn corruption_faults_abort_even_with_isolation() {
    let mut asm = Asm::new();
    asm.op(0x0002).int32(0x00FF_FFFF); // jump far outside the buffer
    let config = VmConfig {
        isolate_faults: true,
        ..VmConfig::default()
    };
    let (mut interp, _) = interpreter_with_config(asm.build(), config);

    let err = interp.tick(16).unwrap_err();
    assert!(matches!(err, ScriptFault::OutOfBounds { .. }));
}

#[test]
fn instruction_budget_bounds_a_runaway_thread() {
    let mut asm = Asm::new();
    asm.op(0x0004).global(1).int32(0);
    asm.op(0x0002).int32(-10); // tight self-loop
    let config = VmConfig {
        instruction_budget: 50,
        ..VmConfig::default()
    };
    let (mut interp, _) = interpreter_with_config(asm.build(), config);

    // The tick terminates despite the loop, and the thread stays live.
    interp.tick(16).unwrap();
    assert!(interp.has_live_threads());
}

#[test]
fn spawned_thread_runs_in_the_same_tick_with_seeded_locals() {
    let start = program_start();
    let mut asm = Asm::new();
    asm.op(0x004F)
        .int32((start + 20) as i32)
        .int32(42)
        .end_args();
    asm.op(0x0001).int32(1000);
    // Spawned body: copy local 0 into g10, then exit.
    asm.op(0x0004).global(10).local(0);
    asm.op(0x004E);
    let (mut interp, _) = interpreter_for(asm.build());

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.globals.get_int(10), 42);
}

#[test]
fn timer_locals_advance_only_while_the_thread_runs() {
    let mut asm = Asm::new();
    asm.op(0x0001).int32(1000);
    let (mut interp, _) = interpreter_for(asm.build());

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.threads[0].locals[crate::vm::TIMER_LOCAL_A], 16);
    assert_eq!(interp.vm.threads[0].locals[crate::vm::TIMER_LOCAL_B], 16);

    // Asleep: the slice returns early and the timers hold.
    interp.tick(16).unwrap();
    assert_eq!(interp.vm.threads[0].locals[crate::vm::TIMER_LOCAL_A], 16);
}

#[test]
fn wasted_player_resets_mission_thread_to_outer_frame() {
    let mut asm = Asm::new();
    asm.op(0x0050).int32(-26); // gosub A
    asm.op(0x0004).global(2).int32(1); // continuation after reset
    asm.op(0x0001).int32(1000);
    asm.op(0x004E);
    asm.op(0x0001).int8(16); // A: short sleep
    asm.op(0x0002).int32(-26); // loop in A

    let (file, start) = program_file(asm.build());
    let mut vm = Vm::new(file);
    vm.start_thread(start, true); // mission thread

    let wasted = Arc::new(AtomicBool::new(false));
    let world = TestWorld {
        wasted: Arc::clone(&wasted),
        ..TestWorld::default()
    };
    let mut interp = Interpreter::new(vm, standard_table(), Box::new(world), VmConfig::default());

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.threads[0].call_stack().len(), 1);

    wasted.store(true, Ordering::Relaxed);
    interp.tick(16).unwrap();
    let thread = &interp.vm.threads[0];
    assert!(thread.wasted_or_busted);
    assert!(thread.call_stack().is_empty());
    assert_eq!(interp.vm.globals.get_int(2), 1);
}

#[test]
fn force_finish_takes_effect_on_the_next_pass() {
    let mut asm = Asm::new();
    asm.op(0x0001).int32(100_000);
    let (mut interp, _) = interpreter_for(asm.build());

    interp.tick(16).unwrap();
    assert!(interp.has_live_threads());
    interp.vm.threads[0].force_finish();
    interp.tick(16).unwrap();
    assert!(!interp.has_live_threads());
}

#[test]
fn skippable_wait_wakes_on_the_skip_control() {
    let mut asm = Asm::new();
    asm.op(0x0001).int32(100_000);
    asm.op(0x0004).global(2).int32(1);
    asm.op(0x004E);

    let (file, start) = program_file(asm.build());
    let mut vm = Vm::new(file);
    vm.start_thread(start, false);

    let skip = Arc::new(AtomicBool::new(false));
    let world = TestWorld {
        skip: Arc::clone(&skip),
        ..TestWorld::default()
    };
    let mut interp = Interpreter::new(vm, standard_table(), Box::new(world), VmConfig::default());

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.globals.get_int(2), 0);

    interp.vm.threads[0].allow_wait_skip = true;
    skip.store(true, Ordering::Relaxed);
    interp.tick(16).unwrap();
    assert_eq!(interp.vm.globals.get_int(2), 1);
    assert!(!interp.has_live_threads());
}

#[test]
fn name_thread_opcode_renames_its_thread() {
    let mut asm = Asm::new();
    asm.op(0x03A4).string8("MAIN");
    asm.op(0x0001).int32(1000);
    let (mut interp, _) = interpreter_for(asm.build());

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.threads[0].name, "MAIN");
}

#[test]
fn mission_launch_resolves_the_offset_table() {
    // A container with one mission whose offset points at a terminate.
    let mut mission_code = Asm::new();
    mission_code.op(0x0004).global(3).int32(77);
    mission_code.op(0x004E);

    let mut root_code = Asm::new();
    root_code.op(0x0417).int8(0); // load_and_launch_mission 0
    root_code.op(0x0001).int32(1000);

    // Lay both blocks into one code section; the mission offset is found
    // by loading a probe container first.
    let mut code = root_code.build();
    let mission_offset_in_code = code.len() as u32;
    code.extend_from_slice(&mission_code.build());

    let probe = crate::test_scripts::build_container(&[], &[0], 8 + 64 * 4, &code);
    let probe_file = crate::scm_file::ScmFile::load(probe).unwrap();
    let mission_start = probe_file.code_section() + mission_offset_in_code;

    let data = crate::test_scripts::build_container(&[], &[mission_start], 8 + 64 * 4, &code);
    let file = crate::scm_file::ScmFile::load(data).unwrap();
    let start = file.code_section();
    let mut vm = Vm::new(file);
    vm.start_thread(start, false);
    let mut interp = Interpreter::new(
        vm,
        standard_table(),
        Box::new(TestWorld::default()),
        VmConfig::default(),
    );

    interp.tick(16).unwrap();
    assert_eq!(interp.vm.globals.get_int(3), 77);
    // The mission thread ran to completion; only the root remains.
    assert_eq!(interp.vm.threads.len(), 1);
}
