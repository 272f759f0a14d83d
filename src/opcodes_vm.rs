//! Control-flow and thread-lifecycle opcodes.

use crate::error::ScriptFault;
use crate::interpreter::ScriptContext;
use crate::opcode_table::OpcodeModule;
use crate::vm::{Pc, WAKE_YIELDED};
use log::{error, info};

fn wait(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    ctx.thread.wake_counter = ctx.int(0);
    if ctx.thread.wake_counter == 0 {
        ctx.thread.wake_counter = WAKE_YIELDED;
    }
    Ok(())
}

fn goto(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    ctx.thread.program_counter = ctx.jump_target(0);
    Ok(())
}

fn goto_if_false(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    if !ctx.thread.condition_result {
        ctx.thread.program_counter = ctx.jump_target(0);
    }
    Ok(())
}

fn terminate_this_script(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    ctx.thread.force_finish();
    Ok(())
}

fn start_new_script(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let start = ctx.int(0) as Pc;
    // Remaining operands seed the new thread's leading locals.
    let args: Vec<i32> = (1..ctx.args.len()).map(|i| ctx.int(i)).collect();
    info!("{} spawning thread at {:06x}", ctx.thread.name, start);
    ctx.start_thread(start, false, args);
    Ok(())
}

fn gosub(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let continuation = ctx.thread.program_counter;
    ctx.thread.push_call(continuation)?;
    ctx.thread.program_counter = ctx.jump_target(0);
    Ok(())
}

fn return_from_gosub(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    match ctx.thread.pop_call() {
        Some(address) => {
            ctx.thread.program_counter = address;
            Ok(())
        }
        None if ctx.thread.is_root => Err(ScriptFault::StackUnderflow {
            offset: ctx.thread.program_counter,
            thread: ctx.thread.name.clone(),
        }),
        None => {
            // A bare return on a spawned thread is how scripts exit it.
            ctx.thread.force_finish();
            Ok(())
        }
    }
}

/// Operand 0 encodes the chain: 0..=7 opens an AND chain over n+1 upcoming
/// results, 21.. opens an OR chain over n-19 results.
fn open_condition_chain(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let n = ctx.int(0);
    if n <= 7 {
        ctx.thread.condition_count = (n + 1).max(0) as u32;
        ctx.thread.condition_mask = 0xFF;
        ctx.thread.condition_and = true;
    } else {
        ctx.thread.condition_count = (n - 19).max(0) as u32;
        ctx.thread.condition_mask = 0x00;
        ctx.thread.condition_and = false;
    }
    Ok(())
}

fn launch_mission_thread(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let start = ctx.int(0) as Pc;
    info!("starting mission thread at {:06x}", start);
    ctx.start_thread(start, true, Vec::new());
    Ok(())
}

fn mission_has_finished(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    info!("mission over on thread {}", ctx.thread.name);
    ctx.world.mission_over();
    Ok(())
}

fn name_thread(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    ctx.thread.name = ctx.string(0);
    Ok(())
}

fn load_and_launch_mission(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let index = ctx.int(0);
    let offset = ctx.file.mission_offsets().get(index as usize).copied();
    match offset {
        Some(offset) => {
            info!("starting mission {index} at {:06x}", offset);
            ctx.start_thread(offset, true, Vec::new());
        }
        None => error!(
            "mission {index} out of range ({} missions)",
            ctx.file.mission_offsets().len()
        ),
    }
    Ok(())
}

pub fn module() -> OpcodeModule {
    let mut m = OpcodeModule::new("vm");
    m.bind_function(0x0001, "wait", 1, wait);
    m.bind_function(0x0002, "goto", 1, goto);
    m.bind_function(0x004D, "goto_if_false", 1, goto_if_false);
    m.bind_function(0x004E, "terminate_this_script", 0, terminate_this_script);
    m.bind_function(0x004F, "start_new_script", -1, start_new_script);
    m.bind_function(0x0050, "gosub", 1, gosub);
    m.bind_function(0x0051, "return", 0, return_from_gosub);
    m.bind_function(0x00D6, "andor", 1, open_condition_chain);
    m.bind_function(0x00D7, "launch_mission_thread", 1, launch_mission_thread);
    m.bind_function(0x00D8, "mission_has_finished", 0, mission_has_finished);
    m.bind_function(0x02CD, "gosub_far", 2, gosub);
    m.bind_function(0x03A4, "name_thread", 1, name_thread);
    m.bind_function(0x0417, "load_and_launch_mission", 1, load_and_launch_mission);
    m
}
