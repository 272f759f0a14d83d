//! World-facing opcodes: leaves that call into the `GameWorld`
//! collaborator, plus the bound-but-unimplemented ids whose only job is to
//! keep the instruction stream aligned while a diagnostic is emitted.

use crate::error::ScriptFault;
use crate::game_world::MessageKind;
use crate::interpreter::ScriptContext;
use crate::opcode_table::OpcodeModule;

fn print_big(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let id = ctx.string(0);
    let time = ctx.int(1);
    let style = ctx.int(2);
    ctx.world.display_message(&id, time, style, MessageKind::Big);
    Ok(())
}

fn print_now(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let id = ctx.string(0);
    let time = ctx.int(1);
    let style = ctx.int(2);
    ctx.world
        .display_message(&id, time, style, MessageKind::HighPriority);
    Ok(())
}

fn print_soon(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let id = ctx.string(0);
    let time = ctx.int(1);
    let style = ctx.int(2);
    ctx.world
        .display_message(&id, time, style, MessageKind::BigLowPriority);
    Ok(())
}

fn clear_prints(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    ctx.world.clear_messages();
    Ok(())
}

fn get_time_of_day(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let hour = ctx.world.hour();
    let minute = ctx.world.minute();
    ctx.set_int(0, hour);
    ctx.set_int(1, minute);
    Ok(())
}

fn set_time_of_day(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let hour = ctx.int(0);
    let minute = ctx.int(1);
    ctx.world.set_time(hour, minute);
    Ok(())
}

fn is_button_pressed(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let player = ctx.int(0);
    let button = ctx.int(1);
    let pressed = ctx.world.is_button_pressed(player, button);
    ctx.set_condition(pressed);
    Ok(())
}

fn set_death_arrest_state(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    ctx.thread.death_arrest_check = ctx.int(0) != 0;
    Ok(())
}

fn has_death_arrest_been_executed(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let result = ctx.thread.wasted_or_busted;
    ctx.set_condition(result);
    Ok(())
}

fn request_model(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let id = ctx.int(0);
    // Negative ids index the script's own model-name table.
    let name = if id < 0 {
        ctx.file.model_name((-id) as usize).map(str::to_string)
    } else {
        None
    };
    ctx.world.request_model(id, name.as_deref());
    Ok(())
}

fn has_model_loaded(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let id = ctx.int(0);
    let loaded = ctx.world.is_model_loaded(id);
    ctx.set_condition(loaded);
    Ok(())
}

pub fn module() -> OpcodeModule {
    let mut m = OpcodeModule::new("game");
    m.bind_unimplemented(0x00A7, "drive_to", 4);
    m.bind_unimplemented(0x00AD, "set_driving_speed", 2);
    m.bind_unimplemented(0x00AE, "set_driving_style", 2);
    m.bind_function(0x00BA, "print_big", 3, print_big);
    m.bind_function(0x00BC, "print_now", 3, print_now);
    m.bind_function(0x00BD, "print_soon", 3, print_soon);
    m.bind_function(0x00BE, "clear_prints", 0, clear_prints);
    m.bind_function(0x00BF, "get_time_of_day", 2, get_time_of_day);
    m.bind_function(0x00C0, "set_time_of_day", 2, set_time_of_day);
    m.bind_function(0x00E1, "is_button_pressed", 2, is_button_pressed);
    m.bind_unimplemented(0x0109, "add_character_money", 2);
    m.bind_unimplemented(0x010D, "set_wanted_level", 2);
    m.bind_unimplemented(0x0110, "clear_wanted_level", 1);
    m.bind_function(0x0111, "set_death_arrest_state", 1, set_death_arrest_state);
    m.bind_function(
        0x0112,
        "has_death_arrest_been_executed",
        0,
        has_death_arrest_been_executed,
    );
    m.bind_unimplemented(0x014D, "add_pager_message", 4);
    m.bind_unimplemented(0x014E, "display_onscreen_timer", 1);
    m.bind_unimplemented(0x014F, "stop_timer", 1);
    m.bind_unimplemented(0x0151, "clear_counter", 1);
    m.bind_unimplemented(0x0152, "set_zone_car_info", 17);
    m.bind_unimplemented(0x0158, "camera_follow_vehicle", 3);
    m.bind_unimplemented(0x0159, "camera_follow_character", 3);
    m.bind_unimplemented(0x015A, "reset_camera", 0);
    m.bind_function(0x0247, "request_model", 1, request_model);
    m.bind_function(0x0248, "has_model_loaded", 1, has_model_loaded);
    m.bind_unimplemented(0x038B, "load_all_models_now", 0);
    m
}
