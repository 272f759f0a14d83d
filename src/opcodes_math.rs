//! Assignment and arithmetic on script variables.
//!
//! Handlers are slot-agnostic: the operand itself says whether it names a
//! global or a thread-local slot, so the same handler serves both id ranges.

use crate::error::ScriptFault;
use crate::interpreter::ScriptContext;
use crate::opcode_table::OpcodeModule;
use log::error;
use rand::Rng;

fn set_int(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.int(1);
    ctx.set_int(0, value);
    Ok(())
}

fn set_float(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.real(1);
    ctx.set_real(0, value);
    Ok(())
}

fn add_int(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.int(0).wrapping_add(ctx.int(1));
    ctx.set_int(0, value);
    Ok(())
}

fn add_float(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.real(0) + ctx.real(1);
    ctx.set_real(0, value);
    Ok(())
}

fn sub_int(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.int(0).wrapping_sub(ctx.int(1));
    ctx.set_int(0, value);
    Ok(())
}

fn sub_float(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.real(0) - ctx.real(1);
    ctx.set_real(0, value);
    Ok(())
}

fn mul_int(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.int(0).wrapping_mul(ctx.int(1));
    ctx.set_int(0, value);
    Ok(())
}

fn mul_float(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.real(0) * ctx.real(1);
    ctx.set_real(0, value);
    Ok(())
}

fn div_int(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let divisor = ctx.int(1);
    if divisor == 0 {
        error!("integer division by zero on thread {}", ctx.thread.name);
        return Ok(());
    }
    let value = ctx.int(0).wrapping_div(divisor);
    ctx.set_int(0, value);
    Ok(())
}

fn div_float(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let value = ctx.real(0) / ctx.real(1);
    ctx.set_real(0, value);
    Ok(())
}

fn random_int_in_range(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let lo = ctx.int(0);
    let hi = ctx.int(1);
    let value = if lo < hi {
        rand::thread_rng().gen_range(lo..hi)
    } else {
        lo
    };
    ctx.set_int(2, value);
    Ok(())
}

fn random_float_in_range(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let lo = ctx.real(0);
    let hi = ctx.real(1);
    let value = if lo < hi {
        rand::thread_rng().gen_range(lo..hi)
    } else {
        lo
    };
    ctx.set_real(2, value);
    Ok(())
}

pub fn module() -> OpcodeModule {
    let mut m = OpcodeModule::new("math");
    m.bind_function(0x0004, "set_var_int", 2, set_int);
    m.bind_function(0x0005, "set_var_float", 2, set_float);
    m.bind_function(0x0006, "set_lvar_int", 2, set_int);
    m.bind_function(0x0007, "set_lvar_float", 2, set_float);
    m.bind_function(0x0008, "add_val_to_int_var", 2, add_int);
    m.bind_function(0x0009, "add_val_to_float_var", 2, add_float);
    m.bind_function(0x000A, "add_val_to_int_lvar", 2, add_int);
    m.bind_function(0x000B, "add_val_to_float_lvar", 2, add_float);
    m.bind_function(0x000C, "sub_val_from_int_var", 2, sub_int);
    m.bind_function(0x000D, "sub_val_from_float_var", 2, sub_float);
    m.bind_function(0x000E, "sub_val_from_int_lvar", 2, sub_int);
    m.bind_function(0x000F, "sub_val_from_float_lvar", 2, sub_float);
    m.bind_function(0x0010, "mult_int_var_by_val", 2, mul_int);
    m.bind_function(0x0011, "mult_float_var_by_val", 2, mul_float);
    m.bind_function(0x0012, "mult_int_lvar_by_val", 2, mul_int);
    m.bind_function(0x0013, "mult_float_lvar_by_val", 2, mul_float);
    m.bind_function(0x0014, "div_int_var_by_val", 2, div_int);
    m.bind_function(0x0015, "div_float_var_by_val", 2, div_float);
    m.bind_function(0x0016, "div_int_lvar_by_val", 2, div_int);
    m.bind_function(0x0017, "div_float_lvar_by_val", 2, div_float);
    m.bind_function(0x0060, "sub_int_var_from_int_var", 2, sub_int);
    m.bind_function(0x0061, "sub_float_var_from_float_var", 2, sub_float);
    m.bind_function(0x0084, "set_var_int_to_var_int", 2, set_int);
    m.bind_function(0x0086, "set_var_float_to_var_float", 2, set_float);
    m.bind_function(
        0x0208,
        "generate_random_float_in_range",
        3,
        random_float_in_range,
    );
    m.bind_function(
        0x0209,
        "generate_random_int_in_range",
        3,
        random_int_in_range,
    );
    m
}
