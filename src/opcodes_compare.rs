//! Conditional comparisons. Each handler stores its boolean as the thread's
//! last condition result; negation and AND/OR chaining happen in the
//! dispatcher after the handler returns.

use crate::error::ScriptFault;
use crate::interpreter::ScriptContext;
use crate::opcode_table::OpcodeModule;

fn is_int_greater(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let result = ctx.int(0) > ctx.int(1);
    ctx.set_condition(result);
    Ok(())
}

fn is_float_greater(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let result = ctx.real(0) > ctx.real(1);
    ctx.set_condition(result);
    Ok(())
}

fn is_int_greater_or_equal(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let result = ctx.int(0) >= ctx.int(1);
    ctx.set_condition(result);
    Ok(())
}

fn is_int_equal(ctx: &mut ScriptContext<'_>) -> Result<(), ScriptFault> {
    let result = ctx.int(0) == ctx.int(1);
    ctx.set_condition(result);
    Ok(())
}

pub fn module() -> OpcodeModule {
    let mut m = OpcodeModule::new("compare");
    m.bind_function(0x0018, "is_int_var_greater_than_number", 2, is_int_greater);
    m.bind_function(0x0019, "is_int_lvar_greater_than_number", 2, is_int_greater);
    m.bind_function(0x001A, "is_number_greater_than_int_var", 2, is_int_greater);
    m.bind_function(0x001B, "is_number_greater_than_int_lvar", 2, is_int_greater);
    m.bind_function(0x001C, "is_int_var_greater_than_int_var", 2, is_int_greater);
    m.bind_function(
        0x001D,
        "is_int_lvar_greater_than_int_lvar",
        2,
        is_int_greater,
    );
    m.bind_function(
        0x0020,
        "is_float_var_greater_than_number",
        2,
        is_float_greater,
    );
    m.bind_function(
        0x0028,
        "is_int_var_greater_or_equal_to_number",
        2,
        is_int_greater_or_equal,
    );
    m.bind_function(
        0x0029,
        "is_int_lvar_greater_or_equal_to_number",
        2,
        is_int_greater_or_equal,
    );
    m.bind_function(
        0x002A,
        "is_number_greater_or_equal_to_int_var",
        2,
        is_int_greater_or_equal,
    );
    m.bind_function(0x0038, "is_int_var_equal_to_number", 2, is_int_equal);
    m.bind_function(0x0039, "is_int_lvar_equal_to_number", 2, is_int_equal);
    m.bind_function(0x003A, "is_int_var_equal_to_int_var", 2, is_int_equal);
    m
}
