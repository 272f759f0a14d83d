//! Operand and instruction decoding tests: every tag decodes bit-for-bit,
//! the cursor advances by exactly the payload size, and malformed streams
//! fault with the offending offset.

use crate::error::ScriptFault;
use crate::instruction::{decode_operands, Instruction, Operand};
use crate::opcode_table::standard_table;
use crate::test_scripts::Asm;
use test_log::test;

#[test]
fn int8_is_sign_extended() {
    let bytes = Asm::new().int8(-5).build();
    let (ops, consumed) = decode_operands(&bytes, 0, 1, "test").unwrap();
    assert_eq!(ops, vec![Operand::Int8(-5)]);
    assert_eq!(ops[0].immediate_int(), Some(-5)); // not 251
    assert_eq!(consumed, 2);
}

#[test]
fn int16_is_sign_extended() {
    let bytes = Asm::new().int16(-300).build();
    let (ops, consumed) = decode_operands(&bytes, 0, 1, "test").unwrap();
    assert_eq!(ops[0].immediate_int(), Some(-300)); // not 65236
    assert_eq!(consumed, 3);
}

#[test]
fn int32_roundtrips() {
    let bytes = Asm::new().int32(-123_456_789).build();
    let (ops, consumed) = decode_operands(&bytes, 0, 1, "test").unwrap();
    assert_eq!(ops[0].immediate_int(), Some(-123_456_789));
    assert_eq!(consumed, 5);
}

#[test]
fn fixed_point_real_decodes_in_sixteenths() {
    let bytes = Asm::new().real(1.5).real(-2.25).build();
    let (ops, consumed) = decode_operands(&bytes, 0, 2, "test").unwrap();
    assert_eq!(ops[0], Operand::Real(1.5));
    assert_eq!(ops[1], Operand::Real(-2.25));
    assert_eq!(consumed, 6);
}

#[test]
fn slot_references_carry_their_index() {
    let bytes = Asm::new().global(17).local(3).build();
    let (ops, consumed) = decode_operands(&bytes, 0, 2, "test").unwrap();
    assert_eq!(ops[0], Operand::Global(17));
    assert_eq!(ops[1], Operand::Local(3));
    assert!(ops[0].is_slot());
    assert_eq!(consumed, 6);
}

#[test]
fn inline_string_consumes_eight_bytes_tag_included() {
    let bytes = Asm::new().string8("MISSION1").int8(4).build();
    let (ops, consumed) = decode_operands(&bytes, 0, 2, "test").unwrap();
    assert_eq!(ops[0].as_string().as_deref(), Some("MISSION1"));
    assert_eq!(ops[1], Operand::Int8(4));
    assert_eq!(consumed, 10);
}

#[test]
fn short_string_is_nul_padded() {
    let bytes = Asm::new().string8("MAIN").build();
    let (ops, consumed) = decode_operands(&bytes, 0, 1, "test").unwrap();
    assert_eq!(ops[0].as_string().as_deref(), Some("MAIN"));
    assert_eq!(consumed, 8);
}

#[test]
fn open_ended_list_stops_at_terminator() {
    let bytes = Asm::new().int32(100).int8(7).int8(9).end_args().build();
    let (ops, consumed) = decode_operands(&bytes, 0, -1, "test").unwrap();
    // The terminator is consumed but not surfaced.
    assert_eq!(
        ops,
        vec![Operand::Int32(100), Operand::Int8(7), Operand::Int8(9)]
    );
    assert_eq!(consumed, 5 + 2 + 2 + 1);
}

#[test]
fn unknown_tag_faults_with_offset() {
    let bytes = vec![0x07, 0x00];
    let err = decode_operands(&bytes, 0, 1, "MAIN").unwrap_err();
    assert_eq!(
        err,
        ScriptFault::UnknownType {
            tag: 0x07,
            offset: 0,
            thread: "MAIN".to_string()
        }
    );
}

#[test]
fn truncated_payload_is_out_of_bounds() {
    let bytes = vec![crate::instruction::TYPE_INT32, 0x01, 0x02];
    let err = decode_operands(&bytes, 0, 1, "test").unwrap_err();
    assert!(matches!(err, ScriptFault::OutOfBounds { .. }));
}

#[test]
fn instruction_decode_resolves_table_entry() {
    let bytes = Asm::new().op(0x0001).int32(250).build();
    let table = standard_table();
    let inst = Instruction::decode(&bytes, 0, &table, "test").unwrap();
    assert_eq!(inst.opcode, 0x0001);
    assert_eq!(inst.name, "wait");
    assert!(!inst.negated);
    assert_eq!(inst.size, 2 + 5);
}

#[test]
fn instruction_decode_reports_negate_bit() {
    let bytes = Asm::new().op(0x0038 | 0x8000).global(2).int32(7).build();
    let table = standard_table();
    let inst = Instruction::decode(&bytes, 0, &table, "test").unwrap();
    assert_eq!(inst.opcode, 0x0038);
    assert!(inst.negated);
}

#[test]
fn instruction_decode_faults_on_unknown_id() {
    let bytes = Asm::new().op(0x0999).build();
    let table = standard_table();
    let err = Instruction::decode(&bytes, 0, &table, "MAIN").unwrap_err();
    assert_eq!(
        err,
        ScriptFault::IllegalInstruction {
            opcode: 0x0999,
            offset: 0,
            thread: "MAIN".to_string()
        }
    );
}
