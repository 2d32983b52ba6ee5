// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::*;

fn compile_ok(source: &str) -> Chunk {
    let mut chunk = Chunk::new();
    let mut strings = Table::new();
    let mut objects = Vec::new();
    let ok = compile(source, &mut chunk, &mut strings, &mut objects);
    assert!(ok, "expected {source:?} to compile successfully");
    chunk
}

fn compile_fails(source: &str) {
    let mut chunk = Chunk::new();
    let mut strings = Table::new();
    let mut objects = Vec::new();
    assert!(!compile(source, &mut chunk, &mut strings, &mut objects));
}

#[test]
fn empty_program_just_returns() {
    let chunk = compile_ok("");
    assert_eq!(chunk.code(), &[OpCode::Return as u8]);
}

#[test]
fn print_statement_emits_constant_then_print() {
    let chunk = compile_ok("print 1;");
    assert_eq!(
        chunk.code(),
        &[
            OpCode::Constant as u8,
            0,
            OpCode::Print as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn arithmetic_precedence_multiplies_before_adding() {
    // 1 + 2 * 3 => push 1, push 2, push 3, multiply, add
    let chunk = compile_ok("print 1 + 2 * 3;");
    assert_eq!(
        chunk.code(),
        &[
            OpCode::Constant as u8,
            0, // 1
            OpCode::Constant as u8,
            1, // 2
            OpCode::Constant as u8,
            2, // 3
            OpCode::Multiply as u8,
            OpCode::Add as u8,
            OpCode::Print as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn left_associative_subtraction() {
    // 10 - 3 - 2 => ((10 - 3) - 2)
    let chunk = compile_ok("print 10 - 3 - 2;");
    assert_eq!(
        chunk.code(),
        &[
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Subtract as u8,
            OpCode::Constant as u8,
            2,
            OpCode::Subtract as u8,
            OpCode::Print as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn not_equal_is_equal_then_not() {
    let chunk = compile_ok("print 1 != 2;");
    assert_eq!(chunk.code()[4], OpCode::Equal as u8);
    assert_eq!(chunk.code()[5], OpCode::Not as u8);
}

#[test]
fn less_equal_is_greater_then_not() {
    let chunk = compile_ok("print 1 <= 2;");
    assert_eq!(chunk.code()[4], OpCode::Greater as u8);
    assert_eq!(chunk.code()[5], OpCode::Not as u8);
}

#[test]
fn unary_minus_then_negate() {
    let chunk = compile_ok("print -1;");
    assert_eq!(
        chunk.code(),
        &[
            OpCode::Constant as u8,
            0,
            OpCode::Negate as u8,
            OpCode::Print as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn grouping_overrides_precedence() {
    // (1 + 2) * 3 => add before multiply, unlike the ungrouped case.
    let chunk = compile_ok("print (1 + 2) * 3;");
    assert_eq!(
        chunk.code(),
        &[
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Add as u8,
            OpCode::Constant as u8,
            2,
            OpCode::Multiply as u8,
            OpCode::Print as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn literals_emit_dedicated_opcodes_not_constants() {
    let chunk = compile_ok("print nil;");
    assert_eq!(chunk.code(), &[OpCode::Nil as u8, OpCode::Print as u8, OpCode::Return as u8]);
}

#[test]
fn var_declaration_without_initializer_defaults_to_nil() {
    let chunk = compile_ok("var x;");
    assert_eq!(
        chunk.code(),
        &[
            OpCode::Nil as u8,
            OpCode::DefineGlobal as u8,
            0,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn var_declaration_with_initializer() {
    // identifier_constant(name) runs before the initializer expression is
    // compiled, so the name lands in the constant pool at index 0 and the
    // initializer value at index 1 — the reverse of emission order.
    let chunk = compile_ok("var x = 1;");
    assert_eq!(
        chunk.code(),
        &[
            OpCode::Constant as u8,
            1, // initializer value constant
            OpCode::DefineGlobal as u8,
            0, // name constant
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn bare_expression_statement_pops_its_result() {
    let chunk = compile_ok("1 + 1;");
    assert_eq!(
        chunk.code(),
        &[
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Add as u8,
            OpCode::Pop as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn assignment_emits_set_global_and_leaves_no_extra_pop() {
    let chunk = compile_ok("var x = 1; x = 2;");
    assert!(chunk.code().contains(&(OpCode::SetGlobal as u8)));
}

#[test]
fn reading_an_identifier_emits_get_global() {
    let chunk = compile_ok("var x = 1; print x;");
    assert!(chunk.code().contains(&(OpCode::GetGlobal as u8)));
}

#[test]
fn block_contains_nested_statements_without_new_opcodes() {
    let chunk = compile_ok("{ print 1; print 2; }");
    let print_count = chunk.code().iter().filter(|&&b| b == OpCode::Print as u8).count();
    assert_eq!(print_count, 2);
}

#[test]
fn missing_semicolon_is_a_compile_error() {
    compile_fails("print 1");
}

#[test]
fn unexpected_token_is_a_compile_error() {
    compile_fails("print ;");
}

#[test]
fn too_many_constants_is_a_compile_error() {
    let mut source = String::new();
    for i in 0..300 {
        source.push_str(&format!("print {i};\n"));
    }
    compile_fails(&source);
}

#[test]
fn error_recovery_continues_past_first_error_via_synchronize() {
    // The first statement is broken (missing semicolon before `print`),
    // but synchronize() should resume at the next `print` keyword rather
    // than cascading failures through the rest of the file.
    let mut chunk = Chunk::new();
    let mut strings = Table::new();
    let mut objects = Vec::new();
    let ok = compile("print 1 print 2;", &mut chunk, &mut strings, &mut objects);
    assert!(!ok);
}

#[test]
fn string_literal_strips_quotes_and_interns() {
    let chunk = compile_ok(r#"print "hello";"#);
    assert_eq!(chunk.constant(0).to_string(), "hello");
}
