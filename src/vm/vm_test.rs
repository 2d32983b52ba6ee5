// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::*;

struct Captured {
    vm: Vm,
    buf: std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
}

struct SharedBuf(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn vm_with_capture() -> Captured {
    let buf = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let vm = Vm::with_output(Box::new(SharedBuf(std::rc::Rc::clone(&buf))));
    Captured { vm, buf }
}

impl Captured {
    fn output(&self) -> String {
        String::from_utf8(self.buf.borrow().clone()).unwrap()
    }
}

#[test]
fn arithmetic_precedence() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print 1 + 2 * 3;"), InterpretResult::Ok);
    assert_eq!(c.output(), "7\n");
}

#[test]
fn left_associative_subtraction() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print 10 - 3 - 2;"), InterpretResult::Ok);
    assert_eq!(c.output(), "5\n");
}

#[test]
fn string_concatenation_and_interning() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret(r#"print "foo" + "bar" == "foobar";"#), InterpretResult::Ok);
    assert_eq!(c.output(), "true\n");
}

#[test]
fn boolean_negation_of_nil() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print !nil;"), InterpretResult::Ok);
    assert_eq!(c.output(), "true\n");
}

#[test]
fn zero_is_truthy_so_double_negation_is_true() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print !!0;"), InterpretResult::Ok);
    assert_eq!(c.output(), "true\n");
}

#[test]
fn cross_type_equality_is_always_false() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret(r#"print "1" == 1;"#), InterpretResult::Ok);
    assert_eq!(c.output(), "false\n");
}

#[test]
fn negating_a_non_number_is_a_runtime_error() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print -true;"), InterpretResult::RuntimeError);
}

#[test]
fn division_by_zero_yields_infinity_not_an_error() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print 1 / 0;"), InterpretResult::Ok);
    assert_eq!(c.output(), "inf\n");
}

#[test]
fn global_variable_round_trip() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("var x = 10; print x;"), InterpretResult::Ok);
    assert_eq!(c.output(), "10\n");
}

#[test]
fn global_assignment_updates_value_and_evaluates_to_it() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("var x = 1; x = 2; print x;"), InterpretResult::Ok);
    assert_eq!(c.output(), "2\n");
}

#[test]
fn reading_undefined_global_is_a_runtime_error() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print nope;"), InterpretResult::RuntimeError);
}

#[test]
fn assigning_undefined_global_is_a_runtime_error_and_does_not_create_it() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("nope = 1;"), InterpretResult::RuntimeError);
    assert_eq!(c.vm.interpret("print nope;"), InterpretResult::RuntimeError);
}

#[test]
fn globals_persist_across_separate_interpret_calls() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("var x = 40;"), InterpretResult::Ok);
    assert_eq!(c.vm.interpret("print x + 2;"), InterpretResult::Ok);
    assert_eq!(c.output(), "42\n");
}

#[test]
fn compile_error_does_not_execute_anything() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print 1"), InterpretResult::CompileError);
    assert_eq!(c.output(), "");
}

#[test]
fn runtime_error_resets_the_stack_so_the_next_call_still_works() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("print 1 + true;"), InterpretResult::RuntimeError);
    assert_eq!(c.vm.interpret("print 1 + 1;"), InterpretResult::Ok);
    assert_eq!(c.output(), "2\n");
}

#[test]
fn block_groups_statements_without_separate_scoping() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret("{ print 1; print 2; }"), InterpretResult::Ok);
    assert_eq!(c.output(), "1\n2\n");
}

#[test]
fn adding_two_strings_and_two_numbers_works_but_mixed_types_error() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret(r#"print "a" + 1;"#), InterpretResult::RuntimeError);
}

#[test]
fn not_greater_than_comparison_on_strings_is_a_runtime_error() {
    let mut c = vm_with_capture();
    assert_eq!(c.vm.interpret(r#"print "a" > "b";"#), InterpretResult::RuntimeError);
}
