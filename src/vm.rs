// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The stack-based virtual machine: decodes a [`Chunk`] and executes it.
//!
//! `Vm` is an explicit value (no global singleton) owning the value
//! stack, the current chunk, the instruction pointer, the globals table,
//! and the string interner. The interner and globals outlive any single
//! `interpret` call; only the chunk is scoped to one compilation.

#[cfg(test)]
mod vm_test;

use crate::chunk::{Chunk, OpCode};
use crate::compiler::compile;
use crate::object::{self, ObjString};
use crate::table::Table;
use crate::value::Value;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Fixed value-stack capacity. A push beyond this is a reported runtime
/// error, not undefined behavior.
const STACK_MAX: usize = 256;

/// Outcome of an `interpret` call, mirroring the source's
/// `InterpretResult` enum (the exit-code mapping lives in `main.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    /// Compiled and ran to completion.
    Ok,
    /// The parser reported at least one error; nothing was executed.
    CompileError,
    /// Execution started but a runtime error aborted it.
    RuntimeError,
}

/// Runtime faults raised while executing a chunk.
///
/// Distinct from compile errors (see `compiler.rs`, which reports those
/// by printing directly during panic-mode recovery): every variant here
/// is returned by a fallible VM helper and converted to the reported
/// message at the point `run` catches it.
#[derive(Debug, Error)]
enum RuntimeError {
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    AddOperandsInvalid,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Stack underflow.")]
    StackUnderflow,
    #[error("Unknown opcode {0}.")]
    UnknownOpcode(u8),
}

/// The virtual machine.
///
/// `output` is where `OP_PRINT` writes — real process stdout in
/// production, an in-memory buffer in tests, mirroring how the teacher's
/// REPL is parameterized over a `Uart` sink instead of writing to a
/// global console directly.
pub struct Vm {
    stack: Vec<Value>,
    chunk: Chunk,
    ip: usize,
    globals: Table,
    strings: Table,
    objects: Vec<Rc<ObjString>>,
    output: Box<dyn Write>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Construct a fresh VM with empty globals/interner and no loaded
    /// chunk, printing to real stdout. Corresponds to the source's
    /// `initVM`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Construct a VM that writes `print` output to `output` instead of
    /// stdout — used by tests that need to assert on what was printed.
    #[must_use]
    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self {
            stack: Vec::with_capacity(STACK_MAX),
            chunk: Chunk::new(),
            ip: 0,
            globals: Table::new(),
            strings: Table::new(),
            objects: Vec::new(),
            output,
        }
    }

    /// Compile `source` and, if compilation succeeds, run it to
    /// completion or until a runtime error aborts it.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let mut chunk = Chunk::new();
        if !compile(source, &mut chunk, &mut self.strings, &mut self.objects) {
            return InterpretResult::CompileError;
        }
        self.chunk = chunk;
        self.ip = 0;
        self.run()
    }

    fn run(&mut self) -> InterpretResult {
        loop {
            match self.step() {
                Ok(Some(result)) => return result,
                Ok(None) => {}
                Err(error) => {
                    self.report_runtime_error(&error);
                    self.reset_stack();
                    return InterpretResult::RuntimeError;
                }
            }
        }
    }

    /// Decode and execute exactly one instruction. `Ok(Some(_))` signals
    /// the VM should stop (only `OP_RETURN` does this); `Ok(None)` means
    /// keep looping.
    fn step(&mut self) -> Result<Option<InterpretResult>, RuntimeError> {
        let byte = self.read_byte();
        let instruction = OpCode::try_from_byte(byte).map_err(RuntimeError::UnknownOpcode)?;
        debug!(?instruction, stack_depth = self.stack.len(), "dispatch");

        match instruction {
            OpCode::Constant => {
                let index = self.read_byte();
                let value = self.chunk.constant(index).clone();
                self.push(value)?;
            }
            OpCode::Nil => self.push(Value::nil())?,
            OpCode::True => self.push(Value::bool(true))?,
            OpCode::False => self.push(Value::bool(false))?,
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::DefineGlobal => {
                let index = self.read_byte();
                let name = Rc::clone(self.chunk.constant(index).as_string());
                let value = self.pop()?;
                self.globals.set(name, value);
            }
            OpCode::GetGlobal => {
                let index = self.read_byte();
                let name = Rc::clone(self.chunk.constant(index).as_string());
                match self.globals.get(&name) {
                    Some(value) => self.push(value)?,
                    None => return Err(RuntimeError::UndefinedVariable(name.chars.to_string())),
                }
            }
            OpCode::SetGlobal => {
                let index = self.read_byte();
                let name = Rc::clone(self.chunk.constant(index).as_string());
                if self.globals.get(&name).is_none() {
                    return Err(RuntimeError::UndefinedVariable(name.chars.to_string()));
                }
                let value = self.peek(0)?.clone();
                self.globals.set(name, value);
            }
            OpCode::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::bool(a == b))?;
            }
            OpCode::Greater => self.binary_compare(|a, b| a > b)?,
            OpCode::Less => self.binary_compare(|a, b| a < b)?,
            OpCode::Add => self.add()?,
            OpCode::Subtract => self.binary_numeric(|a, b| a - b)?,
            OpCode::Multiply => self.binary_numeric(|a, b| a * b)?,
            OpCode::Divide => self.binary_numeric(|a, b| a / b)?,
            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::bool(!value.is_truthy()))?;
            }
            OpCode::Negate => {
                if !self.peek(0)?.is_number() {
                    return Err(RuntimeError::OperandsMustBeNumbers);
                }
                let value = self.pop()?;
                self.push(Value::number(-value.as_number()))?;
            }
            OpCode::Print => {
                let value = self.pop()?;
                writeln!(self.output, "{value}").expect("writing to the print sink should not fail");
            }
            OpCode::Return => return Ok(Some(InterpretResult::Ok)),
        }

        Ok(None)
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        let both_strings = self.peek(0)?.is_string() && self.peek(1)?.is_string();
        let both_numbers = self.peek(0)?.is_number() && self.peek(1)?.is_number();

        if both_strings {
            let b = self.pop()?;
            let a = self.pop()?;
            let mut concatenated = String::with_capacity(a.as_string().len() + b.as_string().len());
            concatenated.push_str(&a.as_string().chars);
            concatenated.push_str(&b.as_string().chars);
            let interned = object::take_string(&mut self.strings, &mut self.objects, concatenated.into_boxed_str());
            self.push(Value::string(interned))
        } else if both_numbers {
            let b = self.pop()?;
            let a = self.pop()?;
            self.push(Value::number(a.as_number() + b.as_number()))
        } else {
            Err(RuntimeError::AddOperandsInvalid)
        }
    }

    fn binary_numeric(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        if !self.peek(0)?.is_number() || !self.peek(1)?.is_number() {
            return Err(RuntimeError::OperandsMustBeNumbers);
        }
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(Value::number(op(a.as_number(), b.as_number())))
    }

    fn binary_compare(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        if !self.peek(0)?.is_number() || !self.peek(1)?.is_number() {
            return Err(RuntimeError::OperandsMustBeNumbers);
        }
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(Value::bool(op(a.as_number(), b.as_number())))
    }

    fn read_byte(&mut self) -> u8 {
        let byte = self.chunk.code()[self.ip];
        self.ip += 1;
        byte
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Look `distance` slots down from the top without popping. `peek(0)`
    /// is the top of the stack.
    fn peek(&self, distance: usize) -> Result<&Value, RuntimeError> {
        let index = self.stack.len().checked_sub(distance + 1).ok_or(RuntimeError::StackUnderflow)?;
        Ok(&self.stack[index])
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
    }

    /// `<message>\n[line N] in script\n`, where `N` is the line of the
    /// byte last consumed by `read_byte` — the spec's `ip - 1`.
    fn report_runtime_error(&self, error: &RuntimeError) {
        eprintln!("{error}");
        let line = self.chunk.line_at(self.ip - 1);
        eprintln!("[line {line}] in script");
    }
}
